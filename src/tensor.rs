// 该文件是 Shanan （山南西风） 项目的一部分。
// src/tensor.rs - 模型输入/输出张量
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TensorLayout {
  #[default]
  Nhwc,
  Nchw,
}

/// 模型输入张量，批大小固定为 1
#[derive(Debug, Clone)]
pub struct Tensor {
  data: Box<[f32]>,
  layout: TensorLayout,
  height: usize,
  width: usize,
  channels: usize,
}

impl Tensor {
  pub fn zeros(layout: TensorLayout, height: usize, width: usize, channels: usize) -> Self {
    Self {
      data: vec![0.0; height * width * channels].into_boxed_slice(),
      layout,
      height,
      width,
      channels,
    }
  }

  pub fn layout(&self) -> TensorLayout {
    self.layout
  }

  pub fn height(&self) -> usize {
    self.height
  }

  pub fn width(&self) -> usize {
    self.width
  }

  pub fn channels(&self) -> usize {
    self.channels
  }

  /// `[1, H, W, C]` 或 `[1, C, H, W]`
  pub fn shape(&self) -> [usize; 4] {
    match self.layout {
      TensorLayout::Nhwc => [1, self.height, self.width, self.channels],
      TensorLayout::Nchw => [1, self.channels, self.height, self.width],
    }
  }

  pub fn as_slice(&self) -> &[f32] {
    &self.data
  }

  fn offset(&self, y: usize, x: usize, c: usize) -> usize {
    match self.layout {
      TensorLayout::Nhwc => (y * self.width + x) * self.channels + c,
      TensorLayout::Nchw => (c * self.height + y) * self.width + x,
    }
  }

  pub fn get(&self, y: usize, x: usize, c: usize) -> f32 {
    self.data[self.offset(y, x, c)]
  }

  pub fn set(&mut self, y: usize, x: usize, c: usize, value: f32) {
    let idx = self.offset(y, x, c);
    self.data[idx] = value;
  }
}

/// 推理引擎的原始输出：扁平数组加形状
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDetectionTensor {
  pub shape: Vec<usize>,
  pub data: Vec<f32>,
}

impl RawDetectionTensor {
  pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Self {
    Self { shape, data }
  }

  /// 形状对应的元素个数；乘积溢出时为 `None`
  pub fn element_count(&self) -> Option<usize> {
    self
      .shape
      .iter()
      .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
  }

  pub fn is_consistent(&self) -> bool {
    !self.shape.is_empty() && self.element_count() == Some(self.data.len())
  }
}
