// 该文件是 Shanan （山南西风） 项目的一部分。
// src/preprocess.rs - 帧预处理
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

//! 帧 -> 张量
//!
//! 处理顺序固定为：按帧的旋转信息转正 -> 缩放（双线性）-> 归一化。
//! 缩放方式决定了 [`FrameTransform`]，坐标映射必须使用同一个变换求逆：
//!
//! - `stretch`：直接缩放到模型尺寸，长宽比会变形；
//! - `letterbox`：等比缩放后居中填充（填充值 114）；
//! - `center_crop`：先在画面中心裁出与模型同长宽比的区域，再缩放。

use image::{Rgb, RgbImage, imageops::FilterType};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
  error::PipelineError,
  frame::{Frame, Rotation},
  geometry::{BBox, Size},
  tensor::{Tensor, TensorLayout},
};

const LETTERBOX_PAD_VALUE: u8 = 114;
const RGB_CHANNELS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeMode {
  Stretch,
  #[default]
  Letterbox,
  CenterCrop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
  /// `[0, 1]`
  #[default]
  Unit,
  /// `[-1, 1]`
  Symmetric,
}

impl Normalization {
  pub fn apply(&self, value: u8) -> f32 {
    match self {
      Normalization::Unit => value as f32 / 255.0,
      Normalization::Symmetric => value as f32 / 127.5 - 1.0,
    }
  }
}

/// 正向帧坐标与模型输入坐标之间的逐轴仿射变换
///
/// `model = frame * scale + offset`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTransform {
  /// 原始缓冲区尺寸
  pub sensor: Size,
  pub rotation: Rotation,
  /// 转正后的帧尺寸
  pub frame: Size,
  pub model_input: Size,
  pub scale_x: f32,
  pub scale_y: f32,
  pub offset_x: f32,
  pub offset_y: f32,
}

impl FrameTransform {
  pub fn new(sensor: Size, rotation: Rotation, model_input: Size, mode: ResizeMode) -> Self {
    let frame = rotation.apply_to_size(sensor);
    let (fw, fh) = (frame.width as f32, frame.height as f32);
    let (mw, mh) = (model_input.width as f32, model_input.height as f32);

    let (scale_x, scale_y, offset_x, offset_y) = match mode {
      ResizeMode::Stretch => (mw / fw, mh / fh, 0.0, 0.0),
      ResizeMode::Letterbox => {
        let placed = letterbox_placement(frame, model_input);
        (
          placed.size.width as f32 / fw,
          placed.size.height as f32 / fh,
          placed.x as f32,
          placed.y as f32,
        )
      }
      ResizeMode::CenterCrop => {
        let crop = center_crop_region(frame, model_input);
        let sx = mw / crop.size.width as f32;
        let sy = mh / crop.size.height as f32;
        (sx, sy, -(crop.x as f32) * sx, -(crop.y as f32) * sy)
      }
    };

    Self {
      sensor,
      rotation,
      frame,
      model_input,
      scale_x,
      scale_y,
      offset_x,
      offset_y,
    }
  }

  pub fn frame_to_model(&self, bbox: &BBox) -> BBox {
    bbox
      .scale(self.scale_x, self.scale_y)
      .translate(self.offset_x, self.offset_y)
  }

  pub fn model_to_frame(&self, bbox: &BBox) -> BBox {
    bbox
      .translate(-self.offset_x, -self.offset_y)
      .scale(1.0 / self.scale_x, 1.0 / self.scale_y)
  }

  pub fn sensor_to_frame(&self, bbox: &BBox) -> BBox {
    self.rotation.rotate_box(bbox, self.sensor)
  }

  pub fn frame_to_sensor(&self, bbox: &BBox) -> BBox {
    self.rotation.unrotate_box(bbox, self.sensor)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Placement {
  x: u32,
  y: u32,
  size: Size,
}

/// 等比缩放后的尺寸与居中偏移（整数像素）
fn letterbox_placement(frame: Size, model_input: Size) -> Placement {
  let r = (model_input.width as f32 / frame.width as f32)
    .min(model_input.height as f32 / frame.height as f32);
  let w = ((frame.width as f32 * r).round() as u32).clamp(1, model_input.width);
  let h = ((frame.height as f32 * r).round() as u32).clamp(1, model_input.height);
  Placement {
    x: (model_input.width - w) / 2,
    y: (model_input.height - h) / 2,
    size: Size::new(w, h),
  }
}

/// 画面中心与模型输入同长宽比的最大区域
fn center_crop_region(frame: Size, model_input: Size) -> Placement {
  let aspect = model_input.width as f32 / model_input.height as f32;
  let w = ((frame.height as f32 * aspect).round() as u32).clamp(1, frame.width);
  let h = ((frame.width as f32 / aspect).round() as u32).clamp(1, frame.height);
  Placement {
    x: (frame.width - w) / 2,
    y: (frame.height - h) / 2,
    size: Size::new(w, h),
  }
}

/// 预处理结果：张量以及坐标映射时需要的变换
#[derive(Debug, Clone)]
pub struct Preprocessed {
  pub tensor: Tensor,
  pub transform: FrameTransform,
}

#[derive(Debug, Clone)]
pub struct Preprocessor {
  model_input: Size,
  mode: ResizeMode,
  normalization: Normalization,
  layout: TensorLayout,
}

impl Preprocessor {
  pub fn new(model_input: Size, mode: ResizeMode) -> Self {
    Self {
      model_input,
      mode,
      normalization: Normalization::default(),
      layout: TensorLayout::default(),
    }
  }

  pub fn with_normalization(mut self, normalization: Normalization) -> Self {
    self.normalization = normalization;
    self
  }

  pub fn with_layout(mut self, layout: TensorLayout) -> Self {
    self.layout = layout;
    self
  }

  pub fn model_input(&self) -> Size {
    self.model_input
  }

  pub fn mode(&self) -> ResizeMode {
    self.mode
  }

  pub fn preprocess(&self, frame: &Frame) -> Result<Preprocessed, PipelineError> {
    let upright = frame.to_upright_rgb()?;
    let transform = FrameTransform::new(frame.size(), frame.rotation(), self.model_input, self.mode);
    let resized = self.resize(&upright);
    debug!(
      "预处理: {} ({:?}) -> {} ({:?})",
      frame.size(),
      frame.rotation(),
      self.model_input,
      self.mode
    );

    let mut tensor = Tensor::zeros(
      self.layout,
      self.model_input.height as usize,
      self.model_input.width as usize,
      RGB_CHANNELS,
    );
    for (x, y, pixel) in resized.enumerate_pixels() {
      for c in 0..RGB_CHANNELS {
        tensor.set(
          y as usize,
          x as usize,
          c,
          self.normalization.apply(pixel.0[c]),
        );
      }
    }

    Ok(Preprocessed { tensor, transform })
  }

  fn resize(&self, upright: &RgbImage) -> RgbImage {
    let (mw, mh) = (self.model_input.width, self.model_input.height);
    let frame = Size::new(upright.width(), upright.height());
    match self.mode {
      ResizeMode::Stretch => image::imageops::resize(upright, mw, mh, FilterType::Triangle),
      ResizeMode::Letterbox => {
        let placed = letterbox_placement(frame, self.model_input);
        let scaled = image::imageops::resize(
          upright,
          placed.size.width,
          placed.size.height,
          FilterType::Triangle,
        );
        let mut canvas = RgbImage::from_pixel(mw, mh, Rgb([LETTERBOX_PAD_VALUE; 3]));
        image::imageops::replace(&mut canvas, &scaled, placed.x as i64, placed.y as i64);
        canvas
      }
      ResizeMode::CenterCrop => {
        let crop = center_crop_region(frame, self.model_input);
        let cropped = image::imageops::crop_imm(
          upright,
          crop.x,
          crop.y,
          crop.size.width,
          crop.size.height,
        )
        .to_image();
        image::imageops::resize(&cropped, mw, mh, FilterType::Triangle)
      }
    }
  }
}
