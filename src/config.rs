// 该文件是 Shanan （山南西风） 项目的一部分。
// src/config.rs - 管线配置
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

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
  error::PipelineError,
  geometry::Size,
  mapper::{CameraFacing, DisplayFit},
  model::DecoderConfig,
  preprocess::{Normalization, ResizeMode},
  tensor::TensorLayout,
};

pub const DEFAULT_MODEL_INPUT_SIZE: u32 = 640;
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.25;
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.45;

/// 显示区域配置；`size` 为空时使用正向帧尺寸
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
  pub size: Option<Size>,
  pub fit: DisplayFit,
}

/// 启动时构造一次，之后只读
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
  /// 模型输入为正方形，边长
  pub model_input_size: u32,
  pub confidence_threshold: f32,
  pub iou_threshold: f32,
  pub resize_mode: ResizeMode,
  pub normalization: Normalization,
  pub tensor_layout: TensorLayout,
  pub output: DecoderConfig,
  pub view: ViewConfig,
  pub camera: CameraFacing,
  /// 标签文件，缺省时使用内置 COCO 标签
  pub labels: Option<PathBuf>,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      model_input_size: DEFAULT_MODEL_INPUT_SIZE,
      confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
      iou_threshold: DEFAULT_IOU_THRESHOLD,
      resize_mode: ResizeMode::default(),
      normalization: Normalization::default(),
      tensor_layout: TensorLayout::default(),
      output: DecoderConfig::default(),
      view: ViewConfig::default(),
      camera: CameraFacing::default(),
      labels: None,
    }
  }
}

impl PipelineConfig {
  pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
    let path = path.as_ref();
    debug!("读取配置文件: {}", path.display());
    let text = std::fs::read_to_string(path).map_err(|e| {
      PipelineError::initialization(format!("无法读取配置文件 {}: {}", path.display(), e))
    })?;
    Self::from_json_str(&text)
  }

  pub fn from_json_str(text: &str) -> Result<Self, PipelineError> {
    serde_json::from_str(text)
      .map_err(|e| PipelineError::initialization(format!("配置文件格式错误: {}", e)))
  }

  pub fn with_model_input_size(mut self, size: u32) -> Self {
    self.model_input_size = size;
    self
  }

  pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
    self.confidence_threshold = threshold;
    self
  }

  pub fn with_iou_threshold(mut self, threshold: f32) -> Self {
    self.iou_threshold = threshold;
    self
  }

  pub fn with_resize_mode(mut self, mode: ResizeMode) -> Self {
    self.resize_mode = mode;
    self
  }

  pub fn with_view(mut self, size: Option<Size>, fit: DisplayFit) -> Self {
    self.view = ViewConfig { size, fit };
    self
  }

  pub fn with_camera(mut self, camera: CameraFacing) -> Self {
    self.camera = camera;
    self
  }

  pub fn with_output(mut self, output: DecoderConfig) -> Self {
    self.output = output;
    self
  }

  pub fn with_labels(mut self, labels: Option<PathBuf>) -> Self {
    self.labels = labels;
    self
  }

  pub fn model_input(&self) -> Size {
    Size::square(self.model_input_size)
  }

  pub fn validate(&self) -> Result<(), PipelineError> {
    if self.model_input_size == 0 {
      return Err(PipelineError::initialization("模型输入尺寸不能为 0"));
    }
    if !(0.0..=1.0).contains(&self.confidence_threshold) {
      return Err(PipelineError::initialization(format!(
        "置信度阈值必须在 [0, 1] 之间: {}",
        self.confidence_threshold
      )));
    }
    if !(0.0..=1.0).contains(&self.iou_threshold) {
      return Err(PipelineError::initialization(format!(
        "IoU 阈值必须在 [0, 1] 之间: {}",
        self.iou_threshold
      )));
    }
    if let Some(size) = self.view.size
      && size.is_empty()
    {
      return Err(PipelineError::initialization(format!(
        "显示区域尺寸无效: {}",
        size
      )));
    }
    Ok(())
  }
}
