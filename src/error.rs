// 该文件是 Shanan （山南西风） 项目的一部分。
// src/error.rs - 管线错误分类
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

use thiserror::Error;

/// 推理引擎边界上的错误
#[derive(Error, Debug)]
pub enum InferenceError {
  #[error("输入张量无效: {0}")]
  InvalidInput(String),
  #[error("推理后端错误: {0}")]
  Backend(String),
  #[error("I/O 错误: {0}")]
  Io(#[from] std::io::Error),
  #[error("JSON 解析错误: {0}")]
  Json(#[from] serde_json::Error),
}

/// 管线错误
///
/// 除 [`PipelineError::Initialization`] 外，所有错误都只影响当前这一帧。
#[derive(Error, Debug)]
pub enum PipelineError {
  /// 帧尺寸为零、缓冲区长度不足或像素格式不支持
  #[error("无效帧: {0}")]
  InvalidFrame(String),
  /// 模型输出形状与解码器约定不一致
  #[error("模型输出无效: {0}")]
  InvalidModelOutput(String),
  #[error("推理失败: {0}")]
  Inference(#[from] InferenceError),
  /// 模型或标签加载失败，管线无法启动
  #[error("初始化失败: {0}")]
  Initialization(String),
}

impl PipelineError {
  pub fn invalid_frame(msg: impl Into<String>) -> Self {
    PipelineError::InvalidFrame(msg.into())
  }

  pub fn invalid_output(msg: impl Into<String>) -> Self {
    PipelineError::InvalidModelOutput(msg.into())
  }

  pub fn initialization(msg: impl Into<String>) -> Self {
    PipelineError::Initialization(msg.into())
  }

  pub fn is_fatal(&self) -> bool {
    matches!(self, PipelineError::Initialization(_))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn only_initialization_errors_are_fatal() {
    assert!(PipelineError::initialization("labels").is_fatal());
    assert!(!PipelineError::invalid_frame("zero").is_fatal());
    assert!(!PipelineError::invalid_output("shape").is_fatal());
    assert!(!PipelineError::from(InferenceError::Backend("npu".into())).is_fatal());
  }

  #[test]
  fn inference_error_converts_into_pipeline_error() {
    let err: PipelineError = InferenceError::InvalidInput("shape".into()).into();
    assert!(matches!(err, PipelineError::Inference(InferenceError::InvalidInput(_))));
  }
}
