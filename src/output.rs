// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output.rs - 检测结果与输出定义
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

use image::RgbImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, geometry::BBox};

mod log_output;
mod overlay;
pub use self::log_output::LogOutput;
pub use self::overlay::{OverlaySnapshot, OverlayState};

#[cfg(feature = "save_image_file")]
pub mod draw;

#[cfg(feature = "save_image_file")]
mod save_image_file;
#[cfg(feature = "save_image_file")]
pub use self::save_image_file::{SaveImageFileError, SaveImageFileOutput};

#[cfg(feature = "directory_record")]
mod directory_record;
#[cfg(feature = "directory_record")]
pub use self::directory_record::{
  DirectoryRecord, DirectoryRecordOutput, DirectoryRecordOutputError,
};

pub const NO_OBJECTS_DETECTED: &str = "No objects detected";

/// 一次处理输出的单个检测结果，坐标位于显示空间
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
  pub bbox: BBox,
  pub label: String,
  pub confidence: f32,
}

impl DetectionResult {
  pub fn new(bbox: BBox, label: impl Into<String>, confidence: f32) -> Self {
    Self {
      bbox,
      label: label.into(),
      confidence,
    }
  }

  /// 置信度百分比，向零截断
  pub fn percent(&self) -> u32 {
    (self.confidence * 100.0).clamp(0.0, 100.0) as u32
  }

  /// 检测框标题，例如 `person 90%`
  pub fn overlay_text(&self) -> String {
    format!("{} {}%", self.label, self.percent())
  }

  pub fn summary_text(&self) -> String {
    format!("{}: {}%", self.label, self.percent())
  }
}

/// 生成文字摘要：`label: NN%` 以逗号连接，无结果时为 `No objects detected`
pub fn summarize(results: &[DetectionResult]) -> String {
  if results.is_empty() {
    return NO_OBJECTS_DETECTED.to_string();
  }
  results
    .iter()
    .map(DetectionResult::summary_text)
    .collect::<Vec<_>>()
    .join(", ")
}

/// 渲染端，每次成功处理后调用一次，调用发生在工作线程上
pub trait RenderSink: Send + Sync {
  fn set_results(&self, results: &[DetectionResult]) -> Result<(), OutputError>;

  /// 需要正向画面时返回 `true`，此时改为调用 [`RenderSink::render_frame`]
  fn needs_frame(&self) -> bool {
    false
  }

  fn render_frame(&self, _frame: &RgbImage, results: &[DetectionResult]) -> Result<(), OutputError> {
    self.set_results(results)
  }
}

/// 摘要文字接收端，与渲染端同频调用
pub trait SummarySink: Send + Sync {
  fn set_summary(&self, summary: &str) -> Result<(), OutputError>;
}

impl<T: RenderSink + ?Sized> RenderSink for Box<T> {
  fn set_results(&self, results: &[DetectionResult]) -> Result<(), OutputError> {
    (**self).set_results(results)
  }

  fn needs_frame(&self) -> bool {
    (**self).needs_frame()
  }

  fn render_frame(&self, frame: &RgbImage, results: &[DetectionResult]) -> Result<(), OutputError> {
    (**self).render_frame(frame, results)
  }
}

impl<T: SummarySink + ?Sized> SummarySink for Box<T> {
  fn set_summary(&self, summary: &str) -> Result<(), OutputError> {
    (**self).set_summary(summary)
  }
}

#[derive(Error, Debug)]
pub enum OutputError {
  #[cfg(feature = "save_image_file")]
  #[error("保存图像文件错误: {0}")]
  SaveImageFileError(#[from] SaveImageFileError),
  #[cfg(feature = "directory_record")]
  #[error("目录记录输出错误: {0}")]
  DirectoryRecordOutputError(#[from] DirectoryRecordOutputError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub enum OutputWrapper {
  Log(LogOutput),
  #[cfg(feature = "save_image_file")]
  SaveImageFileOutput(SaveImageFileOutput),
  #[cfg(feature = "directory_record")]
  DirectoryRecordOutput(DirectoryRecordOutput),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      LogOutput::SCHEME => Ok(OutputWrapper::Log(LogOutput::from_url(url)?)),
      #[cfg(feature = "save_image_file")]
      SaveImageFileOutput::SCHEME => {
        let output = SaveImageFileOutput::from_url(url)?;
        Ok(OutputWrapper::SaveImageFileOutput(output))
      }
      #[cfg(feature = "directory_record")]
      DirectoryRecordOutput::SCHEME => {
        let output = DirectoryRecordOutput::from_url(url)?;
        Ok(OutputWrapper::DirectoryRecordOutput(output))
      }
      other => Err(OutputError::SchemeMismatch(format!(
        "不支持的输出方案: {}",
        other
      ))),
    }
  }
}

impl RenderSink for OutputWrapper {
  fn set_results(&self, results: &[DetectionResult]) -> Result<(), OutputError> {
    match self {
      OutputWrapper::Log(output) => output.set_results(results),
      #[cfg(feature = "save_image_file")]
      OutputWrapper::SaveImageFileOutput(output) => output.set_results(results),
      #[cfg(feature = "directory_record")]
      OutputWrapper::DirectoryRecordOutput(output) => output.set_results(results),
    }
  }

  fn needs_frame(&self) -> bool {
    match self {
      OutputWrapper::Log(output) => output.needs_frame(),
      #[cfg(feature = "save_image_file")]
      OutputWrapper::SaveImageFileOutput(output) => output.needs_frame(),
      #[cfg(feature = "directory_record")]
      OutputWrapper::DirectoryRecordOutput(output) => output.needs_frame(),
    }
  }

  fn render_frame(&self, frame: &RgbImage, results: &[DetectionResult]) -> Result<(), OutputError> {
    match self {
      OutputWrapper::Log(output) => output.render_frame(frame, results),
      #[cfg(feature = "save_image_file")]
      OutputWrapper::SaveImageFileOutput(output) => output.render_frame(frame, results),
      #[cfg(feature = "directory_record")]
      OutputWrapper::DirectoryRecordOutput(output) => output.render_frame(frame, results),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn result(label: &str, confidence: f32) -> DetectionResult {
    DetectionResult::new(BBox::new(0.0, 0.0, 10.0, 10.0), label, confidence)
  }

  #[test]
  fn overlay_text_truncates_percentage() {
    assert_eq!(result("person", 0.9).overlay_text(), "person 90%");
    assert_eq!(result("dog", 0.876).overlay_text(), "dog 87%");
    assert_eq!(result("dog", 0.876).summary_text(), "dog: 87%");
    assert_eq!(result("bird", 0.999).overlay_text(), "bird 99%");
    assert_eq!(result("cat", 1.0).overlay_text(), "cat 100%");
  }

  #[test]
  fn summary_joins_results() {
    let results = vec![result("person", 0.9), result("car", 0.614)];
    assert_eq!(summarize(&results), "person: 90%, car: 61%");
  }

  #[test]
  fn empty_summary() {
    assert_eq!(summarize(&[]), "No objects detected");
  }

  #[test]
  fn wrapper_selects_output_by_scheme() {
    let url = Url::parse("log://").unwrap();
    assert!(matches!(
      OutputWrapper::from_url(&url),
      Ok(OutputWrapper::Log(_))
    ));

    let url = Url::parse("rtsp://localhost/stream").unwrap();
    assert!(matches!(
      OutputWrapper::from_url(&url),
      Err(OutputError::SchemeMismatch(_))
    ));
  }
}
