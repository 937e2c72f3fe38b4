// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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

//! 每次处理写一条 JSON 记录，按日期分目录：
//!
//! ```text
//! folder:///var/records?image&always
//! => /var/records/2026/10/16/13-04-59-0001.json (+ .png)
//! ```
//!
//! 默认只记录有检测结果的处理；`always` 记录每一次，`image` 同时保存正向画面。

use std::{
  path::{Path, PathBuf},
  sync::atomic::{AtomicU64, Ordering},
};

use chrono::{DateTime, Datelike, Utc};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  output::{DetectionResult, OutputError, RenderSink, summarize},
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

/// 单条记录的内容
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryRecord {
  pub timestamp: DateTime<Utc>,
  pub sequence: u64,
  pub summary: String,
  pub results: Vec<DetectionResult>,
}

pub struct DirectoryRecordOutput {
  directory: PathBuf,
  sequence: AtomicU64,
  always: bool,
  with_image: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch(format!(
        "期望输出方式 '{}', 实际输出方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    let always = uri.query_pairs().any(|(k, _)| k == "always");
    let with_image = uri.query_pairs().any(|(k, _)| k == "image");

    Ok(
      Self::new(uri.path())
        .with_always(always)
        .with_image(with_image),
    )
  }
}

impl DirectoryRecordOutput {
  pub fn new(directory: impl Into<PathBuf>) -> Self {
    Self {
      directory: directory.into(),
      sequence: AtomicU64::new(0),
      always: false,
      with_image: false,
    }
  }

  pub fn with_always(mut self, always: bool) -> Self {
    self.always = always;
    self
  }

  pub fn with_image(mut self, with_image: bool) -> Self {
    self.with_image = with_image;
    self
  }

  pub fn directory(&self) -> &Path {
    &self.directory
  }

  fn record_path(&self, now: &DateTime<Utc>, sequence: u64) -> Result<PathBuf, std::io::Error> {
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(&directory)?;

    Ok(directory.join(format!(
      "{}-{:04X}.json",
      now.format("%H-%M-%S"),
      sequence
    )))
  }

  fn write_record(
    &self,
    frame: Option<&RgbImage>,
    results: &[DetectionResult],
  ) -> Result<(), DirectoryRecordOutputError> {
    if !self.always && results.is_empty() {
      return Ok(());
    }

    let now = Utc::now();
    let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
    let path = self.record_path(&now, sequence)?;

    if let Some(frame) = frame {
      frame.save(path.with_extension("png"))?;
    }

    let record = DirectoryRecord {
      timestamp: now,
      sequence,
      summary: summarize(results),
      results: results.to_vec(),
    };
    std::fs::write(&path, serde_json::to_vec_pretty(&record)?)?;
    debug!("写入记录: {}", path.display());
    Ok(())
  }
}

impl RenderSink for DirectoryRecordOutput {
  fn set_results(&self, results: &[DetectionResult]) -> Result<(), OutputError> {
    self.write_record(None, results)?;
    Ok(())
  }

  fn needs_frame(&self) -> bool {
    self.with_image
  }

  fn render_frame(&self, frame: &RgbImage, results: &[DetectionResult]) -> Result<(), OutputError> {
    self.write_record(Some(frame), results)?;
    Ok(())
  }
}
