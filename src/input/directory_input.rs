// 该文件是 Shanan （山南西风） 项目的一部分。
// src/input/directory_input.rs - 目录图像序列输入
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

use std::{collections::VecDeque, path::PathBuf};

use image::ImageReader;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  input::{FrameLedger, FrameOptions},
};

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

#[derive(Error, Debug)]
pub enum DirectoryInputError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("参数错误: {0}")]
  InvalidQuery(String),
}

/// 按文件名顺序读取目录中的图像，逐个解码
///
/// 无法解码的文件记录警告后跳过。
pub struct DirectoryInput {
  files: VecDeque<PathBuf>,
  options: FrameOptions,
  next_index: u64,
  ledger: FrameLedger,
}

impl FromUrlWithScheme for DirectoryInput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryInput {
  type Error = DirectoryInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(DirectoryInputError::SchemeMismatch(url.scheme().to_string()));
    }

    let options = FrameOptions::from_query(url).map_err(DirectoryInputError::InvalidQuery)?;
    let mut files = Vec::new();
    for entry in std::fs::read_dir(url.path())? {
      let path = entry?.path();
      let is_image = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
      if path.is_file() && is_image {
        files.push(path);
      }
    }
    files.sort();
    info!("目录 {} 中找到 {} 张图像", url.path(), files.len());

    Ok(Self {
      files: files.into(),
      options,
      next_index: 0,
      ledger: FrameLedger::new(),
    })
  }
}

impl DirectoryInput {
  pub fn ledger(&self) -> FrameLedger {
    self.ledger.clone()
  }

  pub fn remaining(&self) -> usize {
    self.files.len()
  }
}

impl Iterator for DirectoryInput {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    while let Some(path) = self.files.pop_front() {
      let decoded = ImageReader::open(&path)
        .map_err(image::ImageError::from)
        .and_then(|reader| reader.decode());
      match decoded {
        Ok(image) => {
          let frame = self
            .options
            .build_frame(&image.to_rgb8())
            .with_index(self.next_index);
          self.next_index += 1;
          return Some(self.ledger.track(frame));
        }
        Err(e) => warn!("跳过无法读取的图像 {}: {}", path.display(), e),
      }
    }
    None
  }
}
