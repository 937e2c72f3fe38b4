// 该文件是 Shanan （山南西风） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use image::{ImageReader, RgbImage};
use thiserror::Error;
use tracing::{error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  input::{FrameLedger, FrameOptions},
};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像加载错误: {0}")]
  ImageLoadError(#[from] image::ImageError),
  #[error("参数错误: {0}")]
  InvalidQuery(String),
}

/// 单张图像输入，`repeat=N` 时重复产生 N 帧
///
/// ```text
/// image:///path/to/a.jpg?rotation=90&format=bgra&repeat=30
/// ```
pub struct ImageFileInput {
  image: RgbImage,
  options: FrameOptions,
  remaining: usize,
  next_index: u64,
  ledger: FrameLedger,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemeMismatch(url.scheme().to_string()));
    }

    let options = FrameOptions::from_query(url).map_err(ImageFileInputError::InvalidQuery)?;
    let repeat = match url.query_pairs().find(|(k, _)| k == "repeat") {
      Some((_, v)) => v
        .parse::<usize>()
        .map_err(|e| ImageFileInputError::InvalidQuery(format!("repeat 参数无效 '{}': {}", v, e)))?,
      None => 1,
    };

    let path = url.path();
    let image = ImageReader::open(path)?.decode()?.to_rgb8();
    info!(
      "读取图像 {}: {}x{}, 旋转 {} 度",
      path,
      image.width(),
      image.height(),
      options.rotation.degrees()
    );

    Ok(Self {
      image,
      options,
      remaining: repeat,
      next_index: 0,
      ledger: FrameLedger::new(),
    })
  }
}

impl ImageFileInput {
  pub fn ledger(&self) -> FrameLedger {
    self.ledger.clone()
  }
}

impl Iterator for ImageFileInput {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    if self.remaining == 0 {
      return None;
    }
    self.remaining -= 1;

    let frame = self.options.build_frame(&self.image).with_index(self.next_index);
    self.next_index += 1;
    Some(self.ledger.track(frame))
  }
}
