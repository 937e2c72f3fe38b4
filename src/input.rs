// 该文件是 Shanan （山南西风） 项目的一部分。
// src/input.rs - 帧输入
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

use std::sync::{
  Arc,
  atomic::{AtomicU64, Ordering},
};

use image::RgbImage;
use thiserror::Error;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{Frame, PixelFormat, Rotation},
};

mod directory_input;
mod read_image_file;

pub use self::directory_input::{DirectoryInput, DirectoryInputError};
pub use self::read_image_file::{ImageFileInput, ImageFileInputError};

#[derive(Error, Debug)]
pub enum InputError {
  #[error("图像文件输入错误: {0}")]
  ImageFileInputError(#[from] ImageFileInputError),
  #[error("目录输入错误: {0}")]
  DirectoryInputError(#[from] DirectoryInputError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

/// 帧的交付与释放计数
///
/// 每个经过 [`FrameLedger::track`] 的帧在释放时计数一次，
/// 输入结束后 `outstanding()` 应为零。
#[derive(Debug, Clone, Default)]
pub struct FrameLedger {
  delivered: Arc<AtomicU64>,
  released: Arc<AtomicU64>,
}

impl FrameLedger {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn track(&self, frame: Frame) -> Frame {
    self.delivered.fetch_add(1, Ordering::SeqCst);
    let released = self.released.clone();
    frame.with_release(move || {
      released.fetch_add(1, Ordering::SeqCst);
    })
  }

  pub fn delivered(&self) -> u64 {
    self.delivered.load(Ordering::SeqCst)
  }

  pub fn released(&self) -> u64 {
    self.released.load(Ordering::SeqCst)
  }

  pub fn outstanding(&self) -> u64 {
    self.delivered().saturating_sub(self.released())
  }
}

/// 文件输入共用的参数：`rotation=90` 与 `format=bgra`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FrameOptions {
  pub rotation: Rotation,
  pub format: PixelFormat,
}

impl Default for FrameOptions {
  fn default() -> Self {
    Self {
      rotation: Rotation::Deg0,
      format: PixelFormat::Rgb8,
    }
  }
}

impl FrameOptions {
  pub fn from_query(url: &Url) -> Result<Self, String> {
    let mut options = Self::default();
    for (key, value) in url.query_pairs() {
      match key.as_ref() {
        "rotation" => {
          let degrees = value
            .parse::<u32>()
            .map_err(|e| format!("rotation 参数无效 '{}': {}", value, e))?;
          options.rotation = Rotation::from_degrees(degrees)
            .ok_or_else(|| format!("rotation 必须为 0/90/180/270: {}", degrees))?;
        }
        "format" => {
          options.format = match value.as_ref() {
            "rgb" => PixelFormat::Rgb8,
            "rgba" => PixelFormat::Rgba8,
            "bgra" => PixelFormat::Bgra8,
            other => return Err(format!("不支持的像素格式: {}", other)),
          };
        }
        _ => {}
      }
    }
    Ok(options)
  }

  /// 把正向图像按传感器方向与像素格式打包成帧
  ///
  /// 图像视为已经正向，因此先做逆向旋转得到传感器画面。
  pub fn build_frame(&self, image: &RgbImage) -> Frame {
    let sensor = match self.rotation {
      Rotation::Deg0 => image.clone(),
      Rotation::Deg90 => image::imageops::rotate270(image),
      Rotation::Deg180 => image::imageops::rotate180(image),
      Rotation::Deg270 => image::imageops::rotate90(image),
    };
    let (width, height) = sensor.dimensions();

    let frame = match self.format {
      PixelFormat::Rgb8 => Frame::from_rgb_image(sensor),
      PixelFormat::Rgba8 => {
        let data: Vec<u8> = sensor
          .pixels()
          .flat_map(|p| [p[0], p[1], p[2], u8::MAX])
          .collect();
        Frame::new(data, width, height, PixelFormat::Rgba8)
      }
      PixelFormat::Bgra8 => {
        let data: Vec<u8> = sensor
          .pixels()
          .flat_map(|p| [p[2], p[1], p[0], u8::MAX])
          .collect();
        Frame::new(data, width, height, PixelFormat::Bgra8)
      }
    };
    frame.with_rotation(self.rotation)
  }
}

pub enum InputWrapper {
  ReadImageFile(ImageFileInput),
  Directory(DirectoryInput),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      ImageFileInput::SCHEME => Ok(InputWrapper::ReadImageFile(ImageFileInput::from_url(url)?)),
      DirectoryInput::SCHEME => Ok(InputWrapper::Directory(DirectoryInput::from_url(url)?)),
      other => Err(InputError::SchemeMismatch(format!(
        "不支持的输入方案: {}",
        other
      ))),
    }
  }
}

impl InputWrapper {
  pub fn ledger(&self) -> FrameLedger {
    match self {
      InputWrapper::ReadImageFile(input) => input.ledger(),
      InputWrapper::Directory(input) => input.ledger(),
    }
  }
}

impl Iterator for InputWrapper {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    match self {
      InputWrapper::ReadImageFile(input) => input.next(),
      InputWrapper::Directory(input) => input.next(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  #[test]
  fn ledger_counts_release_once() {
    let ledger = FrameLedger::new();
    let a = ledger.track(Frame::new(vec![0u8; 3], 1, 1, PixelFormat::Rgb8));
    let b = ledger.track(Frame::new(vec![0u8; 3], 1, 1, PixelFormat::Rgb8));
    assert_eq!(ledger.delivered(), 2);
    assert_eq!(ledger.outstanding(), 2);
    drop(a);
    assert_eq!(ledger.released(), 1);
    drop(b);
    assert_eq!(ledger.outstanding(), 0);
  }

  #[test]
  fn built_frame_round_trips_to_upright_image() {
    let mut image = RgbImage::new(4, 2);
    image.put_pixel(3, 0, Rgb([10, 20, 30]));

    for degrees in [0, 90, 180, 270] {
      for format in ["rgb", "rgba", "bgra"] {
        let url = Url::parse(&format!(
          "image:///x.png?rotation={}&format={}",
          degrees, format
        ))
        .unwrap();
        let options = FrameOptions::from_query(&url).unwrap();
        let frame = options.build_frame(&image);
        assert_eq!(frame.rotation().degrees(), degrees);
        assert_eq!(frame.to_upright_rgb().unwrap(), image);
      }
    }
  }

  #[test]
  fn rejects_bad_query() {
    let url = Url::parse("image:///x.png?rotation=45").unwrap();
    assert!(FrameOptions::from_query(&url).is_err());
    let url = Url::parse("image:///x.png?format=yuv").unwrap();
    assert!(FrameOptions::from_query(&url).is_err());
  }

  #[test]
  fn wrapper_rejects_unknown_scheme() {
    let url = Url::parse("v4l2:///dev/video0").unwrap();
    assert!(matches!(
      InputWrapper::from_url(&url),
      Err(InputError::SchemeMismatch(_))
    ));
  }
}
