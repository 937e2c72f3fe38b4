// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/save_image_file.rs - 保存标注图像文件
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

use image::RgbImage;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  output::{
    DetectionResult, OutputError, RenderSink,
    draw::{Draw, DrawError, load_font},
  },
};

/// 在正向画面上绘制检测框与标题并保存
///
/// 检测框位于显示空间，未配置显示区域时与正向画面一致。
/// 查询参数 `font=/path/to/font.ttf` 指定标题字体，`font_size=N` 指定字号。
pub struct SaveImageFileOutput {
  path: PathBuf,
  draw: Draw,
}

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("字体错误: {0}")]
  DrawError(#[from] DrawError),
  #[error("参数无效: {0}")]
  InvalidParameter(String),
}

impl FromUrlWithScheme for SaveImageFileOutput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(SaveImageFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    let mut draw = Draw::default();
    for (key, value) in uri.query_pairs() {
      match &*key {
        "font" => {
          draw = draw.with_font(load_font(&*value)?);
          info!("标题字体: {}", value);
        }
        "font_size" => {
          let size = value
            .parse::<f32>()
            .ok()
            .filter(|size| *size > 0.0)
            .ok_or_else(|| SaveImageFileError::InvalidParameter(format!("font_size={}", value)))?;
          draw = draw.with_font_size(size);
        }
        other => warn!("忽略未知参数: {}", other),
      }
    }

    Ok(Self::new(uri.path()).with_draw(draw))
  }
}

impl SaveImageFileOutput {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self {
      path: path.into(),
      draw: Draw::default(),
    }
  }

  pub fn with_draw(mut self, draw: Draw) -> Self {
    self.draw = draw;
    self
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  fn save_image(&self, image: &RgbImage) -> Result<(), SaveImageFileError> {
    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    image.save(&self.path)?;
    info!("保存图像到文件: {}", self.path.display());
    Ok(())
  }
}

impl RenderSink for SaveImageFileOutput {
  fn set_results(&self, _results: &[DetectionResult]) -> Result<(), OutputError> {
    warn!("没有画面可供绘制，跳过保存: {}", self.path.display());
    Ok(())
  }

  fn needs_frame(&self) -> bool {
    true
  }

  fn render_frame(&self, frame: &RgbImage, results: &[DetectionResult]) -> Result<(), OutputError> {
    let mut image = frame.clone();
    self.draw.draw_results(&mut image, results);
    self.save_image(&image)?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::geometry::BBox;

  #[test]
  fn writes_annotated_image() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("out.png");
    let url = Url::parse(&format!("image://{}", path.display())).unwrap();
    let output = SaveImageFileOutput::from_url(&url).unwrap();
    assert!(output.needs_frame());

    let frame = RgbImage::new(32, 24);
    let results = vec![DetectionResult::new(BBox::new(4.0, 4.0, 20.0, 16.0), "cat", 0.7)];
    output.render_frame(&frame, &results).unwrap();

    let saved = image::open(&path).unwrap().to_rgb8();
    assert_eq!(saved.dimensions(), (32, 24));
    assert_ne!(*saved.get_pixel(4, 4), image::Rgb([0, 0, 0]));
  }

  #[test]
  fn unreadable_font_fails_construction() {
    let dir = tempfile::tempdir().unwrap();
    let font = dir.path().join("font.ttf");
    std::fs::write(&font, b"garbage").unwrap();
    let url = Url::parse(&format!(
      "image://{}?font={}",
      dir.path().join("out.png").display(),
      font.display()
    ))
    .unwrap();
    assert!(matches!(
      SaveImageFileOutput::from_url(&url),
      Err(SaveImageFileError::DrawError(DrawError::InvalidFont(_)))
    ));

    let url = Url::parse("image:///tmp/out.png?font_size=-3").unwrap();
    assert!(matches!(
      SaveImageFileOutput::from_url(&url),
      Err(SaveImageFileError::InvalidParameter(_))
    ));
  }

  #[test]
  fn rejects_other_scheme() {
    let url = Url::parse("folder:///tmp/out").unwrap();
    assert!(matches!(
      SaveImageFileOutput::from_url(&url),
      Err(SaveImageFileError::SchemeMismatch(_))
    ));
  }
}
