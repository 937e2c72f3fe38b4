// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/draw.rs - 检测结果可视化
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

use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size},
  rect::Rect,
};
use thiserror::Error;

use crate::output::DetectionResult;

const BOX_COLOR: [u8; 3] = [0, 0, 255]; // 蓝色
const BOX_THICKNESS: u32 = 2;

// 标题常量
const CAPTION_FONT_SIZE: f32 = 20.0;
const CAPTION_HEIGHT: i32 = 24;
const CAPTION_CHAR_WIDTH: f32 = 11.0; // 没有字体时按字符数估算宽度
const CAPTION_PADDING: i32 = 4;
const CAPTION_TEXT_COLOR: [u8; 3] = [255, 255, 255];

#[derive(Error, Debug)]
pub enum DrawError {
  #[error("无法读取字体文件: {0}")]
  IoError(#[from] std::io::Error),
  #[error("字体文件无效: {0}")]
  InvalidFont(#[from] ab_glyph::InvalidFont),
}

pub struct Draw {
  color: Rgb<u8>,
  thickness: u32,
  font: Option<FontArc>,
  font_scale: PxScale,
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      color: Rgb(BOX_COLOR),
      thickness: BOX_THICKNESS,
      font: None,
      font_scale: PxScale::from(CAPTION_FONT_SIZE),
    }
  }
}

/// 从 TTF/OTF 文件加载字体
pub fn load_font(path: impl AsRef<Path>) -> Result<FontArc, DrawError> {
  let data = std::fs::read(path)?;
  Ok(FontArc::try_from_vec(data)?)
}

impl Draw {
  pub fn with_color(mut self, color: [u8; 3]) -> Self {
    self.color = Rgb(color);
    self
  }

  pub fn with_thickness(mut self, thickness: u32) -> Self {
    self.thickness = thickness.max(1);
    self
  }

  /// 设置标题字体；未设置时只绘制标题底色
  pub fn with_font(mut self, font: FontArc) -> Self {
    self.font = Some(font);
    self
  }

  pub fn with_font_size(mut self, size: f32) -> Self {
    self.font_scale = PxScale::from(size);
    self
  }

  /// 在图像上绘制边框与 `label NN%` 标题，坐标为像素坐标，超出部分裁掉
  pub fn draw_results(&self, image: &mut RgbImage, results: &[DetectionResult]) {
    let (w, h) = (image.width() as i32, image.height() as i32);
    if w == 0 || h == 0 {
      return;
    }

    for result in results {
      let bbox = result.bbox;
      let x_min = (bbox.x_min.floor() as i32).clamp(0, w - 1);
      let y_min = (bbox.y_min.floor() as i32).clamp(0, h - 1);
      let x_max = (bbox.x_max.ceil() as i32).clamp(0, w - 1);
      let y_max = (bbox.y_max.ceil() as i32).clamp(0, h - 1);
      if x_min >= x_max || y_min >= y_max {
        continue;
      }

      // 向内加粗
      for t in 0..self.thickness as i32 {
        let width = x_max - x_min - 2 * t + 1;
        let height = y_max - y_min - 2 * t + 1;
        if width <= 0 || height <= 0 {
          break;
        }
        let rect = Rect::at(x_min + t, y_min + t).of_size(width as u32, height as u32);
        draw_hollow_rect_mut(image, rect, self.color);
      }

      self.draw_caption(image, x_min, y_min, &result.overlay_text());
    }
  }

  /// 标题位于边框上方，贴近图像顶部时下移到图像内
  fn draw_caption(&self, image: &mut RgbImage, x: i32, y: i32, caption: &str) {
    let text_width = match &self.font {
      Some(font) => text_size(self.font_scale, font, caption).0 as i32,
      None => (caption.chars().count() as f32 * CAPTION_CHAR_WIDTH) as i32,
    };

    let label_y = (y - CAPTION_HEIGHT).max(0);
    let label_width = (text_width + 2 * CAPTION_PADDING).min(image.width() as i32 - x);
    if label_width <= 0 {
      return;
    }

    let rect = Rect::at(x, label_y).of_size(label_width as u32, CAPTION_HEIGHT as u32);
    draw_filled_rect_mut(image, rect, self.color);

    if let Some(font) = &self.font {
      draw_text_mut(
        image,
        Rgb(CAPTION_TEXT_COLOR),
        x + CAPTION_PADDING,
        label_y + (CAPTION_HEIGHT - self.font_scale.y as i32).max(0) / 2,
        self.font_scale,
        font,
        caption,
      );
    }
  }
}
