// 该文件是 Shanan （山南西风） 项目的一部分。
// src/geometry.rs - 轴对齐边界框与尺寸
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

use serde::{Deserialize, Serialize};

/// 宽高（像素）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
  pub width: u32,
  pub height: u32,
}

impl Size {
  pub const fn new(width: u32, height: u32) -> Self {
    Self { width, height }
  }

  pub const fn square(side: u32) -> Self {
    Self::new(side, side)
  }

  pub fn is_empty(&self) -> bool {
    self.width == 0 || self.height == 0
  }

  pub fn transposed(&self) -> Self {
    Self::new(self.height, self.width)
  }

  pub fn area(&self) -> usize {
    self.width as usize * self.height as usize
  }
}

impl std::fmt::Display for Size {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}x{}", self.width, self.height)
  }
}

/// 角点格式的边界框 `[x_min, y_min, x_max, y_max]`
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BBox {
  pub x_min: f32,
  pub y_min: f32,
  pub x_max: f32,
  pub y_max: f32,
}

impl BBox {
  pub const fn new(x_min: f32, y_min: f32, x_max: f32, y_max: f32) -> Self {
    Self {
      x_min,
      y_min,
      x_max,
      y_max,
    }
  }

  pub fn from_center_size(cx: f32, cy: f32, w: f32, h: f32) -> Self {
    Self::new(cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0)
  }

  /// 由任意两个对角点构造，坐标自动排序
  pub fn from_corners(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
    Self::new(x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1))
  }

  pub fn width(&self) -> f32 {
    (self.x_max - self.x_min).max(0.0)
  }

  pub fn height(&self) -> f32 {
    (self.y_max - self.y_min).max(0.0)
  }

  pub fn area(&self) -> f32 {
    self.width() * self.height()
  }

  /// 面积为零（或坐标非有限）的框视为退化框
  pub fn is_degenerate(&self) -> bool {
    !self.is_finite() || !(self.area() > 0.0)
  }

  pub fn is_finite(&self) -> bool {
    self.x_min.is_finite() && self.y_min.is_finite() && self.x_max.is_finite() && self.y_max.is_finite()
  }

  pub fn intersection_area(&self, other: &BBox) -> f32 {
    let l = self.x_min.max(other.x_min);
    let t = self.y_min.max(other.y_min);
    let r = self.x_max.min(other.x_max);
    let b = self.y_max.min(other.y_max);
    (r - l).max(0.0) * (b - t).max(0.0)
  }

  /// 交并比；并集面积为零时返回 0
  pub fn iou(&self, other: &BBox) -> f32 {
    let inter = self.intersection_area(other);
    let union = self.area() + other.area() - inter;
    if union > 0.0 { inter / union } else { 0.0 }
  }

  pub fn clamp(&self, width: f32, height: f32) -> BBox {
    BBox::new(
      self.x_min.clamp(0.0, width),
      self.y_min.clamp(0.0, height),
      self.x_max.clamp(0.0, width),
      self.y_max.clamp(0.0, height),
    )
  }

  pub fn scale(&self, sx: f32, sy: f32) -> BBox {
    BBox::from_corners(self.x_min * sx, self.y_min * sy, self.x_max * sx, self.y_max * sy)
  }

  pub fn translate(&self, dx: f32, dy: f32) -> BBox {
    BBox::new(self.x_min + dx, self.y_min + dy, self.x_max + dx, self.y_max + dy)
  }

  /// 水平翻转（镜像）到宽度为 `width` 的画面中
  pub fn mirror_x(&self, width: f32) -> BBox {
    BBox::new(width - self.x_max, self.y_min, width - self.x_min, self.y_max)
  }
}
