// 该文件是 Shanan （山南西风） 项目的一部分。
// src/frame.rs - 相机帧定义
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

use crate::{
  error::PipelineError,
  geometry::{BBox, Size},
};

/// 帧释放回调，由帧来源提供，在帧被丢弃时调用且仅调用一次
pub type ReleaseFn = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
  Rgb8,
  Rgba8,
  Bgra8,
}

impl PixelFormat {
  pub fn bytes_per_pixel(&self) -> usize {
    match self {
      PixelFormat::Rgb8 => 3,
      PixelFormat::Rgba8 | PixelFormat::Bgra8 => 4,
    }
  }
}

/// 将缓冲区转为正向画面所需的顺时针旋转角度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Rotation {
  #[default]
  Deg0,
  Deg90,
  Deg180,
  Deg270,
}

impl Rotation {
  pub fn from_degrees(degrees: u32) -> Option<Self> {
    match degrees % 360 {
      0 => Some(Rotation::Deg0),
      90 => Some(Rotation::Deg90),
      180 => Some(Rotation::Deg180),
      270 => Some(Rotation::Deg270),
      _ => None,
    }
  }

  pub fn degrees(&self) -> u32 {
    match self {
      Rotation::Deg0 => 0,
      Rotation::Deg90 => 90,
      Rotation::Deg180 => 180,
      Rotation::Deg270 => 270,
    }
  }

  /// 旋转后的画面尺寸
  pub fn apply_to_size(&self, size: Size) -> Size {
    match self {
      Rotation::Deg0 | Rotation::Deg180 => size,
      Rotation::Deg90 | Rotation::Deg270 => size.transposed(),
    }
  }

  /// 传感器坐标 -> 正向画面坐标，`sensor` 为缓冲区尺寸
  pub fn rotate_box(&self, bbox: &BBox, sensor: Size) -> BBox {
    let (w, h) = (sensor.width as f32, sensor.height as f32);
    let BBox {
      x_min,
      y_min,
      x_max,
      y_max,
    } = *bbox;
    match self {
      Rotation::Deg0 => *bbox,
      Rotation::Deg90 => BBox::from_corners(h - y_min, x_min, h - y_max, x_max),
      Rotation::Deg180 => BBox::from_corners(w - x_min, h - y_min, w - x_max, h - y_max),
      Rotation::Deg270 => BBox::from_corners(y_min, w - x_min, y_max, w - x_max),
    }
  }

  /// 正向画面坐标 -> 传感器坐标，`rotate_box` 的逆变换
  pub fn unrotate_box(&self, bbox: &BBox, sensor: Size) -> BBox {
    let (w, h) = (sensor.width as f32, sensor.height as f32);
    let BBox {
      x_min,
      y_min,
      x_max,
      y_max,
    } = *bbox;
    match self {
      Rotation::Deg0 => *bbox,
      Rotation::Deg90 => BBox::from_corners(y_min, h - x_min, y_max, h - x_max),
      Rotation::Deg180 => BBox::from_corners(w - x_min, h - y_min, w - x_max, h - y_max),
      Rotation::Deg270 => BBox::from_corners(w - y_min, x_min, w - y_max, x_max),
    }
  }
}

/// 一帧相机画面
///
/// 帧在整个管线处理期间只被协调器独占；`Drop` 时调用来源提供的释放回调，
/// 因此无论处理成功、失败还是被丢弃，缓冲区都只归还一次。
pub struct Frame {
  data: Box<[u8]>,
  width: u32,
  height: u32,
  format: PixelFormat,
  rotation: Rotation,
  index: u64,
  timestamp_ms: u64,
  release: Option<ReleaseFn>,
}

impl Frame {
  pub fn new(data: impl Into<Box<[u8]>>, width: u32, height: u32, format: PixelFormat) -> Self {
    Self {
      data: data.into(),
      width,
      height,
      format,
      rotation: Rotation::Deg0,
      index: 0,
      timestamp_ms: 0,
      release: None,
    }
  }

  pub fn from_rgb_image(image: RgbImage) -> Self {
    let (width, height) = image.dimensions();
    Self::new(image.into_raw(), width, height, PixelFormat::Rgb8)
  }

  pub fn with_rotation(mut self, rotation: Rotation) -> Self {
    self.rotation = rotation;
    self
  }

  pub fn with_index(mut self, index: u64) -> Self {
    self.index = index;
    self
  }

  pub fn with_timestamp(mut self, timestamp_ms: u64) -> Self {
    self.timestamp_ms = timestamp_ms;
    self
  }

  pub fn with_release<F>(mut self, release: F) -> Self
  where
    F: FnOnce() + Send + 'static,
  {
    self.release = Some(Box::new(release));
    self
  }

  pub fn data(&self) -> &[u8] {
    &self.data
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn size(&self) -> Size {
    Size::new(self.width, self.height)
  }

  /// 旋转到正向后的画面尺寸
  pub fn upright_size(&self) -> Size {
    self.rotation.apply_to_size(self.size())
  }

  pub fn format(&self) -> PixelFormat {
    self.format
  }

  pub fn rotation(&self) -> Rotation {
    self.rotation
  }

  pub fn index(&self) -> u64 {
    self.index
  }

  pub fn timestamp_ms(&self) -> u64 {
    self.timestamp_ms
  }

  fn validate(&self) -> Result<(), PipelineError> {
    if self.width == 0 || self.height == 0 {
      return Err(PipelineError::invalid_frame(format!(
        "帧尺寸为零: {}x{}",
        self.width, self.height
      )));
    }

    let expected = self.size().area() * self.format.bytes_per_pixel();
    if self.data.len() < expected {
      return Err(PipelineError::invalid_frame(format!(
        "缓冲区长度不足: 期望 {} 字节 ({:?} {}x{}), 实际 {} 字节",
        expected,
        self.format,
        self.width,
        self.height,
        self.data.len()
      )));
    }
    Ok(())
  }

  /// 转换为正向 RGB 图像
  pub fn to_upright_rgb(&self) -> Result<RgbImage, PipelineError> {
    self.validate()?;

    let pixels = self.size().area();
    let bpp = self.format.bytes_per_pixel();
    let mut rgb = Vec::with_capacity(pixels * 3);
    for px in self.data[..pixels * bpp].chunks_exact(bpp) {
      match self.format {
        PixelFormat::Rgb8 | PixelFormat::Rgba8 => rgb.extend_from_slice(&px[..3]),
        PixelFormat::Bgra8 => rgb.extend_from_slice(&[px[2], px[1], px[0]]),
      }
    }

    let image = RgbImage::from_raw(self.width, self.height, rgb)
      .ok_or_else(|| PipelineError::invalid_frame("无法构造 RGB 图像"))?;

    Ok(match self.rotation {
      Rotation::Deg0 => image,
      Rotation::Deg90 => image::imageops::rotate90(&image),
      Rotation::Deg180 => image::imageops::rotate180(&image),
      Rotation::Deg270 => image::imageops::rotate270(&image),
    })
  }
}

impl std::fmt::Debug for Frame {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Frame")
      .field("width", &self.width)
      .field("height", &self.height)
      .field("format", &self.format)
      .field("rotation", &self.rotation)
      .field("index", &self.index)
      .field("timestamp_ms", &self.timestamp_ms)
      .field("bytes", &self.data.len())
      .finish()
  }
}

impl Drop for Frame {
  fn drop(&mut self) {
    if let Some(release) = self.release.take() {
      release();
    }
  }
}
