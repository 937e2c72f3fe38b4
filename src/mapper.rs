// 该文件是 Shanan （山南西风） 项目的一部分。
// src/mapper.rs - 模型空间到显示空间的坐标映射
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

use crate::{
  geometry::{BBox, Size},
  preprocess::FrameTransform,
};

/// 预览画面在显示区域中的摆放方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayFit {
  /// 等比铺满，超出部分裁掉（预览层默认的 aspect-fill）
  #[default]
  Fill,
  /// 等比完整显示，留黑边
  Fit,
  /// 拉伸到显示区域
  Stretch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraFacing {
  #[default]
  Back,
  /// 前置摄像头预览为镜像，检测框需要水平翻转
  Front,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateMapper {
  view: Option<Size>,
  fit: DisplayFit,
  mirror: bool,
}

impl CoordinateMapper {
  /// `view` 为空时显示区域与正向帧一致
  pub fn new(view: Option<Size>, fit: DisplayFit, camera: CameraFacing) -> Self {
    Self {
      view,
      fit,
      mirror: camera == CameraFacing::Front,
    }
  }

  pub fn view_size(&self, transform: &FrameTransform) -> Size {
    self.view.unwrap_or(transform.frame)
  }

  /// 正向帧坐标 -> 显示坐标的逐轴缩放与偏移
  fn frame_to_view(&self, frame: Size, view: Size) -> (f32, f32, f32, f32) {
    let (fw, fh) = (frame.width as f32, frame.height as f32);
    let (vw, vh) = (view.width as f32, view.height as f32);
    let (sx, sy) = match self.fit {
      DisplayFit::Stretch => (vw / fw, vh / fh),
      DisplayFit::Fill => {
        let s = (vw / fw).max(vh / fh);
        (s, s)
      }
      DisplayFit::Fit => {
        let s = (vw / fw).min(vh / fh);
        (s, s)
      }
    };
    (sx, sy, (vw - fw * sx) / 2.0, (vh - fh * sy) / 2.0)
  }

  /// 模型空间 -> 显示空间，结果裁剪到显示区域内
  ///
  /// 裁剪后面积为零（完全落在显示区域外）时返回 `None`。
  pub fn map_to_view(&self, bbox: &BBox, transform: &FrameTransform) -> Option<BBox> {
    let view = self.view_size(transform);
    if view.is_empty() || transform.frame.is_empty() {
      return None;
    }

    let (sx, sy, dx, dy) = self.frame_to_view(transform.frame, view);
    let (vw, vh) = (view.width as f32, view.height as f32);

    let mut mapped = transform.model_to_frame(bbox).scale(sx, sy).translate(dx, dy);
    if self.mirror {
      mapped = mapped.mirror_x(vw);
    }

    let clamped = mapped.clamp(vw, vh);
    if clamped.is_degenerate() {
      None
    } else {
      Some(clamped)
    }
  }
}

/// 单个框的映射，参数与 [`CoordinateMapper::map_to_view`] 一致
pub fn map_to_view(
  bbox: &BBox,
  transform: &FrameTransform,
  view: Size,
  fit: DisplayFit,
  camera: CameraFacing,
) -> Option<BBox> {
  CoordinateMapper::new(Some(view), fit, camera).map_to_view(bbox, transform)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{frame::Rotation, preprocess::ResizeMode};

  fn close(a: &BBox, b: &BBox, tol: f32) -> bool {
    (a.x_min - b.x_min).abs() < tol
      && (a.y_min - b.y_min).abs() < tol
      && (a.x_max - b.x_max).abs() < tol
      && (a.y_max - b.y_max).abs() < tol
  }

  #[test]
  fn identity_view_recovers_frame_box() {
    let t = FrameTransform::new(
      Size::new(1280, 720),
      Rotation::Deg0,
      Size::square(640),
      ResizeMode::Letterbox,
    );
    let frame_box = BBox::new(200.0, 100.0, 600.0, 500.0);
    let model_box = t.frame_to_model(&frame_box);
    let mapper = CoordinateMapper::new(None, DisplayFit::Fill, CameraFacing::Back);
    let view_box = mapper.map_to_view(&model_box, &t).unwrap();
    assert!(close(&view_box, &frame_box, 1.0), "{:?}", view_box);
  }

  #[test]
  fn fill_crops_overflowing_axis() {
    // 1280x720 帧铺满 720x720 显示：缩放 1.0，x 方向向左偏移 280
    let t = FrameTransform::new(
      Size::new(1280, 720),
      Rotation::Deg0,
      Size::square(640),
      ResizeMode::Stretch,
    );
    let mapper = CoordinateMapper::new(Some(Size::square(720)), DisplayFit::Fill, CameraFacing::Back);
    let frame_box = BBox::new(300.0, 100.0, 500.0, 300.0);
    let view_box = mapper.map_to_view(&t.frame_to_model(&frame_box), &t).unwrap();
    assert!(close(&view_box, &BBox::new(20.0, 100.0, 220.0, 300.0), 1e-2), "{:?}", view_box);
  }

  #[test]
  fn fit_adds_bars() {
    let t = FrameTransform::new(
      Size::new(1280, 720),
      Rotation::Deg0,
      Size::square(640),
      ResizeMode::Stretch,
    );
    let mapper = CoordinateMapper::new(Some(Size::square(640)), DisplayFit::Fit, CameraFacing::Back);
    let full = t.frame_to_model(&BBox::new(0.0, 0.0, 1280.0, 720.0));
    let view_box = mapper.map_to_view(&full, &t).unwrap();
    assert!(close(&view_box, &BBox::new(0.0, 140.0, 640.0, 500.0), 1e-2), "{:?}", view_box);
  }

  #[test]
  fn partially_offscreen_box_is_clipped() {
    let t = FrameTransform::new(
      Size::new(1280, 720),
      Rotation::Deg0,
      Size::square(640),
      ResizeMode::Stretch,
    );
    let mapper = CoordinateMapper::new(Some(Size::square(720)), DisplayFit::Fill, CameraFacing::Back);
    let frame_box = BBox::new(200.0, 100.0, 400.0, 300.0);
    let view_box = mapper.map_to_view(&t.frame_to_model(&frame_box), &t).unwrap();
    assert_eq!(view_box.x_min, 0.0);
    assert!((view_box.x_max - 120.0).abs() < 1e-2);
  }

  #[test]
  fn fully_offscreen_box_is_dropped() {
    let t = FrameTransform::new(
      Size::new(1280, 720),
      Rotation::Deg0,
      Size::square(640),
      ResizeMode::Stretch,
    );
    let mapper = CoordinateMapper::new(Some(Size::square(720)), DisplayFit::Fill, CameraFacing::Back);
    let frame_box = BBox::new(10.0, 100.0, 200.0, 300.0);
    assert!(mapper.map_to_view(&t.frame_to_model(&frame_box), &t).is_none());
  }

  #[test]
  fn front_camera_mirrors_horizontally() {
    let t = FrameTransform::new(
      Size::new(640, 640),
      Rotation::Deg0,
      Size::square(640),
      ResizeMode::Stretch,
    );
    let mapper = CoordinateMapper::new(None, DisplayFit::Fill, CameraFacing::Front);
    let view_box = mapper
      .map_to_view(&BBox::new(10.0, 20.0, 110.0, 120.0), &t)
      .unwrap();
    assert!(close(&view_box, &BBox::new(530.0, 20.0, 630.0, 120.0), 1e-3));
  }

  #[test]
  fn rotated_frame_maps_in_upright_space() {
    // 传感器 640x480，旋转 90 度后正向帧为 480x640
    let t = FrameTransform::new(
      Size::new(640, 480),
      Rotation::Deg90,
      Size::square(640),
      ResizeMode::Letterbox,
    );
    assert_eq!(t.frame, Size::new(480, 640));
    let sensor_box = BBox::new(0.0, 0.0, 100.0, 50.0);
    let upright = t.sensor_to_frame(&sensor_box);
    assert_eq!(upright, BBox::new(430.0, 0.0, 480.0, 100.0));

    let mapper = CoordinateMapper::new(None, DisplayFit::Fill, CameraFacing::Back);
    let view_box = mapper.map_to_view(&t.frame_to_model(&upright), &t).unwrap();
    assert!(close(&view_box, &upright, 1.0), "{:?}", view_box);
    assert!(close(&t.frame_to_sensor(&view_box), &sensor_box, 1.0));
  }

  #[test]
  fn free_function_matches_mapper() {
    let t = FrameTransform::new(
      Size::new(1920, 1080),
      Rotation::Deg0,
      Size::square(640),
      ResizeMode::Letterbox,
    );
    let b = BBox::new(100.0, 200.0, 300.0, 400.0);
    let view = Size::new(1080, 1920);
    assert_eq!(
      map_to_view(&b, &t, view, DisplayFit::Fit, CameraFacing::Back),
      CoordinateMapper::new(Some(view), DisplayFit::Fit, CameraFacing::Back).map_to_view(&b, &t)
    );
  }
}
