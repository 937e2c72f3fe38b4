// 该文件是 Shanan （山南西风） 项目的一部分。
// src/args.rs - 项目参数配置
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

use std::path::PathBuf;

use clap::Parser;
use url::Url;

use shanan_lens::{
  config::PipelineConfig,
  error::PipelineError,
  geometry::Size,
  mapper::{CameraFacing, DisplayFit},
  preprocess::ResizeMode,
};

/// Shanan Lens 参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 推理引擎，例如 replay:///path/to/outputs.json
  #[arg(long, value_name = "MODEL")]
  pub model: Url,

  /// 输入来源，例如 image:///a.jpg?rotation=90 或 folder:///frames
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,

  /// 渲染输出，例如 image:///annotated.png?font=/path/font.ttf、folder:///records 或 log://
  #[arg(long, value_name = "OUTPUT")]
  pub output: Option<Url>,

  /// 标签文件，每行一个类别名称
  #[arg(long, value_name = "FILE")]
  pub labels: Option<PathBuf>,

  /// JSON 配置文件，命令行参数优先
  #[arg(long, value_name = "FILE")]
  pub config: Option<PathBuf>,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, value_name = "THRESHOLD")]
  pub confidence: Option<f32>,

  /// NMS IoU 阈值 (0.0 - 1.0)
  #[arg(long, value_name = "THRESHOLD")]
  pub iou: Option<f32>,

  /// 模型输入边长
  #[arg(long, value_name = "PIXELS")]
  pub input_size: Option<u32>,

  /// 缩放方式: letterbox | stretch | center_crop
  #[arg(long, value_name = "MODE", value_parser = parse_resize_mode)]
  pub resize_mode: Option<ResizeMode>,

  /// 显示区域尺寸，例如 1080x1920
  #[arg(long, value_name = "WxH", value_parser = parse_size)]
  pub view: Option<Size>,

  /// 显示适配方式: fill | fit | stretch
  #[arg(long, value_name = "MODE", value_parser = parse_fit)]
  pub fit: Option<DisplayFit>,

  /// 前置摄像头，检测框水平镜像
  #[arg(long)]
  pub front_camera: bool,

  /// 处理的最大帧数；未指定时只处理第一帧
  #[arg(long, value_name = "FRAME_NUMBER")]
  pub frame_number: Option<usize>,

  /// 按指定帧率投递并在忙时丢帧
  #[arg(long, value_name = "FPS")]
  pub fps: Option<f64>,
}

impl Args {
  /// 配置文件打底，再叠加命令行参数
  pub fn pipeline_config(&self) -> Result<PipelineConfig, PipelineError> {
    let mut config = match &self.config {
      Some(path) => PipelineConfig::from_json_file(path)?,
      None => PipelineConfig::default(),
    };

    if let Some(size) = self.input_size {
      config = config.with_model_input_size(size);
    }
    if let Some(threshold) = self.confidence {
      config = config.with_confidence_threshold(threshold);
    }
    if let Some(threshold) = self.iou {
      config = config.with_iou_threshold(threshold);
    }
    if let Some(mode) = self.resize_mode {
      config = config.with_resize_mode(mode);
    }
    if self.view.is_some() || self.fit.is_some() {
      let size = self.view.or(config.view.size);
      let fit = self.fit.unwrap_or(config.view.fit);
      config = config.with_view(size, fit);
    }
    if self.front_camera {
      config = config.with_camera(CameraFacing::Front);
    }
    if self.labels.is_some() {
      config = config.with_labels(self.labels.clone());
    }

    config.validate()?;
    Ok(config)
  }

  /// 是否进入持续处理模式
  pub fn is_continuous(&self) -> bool {
    self.frame_number.is_some() || self.fps.is_some()
  }
}

fn parse_resize_mode(s: &str) -> Result<ResizeMode, String> {
  match s {
    "letterbox" => Ok(ResizeMode::Letterbox),
    "stretch" => Ok(ResizeMode::Stretch),
    "center_crop" | "center-crop" => Ok(ResizeMode::CenterCrop),
    other => Err(format!("未知的缩放方式: {}", other)),
  }
}

fn parse_fit(s: &str) -> Result<DisplayFit, String> {
  match s {
    "fill" => Ok(DisplayFit::Fill),
    "fit" => Ok(DisplayFit::Fit),
    "stretch" => Ok(DisplayFit::Stretch),
    other => Err(format!("未知的适配方式: {}", other)),
  }
}

fn parse_size(s: &str) -> Result<Size, String> {
  let (w, h) = s
    .split_once(['x', 'X'])
    .ok_or_else(|| format!("尺寸格式应为 WxH: {}", s))?;
  let width = w.trim().parse::<u32>().map_err(|e| format!("宽度无效 '{}': {}", w, e))?;
  let height = h.trim().parse::<u32>().map_err(|e| format!("高度无效 '{}': {}", h, e))?;
  let size = Size::new(width, height);
  if size.is_empty() {
    return Err(format!("尺寸不能为零: {}", s));
  }
  Ok(size)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_view_size() {
    assert_eq!(parse_size("1080x1920").unwrap(), Size::new(1080, 1920));
    assert!(parse_size("0x10").is_err());
    assert!(parse_size("1080").is_err());
  }

  #[test]
  fn cli_overrides_defaults() {
    let args = Args::try_parse_from([
      "shanan-lens",
      "--model",
      "replay:///tmp/out.json",
      "--input",
      "image:///tmp/a.jpg",
      "--confidence",
      "0.5",
      "--resize-mode",
      "center_crop",
      "--view",
      "720x1280",
      "--front-camera",
    ])
    .unwrap();
    let config = args.pipeline_config().unwrap();
    assert_eq!(config.confidence_threshold, 0.5);
    assert_eq!(config.resize_mode, ResizeMode::CenterCrop);
    assert_eq!(config.view.size, Some(Size::new(720, 1280)));
    assert_eq!(config.view.fit, DisplayFit::Fill);
    assert_eq!(config.camera, CameraFacing::Front);
    assert!(!args.is_continuous());
  }

  #[test]
  fn invalid_threshold_is_rejected() {
    let args = Args::try_parse_from([
      "shanan-lens",
      "--model",
      "replay:///tmp/out.json",
      "--input",
      "image:///tmp/a.jpg",
      "--iou",
      "1.5",
    ])
    .unwrap();
    assert!(args.pipeline_config().unwrap_err().is_fatal());
  }
}
