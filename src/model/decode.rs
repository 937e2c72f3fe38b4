// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/decode.rs - YOLO 输出解码
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
use tracing::{debug, warn};

use crate::{
  error::PipelineError,
  geometry::{BBox, Size},
  tensor::RawDetectionTensor,
};

const BOX_ATTRS: usize = 4;

/// 输出张量的排布
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputLayout {
  /// `[1, 4+C, N]`，YOLOv8/YOLO11 导出的原生排布
  #[default]
  ChannelMajor,
  /// `[1, N, 4+C]`
  RowMajor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoxEncoding {
  /// `[cx, cy, w, h]`
  #[default]
  CenterSize,
  /// `[x_min, y_min, x_max, y_max]`
  Corner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreMode {
  /// 无 objectness 通道，置信度即类别分数（YOLOv8 及以后）
  #[default]
  ClassOnly,
  /// 第 5 个通道为 objectness，置信度 = objectness × 类别分数（YOLOv5 风格）
  ObjectnessTimesClass,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoxUnits {
  /// 相对模型输入的 `[0, 1]` 坐标（TFLite 导出）
  #[default]
  Normalized,
  /// 模型输入像素坐标
  Pixels,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
  pub layout: OutputLayout,
  pub box_encoding: BoxEncoding,
  pub score_mode: ScoreMode,
  pub box_units: BoxUnits,
}

impl DecoderConfig {
  fn leading_attrs(&self) -> usize {
    match self.score_mode {
      ScoreMode::ClassOnly => BOX_ATTRS,
      ScoreMode::ObjectnessTimesClass => BOX_ATTRS + 1,
    }
  }
}

/// 解码得到的候选框，坐标位于模型输入空间
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
  pub bbox: BBox,
  pub class_id: usize,
  pub confidence: f32,
  /// 在输出张量中的行号，排序时作为稳定的次级键
  pub order: usize,
}

#[derive(Debug, Clone)]
pub struct Decoder {
  config: DecoderConfig,
  model_input: Size,
  num_labels: usize,
}

/// 行/属性二维视图
struct Rows<'a> {
  data: &'a [f32],
  rows: usize,
  attrs: usize,
  layout: OutputLayout,
}

impl Rows<'_> {
  fn get(&self, row: usize, attr: usize) -> f32 {
    match self.layout {
      OutputLayout::ChannelMajor => self.data[attr * self.rows + row],
      OutputLayout::RowMajor => self.data[row * self.attrs + attr],
    }
  }
}

impl Decoder {
  pub fn new(config: DecoderConfig, model_input: Size, num_labels: usize) -> Self {
    Self {
      config,
      model_input,
      num_labels,
    }
  }

  pub fn config(&self) -> &DecoderConfig {
    &self.config
  }

  fn rows<'a>(&self, raw: &'a RawDetectionTensor) -> Result<Rows<'a>, PipelineError> {
    if !raw.is_consistent() {
      return Err(PipelineError::invalid_output(format!(
        "数据长度 {} 与形状 {:?} 不一致",
        raw.data.len(),
        raw.shape
      )));
    }

    let (d0, d1) = match raw.shape.as_slice() {
      [1, d0, d1] | [d0, d1] => (*d0, *d1),
      other => {
        return Err(PipelineError::invalid_output(format!(
          "期望形状 [1, A, B] 或 [A, B], 实际为 {:?}",
          other
        )));
      }
    };

    let (attrs, rows) = match self.config.layout {
      OutputLayout::ChannelMajor => (d0, d1),
      OutputLayout::RowMajor => (d1, d0),
    };

    if attrs.checked_mul(rows) != Some(raw.data.len()) {
      return Err(PipelineError::invalid_output(format!(
        "形状 {:?} 无法按 {} 行 x {} 属性解读",
        raw.shape, rows, attrs
      )));
    }

    let min_attrs = self.config.leading_attrs() + 1;
    if attrs < min_attrs {
      return Err(PipelineError::invalid_output(format!(
        "每个检测至少需要 {} 个属性, 实际为 {} (形状 {:?}, 排布 {:?})",
        min_attrs, attrs, raw.shape, self.config.layout
      )));
    }

    Ok(Rows {
      data: &raw.data,
      rows,
      attrs,
      layout: self.config.layout,
    })
  }

  /// 解码并按置信度预过滤；输出顺序与张量行顺序一致
  pub fn decode(
    &self,
    raw: &RawDetectionTensor,
    confidence_threshold: f32,
  ) -> Result<Vec<Candidate>, PipelineError> {
    let rows = self.rows(raw)?;
    let lead = self.config.leading_attrs();
    let num_classes = rows.attrs - lead;
    if num_classes != self.num_labels {
      debug!(
        "模型类别数 {} 与标签数 {} 不一致",
        num_classes, self.num_labels
      );
    }

    let (unit_x, unit_y) = match self.config.box_units {
      BoxUnits::Normalized => (
        self.model_input.width as f32,
        self.model_input.height as f32,
      ),
      BoxUnits::Pixels => (1.0, 1.0),
    };

    let mut candidates = Vec::new();
    let mut unknown_class = 0usize;

    for row in 0..rows.rows {
      let (class_id, class_score) = {
        let mut best_score = f32::NEG_INFINITY;
        let mut best_id = 0usize;
        for c in 0..num_classes {
          let score = rows.get(row, lead + c);
          if score > best_score {
            best_score = score;
            best_id = c;
          }
        }
        (best_id, best_score)
      };

      let confidence = match self.config.score_mode {
        ScoreMode::ClassOnly => class_score,
        ScoreMode::ObjectnessTimesClass => rows.get(row, BOX_ATTRS) * class_score,
      };

      // NaN 不满足比较，同样被过滤
      if !(confidence >= confidence_threshold) {
        continue;
      }

      if class_id >= self.num_labels {
        unknown_class += 1;
        continue;
      }

      let (a, b, c, d) = (
        rows.get(row, 0) * unit_x,
        rows.get(row, 1) * unit_y,
        rows.get(row, 2) * unit_x,
        rows.get(row, 3) * unit_y,
      );
      let bbox = match self.config.box_encoding {
        BoxEncoding::CenterSize => BBox::from_center_size(a, b, c, d),
        BoxEncoding::Corner => BBox::from_corners(a, b, c, d),
      };
      if !bbox.is_finite() {
        continue;
      }

      candidates.push(Candidate {
        bbox,
        class_id,
        confidence: confidence.min(1.0),
        order: row,
      });
    }

    if unknown_class > 0 {
      warn!(
        "丢弃 {} 个类别编号超出标签表 ({} 个标签) 的候选框",
        unknown_class, self.num_labels
      );
    }
    debug!("解码得到 {} / {} 个候选框", candidates.len(), rows.rows);

    Ok(candidates)
  }
}
