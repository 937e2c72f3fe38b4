// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/nms.rs - 非极大值抑制
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

use std::collections::BTreeMap;

use tracing::debug;

use crate::{geometry::BBox, model::Candidate};

/// 计算两个边界框的 IoU
pub fn iou(a: &BBox, b: &BBox) -> f32 {
  a.iou(b)
}

/// 按类别独立执行贪心 NMS
///
/// 同类中按置信度降序、解码顺序升序排列，依次保留最高者并移除与其
/// IoU ≥ `iou_threshold` 的其余候选框。退化框（面积为零）不会保留。
/// 输出按类别编号升序拼接，每个类别内部保持置信度顺序。
pub fn suppress(candidates: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
  let total = candidates.len();
  let mut by_class: BTreeMap<usize, Vec<Candidate>> = BTreeMap::new();
  for candidate in candidates {
    if candidate.bbox.is_degenerate() {
      continue;
    }
    by_class.entry(candidate.class_id).or_default().push(candidate);
  }

  let mut survivors = Vec::new();
  for (_, mut group) in by_class {
    group.sort_by(|a, b| {
      b.confidence
        .total_cmp(&a.confidence)
        .then(a.order.cmp(&b.order))
    });

    let mut removed = vec![false; group.len()];
    for i in 0..group.len() {
      if removed[i] {
        continue;
      }
      let best = group[i];
      survivors.push(best);
      for j in (i + 1)..group.len() {
        if !removed[j] && best.bbox.iou(&group[j].bbox) >= iou_threshold {
          removed[j] = true;
        }
      }
    }
  }

  debug!("NMS: {} -> {}", total, survivors.len());
  survivors
}

#[cfg(test)]
mod tests {
  use super::*;
  use proptest::prelude::*;

  fn cand(class_id: usize, confidence: f32, order: usize, bbox: BBox) -> Candidate {
    Candidate {
      bbox,
      class_id,
      confidence,
      order,
    }
  }

  #[test]
  fn overlapping_same_class_keeps_highest() {
    let a = cand(0, 0.6, 0, BBox::new(0.0, 0.0, 100.0, 100.0));
    let b = cand(0, 0.9, 1, BBox::new(5.0, 5.0, 105.0, 105.0));
    let out = suppress(vec![a, b], 0.45);
    assert_eq!(out, vec![b]);
  }

  #[test]
  fn different_classes_never_suppress_each_other() {
    let a = cand(0, 0.9, 0, BBox::new(0.0, 0.0, 100.0, 100.0));
    let b = cand(1, 0.8, 1, BBox::new(0.0, 0.0, 100.0, 100.0));
    let out = suppress(vec![a, b], 0.1);
    assert_eq!(out.len(), 2);
  }

  #[test]
  fn iou_exactly_at_threshold_is_suppressed() {
    // IoU = 50 / 150 = 1/3
    let a = cand(0, 0.9, 0, BBox::new(0.0, 0.0, 10.0, 10.0));
    let b = cand(0, 0.8, 1, BBox::new(5.0, 0.0, 15.0, 10.0));
    let threshold = a.bbox.iou(&b.bbox);
    assert_eq!(suppress(vec![a, b], threshold).len(), 1);
    assert_eq!(suppress(vec![a, b], threshold + 1e-3).len(), 2);
  }

  #[test]
  fn ties_are_broken_by_decode_order() {
    let first = cand(0, 0.7, 3, BBox::new(0.0, 0.0, 10.0, 10.0));
    let second = cand(0, 0.7, 8, BBox::new(1.0, 1.0, 11.0, 11.0));
    assert_eq!(suppress(vec![second, first], 0.3), vec![first]);
    assert_eq!(suppress(vec![first, second], 0.3), vec![first]);
  }

  #[test]
  fn degenerate_boxes_never_survive() {
    let line = cand(0, 0.99, 0, BBox::new(5.0, 5.0, 5.0, 50.0));
    let ok = cand(0, 0.5, 1, BBox::new(0.0, 0.0, 10.0, 10.0));
    assert_eq!(suppress(vec![line, ok], 0.45), vec![ok]);
  }

  #[test]
  fn chain_suppression_only_uses_kept_boxes() {
    // a 压制 b，b 与 c 重叠但 b 已被移除，c 与 a 不重叠，因此 c 保留
    let a = cand(0, 0.9, 0, BBox::new(0.0, 0.0, 10.0, 10.0));
    let b = cand(0, 0.8, 1, BBox::new(4.0, 0.0, 14.0, 10.0));
    let c = cand(0, 0.7, 2, BBox::new(10.0, 0.0, 20.0, 10.0));
    assert_eq!(suppress(vec![a, b, c], 0.4), vec![a, c]);
  }

  #[test]
  fn output_is_grouped_by_class_id() {
    let a = cand(2, 0.9, 0, BBox::new(0.0, 0.0, 10.0, 10.0));
    let b = cand(0, 0.5, 1, BBox::new(50.0, 50.0, 60.0, 60.0));
    let c = cand(0, 0.6, 2, BBox::new(80.0, 80.0, 90.0, 90.0));
    let out = suppress(vec![a, b, c], 0.45);
    assert_eq!(out, vec![c, b, a]);
  }

  fn arb_candidate() -> impl Strategy<Value = (usize, f32, f32, f32, f32, f32)> {
    (
      0usize..3,
      0.0f32..=1.0,
      0.0f32..200.0,
      0.0f32..200.0,
      0.0f32..80.0,
      0.0f32..80.0,
    )
  }

  fn build(raw: Vec<(usize, f32, f32, f32, f32, f32)>) -> Vec<Candidate> {
    raw
      .into_iter()
      .enumerate()
      .map(|(order, (class_id, confidence, x, y, w, h))| {
        cand(class_id, confidence, order, BBox::new(x, y, x + w, y + h))
      })
      .collect()
  }

  proptest! {
    #[test]
    fn suppress_is_idempotent(
      raw in prop::collection::vec(arb_candidate(), 0..40),
      threshold in 0.05f32..0.95,
    ) {
      let once = suppress(build(raw), threshold);
      let twice = suppress(once.clone(), threshold);
      prop_assert_eq!(once, twice);
    }

    #[test]
    fn suppress_is_deterministic(
      raw in prop::collection::vec(arb_candidate(), 0..40),
      threshold in 0.05f32..0.95,
    ) {
      let candidates = build(raw);
      prop_assert_eq!(
        suppress(candidates.clone(), threshold),
        suppress(candidates, threshold)
      );
    }

    #[test]
    fn survivors_of_same_class_stay_below_threshold(
      raw in prop::collection::vec(arb_candidate(), 0..40),
      threshold in 0.05f32..0.95,
    ) {
      let out = suppress(build(raw), threshold);
      for (i, a) in out.iter().enumerate() {
        prop_assert!(!a.bbox.is_degenerate());
        for b in &out[i + 1..] {
          if a.class_id == b.class_id {
            prop_assert!(a.bbox.iou(&b.bbox) < threshold);
          }
        }
      }
    }
  }
}
