// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/labels.rs - 类别标签表
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

use std::{
  io::BufRead,
  path::Path,
  sync::Arc,
};

use tracing::{info, warn};

use crate::error::PipelineError;

/// COCO 数据集类别名称
pub const COCO_LABELS: [&str; 80] = [
  "person",
  "bicycle",
  "car",
  "motorcycle",
  "airplane",
  "bus",
  "train",
  "truck",
  "boat",
  "traffic light",
  "fire hydrant",
  "stop sign",
  "parking meter",
  "bench",
  "bird",
  "cat",
  "dog",
  "horse",
  "sheep",
  "cow",
  "elephant",
  "bear",
  "zebra",
  "giraffe",
  "backpack",
  "umbrella",
  "handbag",
  "tie",
  "suitcase",
  "frisbee",
  "skis",
  "snowboard",
  "sports ball",
  "kite",
  "baseball bat",
  "baseball glove",
  "skateboard",
  "surfboard",
  "tennis racket",
  "bottle",
  "wine glass",
  "cup",
  "fork",
  "knife",
  "spoon",
  "bowl",
  "banana",
  "apple",
  "sandwich",
  "orange",
  "broccoli",
  "carrot",
  "hot dog",
  "pizza",
  "donut",
  "cake",
  "chair",
  "couch",
  "potted plant",
  "bed",
  "dining table",
  "toilet",
  "tv",
  "laptop",
  "mouse",
  "remote",
  "keyboard",
  "cell phone",
  "microwave",
  "oven",
  "toaster",
  "sink",
  "refrigerator",
  "book",
  "clock",
  "vase",
  "scissors",
  "teddy bear",
  "hair drier",
  "toothbrush",
];

/// 按类别编号索引的标签表，启动时加载一次，之后只读共享
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTable {
  labels: Arc<[String]>,
}

impl LabelTable {
  pub fn new(labels: Vec<String>) -> Result<Self, PipelineError> {
    if labels.is_empty() {
      return Err(PipelineError::initialization("标签表为空"));
    }
    Ok(Self {
      labels: labels.into(),
    })
  }

  pub fn coco() -> Self {
    Self {
      labels: COCO_LABELS.iter().map(|s| s.to_string()).collect(),
    }
  }

  /// 每行一个标签，行号即类别编号
  ///
  /// 去除首尾空白；中间的空行保留为空标签以免后续编号错位，末尾空行忽略。
  pub fn from_reader(reader: impl BufRead) -> Result<Self, PipelineError> {
    let mut labels = Vec::new();
    for line in reader.lines() {
      let line =
        line.map_err(|e| PipelineError::initialization(format!("读取标签失败: {}", e)))?;
      labels.push(line.trim().to_string());
    }
    while labels.last().is_some_and(String::is_empty) {
      labels.pop();
    }

    let blank = labels.iter().filter(|label| label.is_empty()).count();
    if blank > 0 {
      warn!("标签文件中有 {} 个空行，对应类别的标签为空", blank);
    }
    Self::new(labels)
  }

  pub fn from_path(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|e| {
      PipelineError::initialization(format!("无法打开标签文件 {}: {}", path.display(), e))
    })?;
    let table = Self::from_reader(std::io::BufReader::new(file))?;
    info!("已加载 {} 个标签: {}", table.len(), path.display());
    Ok(table)
  }

  pub fn get(&self, class_id: usize) -> Option<&str> {
    self.labels.get(class_id).map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.labels.len()
  }

  pub fn is_empty(&self) -> bool {
    self.labels.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Cursor;

  #[test]
  fn parses_trimmed_lines() {
    let table = LabelTable::from_reader(Cursor::new("person\r\n  bicycle \ncar\n\n\n")).unwrap();
    assert_eq!(table.len(), 3);
    assert_eq!(table.get(0), Some("person"));
    assert_eq!(table.get(1), Some("bicycle"));
    assert_eq!(table.get(2), Some("car"));
    assert_eq!(table.get(3), None);
  }

  #[test]
  fn interior_blank_line_keeps_class_positions() {
    let table = LabelTable::from_reader(Cursor::new("person\n\ncar\n")).unwrap();
    assert_eq!(table.len(), 3);
    assert_eq!(table.get(1), Some(""));
    assert_eq!(table.get(2), Some("car"));
  }

  #[test]
  fn empty_source_is_initialization_error() {
    let err = LabelTable::from_reader(Cursor::new("\n \n")).unwrap_err();
    assert!(err.is_fatal());
  }

  #[test]
  fn missing_file_is_initialization_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = LabelTable::from_path(dir.path().join("labels.txt")).unwrap_err();
    assert!(matches!(err, PipelineError::Initialization(_)));
  }

  #[test]
  fn reads_label_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("labels.txt");
    std::fs::write(&path, "cat\ndog\n").unwrap();
    let table = LabelTable::from_path(&path).unwrap();
    assert_eq!(table.get(1), Some("dog"));
  }

  #[test]
  fn coco_has_eighty_classes() {
    let coco = LabelTable::coco();
    assert_eq!(coco.len(), 80);
    assert_eq!(coco.get(0), Some("person"));
    assert_eq!(coco.get(79), Some("toothbrush"));
  }
}
