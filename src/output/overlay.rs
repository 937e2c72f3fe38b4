// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/overlay.rs - 叠加层状态
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

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::output::{DetectionResult, OutputError, RenderSink, SummarySink};

/// 叠加层持有的最新结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverlaySnapshot {
  pub results: Vec<DetectionResult>,
  pub summary: String,
  /// 结果被更新的次数
  pub generation: u64,
}

/// 预览叠加层的共享状态
///
/// 克隆共享同一份状态：一份交给管线作为输出，另一份留给界面读取。
/// 处理失败时管线不会调用输出，因此这里保留上一次的结果。
#[derive(Debug, Clone, Default)]
pub struct OverlayState {
  inner: Arc<Mutex<OverlaySnapshot>>,
}

impl OverlayState {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> MutexGuard<'_, OverlaySnapshot> {
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }

  pub fn snapshot(&self) -> OverlaySnapshot {
    self.lock().clone()
  }

  pub fn results(&self) -> Vec<DetectionResult> {
    self.lock().results.clone()
  }

  pub fn summary(&self) -> String {
    self.lock().summary.clone()
  }

  pub fn generation(&self) -> u64 {
    self.lock().generation
  }

  /// 每个结果对应的标题文字
  pub fn captions(&self) -> Vec<String> {
    self.lock().results.iter().map(DetectionResult::overlay_text).collect()
  }
}

impl RenderSink for OverlayState {
  fn set_results(&self, results: &[DetectionResult]) -> Result<(), OutputError> {
    let mut overlay = self.lock();
    overlay.results = results.to_vec();
    overlay.generation += 1;
    Ok(())
  }
}

impl SummarySink for OverlayState {
  fn set_summary(&self, summary: &str) -> Result<(), OutputError> {
    self.lock().summary = summary.to_string();
    Ok(())
  }
}
