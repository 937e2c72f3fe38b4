// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/log_output.rs - 日志输出
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

use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  output::{DetectionResult, OutputError, RenderSink, SummarySink},
};

/// 将检测结果写入日志
#[derive(Debug, Default, Clone, Copy)]
pub struct LogOutput;

impl FromUrlWithScheme for LogOutput {
  const SCHEME: &'static str = "log";
}

impl FromUrl for LogOutput {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(OutputError::SchemeMismatch(format!(
        "期望输出方式 '{}', 实际输出方式 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }
    Ok(LogOutput)
  }
}

impl RenderSink for LogOutput {
  fn set_results(&self, results: &[DetectionResult]) -> Result<(), OutputError> {
    for result in results {
      debug!(
        "{} @ ({:.0}, {:.0}, {:.0}, {:.0})",
        result.overlay_text(),
        result.bbox.x_min,
        result.bbox.y_min,
        result.bbox.x_max,
        result.bbox.y_max
      );
    }
    Ok(())
  }
}

impl SummarySink for LogOutput {
  fn set_summary(&self, summary: &str) -> Result<(), OutputError> {
    info!("检测结果: {}", summary);
    Ok(())
  }
}
