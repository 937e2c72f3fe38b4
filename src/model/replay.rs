// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/replay.rs - 回放推理引擎
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

//! 从 JSON 文件回放事先录制的模型输出
//!
//! 文件内容为单个 `{"shape": [...], "data": [...]}` 对象或它们的数组，
//! 每次推理按顺序循环返回一个。URL 形如：
//!
//! ```text
//! replay:///path/to/outputs.json?input=1,640,640,3
//! ```
//!
//! `input` 参数可选，给出时会检查输入张量形状。

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  error::InferenceError,
  model::InferenceEngine,
  tensor::{RawDetectionTensor, Tensor},
};

#[derive(Error, Debug)]
pub enum ReplayEngineError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("录制文件读取错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("录制文件格式错误: {0}")]
  FormatError(#[from] serde_json::Error),
  #[error("录制文件无效: {0}")]
  Invalid(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Recording {
  One(RawDetectionTensor),
  Many(Vec<RawDetectionTensor>),
}

pub struct ReplayEngine {
  outputs: Vec<RawDetectionTensor>,
  cursor: usize,
  input_shape: Option<[usize; 4]>,
}

impl FromUrlWithScheme for ReplayEngine {
  const SCHEME: &'static str = "replay";
}

impl FromUrl for ReplayEngine {
  type Error = ReplayEngineError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ReplayEngineError::SchemeMismatch(format!(
        "模型路径必须使用 {} 方案, 实际为 {}",
        Self::SCHEME,
        url.scheme()
      )));
    }

    info!("加载录制文件: {}", url.path());
    let text = std::fs::read_to_string(url.path())?;
    debug!("录制文件大小: {:.2} KB", text.len() as f64 / 1024.0);
    let mut engine = Self::from_json(&text)?;

    if let Some((_, v)) = url.query_pairs().find(|(k, _)| k == "input") {
      let dims = v
        .split(',')
        .map(|d| d.trim().parse::<usize>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ReplayEngineError::Invalid(format!("input 参数无效 '{}': {}", v, e)))?;
      let shape: [usize; 4] = dims
        .try_into()
        .map_err(|_| ReplayEngineError::Invalid(format!("input 参数必须为 4 维: {}", v)))?;
      engine = engine.with_input_shape(shape);
    }

    Ok(engine)
  }
}

impl ReplayEngine {
  pub fn new(outputs: Vec<RawDetectionTensor>) -> Result<Self, ReplayEngineError> {
    if outputs.is_empty() {
      return Err(ReplayEngineError::Invalid("没有录制的输出".to_string()));
    }
    Ok(Self {
      outputs,
      cursor: 0,
      input_shape: None,
    })
  }

  pub fn from_json(text: &str) -> Result<Self, ReplayEngineError> {
    let outputs = match serde_json::from_str::<Recording>(text)? {
      Recording::One(output) => vec![output],
      Recording::Many(outputs) => outputs,
    };
    info!("录制输出数量: {}", outputs.len());
    Self::new(outputs)
  }

  pub fn with_input_shape(mut self, shape: [usize; 4]) -> Self {
    self.input_shape = Some(shape);
    self
  }

  pub fn len(&self) -> usize {
    self.outputs.len()
  }

  pub fn is_empty(&self) -> bool {
    self.outputs.is_empty()
  }
}

impl InferenceEngine for ReplayEngine {
  fn infer(&mut self, input: &Tensor) -> Result<RawDetectionTensor, InferenceError> {
    if let Some(expected) = self.input_shape
      && expected != input.shape()
    {
      error!(
        "输入形状不匹配: 期望 {:?}, 实际 {:?}",
        expected,
        input.shape()
      );
      return Err(InferenceError::InvalidInput(format!(
        "期望输入形状 {:?}, 实际 {:?}",
        expected,
        input.shape()
      )));
    }

    let output = self
      .outputs
      .get(self.cursor)
      .cloned()
      .ok_or_else(|| InferenceError::Backend("录制输出为空".to_string()))?;
    self.cursor = (self.cursor + 1) % self.outputs.len();
    Ok(output)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::tensor::TensorLayout;

  #[test]
  fn replays_outputs_cyclically() {
    let mut engine = ReplayEngine::from_json(
      r#"[{"shape":[1,5,1],"data":[1,2,3,4,5]},{"shape":[1,5,0],"data":[]}]"#,
    )
    .unwrap();
    let input = Tensor::zeros(TensorLayout::Nhwc, 4, 4, 3);
    assert_eq!(engine.infer(&input).unwrap().data.len(), 5);
    assert!(engine.infer(&input).unwrap().data.is_empty());
    assert_eq!(engine.infer(&input).unwrap().data.len(), 5);
  }

  #[test]
  fn accepts_single_object() {
    let engine = ReplayEngine::from_json(r#"{"shape":[1,5,0],"data":[]}"#).unwrap();
    assert_eq!(engine.len(), 1);
  }

  #[test]
  fn rejects_empty_recording() {
    assert!(matches!(
      ReplayEngine::from_json("[]"),
      Err(ReplayEngineError::Invalid(_))
    ));
  }

  #[test]
  fn input_shape_mismatch_is_inference_error() {
    let mut engine = ReplayEngine::from_json(r#"{"shape":[1,5,0],"data":[]}"#)
      .unwrap()
      .with_input_shape([1, 640, 640, 3]);
    let input = Tensor::zeros(TensorLayout::Nhwc, 4, 4, 3);
    assert!(matches!(
      engine.infer(&input),
      Err(InferenceError::InvalidInput(_))
    ));
  }

  #[test]
  fn loads_from_url_with_input_query() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.json");
    std::fs::write(&path, r#"{"shape":[1,5,0],"data":[]}"#).unwrap();
    let url = Url::parse(&format!("replay://{}?input=1,4,4,3", path.display())).unwrap();
    let mut engine = ReplayEngine::from_url(&url).unwrap();
    let input = Tensor::zeros(TensorLayout::Nhwc, 4, 4, 3);
    assert!(engine.infer(&input).is_ok());

    let wrong = Url::parse(&format!("image://{}", path.display())).unwrap();
    assert!(matches!(
      ReplayEngine::from_url(&wrong),
      Err(ReplayEngineError::SchemeMismatch(_))
    ));
  }
}
