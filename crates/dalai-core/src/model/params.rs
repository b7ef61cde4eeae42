//! Hyperparameters shipped alongside the weights in `params.json`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{DalaiError, Result};

/// Contents of a variant's `params.json`.
///
/// The conversion script reads this file itself; parsing it here only makes
/// a truncated or corrupt copy fail before a long conversion starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    pub dim: u32,
    pub multiple_of: u32,
    pub n_heads: u32,
    pub n_layers: u32,
    pub norm_eps: f64,
    /// `-1` in the released files; the tokenizer decides the real size.
    #[serde(default = "default_vocab_size")]
    pub vocab_size: i64,
}

fn default_vocab_size() -> i64 {
    -1
}

impl ModelParams {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| DalaiError::io("reading model params", path, e))?;
        serde_json::from_str(&raw).map_err(|source| DalaiError::Json {
            path: path.to_path_buf(),
            source,
        })
    }
}
