//! The fixed set of LLaMA model variants.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::debug;

use crate::config::PathsConfig;
use crate::{DalaiError, Result};

/// Usage banner printed when a requested model name is not recognised.
pub const USAGE_MESSAGE: &str = "\
##########################################################
#
#   ERROR
#   The arguments must be one or more of the following:
#
#   7B, 13B, 30B, 65B
#
##########################################################

[Example]

# install just 7B (default)
dalai install

# install 7B manually
dalai install 7B

# install 7B and 13B
dalai install 7B 13B
";

/// One of the supported model sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ModelVariant {
    B7,
    B13,
    B30,
    B65,
}

impl ModelVariant {
    pub const ALL: [ModelVariant; 4] = [
        ModelVariant::B7,
        ModelVariant::B13,
        ModelVariant::B30,
        ModelVariant::B65,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelVariant::B7 => "7B",
            ModelVariant::B13 => "13B",
            ModelVariant::B30 => "30B",
            ModelVariant::B65 => "65B",
        }
    }

    /// Number of `consolidated.NN.pth` shards the weights are split into.
    pub fn shard_count(&self) -> usize {
        match self {
            ModelVariant::B7 => 1,
            ModelVariant::B13 => 2,
            ModelVariant::B30 => 4,
            ModelVariant::B65 => 8,
        }
    }

    /// Original PyTorch shard file names, in shard order.
    pub fn shard_files(&self) -> Vec<String> {
        (0..self.shard_count())
            .map(|i| format!("consolidated.{i:02}.pth"))
            .collect()
    }

    /// Every file that must be present in the variant directory before
    /// conversion: checklist, params, then the shards.
    pub fn required_files(&self) -> Vec<String> {
        let mut files = vec![
            PathsConfig::CHECKLIST_FILE.to_string(),
            PathsConfig::PARAMS_FILE.to_string(),
        ];
        files.extend(self.shard_files());
        files
    }

    /// Half-precision weights produced by the conversion script for a shard.
    pub fn f16_file(&self, variant_dir: &Path, shard: usize) -> PathBuf {
        variant_dir.join(format!(
            "{}{}",
            PathsConfig::F16_WEIGHTS_FILE,
            shard_suffix(shard)
        ))
    }

    /// Quantized weights produced by the quantize tool for a shard.
    pub fn q4_file(&self, variant_dir: &Path, shard: usize) -> PathBuf {
        variant_dir.join(format!(
            "{}{}",
            PathsConfig::Q4_WEIGHTS_FILE,
            shard_suffix(shard)
        ))
    }
}

/// File-name suffix for shard `index`: empty for the first shard, `.N` after.
pub fn shard_suffix(index: usize) -> String {
    if index == 0 {
        String::new()
    } else {
        format!(".{index}")
    }
}

impl FromStr for ModelVariant {
    type Err = DalaiError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_uppercase();
        ModelVariant::ALL
            .into_iter()
            .find(|v| v.as_str() == normalized)
            .ok_or(DalaiError::InvalidModel { name: normalized })
    }
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse and validate a batch of requested model names.
///
/// Names are case-insensitive. An empty request means `7B`. The whole batch is
/// rejected on the first unknown name so nothing is staged for a partially
/// valid request.
pub fn parse_variants<S: AsRef<str>>(names: &[S]) -> Result<Vec<ModelVariant>> {
    if names.is_empty() {
        debug!("No models requested, defaulting to {}", ModelVariant::B7);
        return Ok(vec![ModelVariant::B7]);
    }
    names.iter().map(|name| name.as_ref().parse()).collect()
}
