//! Model variants and the files that make them up.
//!
//! A variant is one of the four LLaMA sizes. Each is split into a fixed
//! number of weight shards; every other file name in the layout is derived
//! from the variant and the shard index.

mod params;
mod variant;

pub use params::ModelParams;
pub use variant::{parse_variants, shard_suffix, ModelVariant, USAGE_MESSAGE};
