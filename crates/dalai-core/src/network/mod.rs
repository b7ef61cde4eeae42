//! Network transfers.
//!
//! Only plain HTTP GET downloads are needed: the shared tokenizer files and,
//! when configured with a remote weights source, the model shards.

mod download;

pub use download::{Downloader, Fetcher};
