//! Model staging: acquire weights, convert, quantize.
//!
//! Each requested variant goes through the same three steps, strictly one
//! after another and one variant at a time:
//!
//! 1. **Acquire** - the checklist, params and shard files are copied (or
//!    downloaded) into `models/{VARIANT}/`, and the shared tokenizer files
//!    are fetched into `models/` if missing.
//! 2. **Convert** - the engine's conversion script turns the PyTorch shards
//!    into half-precision ggml files.
//! 3. **Quantize** - the engine's `quantize` tool runs once per shard, unless
//!    both the f16 input and the q4_0 output are already on disk.
//!
//! The first failure aborts the whole batch. Files staged before the failure
//! are left in place so a re-run can pick up where it stopped.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::{InstallConfig, PathsConfig};
use crate::context::{RunContext, WeightsSource};
use crate::model::{parse_variants, ModelParams, ModelVariant};
use crate::network::Fetcher;
use crate::process::{CommandRunner, CommandSpec, PassthroughObserver};
use crate::{DalaiError, Result};

/// Stages model variants for the engine described by a [`RunContext`].
pub struct ModelStager<'a> {
    context: &'a RunContext,
    runner: &'a dyn CommandRunner,
    fetcher: &'a dyn Fetcher,
}

impl<'a> ModelStager<'a> {
    pub fn new(
        context: &'a RunContext,
        runner: &'a dyn CommandRunner,
        fetcher: &'a dyn Fetcher,
    ) -> Self {
        Self {
            context,
            runner,
            fetcher,
        }
    }

    /// Validate the requested names, then stage every variant in order.
    ///
    /// An empty request stages `7B`. Any unknown name rejects the batch
    /// before a single file is touched.
    pub async fn add<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<ModelVariant>> {
        let variants = parse_variants(names)?;
        self.stage_all(&variants).await?;
        Ok(variants)
    }

    /// Stage already-validated variants in order, stopping at the first error.
    pub async fn stage_all(&self, variants: &[ModelVariant]) -> Result<()> {
        let names: Vec<&str> = variants.iter().map(|v| v.as_str()).collect();
        info!("Staging models: {}", names.join(", "));
        for variant in variants {
            self.stage(*variant).await?;
        }
        Ok(())
    }

    /// Acquire, convert and quantize a single variant.
    pub async fn stage(&self, variant: ModelVariant) -> Result<()> {
        info!("Preparing model {}", variant);
        self.acquire(variant).await?;

        let params_path = self.context.variant_dir(variant).join(PathsConfig::PARAMS_FILE);
        let params = ModelParams::load(&params_path)?;
        info!(
            "{} params: dim={} n_layers={} n_heads={}",
            variant, params.dim, params.n_layers, params.n_heads
        );

        self.convert(variant).await?;
        let ran = self.quantize(variant).await?;
        info!("Model {} ready ({} shard(s) quantized)", variant, ran);
        Ok(())
    }

    /// Make every required file of `variant` and the shared tokenizer files
    /// present locally.
    pub async fn acquire(&self, variant: ModelVariant) -> Result<()> {
        let variant_dir = self.context.variant_dir(variant);
        tokio::fs::create_dir_all(&variant_dir)
            .await
            .map_err(|e| DalaiError::io("creating model dir", &variant_dir, e))?;

        for file in variant.required_files() {
            let dest = variant_dir.join(&file);
            match self.context.weights_source() {
                WeightsSource::Local(dir) => {
                    let src = dir.join(variant.as_str()).join(&file);
                    // Only the shards are worth skipping; metadata is always refreshed.
                    let resumable =
                        file != PathsConfig::CHECKLIST_FILE && file != PathsConfig::PARAMS_FILE;
                    copy_weight_file(&src, &dest, resumable).await?;
                }
                WeightsSource::Remote(base) => {
                    if dest.exists() {
                        debug!("Skip download, file already exists: {}", dest.display());
                        continue;
                    }
                    let url = format!("{}/{}/{}", base.trim_end_matches('/'), variant, file);
                    self.fetcher.fetch(&url, &dest).await?;
                }
            }
        }

        self.acquire_tokenizer().await
    }

    async fn acquire_tokenizer(&self) -> Result<()> {
        let models_dir = self.context.models_dir();
        for file in PathsConfig::TOKENIZER_FILES {
            let dest = models_dir.join(file);
            if dest.exists() {
                debug!("Skip download, file already exists: {}", dest.display());
                continue;
            }
            let url = self.context.tokenizer_url(file);
            info!("Fetching {}", url);
            self.fetcher.fetch(&url, &dest).await?;
        }
        Ok(())
    }

    /// Run the conversion script on the variant directory.
    pub async fn convert(&self, variant: ModelVariant) -> Result<()> {
        let command = self.convert_command(variant);
        info!("Converting {} to f16", variant);
        self.runner
            .run_checked(&command, &mut PassthroughObserver)
            .await?;
        Ok(())
    }

    fn convert_command(&self, variant: ModelVariant) -> CommandSpec {
        CommandSpec::new(self.context.python(), self.context.engine_home())
            .arg(InstallConfig::CONVERT_SCRIPT)
            .arg(format!(
                "{}/{}/",
                PathsConfig::MODELS_DIR_NAME,
                variant.as_str()
            ))
            .arg(InstallConfig::CONVERT_FTYPE)
    }

    /// Quantize every shard whose outputs are not both present yet.
    ///
    /// Returns how many quantize runs were performed.
    pub async fn quantize(&self, variant: ModelVariant) -> Result<usize> {
        let variant_dir = self.context.variant_dir(variant);
        let mut ran = 0;

        for shard in 0..variant.shard_count() {
            let f16 = variant.f16_file(&variant_dir, shard);
            let q4 = variant.q4_file(&variant_dir, shard);

            if f16.exists() && q4.exists() {
                info!(
                    "Skip quantization, files already exist: {} and {}",
                    f16.display(),
                    q4.display()
                );
                continue;
            }
            if !f16.exists() {
                return Err(DalaiError::FileNotFound(f16));
            }

            debug!("Quantizing {} shard {}", variant, shard);
            let command = self.quantize_command(&f16, &q4);
            self.runner
                .run_checked(&command, &mut PassthroughObserver)
                .await?;
            ran += 1;
        }
        Ok(ran)
    }

    fn quantize_command(&self, f16: &Path, q4: &Path) -> CommandSpec {
        CommandSpec::new(self.context.quantize_binary(), self.context.engine_bin_dir())
            .arg(f16.as_os_str())
            .arg(q4.as_os_str())
            .arg(InstallConfig::QUANTIZE_TYPE)
    }
}

/// Copy `src` to `dest`.
///
/// With `resumable`, a destination of the same size that is not older than
/// the source is taken to be an earlier copy and left alone. This only lets
/// an interrupted run resume; it is not a content check.
async fn copy_weight_file(src: &Path, dest: &Path, resumable: bool) -> Result<()> {
    let src_meta = match tokio::fs::metadata(src).await {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(DalaiError::FileNotFound(src.to_path_buf()))
        }
        Err(e) => return Err(DalaiError::io("reading weight file", src, e)),
    };

    if resumable {
        if let Ok(dest_meta) = tokio::fs::metadata(dest).await {
            let fresh = match (dest_meta.modified(), src_meta.modified()) {
                (Ok(copied), Ok(source)) => copied >= source,
                _ => false,
            };
            if fresh && dest_meta.len() == src_meta.len() {
                debug!("Skip copy, file already present: {}", dest.display());
                return Ok(());
            }
        }
    }

    info!("Copying {} to {}", src.display(), dest.display());
    tokio::fs::copy(src, dest)
        .await
        .map_err(|e| DalaiError::io("copying weight file", PathBuf::from(dest), e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::Platform;
    use crate::process::fake::RecordingRunner;
    use std::sync::Mutex;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    /// Writes the URL into the destination instead of downloading.
    #[derive(Default)]
    struct EchoFetcher(Mutex<Vec<String>>);

    #[async_trait::async_trait]
    impl Fetcher for EchoFetcher {
        async fn fetch(&self, url: &str, destination: &Path) -> Result<u64> {
            self.0.lock().unwrap().push(url.to_string());
            std::fs::write(destination, url).unwrap();
            Ok(url.len() as u64)
        }
    }

    fn context(root: &Path) -> RunContext {
        RunContext::builder(root)
            .platform(Platform::Posix)
            .python("/venv/bin/python")
            .tokenizer_base_url("http://tok.local/LLaMA")
            .build()
            .unwrap()
    }

    #[test]
    fn test_convert_command() {
        let temp = TempDir::new().unwrap();
        let ctx = context(temp.path());
        let runner = RecordingRunner::new();
        let fetcher = EchoFetcher::default();
        let stager = ModelStager::new(&ctx, &runner, &fetcher);

        let cmd = stager.convert_command(ModelVariant::B13);
        assert_eq!(
            cmd.to_string(),
            "/venv/bin/python convert-pth-to-ggml.py models/13B/ 1"
        );
        assert_eq!(cmd.current_dir, ctx.engine_home());
    }

    #[test]
    fn test_quantize_command_runs_from_bin_dir() {
        let temp = TempDir::new().unwrap();
        let ctx = RunContext::builder(temp.path())
            .platform(Platform::Windows)
            .build()
            .unwrap();
        let runner = RecordingRunner::new();
        let fetcher = EchoFetcher::default();
        let stager = ModelStager::new(&ctx, &runner, &fetcher);

        let cmd = stager.quantize_command(Path::new("f16.bin.1"), Path::new("q4.bin.1"));
        assert_eq!(cmd.current_dir, ctx.build_dir().join("Release"));
        assert_eq!(cmd.args.last().unwrap(), "2");
    }

    #[tokio::test]
    async fn test_remote_acquire_fetches_missing_files_only() {
        let temp = TempDir::new().unwrap();
        let ctx = RunContext::builder(temp.path())
            .weights_source(WeightsSource::Remote("http://weights.local/LLaMA/".into()))
            .tokenizer_base_url("http://tok.local/LLaMA")
            .build()
            .unwrap();
        std::fs::create_dir_all(ctx.variant_dir(ModelVariant::B7)).unwrap();
        std::fs::write(ctx.variant_dir(ModelVariant::B7).join("checklist.chk"), "x").unwrap();

        let runner = RecordingRunner::new();
        let fetcher = EchoFetcher::default();
        ModelStager::new(&ctx, &runner, &fetcher)
            .acquire(ModelVariant::B7)
            .await
            .unwrap();

        let urls = fetcher.0.lock().unwrap().clone();
        assert_eq!(
            urls,
            vec![
                "http://weights.local/LLaMA/7B/params.json",
                "http://weights.local/LLaMA/7B/consolidated.00.pth",
                "http://tok.local/LLaMA/tokenizer_checklist.chk",
                "http://tok.local/LLaMA/tokenizer.model",
            ]
        );
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_local_source_is_file_not_found() {
        let temp = TempDir::new().unwrap();
        let ctx = context(temp.path());
        let runner = RecordingRunner::new();
        let fetcher = EchoFetcher::default();

        let err = ModelStager::new(&ctx, &runner, &fetcher)
            .acquire(ModelVariant::B7)
            .await
            .unwrap_err();
        match err {
            DalaiError::FileNotFound(path) => assert!(path.ends_with("weights/7B/checklist.chk")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    fn set_mtime(path: &Path, time: SystemTime) {
        std::fs::File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(time)
            .unwrap();
    }

    #[tokio::test]
    async fn test_resumable_copy_skips_earlier_copy() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src.pth");
        let dest = temp.path().join("dest.pth");
        let then = SystemTime::now() - Duration::from_secs(3600);
        std::fs::write(&src, "abcd").unwrap();
        std::fs::write(&dest, "wxyz").unwrap();
        set_mtime(&src, then);
        set_mtime(&dest, then + Duration::from_secs(60));

        copy_weight_file(&src, &dest, true).await.unwrap();
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "wxyz");

        // Different size.
        std::fs::write(&src, "abcdef").unwrap();
        copy_weight_file(&src, &dest, true).await.unwrap();
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "abcdef");
    }

    #[tokio::test]
    async fn test_resumable_copy_refreshes_newer_source_of_same_size() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src.pth");
        let dest = temp.path().join("dest.pth");
        let then = SystemTime::now() - Duration::from_secs(3600);
        std::fs::write(&dest, "wxyz").unwrap();
        std::fs::write(&src, "abcd").unwrap();
        set_mtime(&dest, then);
        set_mtime(&src, then + Duration::from_secs(60));

        copy_weight_file(&src, &dest, true).await.unwrap();
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "abcd");
    }

    #[tokio::test]
    async fn test_metadata_files_are_always_copied() {
        let temp = TempDir::new().unwrap();
        let ctx = context(temp.path());
        let weights = temp.path().join("weights").join("7B");
        std::fs::create_dir_all(&weights).unwrap();
        std::fs::write(weights.join("checklist.chk"), "new-sums").unwrap();
        std::fs::write(weights.join("params.json"), "{\"dim\": 2}").unwrap();
        std::fs::write(weights.join("consolidated.00.pth"), "weights").unwrap();

        // Same sizes as the sources, written later.
        let dir = ctx.variant_dir(ModelVariant::B7);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("checklist.chk"), "old-sums").unwrap();
        std::fs::write(dir.join("params.json"), "{\"dim\": 1}").unwrap();
        std::fs::write(dir.join("consolidated.00.pth"), "partial").unwrap();

        let runner = RecordingRunner::new();
        let fetcher = EchoFetcher::default();
        ModelStager::new(&ctx, &runner, &fetcher)
            .acquire(ModelVariant::B7)
            .await
            .unwrap();

        assert_eq!(std::fs::read_to_string(dir.join("checklist.chk")).unwrap(), "new-sums");
        assert_eq!(std::fs::read_to_string(dir.join("params.json")).unwrap(), "{\"dim\": 2}");
        assert_eq!(
            std::fs::read_to_string(dir.join("consolidated.00.pth")).unwrap(),
            "partial"
        );
    }

    #[tokio::test]
    async fn test_quantize_requires_f16_input() {
        let temp = TempDir::new().unwrap();
        let ctx = context(temp.path());
        let runner = RecordingRunner::new();
        let fetcher = EchoFetcher::default();

        let err = ModelStager::new(&ctx, &runner, &fetcher)
            .quantize(ModelVariant::B7)
            .await
            .unwrap_err();
        assert!(matches!(err, DalaiError::FileNotFound(_)));
        assert!(runner.calls().is_empty());
    }
}
