//! Run context: where everything lives for one installer invocation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::{InstallConfig, NetworkConfig, PathsConfig};
use crate::model::ModelVariant;
use crate::platform::Platform;
use crate::{DalaiError, Result};

/// Where per-variant weight files come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WeightsSource {
    /// Directory containing one sub-directory per variant (`{dir}/7B/...`).
    Local(PathBuf),
    /// Base URL serving `{url}/7B/...`.
    Remote(String),
}

/// Paths and settings shared by the builder and the stager.
#[derive(Debug, Clone)]
pub struct RunContext {
    root: PathBuf,
    engine_home: PathBuf,
    platform: Platform,
    weights: WeightsSource,
    tokenizer_base_url: String,
    python: PathBuf,
    engine_repo: String,
    process_timeout: Option<Duration>,
}

impl RunContext {
    pub fn builder(root: impl Into<PathBuf>) -> RunContextBuilder {
        RunContextBuilder::new(root)
    }

    /// `~/dalai`
    pub fn default_root() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| DalaiError::Config {
            message: "Could not determine home directory".to_string(),
        })?;
        Ok(home.join(InstallConfig::ROOT_DIR_NAME))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The engine checkout, `{root}/llama`.
    pub fn engine_home(&self) -> &Path {
        &self.engine_home
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn weights_source(&self) -> &WeightsSource {
        &self.weights
    }

    pub fn engine_repo(&self) -> &str {
        &self.engine_repo
    }

    pub fn process_timeout(&self) -> Option<Duration> {
        self.process_timeout
    }

    /// Python interpreter that runs the conversion script.
    pub fn python(&self) -> &Path {
        &self.python
    }

    pub fn models_dir(&self) -> PathBuf {
        self.engine_home.join(PathsConfig::MODELS_DIR_NAME)
    }

    pub fn variant_dir(&self, variant: ModelVariant) -> PathBuf {
        self.models_dir().join(variant.as_str())
    }

    pub fn build_dir(&self) -> PathBuf {
        self.engine_home.join(PathsConfig::BUILD_DIR_NAME)
    }

    /// cmake installed into the root venv (Windows build).
    pub fn venv_cmake(&self) -> PathBuf {
        let venv = self.root.join(PathsConfig::VENV_DIR_NAME);
        self.platform
            .venv_bin_dir(&venv)
            .join(self.platform.executable_name("cmake"))
    }

    /// Directory the quantize tool is run from.
    pub fn engine_bin_dir(&self) -> PathBuf {
        self.platform.engine_bin_dir(&self.engine_home)
    }

    pub fn quantize_binary(&self) -> PathBuf {
        self.engine_bin_dir()
            .join(self.platform.executable_name(InstallConfig::QUANTIZE_BINARY))
    }

    /// URL of a shared tokenizer file.
    pub fn tokenizer_url(&self, file: &str) -> String {
        format!("{}/{}", self.tokenizer_base_url.trim_end_matches('/'), file)
    }
}

/// Builder for [`RunContext`].
///
/// ```rust,ignore
/// let ctx = RunContext::builder("/home/me/dalai")
///     .weights_source(WeightsSource::Local("/data/LLaMA".into()))
///     .process_timeout(Some(Duration::from_secs(3600)))
///     .build()?;
/// ```
#[derive(Debug, Clone)]
pub struct RunContextBuilder {
    root: PathBuf,
    platform: Platform,
    weights: Option<WeightsSource>,
    tokenizer_base_url: String,
    python: Option<PathBuf>,
    engine_repo: String,
    process_timeout: Option<Duration>,
}

impl RunContextBuilder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            platform: Platform::current(),
            weights: None,
            tokenizer_base_url: NetworkConfig::TOKENIZER_BASE_URL.to_string(),
            python: None,
            engine_repo: InstallConfig::ENGINE_REPO.to_string(),
            process_timeout: None,
        }
    }

    /// Override the detected platform conventions.
    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Default: `Local({root}/weights)`.
    pub fn weights_source(mut self, source: WeightsSource) -> Self {
        self.weights = Some(source);
        self
    }

    pub fn tokenizer_base_url(mut self, url: impl Into<String>) -> Self {
        self.tokenizer_base_url = url.into();
        self
    }

    /// Default: the interpreter of `{root}/venv`.
    pub fn python(mut self, python: impl Into<PathBuf>) -> Self {
        self.python = Some(python.into());
        self
    }

    pub fn engine_repo(mut self, repo: impl Into<String>) -> Self {
        self.engine_repo = repo.into();
        self
    }

    /// Kill any external command that runs longer than this. Default: none.
    pub fn process_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.process_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<RunContext> {
        if self.root.as_os_str().is_empty() {
            return Err(DalaiError::Config {
                message: "root directory must not be empty".to_string(),
            });
        }
        if let Some(WeightsSource::Remote(url)) = &self.weights {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(DalaiError::Config {
                    message: format!("weights URL must be http(s): {url}"),
                });
            }
        }

        // Commands run from directories below the root, so every derived path
        // has to be absolute.
        let root = std::path::absolute(&self.root)
            .map_err(|e| DalaiError::io("resolving root dir", &self.root, e))?;
        let engine_home = root.join(InstallConfig::ENGINE_DIR_NAME);
        let weights = self
            .weights
            .unwrap_or_else(|| WeightsSource::Local(root.join("weights")));
        let python = match self.python {
            Some(python) => resolve_program(python)?,
            None => self.platform.venv_python(&root),
        };

        Ok(RunContext {
            root,
            engine_home,
            platform: self.platform,
            weights,
            tokenizer_base_url: self.tokenizer_base_url,
            python,
            engine_repo: self.engine_repo,
            process_timeout: self.process_timeout,
        })
    }
}

/// Absolutize a program given as a relative path; bare names are left for
/// `PATH` lookup.
fn resolve_program(program: PathBuf) -> Result<PathBuf> {
    if program.is_absolute() || program.components().count() < 2 {
        return Ok(program);
    }
    std::path::absolute(&program)
        .map_err(|e| DalaiError::io("resolving program path", &program, e))
}
