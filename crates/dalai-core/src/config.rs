//! Centralized configuration for the dalai installer.
//!
//! Constants for the engine checkout, the external tool invocations and
//! network transfers. Per-run values live in [`crate::context::RunContext`].

use std::time::Duration;

/// Engine checkout and external tool configuration.
pub struct InstallConfig;

impl InstallConfig {
    /// Default llama.cpp fork cloned into the engine home.
    pub const ENGINE_REPO: &'static str = "https://github.com/candywrap/llama.cpp.git";
    /// Directory name of the engine checkout under the root.
    pub const ENGINE_DIR_NAME: &'static str = "llama";
    /// Default root directory name under the user's home.
    pub const ROOT_DIR_NAME: &'static str = "dalai";

    /// Conversion script shipped with the engine checkout.
    pub const CONVERT_SCRIPT: &'static str = "convert-pth-to-ggml.py";
    /// `ftype` argument for the conversion script (1 = f16 output).
    pub const CONVERT_FTYPE: &'static str = "1";
    /// Quantize executable name (without platform suffix).
    pub const QUANTIZE_BINARY: &'static str = "quantize";
    /// Quantization type argument for the quantize tool (2 = q4_0).
    pub const QUANTIZE_TYPE: &'static str = "2";

    /// Default idle-prompt marker printed by an interactive PowerShell session.
    pub const IDLE_PROMPT_PATTERN: &'static str = r"^PS .*";
    /// Number of idle prompts seen before the wrapped tool is stopped.
    pub const IDLE_PROMPT_COUNT: usize = 2;
}

/// Network-related configuration.
pub struct NetworkConfig;

impl NetworkConfig {
    /// Host serving the shared tokenizer files.
    pub const TOKENIZER_BASE_URL: &'static str = "https://agi.gpt4.org/llama/LLaMA";
    /// User agent sent with every weight download.
    pub const USER_AGENT: &'static str = "Mozilla/5.0";
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
    pub const DOWNLOAD_TEMP_SUFFIX: &'static str = ".part";
    pub const DOWNLOAD_PROGRESS_INTERVAL: Duration = Duration::from_secs(5);
}

/// File names of the model layout.
pub struct PathsConfig;

impl PathsConfig {
    pub const MODELS_DIR_NAME: &'static str = "models";
    pub const BUILD_DIR_NAME: &'static str = "build";
    pub const RELEASE_DIR_NAME: &'static str = "Release";
    pub const VENV_DIR_NAME: &'static str = "venv";
    pub const CMAKE_CACHE_FILE: &'static str = "CMakeCache.txt";

    pub const CHECKLIST_FILE: &'static str = "checklist.chk";
    pub const PARAMS_FILE: &'static str = "params.json";
    pub const TOKENIZER_CHECKLIST_FILE: &'static str = "tokenizer_checklist.chk";
    pub const TOKENIZER_MODEL_FILE: &'static str = "tokenizer.model";

    pub const F16_WEIGHTS_FILE: &'static str = "ggml-model-f16.bin";
    pub const Q4_WEIGHTS_FILE: &'static str = "ggml-model-q4_0.bin";

    /// Shared tokenizer files fetched once into the models directory.
    pub const TOKENIZER_FILES: [&'static str; 2] =
        [Self::TOKENIZER_CHECKLIST_FILE, Self::TOKENIZER_MODEL_FILE];
}
