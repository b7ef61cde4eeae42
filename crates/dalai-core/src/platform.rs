//! Platform discriminator and the path conventions that depend on it.
//!
//! The platform is detected at compile time but carried as a value so a run
//! context can be built for either convention (and tests can exercise both).

use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::PathsConfig;

/// Operating-system family that selects path conventions and build strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    /// cmake from the Python venv, binaries under `build/Release`.
    Windows,
    /// Linux and macOS: `make` in the engine home.
    Posix,
}

impl Platform {
    /// Platform this binary was compiled for.
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Posix
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Windows => "windows",
            Platform::Posix => "posix",
        }
    }

    /// Directory holding executables inside a virtual environment.
    ///
    /// # Platform Behavior
    /// - **Windows**: `{venv}/Scripts`
    /// - **Posix**: `{venv}/bin`
    pub fn venv_bin_dir(&self, venv: &Path) -> PathBuf {
        match self {
            Platform::Windows => venv.join("Scripts"),
            Platform::Posix => venv.join("bin"),
        }
    }

    /// Python interpreter of the virtual environment under `root`.
    pub fn venv_python(&self, root: &Path) -> PathBuf {
        let bin = self.venv_bin_dir(&root.join(PathsConfig::VENV_DIR_NAME));
        bin.join(self.executable_name("python"))
    }

    /// Append the platform executable suffix.
    pub fn executable_name(&self, name: &str) -> String {
        match self {
            Platform::Windows => format!("{name}.exe"),
            Platform::Posix => name.to_string(),
        }
    }

    /// Directory the engine build drops its tools into.
    ///
    /// # Platform Behavior
    /// - **Windows**: `{engine}/build/Release`
    /// - **Posix**: `{engine}`
    pub fn engine_bin_dir(&self, engine_home: &Path) -> PathBuf {
        match self {
            Platform::Windows => engine_home
                .join(PathsConfig::BUILD_DIR_NAME)
                .join(PathsConfig::RELEASE_DIR_NAME),
            Platform::Posix => engine_home.to_path_buf(),
        }
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::current()
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_matches_cfg() {
        #[cfg(windows)]
        assert_eq!(Platform::current(), Platform::Windows);
        #[cfg(unix)]
        assert_eq!(Platform::current(), Platform::Posix);
    }

    #[test]
    fn test_venv_python() {
        let root = Path::new("/home/me/dalai");
        assert_eq!(
            Platform::Posix.venv_python(root),
            PathBuf::from("/home/me/dalai/venv/bin/python")
        );
        assert_eq!(
            Platform::Windows.venv_python(root),
            PathBuf::from("/home/me/dalai/venv/Scripts/python.exe")
        );
    }

    #[test]
    fn test_engine_bin_dir() {
        let engine = Path::new("/home/me/dalai/llama");
        assert_eq!(Platform::Posix.engine_bin_dir(engine), engine);
        assert_eq!(
            Platform::Windows.engine_bin_dir(engine),
            PathBuf::from("/home/me/dalai/llama/build/Release")
        );
    }
}
