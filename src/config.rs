//! Engine configuration and the optional settings file.
//!
//! Settings are read from `$BF_CONFIG` when set, otherwise from `bfvm.toml` in
//! the XDG config home. A missing file is not an error; every field is
//! optional and falls back to the defaults of [`MachineConfig`].

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use cross_xdg::BaseDirs;
use serde::Deserialize;

use crate::channels::EofPolicy;
use crate::tape::{DEFAULT_MEMORY_SIZE, Modulus, PointerMode};

/// Environment variable naming an explicit settings file.
pub const CONFIG_ENV: &str = "BF_CONFIG";

/// File name looked up in the XDG config home.
pub const CONFIG_FILE_NAME: &str = "bfvm.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("memory size must be at least 1 cell")]
    ZeroMemory,
}

/// Options fixed for the lifetime of one engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachineConfig {
    /// Number of cells on the tape.
    pub memory_size: usize,
    /// Cell wraparound width; `None` wraps at the `i64` boundary.
    pub modulus: Option<Modulus>,
    /// Flush the output after every `.`; otherwise only when the run ends.
    pub flush_on_write: bool,
    pub eof: EofPolicy,
    pub pointer: PointerMode,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            memory_size: DEFAULT_MEMORY_SIZE,
            modulus: None,
            flush_on_write: true,
            eof: EofPolicy::Fault,
            pointer: PointerMode::Alias,
        }
    }
}

impl MachineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.memory_size == 0 {
            return Err(ConfigError::ZeroMemory);
        }
        Ok(())
    }

    pub fn with_memory_size(mut self, memory_size: usize) -> Self {
        self.memory_size = memory_size;
        self
    }

    pub fn with_modulus(mut self, modulus: Option<Modulus>) -> Self {
        self.modulus = modulus;
        self
    }

    pub fn with_flush_on_write(mut self, flush_on_write: bool) -> Self {
        self.flush_on_write = flush_on_write;
        self
    }

    pub fn with_eof(mut self, eof: EofPolicy) -> Self {
        self.eof = eof;
        self
    }

    pub fn with_pointer(mut self, pointer: PointerMode) -> Self {
        self.pointer = pointer;
        self
    }
}

/// `[machine]` table of the settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MachineSection {
    pub memory_size: Option<usize>,
    pub modulus: Option<Modulus>,
    pub flush_on_write: Option<bool>,
    pub eof: Option<EofPolicy>,
    pub pointer: Option<PointerMode>,
}

/// `[limits]` table of the settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LimitsSection {
    pub max_steps: Option<u64>,
    pub timeout_ms: Option<u64>,
}

/// Contents of the settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default)]
    pub machine: MachineSection,
    #[serde(default)]
    pub limits: LimitsSection,
}

impl Settings {
    /// Parse settings from TOML text; `path` is only used in errors.
    pub fn from_toml(text: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load from an explicit path. The file must exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_toml(&text, path)?;
        log::debug!("loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Load from `$BF_CONFIG` or the XDG config home, whichever applies.
    ///
    /// `$BF_CONFIG` must point at an existing file; the XDG file is optional.
    pub fn load() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os(CONFIG_ENV) {
            return Self::load_from(Path::new(&path));
        }
        match default_path() {
            Some(path) if path.is_file() => Self::load_from(&path),
            _ => {
                log::debug!("no settings file found; using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Apply the `[machine]` table on top of `base`.
    pub fn machine_config(&self, base: MachineConfig) -> MachineConfig {
        let m = &self.machine;
        MachineConfig {
            memory_size: m.memory_size.unwrap_or(base.memory_size),
            modulus: m.modulus.or(base.modulus),
            flush_on_write: m.flush_on_write.unwrap_or(base.flush_on_write),
            eof: m.eof.unwrap_or(base.eof),
            pointer: m.pointer.unwrap_or(base.pointer),
        }
    }
}

/// `<config home>/bfvm.toml`, if the config home can be determined.
pub fn default_path() -> Option<PathBuf> {
    // On Linux: resolves to /home/<user>/.config
    // On Windows: resolves to C:\Users\<user>\.config
    // On macOS: resolves to /Users/<user>/.config
    let base_dirs = BaseDirs::new().ok()?;
    let mut path = PathBuf::from(base_dirs.config_home());
    path.push(CONFIG_FILE_NAME);
    Some(path)
}
