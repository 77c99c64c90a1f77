//! Configuration
//!
//! [`Concurrency`] is the validated pool limit. [`RunnerConfig`] holds the
//! defaults a [`Runner`](crate::Runner) falls back to.
//!
//! ## Priority Order (highest to lowest)
//!
//! 1. Environment variable (`TASKLINE_CONCURRENCY`)
//! 2. Config file (TOML, loaded explicitly with [`RunnerConfig::load`])
//! 3. Defaults (host parallelism)

use std::fmt;
use std::fs;
use std::num::NonZeroUsize;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{FlowError, Result};

/// Environment variable overriding the default pool concurrency
pub const CONCURRENCY_ENV: &str = "TASKLINE_CONCURRENCY";

/// Maximum number of tasks a pool keeps in flight. Always at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Concurrency(NonZeroUsize);

impl Concurrency {
    /// One task at a time
    pub const SERIAL: Concurrency = Concurrency(NonZeroUsize::MIN);

    /// Validate a signed limit; 0 and negatives are rejected, never clamped
    pub fn new(value: i64) -> Result<Self> {
        usize::try_from(value)
            .ok()
            .and_then(NonZeroUsize::new)
            .map(Concurrency)
            .ok_or(FlowError::InvalidConcurrency { value })
    }

    /// Number of threads the host can run in parallel, or 1 if unknown
    pub fn available() -> Self {
        std::thread::available_parallelism()
            .map(Concurrency)
            .unwrap_or(Self::SERIAL)
    }

    pub fn get(self) -> usize {
        self.0.get()
    }
}

impl Default for Concurrency {
    fn default() -> Self {
        Self::available()
    }
}

impl fmt::Display for Concurrency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<NonZeroUsize> for Concurrency {
    fn from(value: NonZeroUsize) -> Self {
        Concurrency(value)
    }
}

macro_rules! concurrency_from_signed {
    ($($ty:ty),*) => {$(
        impl TryFrom<$ty> for Concurrency {
            type Error = FlowError;

            fn try_from(value: $ty) -> Result<Self> {
                Concurrency::new(i64::try_from(value).unwrap_or(i64::MAX))
            }
        }
    )*};
}

macro_rules! concurrency_from_unsigned {
    ($($ty:ty),*) => {$(
        impl TryFrom<$ty> for Concurrency {
            type Error = FlowError;

            fn try_from(value: $ty) -> Result<Self> {
                // Above usize::MAX the limit can never bind anyway
                let value = usize::try_from(value).unwrap_or(usize::MAX);
                NonZeroUsize::new(value)
                    .map(Concurrency)
                    .ok_or(FlowError::InvalidConcurrency { value: 0 })
            }
        }
    )*};
}

concurrency_from_signed!(i8, i16, i32, i64, isize);
concurrency_from_unsigned!(u8, u16, u32, u64, usize);

impl Serialize for Concurrency {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.get() as u64)
    }
}

impl<'de> Deserialize<'de> for Concurrency {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = i64::deserialize(deserializer)?;
        Concurrency::new(value).map_err(serde::de::Error::custom)
    }
}

/// Runner defaults
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Concurrency used by `Runner::pool_default`
    #[serde(default)]
    pub concurrency: Concurrency,
}

impl RunnerConfig {
    pub fn new(concurrency: Concurrency) -> Self {
        Self { concurrency }
    }

    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| FlowError::ConfigError {
            reason: format!("Failed to parse config: {}", e),
        })
    }

    /// Load configuration from a TOML file
    ///
    /// Returns default config if file doesn't exist.
    /// Returns error if file exists but is malformed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| FlowError::ConfigError {
            reason: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        Self::from_toml_str(&content)
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| FlowError::ConfigError {
            reason: format!("Failed to serialize config: {}", e),
        })
    }

    /// Merge with environment variables
    ///
    /// Environment variables take precedence over config file values.
    pub fn with_env(self) -> Result<Self> {
        self.with_env_value(std::env::var(CONCURRENCY_ENV).ok().as_deref())
    }

    fn with_env_value(mut self, value: Option<&str>) -> Result<Self> {
        let Some(raw) = value else {
            return Ok(self);
        };

        let invalid = || FlowError::InvalidEnvVar {
            var: CONCURRENCY_ENV.to_string(),
            value: raw.to_string(),
        };
        let parsed: i64 = raw.trim().parse().map_err(|_| invalid())?;
        self.concurrency = Concurrency::new(parsed).map_err(|_| invalid())?;
        Ok(self)
    }
}
