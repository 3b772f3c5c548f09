//! # Service Configuration
//!
//! Layered configuration: built-in defaults, then an optional TOML document,
//! then `CONTRACT_ENGINE_*` environment variables.
//!
//! ```toml
//! default_gas_limit = 1000000
//! max_gas_limit = 30000000
//! enable_tracing = false
//!
//! [vm]
//! max_stack_size = 1024
//! max_memory_size = 16777216
//! max_code_size = 24576
//! max_call_depth = 1024
//! ```

use crate::domain::entities::VmConfig;
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::env;

/// Cap on the gas limit a single request may ask for.
pub const ENV_MAX_GAS_LIMIT: &str = "CONTRACT_ENGINE_MAX_GAS_LIMIT";
/// Gas limit used when a request leaves it unspecified.
pub const ENV_DEFAULT_GAS_LIMIT: &str = "CONTRACT_ENGINE_DEFAULT_GAS_LIMIT";
/// Per-execution debug summaries (`true`/`1`).
pub const ENV_TRACING: &str = "CONTRACT_ENGINE_TRACING";

/// Contract service configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Interpreter resource limits.
    pub vm: VmConfig,
    /// Gas limit applied when the caller supplies none.
    pub default_gas_limit: u64,
    /// Largest gas limit the service accepts.
    pub max_gas_limit: u64,
    /// Emit a debug summary for every execution.
    pub enable_tracing: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            vm: VmConfig::default(),
            default_gas_limit: 1_000_000,
            max_gas_limit: 30_000_000,
            enable_tracing: false,
        }
    }
}

impl ServiceConfig {
    /// Parses a TOML document. Missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// `Parse` for malformed TOML, `Inconsistent` if the result fails
    /// [`ServiceConfig::validate`].
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by the process environment.
    ///
    /// # Errors
    ///
    /// `InvalidEnv` for an unparsable variable, `Inconsistent` if the
    /// resulting limits disagree.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_overrides(|key| env::var(key).ok())
    }

    /// Applies `CONTRACT_ENGINE_*` overrides read through `lookup`.
    ///
    /// # Errors
    ///
    /// Same as [`ServiceConfig::from_env`].
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_MAX_GAS_LIMIT) {
            self.max_gas_limit = parse_u64(ENV_MAX_GAS_LIMIT, &value)?;
        }
        if let Some(value) = lookup(ENV_DEFAULT_GAS_LIMIT) {
            self.default_gas_limit = parse_u64(ENV_DEFAULT_GAS_LIMIT, &value)?;
        }
        if let Some(value) = lookup(ENV_TRACING) {
            self.enable_tracing = parse_bool(ENV_TRACING, &value)?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Checks that the limits agree with each other.
    ///
    /// # Errors
    ///
    /// `Inconsistent` when the default gas limit is above the cap, the cap is
    /// zero, or a VM bound is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_gas_limit == 0 {
            return Err(ConfigError::Inconsistent(
                "max_gas_limit must be positive".into(),
            ));
        }
        if self.default_gas_limit > self.max_gas_limit {
            return Err(ConfigError::Inconsistent(format!(
                "default_gas_limit {} exceeds max_gas_limit {}",
                self.default_gas_limit, self.max_gas_limit
            )));
        }
        if self.vm.max_stack_size == 0 || self.vm.max_code_size == 0 {
            return Err(ConfigError::Inconsistent(
                "vm limits must be positive".into(),
            ));
        }
        Ok(())
    }
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .replace('_', "")
        .parse()
        .map_err(|_| invalid(key, value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" | "" => Ok(false),
        _ => Err(invalid(key, value)),
    }
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnv {
        key: key.to_string(),
        value: value.to_string(),
    }
}

// =============================================================================
// TESTS
// =============================================================================
