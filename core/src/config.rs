use std::{env, fs, path::Path, str::FromStr};

use log::debug;
use serde::{Deserialize, Serialize};
use solana_program::rent::{Rent, ACCOUNT_STORAGE_OVERHEAD};
use solana_program::system_instruction::MAX_PERMITTED_DATA_LENGTH;

pub const DEFAULT_LAMPORTS_PER_SIGNATURE: u64 = 5_000;
pub const DEFAULT_LOG_MESSAGES_BYTES_LIMIT: usize = 100 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file error {0:?}")]
    Io(#[from] std::io::Error),
    #[error("Config parse error {0:?}")]
    Json(#[from] serde_json::Error),
    #[error("Rent parameters overflow for the largest permitted account")]
    InvalidRent,
    #[error("{name} variable must be a valid {expected}, got {value:?}")]
    InvalidVariable {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SimulatorConfig {
    pub lamports_per_signature: u64,
    pub rent: Rent,
    /// When disabled every required signer counts as verified.
    pub sig_verify: bool,
    pub log_messages_bytes_limit: Option<usize>,
    pub blockhash_seed: String,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            lamports_per_signature: DEFAULT_LAMPORTS_PER_SIGNATURE,
            rent: Rent::default(),
            sig_verify: true,
            log_messages_bytes_limit: Some(DEFAULT_LOG_MESSAGES_BYTES_LIMIT),
            blockhash_seed: "genesis".to_string(),
        }
    }
}

impl SimulatorConfig {
    /// Reads a JSON config file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        debug!("loaded simulator config from {}", path.as_ref().display());
        Ok(config)
    }

    /// Rejects rent parameters whose exemption minimum overflows for an
    /// account of the largest permitted size.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let overflows = ACCOUNT_STORAGE_OVERHEAD
            .saturating_add(MAX_PERMITTED_DATA_LENGTH)
            .checked_mul(self.rent.lamports_per_byte_year)
            .is_none();
        if overflows || !self.rent.exemption_threshold.is_finite() || self.rent.exemption_threshold < 0.0 {
            return Err(ConfigError::InvalidRent);
        }
        Ok(())
    }

    /// Applies `POCKET_SVM_*` environment overrides on top of `self`.
    pub fn with_environment(self) -> Result<Self, ConfigError> {
        self.with_overrides(|name| env::var(name).ok())
    }

    fn with_overrides(
        mut self,
        lookup: impl Fn(&'static str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(value) = lookup("POCKET_SVM_LAMPORTS_PER_SIGNATURE") {
            self.lamports_per_signature =
                parse_variable("POCKET_SVM_LAMPORTS_PER_SIGNATURE", "number", value)?;
        }

        if let Some(value) = lookup("POCKET_SVM_SIG_VERIFY") {
            self.sig_verify = parse_variable("POCKET_SVM_SIG_VERIFY", "boolean", value)?;
        }

        if let Some(value) = lookup("POCKET_SVM_LOG_BYTES_LIMIT") {
            self.log_messages_bytes_limit = if value.eq_ignore_ascii_case("none") {
                None
            } else {
                Some(parse_variable("POCKET_SVM_LOG_BYTES_LIMIT", "number", value)?)
            };
        }

        Ok(self)
    }
}

fn parse_variable<T: FromStr>(
    name: &'static str,
    expected: &'static str,
    value: String,
) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidVariable {
            name,
            expected,
            value,
        })
}
