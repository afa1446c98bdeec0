//! Scan settings persisted as JSON between runs.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use alloy::primitives::Address;
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::{
    DEFAULT_BATCH_SPAN, DEFAULT_MAX_CONCURRENT_DECODES, DEFAULT_POLL_INTERVAL, ScanRange, TailMode,
    robust_provider::{DEFAULT_CALL_TIMEOUT, DEFAULT_MAX_RETRIES, DEFAULT_MIN_DELAY},
};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot access {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("invalid JSON in {path}: {source}")]
    Json { path: PathBuf, source: serde_json::Error },
    #[error("`{0}` is required for this scan")]
    MissingField(&'static str),
    #[error("a block range is only defined in history mode")]
    NotHistoryMode,
}

/// Where the contract interface comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum AbiSource {
    File { path: PathBuf },
    Inline { abi: Value },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanMode {
    #[default]
    Live,
    History,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryType {
    #[default]
    Time,
    Block,
}

/// Retry policy handed to [`RobustProviderBuilder`](crate::robust_provider::RobustProviderBuilder).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub call_timeout_secs: u64,
    pub max_retries: usize,
    pub min_delay_ms: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            call_timeout_secs: DEFAULT_CALL_TIMEOUT.as_secs(),
            max_retries: DEFAULT_MAX_RETRIES,
            min_delay_ms: u64::try_from(DEFAULT_MIN_DELAY.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

impl ProviderSettings {
    #[must_use]
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    #[must_use]
    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    pub contract_address: Address,
    pub event_name: String,
    pub rpc_url: String,
    /// Tried in order when `rpc_url` fails.
    #[serde(default)]
    pub fallback_rpc_urls: Vec<String>,
    pub abi: AbiSource,
    #[serde(default)]
    pub mode: ScanMode,
    #[serde(default)]
    pub history_type: HistoryType,
    /// Midnight UTC of this day.
    #[serde(default)]
    pub start_time: Option<NaiveDate>,
    /// Midnight UTC of this day; absent means now.
    #[serde(default)]
    pub end_time: Option<NaiveDate>,
    #[serde(default)]
    pub start_block: Option<u64>,
    /// Absent means the chain head.
    #[serde(default)]
    pub end_block: Option<u64>,
    #[serde(default = "default_batch_span")]
    pub batch_span: u64,
    #[serde(default = "default_max_concurrent_decodes")]
    pub max_concurrent_decodes: usize,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub tail_mode: TailMode,
    #[serde(default)]
    pub provider: ProviderSettings,
}

fn default_batch_span() -> u64 {
    DEFAULT_BATCH_SPAN
}

fn default_max_concurrent_decodes() -> usize {
    DEFAULT_MAX_CONCURRENT_DECODES
}

fn default_poll_interval_ms() -> u64 {
    u64::try_from(DEFAULT_POLL_INTERVAL.as_millis()).unwrap_or(u64::MAX)
}

impl ScanConfig {
    /// A live-mode configuration with every optional setting at its default.
    #[must_use]
    pub fn new(
        contract_address: Address,
        event_name: impl Into<String>,
        rpc_url: impl Into<String>,
        abi: AbiSource,
    ) -> Self {
        Self {
            contract_address,
            event_name: event_name.into(),
            rpc_url: rpc_url.into(),
            fallback_rpc_urls: Vec::new(),
            abi,
            mode: ScanMode::default(),
            history_type: HistoryType::default(),
            start_time: None,
            end_time: None,
            start_block: None,
            end_block: None,
            batch_span: DEFAULT_BATCH_SPAN,
            max_concurrent_decodes: DEFAULT_MAX_CONCURRENT_DECODES,
            poll_interval_ms: default_poll_interval_ms(),
            tail_mode: TailMode::default(),
            provider: ProviderSettings::default(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_owned(), source })?;
        let config = serde_json::from_str(&text)
            .map_err(|source| ConfigError::Json { path: path.to_owned(), source })?;
        debug!(path = %path.display(), "Loaded scan configuration");
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let text = serde_json::to_string_pretty(self)
            .map_err(|source| ConfigError::Json { path: path.to_owned(), source })?;
        fs::write(path, text).map_err(|source| ConfigError::Io { path: path.to_owned(), source })?;
        debug!(path = %path.display(), "Saved scan configuration");
        Ok(())
    }

    /// The JSON interface array, read from disk for [`AbiSource::File`].
    pub fn interface(&self) -> Result<Value, ConfigError> {
        match &self.abi {
            AbiSource::Inline { abi } => Ok(abi.clone()),
            AbiSource::File { path } => {
                let text = fs::read_to_string(path)
                    .map_err(|source| ConfigError::Io { path: path.clone(), source })?;
                serde_json::from_str(&text)
                    .map_err(|source| ConfigError::Json { path: path.clone(), source })
            }
        }
    }

    /// The historical range described by the start/end fields of the active history type.
    pub fn scan_range(&self) -> Result<ScanRange, ConfigError> {
        if self.mode != ScanMode::History {
            return Err(ConfigError::NotHistoryMode);
        }

        match self.history_type {
            HistoryType::Block => {
                let start = self.start_block.ok_or(ConfigError::MissingField("start_block"))?;
                Ok(ScanRange::blocks(start, self.end_block))
            }
            HistoryType::Time => {
                let start = self.start_time.ok_or(ConfigError::MissingField("start_time"))?;
                let midnight = |day: NaiveDate| day.and_time(NaiveTime::MIN).and_utc();
                Ok(ScanRange::time(midnight(start), self.end_time.map(midnight)))
            }
        }
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::address;
    use chrono::{DateTime, Utc};
    use serde_json::json;

    use super::*;

    const TOKEN: Address = address!("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");

    #[test]
    fn minimal_file_gets_defaults() -> anyhow::Result<()> {
        let config: ScanConfig = serde_json::from_value(json!({
            "contract_address": "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48",
            "event_name": "Transfer",
            "rpc_url": "http://localhost:8545",
            "abi": {"source": "file", "path": "erc20.json"}
        }))?;

        let abi = AbiSource::File { path: "erc20.json".into() };
        assert_eq!(config, ScanConfig::new(TOKEN, "Transfer", "http://localhost:8545", abi));
        assert_eq!(config.poll_interval(), DEFAULT_POLL_INTERVAL);
        assert_eq!(config.provider.call_timeout(), DEFAULT_CALL_TIMEOUT);

        Ok(())
    }

    #[test]
    fn save_then_load_preserves_settings() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("scan.json");

        let mut config =
            ScanConfig::new(TOKEN, "Approval", "http://node", AbiSource::Inline { abi: json!([]) });
        config.mode = ScanMode::History;
        config.history_type = HistoryType::Block;
        config.start_block = Some(100);
        config.tail_mode = TailMode::Contiguous;

        config.save(&path)?;
        assert_eq!(ScanConfig::load(&path)?, config);

        Ok(())
    }

    #[test]
    fn block_history_range() -> anyhow::Result<()> {
        let mut config =
            ScanConfig::new(TOKEN, "Transfer", "http://node", AbiSource::Inline { abi: json!([]) });
        config.mode = ScanMode::History;
        config.history_type = HistoryType::Block;

        assert!(matches!(config.scan_range(), Err(ConfigError::MissingField("start_block"))));

        config.start_block = Some(10);
        assert_eq!(config.scan_range()?, ScanRange::blocks(10, None));

        Ok(())
    }

    #[test]
    fn time_history_range_uses_utc_midnight() -> anyhow::Result<()> {
        let mut config =
            ScanConfig::new(TOKEN, "Transfer", "http://node", AbiSource::Inline { abi: json!([]) });
        config.mode = ScanMode::History;
        config.start_time = NaiveDate::from_ymd_opt(2024, 3, 1);
        config.end_time = NaiveDate::from_ymd_opt(2024, 3, 2);

        let expected_start: DateTime<Utc> = "2024-03-01T00:00:00Z".parse()?;
        let expected_end: DateTime<Utc> = "2024-03-02T00:00:00Z".parse()?;
        assert_eq!(config.scan_range()?, ScanRange::time(expected_start, Some(expected_end)));

        Ok(())
    }

    #[test]
    fn live_mode_has_no_range() {
        let config =
            ScanConfig::new(TOKEN, "Transfer", "http://node", AbiSource::Inline { abi: json!([]) });

        assert!(matches!(config.scan_range(), Err(ConfigError::NotHistoryMode)));
    }

    #[test]
    fn interface_is_read_from_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("abi.json");
        std::fs::write(&path, r#"[{"type": "event", "name": "Ping", "inputs": []}]"#)?;

        let config = ScanConfig::new(TOKEN, "Ping", "http://node", AbiSource::File { path });

        assert_eq!(config.interface()?[0]["name"], "Ping");

        Ok(())
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = ScanConfig::load(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
