//! Control plane configuration.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::runner::RunnerConfig;
use crate::tracker::Toolchain;

/// Control plane configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server bind address.
    pub http_addr: String,

    /// Maximum simultaneously running operations; zero disables the gate.
    pub max_concurrent: usize,

    /// Seconds a canceled process gets between SIGTERM and SIGKILL.
    pub cancel_grace_secs: u64,

    /// Toolchain program that runs registry targets.
    pub make_command: String,

    /// Checkout of the deployment repository the toolchain runs in.
    pub onramp_dir: PathBuf,

    /// JSON state file. In-memory storage when unset.
    pub store_path: Option<PathBuf>,

    /// Environment passed to every toolchain invocation.
    pub toolchain_env: HashMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_addr: "[::1]:8186".to_string(),
            max_concurrent: 1,
            cancel_grace_secs: 10,
            make_command: "make".to_string(),
            onramp_dir: PathBuf::from("aether-onramp"),
            store_path: None,
            toolchain_env: HashMap::new(),
        }
    }
}

impl Config {
    /// Runner settings derived from this configuration.
    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            max_concurrent: self.max_concurrent,
            cancel_grace: Duration::from_secs(self.cancel_grace_secs),
        }
    }

    /// Toolchain used to run component actions.
    pub fn toolchain(&self) -> Toolchain {
        let mut toolchain =
            Toolchain::new(&self.make_command).with_work_dir(self.onramp_dir.clone());
        toolchain.env = self.toolchain_env.clone();
        toolchain
    }
}

/// Parse a `KEY=VALUE` pair.
pub fn parse_env_pair(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.max_concurrent, 1);
        assert_eq!(config.runner_config().cancel_grace, Duration::from_secs(10));

        let toolchain = config.toolchain();
        assert_eq!(toolchain.command, "make");
        assert_eq!(toolchain.work_dir, Some(PathBuf::from("aether-onramp")));
    }

    #[test]
    fn test_parse_env_pair() {
        assert_eq!(
            parse_env_pair("ANSIBLE_FORCE_COLOR=false").unwrap(),
            ("ANSIBLE_FORCE_COLOR".to_string(), "false".to_string())
        );
        assert_eq!(
            parse_env_pair("EXTRA=a=b").unwrap(),
            ("EXTRA".to_string(), "a=b".to_string())
        );
        assert!(parse_env_pair("novalue").is_err());
        assert!(parse_env_pair("=x").is_err());
    }
}
