// Traffic counters via the vnstat CLI (subprocess per query)

pub mod interfaces;
pub mod parse;

use chrono::NaiveDate;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tracing::instrument;

use crate::config::VnstatConfig;
use crate::models::TrafficTotals;

#[derive(Debug, thiserror::Error)]
pub enum VnstatError {
    #[error("failed to run {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{binary} did not finish within {timeout:?}")]
    Timeout { binary: String, timeout: Duration },
    #[error("{binary} exited with {status}: {stderr}")]
    Exit {
        binary: String,
        status: ExitStatus,
        stderr: String,
    },
    #[error("unexpected --iflist output: {0:?}")]
    UnexpectedOutput(String),
    #[error("{binary} printed no traffic data")]
    EmptyOutput { binary: String },
}

pub struct VnstatRepo {
    binary: String,
    iflist_timeout: Duration,
    query_timeout: Duration,
}

impl VnstatRepo {
    pub fn new(binary: impl Into<String>, iflist_timeout: Duration, query_timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            iflist_timeout,
            query_timeout,
        }
    }

    pub fn from_config(config: &VnstatConfig) -> Self {
        Self::new(
            config.binary.clone(),
            Duration::from_secs(config.iflist_timeout_secs),
            Duration::from_secs(config.query_timeout_secs),
        )
    }

    /// Run vnstat with `args`, returning stdout on a zero exit. The child is killed if it
    /// outlives `timeout`.
    async fn run(&self, args: &[String], timeout: Duration) -> Result<String, VnstatError> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => {
                return Err(VnstatError::Spawn {
                    binary: self.binary.clone(),
                    source,
                });
            }
            Err(_) => {
                return Err(VnstatError::Timeout {
                    binary: self.binary.clone(),
                    timeout,
                });
            }
        };

        if !output.status.success() {
            return Err(VnstatError::Exit {
                binary: self.binary.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Interfaces known to the vnstat database, in the order vnstat lists them.
    #[instrument(skip(self), fields(repo = "vnstat", operation = "list_interfaces"))]
    pub async fn list_interfaces(&self) -> Result<Vec<String>, VnstatError> {
        let stdout = self
            .run(&["--iflist".to_string()], self.iflist_timeout)
            .await?;
        let stdout = stdout.trim();
        tracing::debug!(output = stdout, "vnstat --iflist");
        interfaces::parse_iflist(stdout)
            .ok_or_else(|| VnstatError::UnexpectedOutput(stdout.to_string()))
    }

    /// The interface to scope traffic queries to, or `None` to query all of them.
    /// Discovery problems are logged and degrade to `None`.
    pub async fn select_interface(&self) -> Option<String> {
        let candidates = match self.list_interfaces().await {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    operation = "list_interfaces",
                    "interface discovery failed, querying all interfaces"
                );
                return None;
            }
        };
        tracing::info!(interfaces = ?candidates, "vnstat interfaces discovered");

        match interfaces::choose_interface(&candidates) {
            Some(name) => {
                tracing::info!(interface = name, "selected interface");
                Some(name.to_string())
            }
            None => {
                tracing::warn!("no physical interface found, querying all interfaces");
                None
            }
        }
    }

    /// Raw `--json` output for `[begin, end]`, optionally scoped to one interface.
    /// Blank output is an error, not zero traffic.
    #[instrument(skip(self), fields(repo = "vnstat", operation = "query_traffic"))]
    pub async fn query_traffic(
        &self,
        interface: Option<&str>,
        begin: NaiveDate,
        end: NaiveDate,
    ) -> Result<String, VnstatError> {
        let args = traffic_args(interface, begin, end);
        tracing::info!(command = %format!("{} {}", self.binary, args.join(" ")), "running vnstat");
        let stdout = self.run(&args, self.query_timeout).await?;
        if stdout.trim().is_empty() {
            return Err(VnstatError::EmptyOutput {
                binary: self.binary.clone(),
            });
        }
        Ok(stdout)
    }

    /// Query and parse traffic for `[begin, end]`.
    pub async fn get_traffic(
        &self,
        interface: Option<&str>,
        begin: NaiveDate,
        end: NaiveDate,
    ) -> Result<TrafficTotals, VnstatError> {
        let raw = self.query_traffic(interface, begin, end).await?;
        Ok(parse::parse_output(&raw))
    }
}

/// Arguments for a JSON traffic query over `[begin, end]`.
pub fn traffic_args(interface: Option<&str>, begin: NaiveDate, end: NaiveDate) -> Vec<String> {
    let mut args = Vec::with_capacity(7);
    if let Some(iface) = interface {
        args.push("-i".to_string());
        args.push(iface.to_string());
    }
    args.extend([
        "--begin".to_string(),
        begin.format("%Y-%m-%d").to_string(),
        "--end".to_string(),
        end.format("%Y-%m-%d").to_string(),
        "--json".to_string(),
    ]);
    args
}
