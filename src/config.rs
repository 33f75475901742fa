use anyhow::Context;
use serde::Deserialize;

/// Secret-looking default path; deployments are expected to override it.
pub const DEFAULT_WEBHOOK_PATH: &str = "/webhook/secret-0c68fb14-bb0d-41ca-a53f-a8ba0ea08fae";

/// Paths served by the exporter itself that the webhook must not shadow.
const RESERVED_PATHS: [&str; 2] = ["/health", "/version"];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub exporter: ExporterConfig,
    #[serde(default)]
    pub vnstat: VnstatConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

fn default_port() -> u16 {
    50000
}

fn default_host() -> String {
    "0.0.0.0".into()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExporterConfig {
    #[serde(default = "default_webhook_path")]
    pub webhook_path: String,
    /// Day of month the billing cycle starts on (1-31). Months shorter than this
    /// start their cycle on their last day.
    #[serde(default = "default_start_day")]
    pub start_day: u32,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            webhook_path: default_webhook_path(),
            start_day: default_start_day(),
        }
    }
}

fn default_webhook_path() -> String {
    DEFAULT_WEBHOOK_PATH.into()
}

fn default_start_day() -> u32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct VnstatConfig {
    /// Executable name or path of vnstat.
    #[serde(default = "default_binary")]
    pub binary: String,
    #[serde(default = "default_iflist_timeout_secs")]
    pub iflist_timeout_secs: u64,
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,
}

impl Default for VnstatConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            iflist_timeout_secs: default_iflist_timeout_secs(),
            query_timeout_secs: default_query_timeout_secs(),
        }
    }
}

fn default_binary() -> String {
    "vnstat".into()
}

fn default_iflist_timeout_secs() -> u64 {
    10
}

fn default_query_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshConfig {
    /// Wait between the end of one refresh and the start of the next.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Shortened wait after a refresh failed unexpectedly.
    #[serde(default = "default_retry_interval_secs")]
    pub retry_interval_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            retry_interval_secs: default_retry_interval_secs(),
        }
    }
}

fn default_interval_secs() -> u64 {
    300
}

fn default_retry_interval_secs() -> u64 {
    60
}

impl AppConfig {
    /// Defaults, then the TOML file named by `CONFIG_FILE` (if set), then environment
    /// overrides (`WEBHOOK_PATH`, `START_DAY`, `PORT`, `HOST`, `VNSTAT_BIN`).
    pub fn load() -> anyhow::Result<Self> {
        let mut config = match std::env::var("CONFIG_FILE") {
            Ok(path) => {
                let s = std::fs::read_to_string(&path)
                    .with_context(|| format!("reading config file {}", path))?;
                toml::from_str(&s).with_context(|| format!("parsing config file {}", path))?
            }
            Err(_) => AppConfig::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment-style overrides from `lookup`; unset keys keep their value.
    pub fn apply_env<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("WEBHOOK_PATH") {
            self.exporter.webhook_path = path;
        }
        if let Some(day) = lookup("START_DAY") {
            self.exporter.start_day = day
                .trim()
                .parse()
                .with_context(|| format!("START_DAY must be an integer, got {:?}", day))?;
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("PORT must be an integer, got {:?}", port))?;
        }
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(binary) = lookup("VNSTAT_BIN") {
            self.vnstat.binary = binary;
        }
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(
            (1..=31).contains(&self.exporter.start_day),
            "exporter.start_day must be between 1 and 31, got {}",
            self.exporter.start_day
        );
        anyhow::ensure!(
            self.exporter.webhook_path.starts_with('/'),
            "exporter.webhook_path must start with '/', got {:?}",
            self.exporter.webhook_path
        );
        anyhow::ensure!(
            !self.exporter.webhook_path.contains(['{', '}'])
                && !self
                    .exporter
                    .webhook_path
                    .split('/')
                    .any(|segment| segment.starts_with([':', '*'])),
            "exporter.webhook_path must not contain route parameters, got {:?}",
            self.exporter.webhook_path
        );
        anyhow::ensure!(
            !RESERVED_PATHS.contains(&self.exporter.webhook_path.as_str()),
            "exporter.webhook_path must not be one of {:?}",
            RESERVED_PATHS
        );
        anyhow::ensure!(
            !self.vnstat.binary.is_empty(),
            "vnstat.binary must be non-empty"
        );
        anyhow::ensure!(
            self.vnstat.iflist_timeout_secs > 0,
            "vnstat.iflist_timeout_secs must be > 0, got {}",
            self.vnstat.iflist_timeout_secs
        );
        anyhow::ensure!(
            self.vnstat.query_timeout_secs > 0,
            "vnstat.query_timeout_secs must be > 0, got {}",
            self.vnstat.query_timeout_secs
        );
        anyhow::ensure!(
            self.refresh.interval_secs > 0,
            "refresh.interval_secs must be > 0, got {}",
            self.refresh.interval_secs
        );
        anyhow::ensure!(
            self.refresh.retry_interval_secs > 0,
            "refresh.retry_interval_secs must be > 0, got {}",
            self.refresh.retry_interval_secs
        );
        Ok(())
    }
}
