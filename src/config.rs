//! Logger configuration and its `key = value` file parser.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{LoggerError, Result};

// Defaults
const ENDPOINT:   &str = "/piwik.php";
const PORT:       u16 = 443;
const THRESHOLD:  usize = 10;
const BUF_LIMIT:  usize = 30;
const IO_TIMEOUT: u64 = 30;

/// How the response to a batch is read back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    /// Read exactly as many bytes as the request had; any such read counts as
    /// delivered. The collector's status is not inspected.
    EchoLength,
    /// Read until the collector closes and require a `2xx` status line.
    HttpStatus,
}

impl Default for ResponseMode {
    fn default() -> Self { ResponseMode::EchoLength }
}

/// Full logger configuration.
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    // ── Identity ──────────────────────────────────────────────────────────────
    /// Application name. Stored only.
    pub app_name: String,
    /// Visitor identifier sent as `uid` with every event.
    pub uid: String,
    // ── Collector ─────────────────────────────────────────────────────────────
    /// Collector domain; used for DNS, SNI, the `Host` header and event URLs.
    pub server_host: String,
    /// Request path of the bulk tracking endpoint.
    pub endpoint: String,
    pub port: u16,
    // ── Buffering ─────────────────────────────────────────────────────────────
    /// Pending size above which `add_page_visit` flushes inline.
    pub threshold_num_entries: usize,
    /// In-flight size above which the whole in-flight batch is dropped at the
    /// next promotion.
    pub buffer_limit: usize,
    // ── Connection ────────────────────────────────────────────────────────────
    /// Bound applied to each connection step separately.
    pub io_timeout: Duration,
    pub response_mode: ResponseMode,
    /// PEM CA bundle. When set, the server chain must validate against it.
    pub ca_file: Option<PathBuf>,
    // ── Process ───────────────────────────────────────────────────────────────
    pub log_syslog: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            app_name:              String::new(),
            uid:                   String::new(),
            server_host:           String::new(),
            endpoint:              ENDPOINT.to_string(),
            port:                  PORT,
            threshold_num_entries: THRESHOLD,
            buffer_limit:          BUF_LIMIT,
            io_timeout:            Duration::from_secs(IO_TIMEOUT),
            response_mode:         ResponseMode::EchoLength,
            ca_file:               None,
            log_syslog:            false,
        }
    }
}

impl LoggerConfig {
    /// Configuration with the required fields set and everything else default.
    pub fn new(
        app_name:    impl Into<String>,
        uid:         impl Into<String>,
        server_host: impl Into<String>,
    ) -> Self {
        Self {
            app_name:    app_name.into(),
            uid:         uid.into(),
            server_host: server_host.into(),
            ..Self::default()
        }
    }
}

fn parse_bool(val: &str) -> bool {
    val == "true" || val == "1" || val == "yes"
}

/// Parse `path` as a `key = value` logger configuration file.
pub fn load_config(path: &Path) -> Result<LoggerConfig> {
    let content = fs::read_to_string(path)
        .map_err(|e| LoggerError::Config(format!("cannot read {}: {e}", path.display())))?;
    Ok(parse_config(&content))
}

/// Parse configuration text. Unknown keys are ignored and malformed numbers
/// keep the default.
pub fn parse_config(content: &str) -> LoggerConfig {
    let mut cfg = LoggerConfig::default();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts = line.splitn(2, '=');
        let key = match parts.next() {
            Some(k) => k.trim().to_ascii_lowercase(),
            None => continue,
        };
        let val = match parts.next() {
            Some(v) => v.trim().to_string(),
            None => continue,
        };
        if val.is_empty() {
            continue;
        }

        match key.as_str() {
            "app_name"              => cfg.app_name              = val,
            "uid"                   => cfg.uid                   = val,
            "server_host"           => cfg.server_host           = val,
            "endpoint"              => cfg.endpoint              = val,
            "port"                  => cfg.port                  = val.parse().unwrap_or(PORT),
            "threshold_num_entries" => cfg.threshold_num_entries = val.parse().unwrap_or(THRESHOLD),
            "buffer_limit"          => cfg.buffer_limit          = val.parse().unwrap_or(BUF_LIMIT),
            "io_timeout"            => {
                cfg.io_timeout = Duration::from_secs(val.parse().unwrap_or(IO_TIMEOUT));
            }
            "ca_file"               => cfg.ca_file               = Some(PathBuf::from(&val)),
            "log_syslog"            => cfg.log_syslog            = parse_bool(&val),
            "response_mode" => {
                cfg.response_mode = match val.to_ascii_lowercase().as_str() {
                    "http" | "status" => ResponseMode::HttpStatus,
                    _                 => ResponseMode::EchoLength,
                };
            }
            _ => {} // ignore unknown keys
        }
    }

    cfg
}

/// Validate that required fields are populated.
pub fn validate_config(cfg: &LoggerConfig) -> Result<()> {
    if cfg.uid.is_empty() {
        return Err(LoggerError::Config("uid is required".into()));
    }
    if cfg.server_host.is_empty() {
        return Err(LoggerError::Config("server_host is required".into()));
    }
    if !cfg.endpoint.starts_with('/') {
        return Err(LoggerError::Config(format!(
            "endpoint must start with '/': {}",
            cfg.endpoint
        )));
    }
    if cfg.port == 0 {
        return Err(LoggerError::Config("port must be non-zero".into()));
    }
    if cfg.io_timeout.is_zero() {
        return Err(LoggerError::Config("io_timeout must be non-zero".into()));
    }
    Ok(())
}
