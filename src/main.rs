//! Record page visits and push them to a Piwik/Matomo collector.
//!
//! Usage:
//!   piwik-logger --server stats.example.com --uid u1 "Sec A/Sub B" "Sec H"
//!   piwik-logger -c /etc/piwik-logger.conf --local-time -o lang=en "Home"

use std::path::PathBuf;
use std::process;

use anyhow::Context;
use chrono::Timelike;
use clap::Parser;
use log::{error, info};

use piwik_logger::{config, FlushOutcome, Logger, LoggerConfig};

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Parser)]
#[command(name = "piwik-logger", about = "Send page visits to a Piwik/Matomo collector")]
struct Cli {
    /// Path to a key = value configuration file.
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Collector domain (overrides server_host).
    #[arg(long)]
    server: Option<String>,

    /// Visitor id (overrides uid; a random one is generated if neither is set).
    #[arg(long)]
    uid: Option<String>,

    /// Collector port (overrides port).
    #[arg(long)]
    port: Option<u16>,

    /// Extra tracking parameter appended to every visit, as key=value.
    #[arg(short = 'o', long = "opt", value_parser = parse_opt)]
    opts: Vec<(String, String)>,

    /// Attach the local time as h/m/s parameters.
    #[arg(long)]
    local_time: bool,

    /// Log to stderr instead of syslog (useful for debugging).
    #[arg(long)]
    stderr: bool,

    /// Page paths, segments separated by '/'.
    #[arg(required = true)]
    paths: Vec<String>,
}

fn parse_opt(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got {s:?}"))
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let cfg = match load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("piwik-logger: config error: {e:#}");
            process::exit(1);
        }
    };

    let use_syslog = cfg.log_syslog && !cli.stderr;
    if let Err(e) = setup_logging(use_syslog) {
        eprintln!("piwik-logger: {e:#}");
        process::exit(1);
    }

    match run(&cli, cfg).await {
        Ok(FlushOutcome::Sent { events }) => info!("{events} visits delivered"),
        Ok(FlushOutcome::Idle) => info!("nothing to send"),
        Err(e) => {
            error!("{e:#}");
            process::exit(1);
        }
    }
}

fn load(cli: &Cli) -> anyhow::Result<LoggerConfig> {
    let mut cfg = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => LoggerConfig::default(),
    };
    if cfg.app_name.is_empty() {
        cfg.app_name = "piwik-logger".into();
    }
    if let Some(server) = &cli.server {
        cfg.server_host = server.clone();
    }
    if let Some(uid) = &cli.uid {
        cfg.uid = uid.clone();
    }
    if let Some(port) = cli.port {
        cfg.port = port;
    }
    if cfg.uid.is_empty() {
        cfg.uid = uuid::Uuid::new_v4().simple().to_string();
    }
    config::validate_config(&cfg)?;
    Ok(cfg)
}

async fn run(cli: &Cli, cfg: LoggerConfig) -> anyhow::Result<FlushOutcome> {
    info!("visitor {} → {}:{}{}", cfg.uid, cfg.server_host, cfg.port, cfg.endpoint);
    let server = cfg.server_host.clone();
    let logger = Logger::new(cfg).context("cannot set up logger")?;

    let mut opts = cli.opts.clone();
    if cli.local_time {
        let now = chrono::Local::now();
        opts.push(("h".into(), now.hour().to_string()));
        opts.push(("m".into(), now.minute().to_string()));
        opts.push(("s".into(), now.second().to_string()));
    }
    let opts: Vec<(&str, &str)> = opts.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();

    for path in &cli.paths {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        logger.add_page_visit(&segments, &opts).await;
    }

    logger
        .flush()
        .await
        .with_context(|| format!("delivery to {server} failed"))
}

// ── Logging setup ─────────────────────────────────────────────────────────────

fn setup_logging(use_syslog: bool) -> anyhow::Result<()> {
    if use_syslog {
        let formatter = syslog::Formatter3164 {
            facility: syslog::Facility::LOG_USER,
            hostname: None,
            process:  "piwik-logger".into(),
            pid:      process::id(),
        };
        let logger = syslog::unix(formatter)
            .map_err(|e| anyhow::anyhow!("syslog connect failed: {e}"))?;
        log::set_boxed_logger(Box::new(syslog::BasicLogger::new(logger)))
            .map(|()| log::set_max_level(log::LevelFilter::Info))
            .map_err(|e| anyhow::anyhow!("set_logger: {e}"))?;
    } else {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .parse_default_env()
            .init();
    }
    Ok(())
}
