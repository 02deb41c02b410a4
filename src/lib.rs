//! Buffering page-visit logger for Piwik/Matomo-style collectors.
//!
//! Visits are encoded and queued locally, then sent as one bulk tracking
//! request over a fresh TLS connection when the queue passes its threshold or
//! when [`Logger::flush`] is called. A batch that fails to send is kept and
//! goes out with the next flush, unless it has grown past `buffer_limit`.
//!
//! [`BlockingLogger`] wraps the async [`Logger`] for callers without a runtime.

pub mod blocking;
pub mod buffer;
pub mod config;
pub mod error;
pub mod event;
pub mod logger;
pub mod request;
pub mod session;
pub mod tls;

pub use blocking::BlockingLogger;
pub use config::{load_config, LoggerConfig, ResponseMode};
pub use error::{LoggerError, Result, Stage};
pub use event::PendingEvent;
pub use logger::{FlushOutcome, Logger};
pub use tls::{AcceptAll, CertificateHook};
