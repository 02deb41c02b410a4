//! Blocking facade over [`Logger`].
//!
//! Each `BlockingLogger` owns a current-thread runtime, so every flush runs
//! to completion on the caller's thread before the call returns.

use tokio::runtime::{Builder, Runtime};

use crate::config::LoggerConfig;
use crate::error::Result;
use crate::event::PendingEvent;
use crate::logger::{FlushOutcome, Logger};

pub struct BlockingLogger {
    runtime: Runtime,
    inner:   Logger,
}

impl BlockingLogger {
    pub fn new(config: LoggerConfig) -> Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        Ok(BlockingLogger { runtime, inner: Logger::new(config)? })
    }

    /// Wrap an already configured logger.
    pub fn from_logger(inner: Logger) -> Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        Ok(BlockingLogger { runtime, inner })
    }

    pub fn add_page_visit(&self, path: &[&str], options: &[(&str, &str)]) {
        self.runtime.block_on(self.inner.add_page_visit(path, options))
    }

    pub fn set_callback<F>(&self, callback: F)
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.inner.set_callback(callback);
    }

    /// Blocks for one full connect, handshake, write and read cycle.
    pub fn flush(&self) -> Result<FlushOutcome> {
        self.runtime.block_on(self.inner.flush())
    }

    pub fn log(&self) -> Result<FlushOutcome> { self.flush() }

    pub fn pending_len(&self) -> usize { self.inner.pending_len() }

    pub fn in_flight(&self) -> Vec<PendingEvent> { self.inner.in_flight() }

    pub fn logger(&self) -> &Logger { &self.inner }
}
