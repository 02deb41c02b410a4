//! The public logger: buffers visits and flushes them to the collector.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, info, warn};
use rustls::pki_types::ServerName;
use tokio_rustls::TlsConnector;

use crate::buffer::EventBuffer;
use crate::config::{validate_config, LoggerConfig};
use crate::error::{LoggerError, Result};
use crate::event::{self, PendingEvent};
use crate::request;
use crate::session::Session;
use crate::tls::{self, AcceptAll, CertificateHook};

type Callback = Arc<dyn Fn(bool) + Send + Sync>;

/// Result of a flush that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing was pending; no connection was made.
    Idle,
    /// The collector took the in-flight batch of `events` visits.
    Sent { events: usize },
}

/// Releases the single-flight flag when the flush ends or is dropped.
struct FlushGuard<'a>(&'a AtomicBool);

impl<'a> FlushGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| FlushGuard(flag))
            .map_err(|_| LoggerError::FlushInProgress)
    }
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Buffering page-visit logger.
///
/// ```no_run
/// # async fn demo() -> piwik_logger::Result<()> {
/// use piwik_logger::{Logger, LoggerConfig};
///
/// let logger = Logger::new(LoggerConfig::new("The App", "user-id", "awesomeapp.com"))?;
/// logger.set_callback(|sent| println!("sent: {sent}"));
/// logger.add_page_visit(&["Section B", "Subsection N"], &[]).await;
/// logger.add_page_visit(&["Section H"], &[("h", "3")]).await;
/// logger.flush().await?;
/// # Ok(())
/// # }
/// ```
pub struct Logger {
    config:      LoggerConfig,
    connector:   TlsConnector,
    server_name: ServerName<'static>,
    buffer:      Mutex<EventBuffer>,
    callback:    Mutex<Option<Callback>>,
    flushing:    AtomicBool,
}

impl Logger {
    /// Build a logger that accepts any collector certificate unless
    /// `config.ca_file` is set.
    pub fn new(config: LoggerConfig) -> Result<Self> {
        Self::with_certificate_hook(config, Arc::new(AcceptAll))
    }

    /// Build a logger whose handshake runs every collector certificate
    /// through `hook`.
    pub fn with_certificate_hook(
        config: LoggerConfig,
        hook:   Arc<dyn CertificateHook>,
    ) -> Result<Self> {
        validate_config(&config)?;
        let connector = tls::build_connector(hook, config.ca_file.as_deref())?;
        let server_name = tls::server_name(&config.server_host)?;
        let buffer = EventBuffer::new(config.threshold_num_entries, config.buffer_limit);

        debug!(
            "logger for {} ({}:{}{})",
            config.app_name, config.server_host, config.port, config.endpoint
        );

        Ok(Logger {
            config,
            connector,
            server_name,
            buffer: Mutex::new(buffer),
            callback: Mutex::new(None),
            flushing: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &LoggerConfig { &self.config }

    fn buffer(&self) -> MutexGuard<'_, EventBuffer> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register the handler told whether each flush attempt delivered its
    /// batch. Replaces any previous handler.
    pub fn set_callback<F>(&self, callback: F)
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        *self.callback.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(callback));
    }

    pub fn clear_callback(&self) {
        *self.callback.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn notify(&self, sent: bool) {
        let callback = self.callback.lock().unwrap_or_else(PoisonError::into_inner).clone();
        if let Some(callback) = callback {
            callback(sent);
        }
    }

    /// Buffer a visit to `path` (e.g. `["Sec A", "Sub B"]` records
    /// `Sec A/Sub B`) with extra tracking parameters `options`.
    ///
    /// An empty path is ignored. When the pending queue grows past the
    /// threshold the buffer is flushed before this returns; the outcome of
    /// that flush reaches the callback.
    pub async fn add_page_visit(&self, path: &[&str], options: &[(&str, &str)]) {
        let Some(event) = event::encode(&self.config.server_host, &self.config.uid, path, options)
        else {
            return;
        };

        let over_threshold = self.buffer().add_pending(event);
        if !over_threshold {
            return;
        }

        match self.flush().await {
            Ok(_) => {}
            Err(LoggerError::FlushInProgress) => {
                debug!("threshold reached while a flush is running; visits stay pending");
            }
            Err(e) => warn!("automatic flush failed: {e}"),
        }
    }

    /// Send everything pending, together with any batch a previous failed
    /// attempt left in flight, as one request.
    ///
    /// Makes no connection when nothing is pending. The callback fires once
    /// for every attempt that does connect. Returns
    /// [`LoggerError::FlushInProgress`] if another flush is still running.
    pub async fn flush(&self) -> Result<FlushOutcome> {
        let _guard = FlushGuard::acquire(&self.flushing)?;

        let (request, events) = {
            let mut buffer = self.buffer();
            if !buffer.promote_to_in_flight() {
                return Ok(FlushOutcome::Idle);
            }
            let batch = buffer.in_flight();
            (
                request::build(batch, &self.config.endpoint, &self.config.server_host),
                batch.len(),
            )
        };

        let session = Session::new(
            self.connector.clone(),
            self.server_name.clone(),
            &self.config.server_host,
            self.config.port,
            self.config.io_timeout,
            self.config.response_mode,
        );

        match session.run(&request).await {
            Ok(_) => {
                self.buffer().clear_in_flight();
                info!("sent {events} visits to {}", self.config.server_host);
                self.notify(true);
                Ok(FlushOutcome::Sent { events })
            }
            Err(e) => {
                warn!(
                    "sending {events} visits to {} failed: {e}",
                    self.config.server_host
                );
                self.notify(false);
                Err(e)
            }
        }
    }

    /// Alias of [`Logger::flush`].
    pub async fn log(&self) -> Result<FlushOutcome> {
        self.flush().await
    }

    pub fn pending_len(&self) -> usize { self.buffer().pending().len() }

    pub fn in_flight_len(&self) -> usize { self.buffer().in_flight().len() }

    /// Snapshot of the in-flight batch.
    pub fn in_flight(&self) -> Vec<PendingEvent> { self.buffer().in_flight().to_vec() }
}
