//! One-shot collector exchange.
//!
//! A [`Session`] is created for a single flush and walks
//! resolve → connect → TLS handshake → write → read exactly once. Each step
//! either advances or ends the attempt with a typed error; nothing is retried
//! and no step is revisited.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use log::debug;
use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{lookup_host, TcpStream};
use tokio_rustls::{client::TlsStream, TlsConnector};

use crate::config::ResponseMode;
use crate::error::{LoggerError, Result, Stage};

/// Bound `fut` by `limit`, mapping expiry to a timeout of `stage`.
async fn step<T, F>(stage: Stage, limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    debug!("session: {stage}");
    match tokio::time::timeout(limit, fut).await {
        Ok(res) => res,
        Err(_) => Err(LoggerError::Timeout(stage)),
    }
}

pub struct Session {
    connector:     TlsConnector,
    server_name:   ServerName<'static>,
    host:          String,
    port:          u16,
    timeout:       Duration,
    response_mode: ResponseMode,
}

impl Session {
    pub fn new(
        connector:     TlsConnector,
        server_name:   ServerName<'static>,
        host:          &str,
        port:          u16,
        timeout:       Duration,
        response_mode: ResponseMode,
    ) -> Self {
        Session {
            connector,
            server_name,
            host: host.to_string(),
            port,
            timeout,
            response_mode,
        }
    }

    /// Deliver `request` and read the collector's answer.
    ///
    /// Returns the number of response bytes read.
    pub async fn run(self, request: &[u8]) -> Result<usize> {
        let limit = self.timeout;

        let addrs = step(Stage::Resolve, limit, self.resolve()).await?;
        let tcp = step(Stage::Connect, limit, connect_any(&addrs)).await?;
        let mut tls = step(Stage::Handshake, limit, self.handshake(tcp)).await?;

        let written = step(Stage::Write, limit, async {
            tls.write_all(request).await.map_err(LoggerError::Write)?;
            tls.flush().await.map_err(LoggerError::Write)?;
            Ok(request.len())
        })
        .await?;

        let read = match self.response_mode {
            ResponseMode::EchoLength => {
                step(Stage::Read, limit, read_echo(&mut tls, written)).await?
            }
            ResponseMode::HttpStatus => {
                step(Stage::Read, limit, read_status(&mut tls)).await?
            }
        };

        close(&mut tls, limit).await;
        debug!("session: done, {written} bytes sent, {read} bytes read");
        Ok(read)
    }

    async fn resolve(&self) -> Result<Vec<SocketAddr>> {
        let addrs: Vec<SocketAddr> = lookup_host((self.host.as_str(), self.port))
            .await
            .map_err(|source| LoggerError::Resolve { host: self.host.clone(), source })?
            .collect();
        if addrs.is_empty() {
            return Err(LoggerError::Resolve {
                host:   self.host.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses"),
            });
        }
        debug!("session: {} resolved to {addrs:?}", self.host);
        Ok(addrs)
    }

    async fn handshake(&self, tcp: TcpStream) -> Result<TlsStream<TcpStream>> {
        self.connector
            .connect(self.server_name.clone(), tcp)
            .await
            .map_err(LoggerError::Handshake)
    }
}

/// Try each candidate in order; the first connection wins.
async fn connect_any(addrs: &[SocketAddr]) -> Result<TcpStream> {
    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect(addr).await {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                debug!("session: connect {addr} failed: {e}");
                last_err = Some(e);
            }
        }
    }
    Err(LoggerError::Connect(last_err.unwrap_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::NotFound, "no candidate addresses")
    })))
}

/// Send close_notify, bounded by `limit`. The collector closes after
/// answering, so a failed or stalled close changes nothing.
async fn close<S: AsyncWrite + Unpin>(stream: &mut S, limit: Duration) {
    if tokio::time::timeout(limit, stream.shutdown()).await.is_err() {
        debug!("session: close timed out");
    }
}

/// Read back exactly `len` bytes, whatever they are.
async fn read_echo<S: AsyncRead + Unpin>(stream: &mut S, len: usize) -> Result<usize> {
    let mut response = vec![0u8; len];
    stream.read_exact(&mut response).await.map_err(LoggerError::Read)?;
    Ok(len)
}

/// Read until the peer closes and check the HTTP status line.
async fn read_status<S: AsyncRead + Unpin>(stream: &mut S) -> Result<usize> {
    let mut response = Vec::new();
    match stream.read_to_end(&mut response).await {
        Ok(_) => {}
        // Peers that skip close_notify still delivered a complete answer.
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof && !response.is_empty() => {}
        Err(e) => return Err(LoggerError::Read(e)),
    }
    let status = parse_status(&response)?;
    if !(200..300).contains(&status) {
        return Err(LoggerError::Status(status));
    }
    Ok(response.len())
}

fn parse_status(response: &[u8]) -> Result<u16> {
    let line_end = response
        .windows(2)
        .position(|w| w == b"\r\n")
        .unwrap_or(response.len());
    let line = std::str::from_utf8(&response[..line_end])
        .map_err(|_| LoggerError::MalformedResponse)?;
    let mut parts = line.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some(version), Some(code)) if version.starts_with("HTTP/") => {
            code.parse().map_err(|_| LoggerError::MalformedResponse)
        }
        _ => Err(LoggerError::MalformedResponse),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_line_parsing() {
        assert_eq!(parse_status(b"HTTP/1.1 200 OK\r\n\r\n").unwrap(), 200);
        assert_eq!(parse_status(b"HTTP/1.0 204 No Content").unwrap(), 204);
        assert!(matches!(parse_status(b"garbage"), Err(LoggerError::MalformedResponse)));
        assert!(matches!(parse_status(b""), Err(LoggerError::MalformedResponse)));
        assert!(matches!(parse_status(b"HTTP/1.1 abc\r\n"), Err(LoggerError::MalformedResponse)));
    }

    #[tokio::test]
    async fn echo_read_takes_exactly_len() {
        let mut data: &[u8] = b"0123456789";
        assert_eq!(read_echo(&mut data, 4).await.unwrap(), 4);
        assert_eq!(data, b"456789");
    }

    #[tokio::test]
    async fn echo_read_fails_on_short_response() {
        let mut data: &[u8] = b"01";
        assert!(matches!(read_echo(&mut data, 4).await, Err(LoggerError::Read(_))));
    }

    #[tokio::test]
    async fn status_read_rejects_server_errors() {
        let mut ok: &[u8] = b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n";
        assert!(read_status(&mut ok).await.is_ok());

        let mut failed: &[u8] = b"HTTP/1.1 503 Service Unavailable\r\n\r\n";
        assert!(matches!(read_status(&mut failed).await, Err(LoggerError::Status(503))));
    }

    #[tokio::test]
    async fn connect_with_no_candidates_fails() {
        assert!(matches!(connect_any(&[]).await, Err(LoggerError::Connect(_))));
    }

    /// Writer whose shutdown never completes.
    struct StuckClose;

    impl AsyncWrite for StuckClose {
        fn poll_write(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            buf: &[u8],
        ) -> std::task::Poll<std::io::Result<usize>> {
            std::task::Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }

        fn poll_shutdown(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Pending
        }
    }

    #[tokio::test]
    async fn stalled_close_is_bounded() {
        let res = tokio::time::timeout(
            Duration::from_secs(5),
            close(&mut StuckClose, Duration::from_millis(20)),
        )
        .await;
        assert!(res.is_ok());
    }

    #[tokio::test]
    async fn steps_time_out() {
        let res: Result<()> = step(Stage::Read, Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(res, Err(LoggerError::Timeout(Stage::Read))));
    }
}
