use std::{io, time::Duration};

use chrono::{DateTime, Utc};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    time::{Instant, timeout},
};
use tracing::{debug, info, warn};

use super::{
    ContactSource, Diagnostics, ProtocolError, Pull, PullDiagnostics, PullKind,
    backoff::Backoff,
    dialect::Dialect,
    n3fjp::N3fjp,
};

const READ_CHUNK: usize = 8192;

/// Size and timeouts for one kind of pull.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullSettings {
    /// Number of most recent contacts to request.
    pub count: usize,
    /// Give up when nothing at all has arrived by then.
    pub total_timeout: Duration,
    /// Once data is flowing, this much silence ends the response.
    pub idle_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub host: String,
    pub port: u16,
    pub connect_timeout: Duration,
    pub seed: PullSettings,
    pub poll: PullSettings,
    pub backoff_initial: Duration,
    pub backoff_max: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 1100,
            connect_timeout: Duration::from_secs(5),
            seed: PullSettings {
                count: 5000,
                total_timeout: Duration::from_secs(60),
                idle_timeout: Duration::from_millis(1750),
            },
            poll: PullSettings {
                count: 80,
                total_timeout: Duration::from_secs(8),
                idle_timeout: Duration::from_millis(750),
            },
            backoff_initial: Duration::from_millis(500),
            backoff_max: Duration::from_secs(30),
        }
    }
}

/// Keeps one TCP connection to the logger and pulls its contact list.
///
/// The first exchange on every new connection is a seed pull; later ones
/// only ask for the tail of the log. Refused connections back off before the
/// next attempt. A dropped connection is reopened on the next pull.
pub struct ProtocolClient<D = N3fjp> {
    settings: ClientSettings,
    dialect: D,
    stream: Option<TcpStream>,
    needs_seed: bool,
    /// Set while an exchange is running. Still set on entry means the last
    /// one was dropped midway and the stream holds half a conversation.
    in_flight: bool,
    backoff: Backoff,
    retry_at: Option<Instant>,
    diagnostics: Diagnostics,
}

impl ProtocolClient<N3fjp> {
    pub fn n3fjp(settings: ClientSettings) -> Self {
        Self::new(settings, N3fjp::default())
    }
}

impl<D: Dialect> ProtocolClient<D> {
    pub fn new(settings: ClientSettings, dialect: D) -> Self {
        let backoff = Backoff::new(settings.backoff_initial, settings.backoff_max);
        let diagnostics = Diagnostics {
            host: settings.host.clone(),
            port: settings.port,
            ..Diagnostics::default()
        };
        Self {
            settings,
            dialect,
            stream: None,
            needs_seed: true,
            in_flight: false,
            backoff,
            retry_at: None,
            diagnostics,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.settings.host, self.settings.port)
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Performs one exchange. Connection-level failures drop the socket so
    /// the next call reconnects; a timeout leaves it open.
    pub async fn pull_once(&mut self, now: DateTime<Utc>) -> Result<Pull, ProtocolError> {
        if std::mem::replace(&mut self.in_flight, true) && self.stream.take().is_some() {
            self.diagnostics.connected = false;
            self.diagnostics.disconnects += 1;
            info!(addr = %self.addr(), "previous exchange was abandoned, reconnecting");
        }
        let result = self.exchange_once(now).await;
        self.in_flight = false;
        if let Err(err) = &result {
            self.diagnostics.last_error = Some(err.to_string());
            match err {
                ProtocolError::Disconnected | ProtocolError::Io(_) => self.drop_connection(err),
                ProtocolError::Timeout(_) => {
                    warn!(addr = %self.addr(), error = %err, "logger did not answer");
                }
                _ => {}
            }
        }
        result
    }

    pub fn request_seed(&mut self) {
        self.needs_seed = true;
    }

    pub fn diagnostics(&self) -> Diagnostics {
        self.diagnostics.clone()
    }

    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
            self.diagnostics.connected = false;
            info!(addr = %self.addr(), "closed logger connection");
        }
    }

    async fn exchange_once(&mut self, now: DateTime<Utc>) -> Result<Pull, ProtocolError> {
        self.ensure_connected().await?;

        let (kind, pull) = if self.needs_seed {
            (PullKind::Seed, self.settings.seed.clone())
        } else {
            (PullKind::Poll, self.settings.poll.clone())
        };
        let command = self.dialect.list_command(pull.count);
        let started = Instant::now();

        let Some(stream) = self.stream.as_mut() else {
            return Err(ProtocolError::Disconnected);
        };
        discard_stale(stream)?;
        let Reply { raw, terminated } = exchange(stream, &self.dialect, &command, &pull).await?;

        let text = String::from_utf8_lossy(&raw);
        let decoded = self.dialect.decode(&text, now);
        // Only a terminated seed covers the whole log.
        if kind == PullKind::Seed && !terminated {
            warn!(
                addr = %self.addr(),
                records = decoded.records.len(),
                "seed response ended without terminator; seeding again next pull"
            );
        } else {
            self.needs_seed = false;
        }

        let diag = PullDiagnostics {
            requested: pull.count,
            records_parsed: decoded.records.len(),
            malformed: decoded.malformed,
            raw_bytes: raw.len(),
            terminated,
            sample_fields: decoded.sample_fields,
            at: now,
            elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        };
        debug!(
            kind = ?kind,
            records = diag.records_parsed,
            malformed = diag.malformed,
            bytes = diag.raw_bytes,
            elapsed_ms = diag.elapsed_ms,
            "pull complete"
        );
        match kind {
            PullKind::Seed => self.diagnostics.seed = Some(diag),
            PullKind::Poll => self.diagnostics.poll = Some(diag),
        }

        Ok(Pull {
            kind,
            records: decoded.records,
            malformed: decoded.malformed,
        })
    }

    async fn ensure_connected(&mut self) -> Result<(), ProtocolError> {
        if self.stream.is_some() {
            return Ok(());
        }
        if let Some(at) = self.retry_at {
            let now = Instant::now();
            if now < at {
                return Err(ProtocolError::BackingOff { remaining: at - now });
            }
        }

        let addr = self.addr();
        let connect = TcpStream::connect((self.settings.host.as_str(), self.settings.port));
        let mut stream = match timeout(self.settings.connect_timeout, connect).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                self.schedule_retry();
                return Err(ProtocolError::Connect { addr, source });
            }
            Err(_) => {
                self.schedule_retry();
                return Err(ProtocolError::ConnectTimeout { addr });
            }
        };
        let _ = stream.set_nodelay(true);

        if let Some(handshake) = self.dialect.handshake() {
            stream.write_all(handshake.as_bytes()).await?;
            stream.write_all(b"\r\n").await?;
        }

        self.backoff.reset();
        self.retry_at = None;
        self.needs_seed = true;
        self.diagnostics.connected = true;
        self.diagnostics.connects += 1;
        self.stream = Some(stream);
        info!(%addr, "connected to logger");
        Ok(())
    }

    fn schedule_retry(&mut self) {
        let delay = self.backoff.next_delay();
        self.retry_at = Some(Instant::now() + delay);
        debug!(addr = %self.addr(), delay_ms = delay.as_millis() as u64, "reconnect scheduled");
    }

    fn drop_connection(&mut self, cause: &ProtocolError) {
        if self.stream.take().is_some() {
            self.diagnostics.connected = false;
            self.diagnostics.disconnects += 1;
            warn!(addr = %self.addr(), error = %cause, "logger connection lost");
        }
    }
}

/// Throws away bytes left over from an earlier exchange that was cut short.
fn discard_stale(stream: &TcpStream) -> Result<(), ProtocolError> {
    let mut scratch = [0u8; READ_CHUNK];
    loop {
        match stream.try_read(&mut scratch) {
            Ok(0) => return Err(ProtocolError::Disconnected),
            Ok(n) => debug!(bytes = n, "discarded stale response bytes"),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
            Err(e) => return Err(e.into()),
        }
    }
}

struct Reply {
    raw: Vec<u8>,
    terminated: bool,
}

/// Sends `command` and reads until the dialect sees a complete response,
/// or data stops arriving for the idle timeout.
async fn exchange<D: Dialect>(
    stream: &mut TcpStream,
    dialect: &D,
    command: &str,
    pull: &PullSettings,
) -> Result<Reply, ProtocolError> {
    stream.write_all(command.as_bytes()).await?;
    stream.write_all(b"\r\n").await?;

    let deadline = Instant::now() + pull.total_timeout;
    let mut buf = Vec::with_capacity(READ_CHUNK);
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        let now = Instant::now();
        if now >= deadline {
            if buf.is_empty() {
                return Err(ProtocolError::Timeout(pull.total_timeout));
            }
            return Ok(Reply {
                raw: buf,
                terminated: false,
            });
        }
        let wait = if buf.is_empty() {
            deadline - now
        } else {
            pull.idle_timeout.min(deadline - now)
        };

        match timeout(wait, stream.read(&mut chunk)).await {
            Ok(Ok(0)) => return Err(ProtocolError::Disconnected),
            Ok(Ok(n)) => {
                buf.extend_from_slice(&chunk[..n]);
                if dialect.response_complete(&buf) {
                    return Ok(Reply {
                        raw: buf,
                        terminated: true,
                    });
                }
            }
            Ok(Err(e)) => return Err(e.into()),
            Err(_) if buf.is_empty() => return Err(ProtocolError::Timeout(pull.total_timeout)),
            Err(_) => {
                return Ok(Reply {
                    raw: buf,
                    terminated: false,
                });
            }
        }
    }
}

impl<D: Dialect> ContactSource for ProtocolClient<D> {
    async fn pull(&mut self, now: DateTime<Utc>) -> Result<Pull, ProtocolError> {
        self.pull_once(now).await
    }

    fn request_seed(&mut self) {
        ProtocolClient::request_seed(self);
    }

    fn diagnostics(&self) -> Diagnostics {
        ProtocolClient::diagnostics(self)
    }

    async fn close(&mut self) {
        ProtocolClient::close(self).await;
    }
}
