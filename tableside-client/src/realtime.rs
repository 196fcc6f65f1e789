//! Realtime subscription over WebSocket
//!
//! 1. Connect `/api/ws` with the table QR token or a staff JWT
//! 2. First frame is `hello{protocolVersion, epoch, sequence}`
//! 3. Forward events / resync requests to the consumer
//! 4. Reconnect with exponential backoff plus jitter on disconnect
//!
//! There is no catch-up stream: every [`RealtimeUpdate::Connected`] means
//! cached state must be re-fetched.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use rand::Rng;
use shared::message::{BusMessage, PROTOCOL_VERSION, ServerFrame};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::{ClientConfig, ClientError, ClientResult, Credentials, RealtimeConfig};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Buffered updates between the socket task and its consumer
const UPDATE_CHANNEL_CAPACITY: usize = 256;

/// What the consumer sees
#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeUpdate {
    /// (Re)connected; re-fetch everything
    Connected {
        epoch: String,
        sequence: u64,
        /// Server epoch differs from the previous connection
        restarted: bool,
    },
    Message(BusMessage),
    /// Server dropped events for this subscriber
    Resync { reason: String },
    Disconnected { reason: String },
    /// Credentials were refused; reconnecting will not help
    Rejected { status: u16 },
}

enum SessionEnd {
    /// Server closed or stream ended; reconnect
    Closed,
    /// Shutdown requested or consumer gone
    Stop,
}

/// WebSocket subscriber with automatic reconnect
#[derive(Debug, Clone)]
pub struct RealtimeClient {
    url: Url,
    config: RealtimeConfig,
}

impl RealtimeClient {
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let credentials = config
            .credentials
            .as_ref()
            .ok_or(ClientError::MissingCredentials("table QR token or staff token"))?;
        Ok(Self {
            url: ws_url(&config.base_url, credentials)?,
            config: config.realtime.clone(),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Run on a background task; updates arrive on the returned receiver
    pub fn spawn(
        self,
        shutdown: CancellationToken,
    ) -> (mpsc::Receiver<RealtimeUpdate>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(UPDATE_CHANNEL_CAPACITY);
        let handle = tokio::spawn(self.run(tx, shutdown));
        (rx, handle)
    }

    /// Main loop: connect, pump frames, back off, repeat
    pub async fn run(self, tx: mpsc::Sender<RealtimeUpdate>, shutdown: CancellationToken) {
        tracing::info!(url = %redacted(&self.url), "Realtime client started");
        let mut attempt: u32 = 0;
        let mut last_epoch: Option<String> = None;

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            let connected = tokio::select! {
                _ = shutdown.cancelled() => break,
                result = connect_async(self.url.as_str()) => result,
            };

            match connected {
                Ok((ws, _)) => {
                    attempt = 0;
                    let end = self.run_session(ws, &tx, &shutdown, &mut last_epoch).await;
                    let reason = match end {
                        Ok(SessionEnd::Stop) => break,
                        Ok(SessionEnd::Closed) => "closed by server".to_string(),
                        Err(e) => {
                            tracing::warn!(error = %e, "Realtime connection lost");
                            e.to_string()
                        }
                    };
                    if tx.send(RealtimeUpdate::Disconnected { reason }).await.is_err() {
                        break;
                    }
                }
                Err(tungstenite::Error::Http(response))
                    if matches!(
                        response.status(),
                        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
                    ) =>
                {
                    let status = response.status().as_u16();
                    tracing::warn!(status, "Realtime connection rejected");
                    let _ = tx.send(RealtimeUpdate::Rejected { status }).await;
                    break;
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "Realtime connect failed");
                }
            }

            if !self.config.auto_reconnect {
                break;
            }
            if self.config.max_reconnect_attempts != 0
                && attempt >= self.config.max_reconnect_attempts
            {
                tracing::error!(attempt, "Realtime reconnect attempts exhausted");
                break;
            }

            let delay = jittered(self.config.backoff(attempt), self.config.jitter);
            attempt = attempt.saturating_add(1);
            tracing::debug!(delay_ms = delay.as_millis() as u64, attempt, "Reconnecting");
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(delay) => {},
            }
        }

        tracing::info!("Realtime client stopped");
    }

    /// Pump one connection until it ends
    async fn run_session(
        &self,
        ws: WsStream,
        tx: &mpsc::Sender<RealtimeUpdate>,
        shutdown: &CancellationToken,
        last_epoch: &mut Option<String>,
    ) -> ClientResult<SessionEnd> {
        let (mut sink, mut stream) = ws.split();

        let ping_every = if self.config.ping_interval.is_zero() {
            Duration::from_secs(3600)
        } else {
            self.config.ping_interval
        };
        let mut ping = tokio::time::interval(ping_every);
        ping.tick().await; // skip immediate tick

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    let _ = sink.send(Message::Close(None)).await;
                    return Ok(SessionEnd::Stop);
                }

                _ = ping.tick(), if !self.config.ping_interval.is_zero() => {
                    sink.send(Message::Ping(Vec::new().into())).await?;
                }

                frame = stream.next() => {
                    let text = match frame {
                        Some(Ok(Message::Text(text))) => text,
                        Some(Ok(Message::Close(_))) | None => return Ok(SessionEnd::Closed),
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => return Err(e.into()),
                    };

                    let frame: ServerFrame = match serde_json::from_str(text.as_str()) {
                        Ok(frame) => frame,
                        Err(e) => {
                            tracing::warn!(error = %e, "Unparseable realtime frame");
                            continue;
                        }
                    };

                    let update = match frame {
                        ServerFrame::Hello { protocol_version, epoch, sequence } => {
                            if protocol_version != PROTOCOL_VERSION {
                                tracing::warn!(
                                    server = protocol_version,
                                    client = PROTOCOL_VERSION,
                                    "Realtime protocol version mismatch"
                                );
                            }
                            let restarted = last_epoch.as_ref().is_some_and(|e| *e != epoch);
                            if restarted {
                                tracing::info!(epoch = %epoch, "Server restarted since last connection");
                            }
                            *last_epoch = Some(epoch.clone());
                            RealtimeUpdate::Connected { epoch, sequence, restarted }
                        }
                        ServerFrame::Event(msg) => RealtimeUpdate::Message(msg),
                        ServerFrame::Resync { reason } => RealtimeUpdate::Resync { reason },
                    };

                    if tx.send(update).await.is_err() {
                        return Ok(SessionEnd::Stop);
                    }
                }
            }
        }
    }
}

/// `http(s)://host/base` -> `ws(s)://host/base/api/ws?...`
pub fn ws_url(base_url: &str, credentials: &Credentials) -> ClientResult<Url> {
    let mut url = Url::parse(base_url)?;
    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        _ => "ws",
    };
    url.set_scheme(scheme)
        .map_err(|_| ClientError::InvalidResponse(format!("cannot use {base_url} for websocket")))?;

    let path = format!("{}/api/ws", url.path().trim_end_matches('/'));
    url.set_path(&path);
    url.set_query(None);
    {
        let mut query = url.query_pairs_mut();
        match credentials {
            Credentials::Table { table_id, token } => {
                query.append_pair("table", table_id).append_pair("token", token);
            }
            Credentials::Staff { token } => {
                query.append_pair("access_token", token);
            }
        }
    }
    Ok(url)
}

/// Add up to `jitter` × delay of random slack so reconnecting clients spread out
fn jittered(delay: Duration, jitter: f64) -> Duration {
    if jitter <= 0.0 {
        return delay;
    }
    let factor = 1.0 + rand::thread_rng().gen_range(0.0..=jitter);
    delay.mul_f64(factor)
}

/// URL without credentials, for logs
fn redacted(url: &Url) -> String {
    let mut url = url.clone();
    url.set_query(None);
    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ws_url() {
        let url = ws_url("http://localhost:3000", &Credentials::table("t1", "abc")).unwrap();
        assert_eq!(url.as_str(), "ws://localhost:3000/api/ws?table=t1&token=abc");

        let url = ws_url("https://pos.example.com/r1/", &Credentials::staff("jwt")).unwrap();
        assert_eq!(url.as_str(), "wss://pos.example.com/r1/api/ws?access_token=jwt");
        assert_eq!(redacted(&url), "wss://pos.example.com/r1/api/ws");
    }

    #[test]
    fn test_jitter_bounds() {
        let base = Duration::from_millis(1000);
        for _ in 0..50 {
            let d = jittered(base, 0.2);
            assert!(d >= base && d <= Duration::from_millis(1200));
        }
        assert_eq!(jittered(base, 0.0), base);
    }

    #[tokio::test]
    async fn test_gives_up_without_server() {
        let config = ClientConfig::for_table("http://127.0.0.1:1", "t1", "abc").with_realtime(
            RealtimeConfig::new()
                .with_reconnect_delay(Duration::from_millis(1), Duration::from_millis(5))
                .with_max_reconnect_attempts(2)
                .with_jitter(0.0),
        );
        let client = RealtimeClient::new(&config).unwrap();
        let (mut rx, handle) = client.spawn(CancellationToken::new());
        tokio::time::timeout(Duration::from_secs(10), handle)
            .await
            .unwrap()
            .unwrap();
        // connect failures are not reported as sessions
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_shutdown_stops_reconnect_loop() {
        let config = ClientConfig::for_staff("http://127.0.0.1:1", "jwt").with_realtime(
            RealtimeConfig::new().with_reconnect_delay(Duration::from_secs(30), Duration::from_secs(30)),
        );
        let shutdown = CancellationToken::new();
        let (_rx, handle) = RealtimeClient::new(&config).unwrap().spawn(shutdown.clone());
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
