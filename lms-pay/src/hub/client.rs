//! Realtime payment hub client
//!
//! Connects to the backend payment hub using the server-sent-events transport:
//! 1. `POST {hub}/negotiate?negotiateVersion=1` obtains a connection token
//! 2. `GET {hub}?id=<token>&access_token=<jwt>` opens the receive stream
//! 3. `POST {hub}?id=<token>` sends the JSON protocol handshake
//!
//! A reader task decodes the stream and forwards every status invocation to
//! the caller's channel. The connection never reconnects on its own.

use futures::StreamExt;
use reqwest::{header, Client, StatusCode};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::protocol::{
    handshake_request, parse_record, split_records, status_from_invocation, HubMessage,
    NegotiateResponse,
};
use super::sse::SseDecoder;
use crate::error::{Error, Result};
use lms_common::config::TomlConfig;
use lms_common::PaymentStatus;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Factory for hub connections
#[derive(Clone)]
pub struct HubClient {
    http_client: Client,
    hub_url: String,
    status_event: String,
}

impl HubClient {
    pub fn new(config: &TomlConfig) -> Result<Self> {
        Self::from_parts(config.hub_base_url(), &config.hub.path, &config.hub.status_event)
    }

    pub fn from_parts(base_url: &str, path: &str, status_event: &str) -> Result<Self> {
        // No overall timeout: the receive stream stays open for the life of the connection
        let http_client = Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?;

        Ok(Self {
            http_client,
            hub_url: format!(
                "{}/{}",
                base_url.trim_end_matches('/'),
                path.trim_start_matches('/')
            ),
            status_event: status_event.to_string(),
        })
    }

    pub fn hub_url(&self) -> &str {
        &self.hub_url
    }

    /// Open a connection authenticated with `token`
    ///
    /// Status updates are sent to `status_tx` until the connection is
    /// disconnected, the server closes it, or the receiver is dropped.
    pub async fn connect(
        &self,
        token: &str,
        status_tx: mpsc::Sender<PaymentStatus>,
    ) -> Result<HubConnection> {
        let negotiate = self.negotiate(token).await?;
        let stream_id = negotiate.stream_id()?.to_string();

        let stream = self
            .http_client
            .get(&self.hub_url)
            .query(&[("id", stream_id.as_str()), ("access_token", token)])
            .bearer_auth(token)
            .header(header::ACCEPT, "text/event-stream")
            .send()
            .await?;
        if !stream.status().is_success() {
            return Err(Error::Hub(format!(
                "Receive stream refused: HTTP {}",
                stream.status()
            )));
        }

        let handshake = self
            .http_client
            .post(&self.hub_url)
            .query(&[("id", stream_id.as_str())])
            .bearer_auth(token)
            .timeout(REQUEST_TIMEOUT)
            .body(handshake_request())
            .send()
            .await?;
        if !handshake.status().is_success() {
            return Err(Error::Hub(format!(
                "Handshake refused: HTTP {}",
                handshake.status()
            )));
        }

        let cancel = CancellationToken::new();
        let ended = CancellationToken::new();
        let reader = StreamReader {
            status_event: self.status_event.clone(),
            status_tx,
            cancel: cancel.clone(),
        };
        let task_ended = ended.clone();
        let task = tokio::spawn(async move {
            reader.run(stream).await;
            task_ended.cancel();
        });

        info!(connection_id = ?negotiate.connection_id, "Payment hub connected");

        Ok(HubConnection {
            http_client: self.http_client.clone(),
            hub_url: self.hub_url.clone(),
            stream_id,
            token: token.to_string(),
            cancel,
            ended,
            task: Some(task),
        })
    }

    async fn negotiate(&self, token: &str) -> Result<NegotiateResponse> {
        let url = format!("{}/negotiate", self.hub_url);
        let response = self
            .http_client
            .post(&url)
            .query(&[("negotiateVersion", "1")])
            .bearer_auth(token)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED => Err(Error::Common(lms_common::Error::Unauthenticated(
                "hub rejected the access token".to_string(),
            ))),
            status if !status.is_success() => {
                Err(Error::Hub(format!("Negotiation failed: HTTP {}", status)))
            }
            _ => response
                .json::<NegotiateResponse>()
                .await
                .map_err(|e| Error::Hub(format!("Invalid negotiate response: {}", e))),
        }
    }
}

/// Live hub connection
///
/// Dropping the connection stops the reader task; `disconnect` additionally
/// tells the server.
pub struct HubConnection {
    http_client: Client,
    hub_url: String,
    stream_id: String,
    token: String,
    cancel: CancellationToken,
    ended: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl HubConnection {
    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    /// Resolves once the reader task has stopped for any reason
    pub async fn ended(&self) {
        self.ended.cancelled().await
    }

    /// Stop reading and close the server side of the connection
    pub async fn disconnect(mut self) {
        self.cancel.cancel();

        let result = self
            .http_client
            .delete(&self.hub_url)
            .query(&[("id", self.stream_id.as_str())])
            .bearer_auth(&self.token)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await;
        if let Err(e) = result {
            debug!("Hub close request failed: {}", e);
        }

        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        info!("Payment hub disconnected");
    }
}

impl Drop for HubConnection {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct StreamReader {
    status_event: String,
    status_tx: mpsc::Sender<PaymentStatus>,
    cancel: CancellationToken,
}

impl StreamReader {
    async fn run(self, response: reqwest::Response) {
        let mut body = Box::pin(response.bytes_stream());
        let mut decoder = SseDecoder::new();
        let mut pending = String::new();

        loop {
            let chunk = tokio::select! {
                _ = self.cancel.cancelled() => return,
                _ = self.status_tx.closed() => return,
                chunk = body.next() => chunk,
            };

            let bytes = match chunk {
                Some(Ok(bytes)) => bytes,
                Some(Err(e)) => {
                    warn!("Hub stream error: {}", e);
                    return;
                }
                None => {
                    info!("Hub stream ended by server");
                    return;
                }
            };

            for payload in decoder.push(&bytes) {
                pending.push_str(&payload);
                let (records, rest) = split_records(&pending);
                let messages: Vec<_> = records.into_iter().map(parse_record).collect();
                pending = rest.to_string();

                for message in messages {
                    if !self.handle(message).await {
                        return;
                    }
                }
            }
        }
    }

    /// Returns false when the connection should stop
    async fn handle(&self, message: Result<HubMessage>) -> bool {
        match message {
            Ok(HubMessage::Handshake { error: Some(error) }) => {
                warn!("Hub handshake rejected: {}", error);
                false
            }
            Ok(HubMessage::Handshake { error: None }) => {
                debug!("Hub handshake accepted");
                true
            }
            Ok(HubMessage::Invocation { target, arguments }) => {
                if !target.eq_ignore_ascii_case(&self.status_event) {
                    debug!(%target, "Ignoring hub invocation");
                    return true;
                }
                match status_from_invocation(&arguments) {
                    Some(status) => {
                        debug!(%status, "Hub status received");
                        self.status_tx.send(status).await.is_ok()
                    }
                    None => {
                        warn!(?arguments, "Status invocation without a status");
                        true
                    }
                }
            }
            Ok(HubMessage::Ping) | Ok(HubMessage::Other(_)) => true,
            Ok(HubMessage::Close { error }) => {
                info!(?error, "Hub closed the connection");
                false
            }
            Err(e) => {
                warn!("Dropping hub record: {}", e);
                true
            }
        }
    }
}
