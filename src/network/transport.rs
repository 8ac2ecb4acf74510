use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::common::{ChatMessage, OutgoingMessage};
use crate::error::Result;

/// Events the client emits on the real-time channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientFrame {
    #[serde(rename_all = "camelCase")]
    Join { user_id: String },
    SendMessage(OutgoingMessage),
}

/// Events pushed by the messaging server.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerFrame {
    ReceiveMessage {
        chat_id: Option<String>,
        message: ChatMessage,
    },
    /// Any event this client does not handle.
    Unknown(String),
}

#[derive(Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: serde_json::Value,
}

impl ServerFrame {
    pub fn parse(text: &str) -> Result<Self> {
        let envelope: Envelope = serde_json::from_str(text)?;
        match envelope.event.as_str() {
            "receive-message" => {
                let chat_id = envelope
                    .data
                    .get("chatId")
                    .and_then(serde_json::Value::as_str)
                    .map(str::to_string);
                Ok(ServerFrame::ReceiveMessage {
                    chat_id,
                    message: serde_json::from_value(envelope.data)?,
                })
            }
            _ => Ok(ServerFrame::Unknown(envelope.event)),
        }
    }
}

/// Opens real-time channels; called again on every reconnect.
#[async_trait]
pub trait Connector: Send + Sync {
    type Channel: Channel;

    async fn connect(&self) -> Result<Self::Channel>;
}

#[async_trait]
pub trait Channel: Send {
    async fn send(&mut self, frame: ClientFrame) -> Result<()>;

    /// Next server frame; `None` once the channel is closed.
    async fn next_frame(&mut self) -> Option<Result<ServerFrame>>;

    async fn close(&mut self);
}

/// WebSocket connector carrying JSON `{ "event", "data" }` text frames.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl Connector for WsConnector {
    type Channel = WsChannel;

    async fn connect(&self) -> Result<WsChannel> {
        let (stream, response) = connect_async(self.url.as_str()).await?;
        log::info!(
            "Connected to chat server {} (status {})",
            self.url,
            response.status()
        );
        Ok(WsChannel { stream })
    }
}

pub struct WsChannel {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Channel for WsChannel {
    async fn send(&mut self, frame: ClientFrame) -> Result<()> {
        let json = serde_json::to_string(&frame)?;
        self.stream.send(Message::Text(json)).await?;
        Ok(())
    }

    async fn next_frame(&mut self) -> Option<Result<ServerFrame>> {
        loop {
            let message = match self.stream.next().await? {
                Ok(message) => message,
                Err(err) => return Some(Err(err.into())),
            };
            match message {
                Message::Text(text) => {
                    return Some(ServerFrame::parse(&text));
                }
                Message::Close(frame) => {
                    log::info!("Chat server closed the channel: {frame:?}");
                    return None;
                }
                _ => continue,
            }
        }
    }

    async fn close(&mut self) {
        if let Err(err) = self.stream.close(None).await {
            log::debug!("Closing chat channel: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::SenderType;

    #[test]
    fn client_frames_use_event_envelope() {
        let join = serde_json::to_value(ClientFrame::Join {
            user_id: "u1".into(),
        })
        .unwrap();
        assert_eq!(join["event"], "join");
        assert_eq!(join["data"]["userId"], "u1");

        let send = serde_json::to_value(ClientFrame::SendMessage(OutgoingMessage {
            user_id: "u1".into(),
            message: "hi".into(),
            sender_type: SenderType::User,
            client_id: None,
        }))
        .unwrap();
        assert_eq!(send["event"], "send-message");
        assert_eq!(send["data"]["senderType"], "User");
    }

    #[test]
    fn server_frames_parse_and_tolerate_unknown_events() {
        let frame = ServerFrame::parse(
            r#"{"event":"receive-message","data":{"chatId":"c1","_id":"m1","message":"hi","senderType":"Admin","timestamp":"2024-01-01T00:00:00Z","read":false}}"#,
        )
        .unwrap();
        match frame {
            ServerFrame::ReceiveMessage { chat_id, message } => {
                assert_eq!(chat_id.as_deref(), Some("c1"));
                assert_eq!(message.id.as_deref(), Some("m1"));
                assert_eq!(message.sender_type, SenderType::Admin);
            }
            other => panic!("unexpected frame {other:?}"),
        }

        let unknown = ServerFrame::parse(r#"{"event":"typing","data":{"userId":"u1"}}"#).unwrap();
        assert_eq!(unknown, ServerFrame::Unknown("typing".into()));
        assert!(ServerFrame::parse("not json").is_err());
    }
}
