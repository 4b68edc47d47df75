//! WebSocket push listener with the tokio mpsc command/event pattern.
//!
//! The socket read loop runs in a dedicated tokio task. External code
//! communicates with it through typed command and event channels, keeping
//! the transport fully asynchronous and decoupled. Reconnection policy is
//! the embedder's; when the socket drops, the task ends and the event
//! channel closes.

use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tracing::{debug, info, warn};
use url::Url;

use brillprime_shared::{ChatMessage, MessageId, MessageStatus, PushEvent};

use crate::error::PushError;

/// Commands sent *into* the listener task.
#[derive(Debug)]
pub enum PushCommand {
    /// Close the socket and end the task.
    Shutdown,
}

/// Decode one text frame into a [`PushEvent`].
///
/// Frames look like `{"event": "new_message", "data": {...}}`. An unknown
/// event name decodes to [`PushEvent::Unknown`]; a frame that does not
/// match the shape at all is an error.
pub fn decode_frame(text: &str) -> Result<PushEvent, PushError> {
    #[derive(Deserialize)]
    struct Frame {
        event: String,
        #[serde(default)]
        data: serde_json::Value,
    }

    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct StatusChange {
        conversation_id: String,
        message_id: MessageId,
        status: MessageStatus,
    }

    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct ConversationRef {
        conversation_id: String,
    }

    let frame: Frame =
        serde_json::from_str(text).map_err(|e| PushError::MalformedFrame(e.to_string()))?;

    match frame.event.as_str() {
        "new_message" => {
            let message: ChatMessage = serde_json::from_value(frame.data)
                .map_err(|e| PushError::MalformedFrame(e.to_string()))?;
            Ok(PushEvent::MessageReceived(message))
        }
        "message_status" => {
            let change: StatusChange = serde_json::from_value(frame.data)
                .map_err(|e| PushError::MalformedFrame(e.to_string()))?;
            Ok(PushEvent::MessageStatusChanged {
                conversation_id: change.conversation_id,
                message_id: change.message_id,
                status: change.status,
            })
        }
        "conversation_updated" => {
            let reference: ConversationRef = serde_json::from_value(frame.data)
                .map_err(|e| PushError::MalformedFrame(e.to_string()))?;
            Ok(PushEvent::ConversationUpdated {
                conversation_id: reference.conversation_id,
            })
        }
        other => Ok(PushEvent::Unknown {
            event: other.to_string(),
        }),
    }
}

/// Connect to the push endpoint and spawn the read loop in a background
/// tokio task.
///
/// The stored session token, when present, rides along as a query
/// parameter. Returns the command channel, the decoded event stream, and
/// the task handle.
pub async fn spawn_push_listener(
    ws_url: &str,
    token: Option<String>,
) -> Result<
    (
        mpsc::Sender<PushCommand>,
        mpsc::Receiver<PushEvent>,
        tokio::task::JoinHandle<()>,
    ),
    PushError,
> {
    let mut url = Url::parse(ws_url).map_err(|e| PushError::InvalidUrl(e.to_string()))?;
    if let Some(token) = token {
        url.query_pairs_mut().append_pair("token", &token);
    }

    let (stream, _response) = connect_async(url.as_str())
        .await
        .map_err(|e| PushError::Connect(e.to_string()))?;

    info!("push transport connected");

    let (cmd_tx, mut cmd_rx) = mpsc::channel::<PushCommand>(8);
    let (event_tx, event_rx) = mpsc::channel::<PushEvent>(256);

    let handle = tokio::spawn(async move {
        let (mut write, mut read) = stream.split();

        loop {
            tokio::select! {
                // --- Incoming commands ---
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(PushCommand::Shutdown) => {
                            info!("push listener shutdown requested");
                            let _ = write.close().await;
                            break;
                        }
                        None => {
                            // All senders dropped
                            info!("command channel closed, shutting down push listener");
                            let _ = write.close().await;
                            break;
                        }
                    }
                }

                // --- Socket frames ---
                frame = read.next() => {
                    match frame {
                        Some(Ok(WsMessage::Text(text))) => {
                            match decode_frame(&text) {
                                Ok(PushEvent::Unknown { event }) => {
                                    debug!(event, "ignoring unknown push event");
                                }
                                Ok(event) => {
                                    if event_tx.send(event).await.is_err() {
                                        // Receiver gone, nobody is listening anymore.
                                        break;
                                    }
                                }
                                Err(e) => {
                                    warn!(error = %e, "skipping malformed push frame");
                                }
                            }
                        }
                        Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_))) => {}
                        Some(Ok(WsMessage::Close(_))) | None => {
                            info!("push transport closed by server");
                            break;
                        }
                        Some(Ok(_)) => {
                            // Binary frames are not part of the protocol.
                        }
                        Some(Err(e)) => {
                            warn!(error = %e, "push transport error");
                            break;
                        }
                    }
                }
            }
        }
    });

    Ok((cmd_tx, event_rx, handle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_message_frame_decodes() {
        let frame = json!({
            "event": "new_message",
            "data": {
                "id": "m-7",
                "conversationId": "conv-1",
                "senderId": "u-2",
                "senderRole": "VENDOR",
                "content": "on my way",
                "createdAt": "2025-06-01T12:00:00Z",
            }
        })
        .to_string();

        match decode_frame(&frame).unwrap() {
            PushEvent::MessageReceived(message) => {
                assert_eq!(message.id, MessageId::Server("m-7".into()));
                assert_eq!(message.content, "on my way");
                assert_eq!(message.status, MessageStatus::Sent);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn status_change_frame_decodes() {
        let frame = json!({
            "event": "message_status",
            "data": {
                "conversationId": "conv-1",
                "messageId": "m-7",
                "status": "read",
            }
        })
        .to_string();

        assert_eq!(
            decode_frame(&frame).unwrap(),
            PushEvent::MessageStatusChanged {
                conversation_id: "conv-1".into(),
                message_id: MessageId::Server("m-7".into()),
                status: MessageStatus::Read,
            }
        );
    }

    #[test]
    fn conversation_updated_frame_decodes() {
        let frame = json!({
            "event": "conversation_updated",
            "data": { "conversationId": "conv-9" }
        })
        .to_string();

        assert_eq!(
            decode_frame(&frame).unwrap(),
            PushEvent::ConversationUpdated {
                conversation_id: "conv-9".into(),
            }
        );
    }

    #[test]
    fn unknown_event_names_are_tolerated() {
        let frame = json!({"event": "fleet_position", "data": {}}).to_string();
        assert_eq!(
            decode_frame(&frame).unwrap(),
            PushEvent::Unknown {
                event: "fleet_position".into(),
            }
        );
    }

    #[test]
    fn malformed_frames_are_errors() {
        assert!(decode_frame("{not json").is_err());
        assert!(decode_frame("{\"data\": {}}").is_err());
        assert!(decode_frame("{\"event\": \"new_message\", \"data\": {\"id\": 5}}").is_err());
    }
}
