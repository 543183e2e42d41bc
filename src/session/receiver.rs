use anyhow::Result;
use futures::{Stream, StreamExt};
use std::io::Write;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, error, info};

use super::dispatcher::{Dispatch, SegmentDispatcher, SessionEvent};
use crate::translator::TranslationResult;

/// Map a WebSocket message to a dispatcher event.
///
/// Continuation frames are reassembled by the transport, so every message
/// arrives complete and binary payloads are always final fragments. Control
/// frames carry nothing for the dispatcher.
pub fn classify(message: Message) -> Option<SessionEvent> {
    match message {
        Message::Text(text) => Some(SessionEvent::text(text)),
        Message::Binary(data) => Some(SessionEvent::binary(data, true)),
        Message::Close(frame) => {
            if let Some(frame) = frame {
                info!(
                    "Server closed connection: {} {}",
                    u16::from(frame.code),
                    frame.reason
                );
            }
            Some(SessionEvent::Closed)
        }
        Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => None,
    }
}

/// Feed every inbound message through `dispatcher` until the connection ends.
///
/// Returns the final [`Dispatch::Disconnected`]. Segment files are written
/// inline, so a slow disk delays the next message; a storage failure is
/// returned as an error.
pub async fn receive_messages<St>(mut stream: St, dispatcher: &mut SegmentDispatcher) -> Result<Dispatch>
where
    St: Stream<Item = Result<Message, WsError>> + Unpin,
{
    dispatcher.handle(SessionEvent::Opened)?;
    info!("Receiving translation results");

    while let Some(item) = stream.next().await {
        let event = match item {
            Ok(message) => match classify(message) {
                Some(event) => event,
                None => continue,
            },
            Err(e) => SessionEvent::Errored(e.to_string()),
        };

        let dispatch = dispatcher.handle(event)?;
        report(&dispatch);

        if matches!(dispatch, Dispatch::Disconnected { .. }) {
            return Ok(dispatch);
        }
    }

    let dispatch = dispatcher.handle(SessionEvent::Closed)?;
    report(&dispatch);
    Ok(dispatch)
}

/// Surface a dispatch result to the operator
pub fn report(dispatch: &Dispatch) {
    match dispatch {
        Dispatch::Text(text) => display_text(text),
        Dispatch::FragmentAppended { sequence, bytes } => {
            debug!("Segment #{}: +{} bytes", sequence, bytes)
        }
        Dispatch::Disconnected {
            error: Some(reason),
            ..
        } => error!("Connection error: {}", reason),
        Dispatch::Disconnected { error: None, .. } => info!("Connection closed"),
        Dispatch::Connected | Dispatch::SegmentCompleted(_) => {}
    }
}

fn display_text(text: &str) {
    match TranslationResult::parse(text) {
        Some(result) if result.is_partial() => {
            print!("\r{}", result.recognition);
            std::io::stdout().flush().ok();
        }
        Some(result) => {
            println!("\n{}", result.recognition);
            if let Some(translation) = &result.translation {
                println!("  → {}", translation);
            }
        }
        None => info!("Service message: {}", text),
    }
}
