use futures::{Stream, StreamExt};
use log::{debug, info, warn};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};

use crate::config::ConfigResolver;
use crate::context::ControlState;
use crate::error::ClientError;
use crate::message::{Inbound, Message, RecCommand, decode_inbound};
use crate::session::SessionEnd;

/// Code reported when the peer vanished without a closing handshake.
const ABNORMAL_CLOSURE: u16 = 1006;

/// Read server frames until the connection closes, updating `state`.
///
/// Malformed frames and unknown types are logged and skipped. A close with
/// code 1000/1001 (or no code) ends the handler normally; anything else is
/// a connection error.
pub async fn run<S>(
    stream: &mut S,
    state: &ControlState,
    mut resolver: ConfigResolver,
) -> Result<SessionEnd, ClientError>
where
    S: Stream<Item = Result<WsMessage, WsError>> + Unpin,
{
    while let Some(frame) = stream.next().await {
        match frame? {
            WsMessage::Text(text) => handle_text(&text, state, &mut resolver),
            WsMessage::Close(frame) => return close_outcome(frame),
            WsMessage::Binary(bytes) => warn!("Ignoring {}-byte binary frame from server", bytes.len()),
            _ => {}
        }
    }

    Err(ClientError::ClosedAbnormally {
        code: ABNORMAL_CLOSURE,
        reason: "connection dropped without a close frame".into(),
    })
}

fn handle_text(text: &str, state: &ControlState, resolver: &mut ConfigResolver) {
    debug!("Server frame: {text}");

    match decode_inbound(text) {
        Ok(Inbound::Message(Message::RecCmd { cmd })) => apply_command(cmd, state),
        Ok(Inbound::Message(Message::ClientConfig(advertised))) => {
            if let Some(resolved) = resolver.apply(advertised) {
                info!(
                    "Session config ready: send_rate={}, sample_rate_per_send={}",
                    resolved.send_rate, resolved.sample_rate_per_send
                );
                state.publish_config(resolved);
            }
        }
        Ok(Inbound::Message(other)) => debug!("Ignoring outbound-only message from server: {other:?}"),
        Ok(Inbound::Unknown(kind)) => debug!("Ignoring frame of unknown type '{kind}'"),
        Err(e) => warn!("Ignoring malformed frame from server ({e}): {text}"),
    }
}

fn apply_command(cmd: RecCommand, state: &ControlState) {
    let enable = matches!(cmd, RecCommand::Start);
    if state.sending_enabled() != enable {
        info!("Recording command {cmd:?}: sending {}", if enable { "enabled" } else { "disabled" });
    }
    state.set_sending(enable);
}

fn close_outcome(frame: Option<CloseFrame<'_>>) -> Result<SessionEnd, ClientError> {
    match frame {
        None => Ok(SessionEnd::Closed {
            code: None,
            reason: String::new(),
        }),
        Some(CloseFrame { code, reason }) if matches!(code, CloseCode::Normal | CloseCode::Away) => {
            Ok(SessionEnd::Closed {
                code: Some(code.into()),
                reason: reason.into_owned(),
            })
        }
        Some(CloseFrame { code, reason }) => Err(ClientError::ClosedAbnormally {
            code: code.into(),
            reason: reason.into_owned(),
        }),
    }
}
