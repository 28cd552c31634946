use futures::{Sink, SinkExt, Stream, StreamExt};
use log::{debug, error, info};
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};

use crate::error::{AuthError, ClientError};
use crate::message::{AuthReply, Message};

/// Send credentials once and wait for the server's single reply frame.
///
/// There is no retry: any failure here ends the session before the duplex
/// handlers start.
pub async fn authenticate<S>(ws: &mut S, participant_label: &str, admin_password: &str) -> Result<(), ClientError>
where
    S: Stream<Item = Result<WsMessage, WsError>> + Sink<WsMessage, Error = WsError> + Unpin,
{
    let credentials = Message::AuthCredentials {
        admin_password: admin_password.to_owned(),
        participant_label: participant_label.to_owned(),
    };
    ws.send(credentials.to_frame()?).await.map_err(AuthError::from)?;

    let text = read_reply(ws).await?;
    let reply: AuthReply = serde_json::from_str(&text).map_err(|e| AuthError::InvalidReply(format!("{e}: {text}")))?;

    if reply.is_success() {
        info!("Server auth reply: {text}");
        info!("Authenticated as participant '{participant_label}'");
        Ok(())
    } else {
        error!("Server auth reply: {text}");
        Err(AuthError::Rejected {
            err_msg: reply.value.err_msg,
        }
        .into())
    }
}

async fn read_reply<S>(ws: &mut S) -> Result<String, AuthError>
where
    S: Stream<Item = Result<WsMessage, WsError>> + Unpin,
{
    while let Some(frame) = ws.next().await {
        match frame {
            Ok(WsMessage::Text(text)) => return Ok(text),
            Ok(WsMessage::Binary(bytes)) => {
                return String::from_utf8(bytes)
                    .map_err(|_| AuthError::InvalidReply("binary reply is not UTF-8".into()));
            }
            Ok(WsMessage::Close(frame)) => {
                debug!("Close frame during handshake: {frame:?}");
                return Err(AuthError::ClosedDuringHandshake);
            }
            // control frames are not the reply
            Ok(_) => continue,
            Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => return Err(AuthError::ClosedDuringHandshake),
            Err(e) => return Err(AuthError::Transport(e)),
        }
    }
    Err(AuthError::ClosedDuringHandshake)
}
