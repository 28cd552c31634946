//! Supervisor: one authenticated connection lifetime, from handshake to teardown.

use std::fmt;
use std::future::Future;
use std::pin::pin;
use std::time::Duration;

use futures::future::{self, Either};
use futures::{FutureExt, Sink, SinkExt, StreamExt};
use log::{debug, error, info, warn};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tokio_tungstenite::{WebSocketStream, connect_async};

use crate::config::{ConfigResolver, SessionConfig};
use crate::context::ControlState;
use crate::error::ClientError;
use crate::handshake::authenticate;
use crate::source::{self, DeviceFeed, SampleSource};
use crate::{inbound, outbound};

/// Upper bound on the closing handshake once both halves have stopped.
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// How a session ended. Exactly one of these is reported per session.
#[derive(Debug)]
pub enum SessionEnd {
    /// The server closed the connection with an expected close code.
    Closed { code: Option<u16>, reason: String },
    /// The sample source ran dry; the incomplete batch was discarded.
    SourceExhausted { source: String },
    /// Local shutdown request.
    Interrupted,
    Failed(ClientError),
}

/// Condition kinds used to de-duplicate reports from the two halves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EndKind {
    Closed,
    SourceExhausted,
    Interrupted,
    Config,
    Auth,
    Source,
    Connection,
    Internal,
}

impl SessionEnd {
    pub fn kind(&self) -> EndKind {
        match self {
            SessionEnd::Closed { .. } => EndKind::Closed,
            SessionEnd::SourceExhausted { .. } => EndKind::SourceExhausted,
            SessionEnd::Interrupted => EndKind::Interrupted,
            SessionEnd::Failed(e) => match e {
                ClientError::Config(_) => EndKind::Config,
                ClientError::Auth(_) => EndKind::Auth,
                ClientError::Source(_) => EndKind::Source,
                ClientError::Connect { .. } | ClientError::ClosedAbnormally { .. } | ClientError::Transport(_) => {
                    EndKind::Connection
                }
                ClientError::Serialize(_) | ClientError::ControlClosed => EndKind::Internal,
            },
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, SessionEnd::Failed(_))
    }

    fn log(&self) {
        match self {
            SessionEnd::Closed { .. } | SessionEnd::Interrupted => info!("{self}"),
            _ => error!("{self}"),
        }
    }
}

impl From<Result<SessionEnd, ClientError>> for SessionEnd {
    fn from(result: Result<SessionEnd, ClientError>) -> Self {
        result.unwrap_or_else(SessionEnd::Failed)
    }
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEnd::Closed { code: Some(code), reason } => {
                write!(f, "Disconnected from server (code {code}): {reason}")
            }
            SessionEnd::Closed { code: None, .. } => write!(f, "Disconnected from server"),
            SessionEnd::SourceExhausted { source } => write!(
                f,
                "{source} has no more data and the incomplete batch will not be sent. Shutting down"
            ),
            SessionEnd::Interrupted => write!(f, "Interrupted. Shutting down"),
            SessionEnd::Failed(e @ (ClientError::ClosedAbnormally { .. } | ClientError::Transport(_))) => {
                write!(f, "Disconnected from server unexpectedly: {e}")
            }
            SessionEnd::Failed(e) => write!(f, "Session failed: {e}"),
        }
    }
}

/// Owns the start-up config and the sample source for one session.
pub struct Supervisor {
    config: SessionConfig,
    source: Box<dyn SampleSource>,
}

impl Supervisor {
    pub fn new(config: SessionConfig, source: Box<dyn SampleSource>) -> Self {
        Self { config, source }
    }

    /// Open the source named in `config`. A live-device source also hands back
    /// the feed its capture task pushes into.
    pub fn from_config(config: SessionConfig) -> Result<(Self, Option<DeviceFeed>), ClientError> {
        let (source, feed) = source::open(&config.source)?;
        Ok((Self::new(config, source), feed))
    }

    /// Connect to the configured server and run one session until it ends or
    /// `shutdown` resolves.
    pub async fn run<F>(self, shutdown: F) -> SessionEnd
    where
        F: Future<Output = ()>,
    {
        info!("Connecting to {}", self.config.url);
        let connected = connect_async(self.config.url.as_str()).await;
        match connected {
            Ok((ws, _response)) => self.run_on(ws, shutdown).await,
            Err(source) => report(
                SessionEnd::Failed(ClientError::Connect {
                    url: self.config.url.clone(),
                    source,
                }),
                None,
            ),
        }
    }

    /// Run a session over an already-open websocket.
    pub async fn run_on<S, F>(mut self, mut ws: WebSocketStream<S>, shutdown: F) -> SessionEnd
    where
        S: AsyncRead + AsyncWrite + Unpin,
        F: Future<Output = ()>,
    {
        let label = &self.config.participant_label;
        if let Err(e) = authenticate(&mut ws, label, &self.config.admin_password).await {
            close_quietly(&mut ws).await;
            return report(SessionEnd::Failed(e), None);
        }

        let state = ControlState::new();
        let resolver = ConfigResolver::from_session(&self.config);
        let (mut sink, mut stream) = ws.split();

        let (primary, secondary) = race(
            inbound::run(&mut stream, &state, resolver),
            outbound::run(&mut sink, &state, self.source.as_mut(), self.config.auto_send),
            shutdown,
        )
        .await;

        // both halves have unwound; the socket is closed exactly once
        close_quietly(&mut sink).await;
        report(primary, secondary)
    }
}

/// Wait for the first half to finish, or for `shutdown`.
///
/// The other half is polled once more so a failure it has already hit (the
/// same dropped connection, usually) is not lost, then cancelled.
async fn race<I, O, F>(inbound: I, outbound: O, shutdown: F) -> (SessionEnd, Option<SessionEnd>)
where
    I: Future<Output = Result<SessionEnd, ClientError>>,
    O: Future<Output = Result<SessionEnd, ClientError>>,
    F: Future<Output = ()>,
{
    let inbound = pin!(inbound);
    let outbound = pin!(outbound);
    let shutdown = pin!(shutdown);

    match future::select(future::select(inbound, outbound), shutdown).await {
        Either::Left((Either::Left((first, outbound)), _)) => {
            debug!("Inbound handler finished first, cancelling outbound");
            (first.into(), outbound.now_or_never().map(SessionEnd::from))
        }
        Either::Left((Either::Right((first, inbound)), _)) => {
            debug!("Outbound handler finished first, cancelling inbound");
            (first.into(), inbound.now_or_never().map(SessionEnd::from))
        }
        Either::Right(((), _duplex)) => (SessionEnd::Interrupted, None),
    }
}

/// Log the session's terminating condition once and return it.
fn report(primary: SessionEnd, secondary: Option<SessionEnd>) -> SessionEnd {
    primary.log();
    if let Some(secondary) = dedupe(&primary, secondary) {
        debug!("Also observed while shutting down: {secondary}");
    }
    primary
}

/// Drop `secondary` when it is the same kind of condition as `primary`.
fn dedupe(primary: &SessionEnd, secondary: Option<SessionEnd>) -> Option<SessionEnd> {
    secondary.filter(|end| end.kind() != primary.kind())
}

async fn close_quietly<K>(sink: &mut K)
where
    K: Sink<WsMessage, Error = WsError> + Unpin,
{
    match tokio::time::timeout(CLOSE_TIMEOUT, sink.close()).await {
        Ok(Ok(())) => debug!("Connection closed"),
        Ok(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) => {}
        Ok(Err(e)) => debug!("Error while closing connection: {e}"),
        Err(_) => warn!("Closing handshake timed out after {CLOSE_TIMEOUT:?}"),
    }
}
