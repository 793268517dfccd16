//! Per-connection state and the read/write loops
//!
//! Each live connection gets:
//!
//! 1. A [`Session`] owned by the [`Hub`](super::hub::Hub): id, user id, the
//!    sending side of a bounded outbound queue and the set of joined rooms
//! 2. A read loop that decodes frames and dispatches them
//! 3. A write loop that drains the queue and sends keepalive pings
//!
//! The two loops only share the queue and the socket. Whichever ends first
//! takes the Session down: the read side through `Hub::unregister`, which
//! drops the queue sender and lets the write loop exit. A write-side failure
//! is noticed by the read loop between frames, never in the middle of a
//! dispatch.

use super::dispatch::{SessionContext, dispatch};
use super::protocol::{self, Frame};
use crate::core::error::ChatError;
use crate::core::message::{ChatId, UserId};
use crate::server::host::ServerHost;
use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::{SplitSink, SplitStream, StreamExt};
use futures::SinkExt;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at, timeout};
use uuid::Uuid;

/// Opaque connection identifier
pub type SessionId = String;

/// Server-side state for one live connection
///
/// Created by the gateway, then moved into the Hub on registration. Dropping
/// it closes the outbound queue.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    user_id: UserId,
    outbound: mpsc::Sender<Frame>,
    pub(super) rooms: HashSet<ChatId>,
}

impl Session {
    /// Create a Session with a fresh id and a queue of `capacity` frames
    ///
    /// Returns the receiving side of the queue for the write loop.
    pub fn new(user_id: impl Into<UserId>, capacity: usize) -> (Self, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let session = Self {
            id: format!("conn_{}", Uuid::new_v4().simple()),
            user_id: user_id.into(),
            outbound: tx,
            rooms: HashSet::new(),
        };
        (session, rx)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Rooms this Session currently belongs to
    pub fn rooms(&self) -> &HashSet<ChatId> {
        &self.rooms
    }

    /// Non-blocking enqueue; fails when the queue is full or the write loop is gone
    pub(super) fn try_enqueue(&self, frame: Frame) -> Result<(), TrySendError<Frame>> {
        self.outbound.try_send(frame)
    }
}

/// Connection lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Upgrade request received, identity not yet known
    Connecting,
    /// Identity resolved, upgrade pending
    Authenticated,
    /// Registered with the Hub and running both loops
    Active,
    /// Resources released; terminal
    Closed,
    /// Authentication failed; terminal, no Session was ever created
    Rejected,
}

impl SessionState {
    /// Whether `next` is a legal successor of this state
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Connecting, Authenticated)
                | (Connecting, Rejected)
                | (Authenticated, Active)
                | (Authenticated, Closed)
                | (Active, Closed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Rejected)
    }
}

/// Tracks one connection through its lifecycle
#[derive(Debug)]
pub struct SessionLifecycle {
    state: SessionState,
}

impl SessionLifecycle {
    pub fn new() -> Self {
        Self {
            state: SessionState::Connecting,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Move to `next`; illegal transitions are ignored and reported as `false`
    pub fn transition(&mut self, next: SessionState) -> bool {
        if !self.state.can_transition_to(next) {
            tracing::warn!(from = ?self.state, to = ?next, "Ignoring invalid session transition");
            return false;
        }
        tracing::trace!(from = ?self.state, to = ?next, "Session state transition");
        self.state = next;
        true
    }
}

impl Default for SessionLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Liveness timings, taken from `ChatConfig`
#[derive(Debug, Clone, Copy)]
pub struct Keepalive {
    /// Idle read deadline
    pub pong_wait: Duration,
    /// Interval between pings
    pub ping_period: Duration,
    /// Deadline for one write
    pub write_wait: Duration,
}

/// Drive a registered Session until either loop ends, then clean up
///
/// The Session must already be registered with `host.hub`.
pub async fn run(
    socket: WebSocket,
    host: Arc<ServerHost>,
    ctx: SessionContext,
    queue: mpsc::Receiver<Frame>,
    mut lifecycle: SessionLifecycle,
) {
    let keepalive = host.keepalive();
    let (sink, mut stream) = socket.split();

    let mut writer = tokio::spawn(write_loop(sink, queue, keepalive, ctx.session_id.clone()));

    let outcome = read_loop(&mut stream, &mut writer, &host, &ctx, keepalive).await;

    match &outcome {
        Ok(()) => tracing::debug!(session_id = %ctx.session_id, "Connection closed by peer"),
        Err(e) => tracing::debug!(session_id = %ctx.session_id, error = %e, "Connection failed"),
    }

    // Dropping the queue sender lets the write loop send a close frame and exit
    host.hub.unregister(&ctx.session_id).await;

    if !writer.is_finished() && timeout(keepalive.write_wait, &mut writer).await.is_err() {
        writer.abort();
    }

    lifecycle.transition(SessionState::Closed);
}

/// Receive frames until the peer goes away, errors, stays silent too long, or
/// the write loop ends
///
/// Any frame, including pongs, re-arms the idle deadline. The write loop is
/// only watched while waiting for the next frame, so a dispatch that has
/// started always runs to completion.
async fn read_loop(
    stream: &mut SplitStream<WebSocket>,
    writer: &mut JoinHandle<Result<(), ChatError>>,
    host: &ServerHost,
    ctx: &SessionContext,
    keepalive: Keepalive,
) -> Result<(), ChatError> {
    loop {
        let next = tokio::select! {
            next = timeout(keepalive.pong_wait, stream.next()) => {
                next.map_err(|_| ChatError::transport("read deadline exceeded"))?
            }
            res = &mut *writer => {
                return res.unwrap_or_else(|e| Err(ChatError::transport(e)));
            }
        };

        let decoded = match next {
            Some(Ok(Message::Text(text))) => protocol::decode(text.as_str()),
            Some(Ok(Message::Binary(bytes))) => {
                std::str::from_utf8(&bytes).ok().and_then(protocol::decode)
            }
            Some(Ok(Message::Close(_))) | None => return Ok(()),
            // Ping/Pong only refresh the deadline; axum answers pings itself
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(ChatError::transport(e)),
        };

        match decoded {
            Some(msg) => dispatch(host, ctx, msg).await,
            None => tracing::debug!(session_id = %ctx.session_id, "Dropped unrecognized frame"),
        }
    }
}

/// Flush queued frames and ping on a fixed interval
///
/// Ends when the queue is closed (after a best-effort close frame) or when a
/// write misses its deadline or fails.
async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut queue: mpsc::Receiver<Frame>,
    keepalive: Keepalive,
    session_id: SessionId,
) -> Result<(), ChatError> {
    let mut ticker = interval_at(Instant::now() + keepalive.ping_period, keepalive.ping_period);

    let result = loop {
        tokio::select! {
            frame = queue.recv() => match frame {
                Some(frame) => {
                    let msg = Message::Text(frame.to_string().into());
                    if let Err(e) = write_frame(&mut sink, msg, keepalive.write_wait).await {
                        break Err(e);
                    }
                }
                None => {
                    let _ = write_frame(&mut sink, Message::Close(None), keepalive.write_wait).await;
                    break Ok(());
                }
            },
            _ = ticker.tick() => {
                if let Err(e) = write_frame(&mut sink, Message::Ping(Bytes::new()), keepalive.write_wait).await {
                    break Err(e);
                }
            }
        }
    };

    if let Err(e) = &result {
        tracing::debug!(session_id = %session_id, error = %e, "WebSocket write failed, closing");
    }
    let _ = timeout(keepalive.write_wait, sink.close()).await;
    result
}

async fn write_frame(
    sink: &mut SplitSink<WebSocket, Message>,
    msg: Message,
    deadline: Duration,
) -> Result<(), ChatError> {
    match timeout(deadline, sink.send(msg)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(ChatError::transport(e)),
        Err(_) => Err(ChatError::transport("write deadline exceeded")),
    }
}
