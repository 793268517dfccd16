//! The Hub: single authority over live Sessions and room membership
//!
//! All state lives in one `HubState` behind one lock. Every operation takes
//! the lock once, mutates, and releases it before returning, so no caller can
//! observe a Session that is half-removed or a room entry without its Session.
//! The lock is never held across I/O: delivery is a non-blocking enqueue.
//!
//! # Architecture
//!
//! ```text
//! Gateway ──register──▶ Hub ◀──join/leave/unregister── read loops
//!                        │
//!              broadcast_to_room(room, frame)
//!                        │
//!             for each member: try_enqueue ──full/closed──▶ evict
//!                        │
//!                        ▼
//!             Session queue ──▶ write loop ──▶ socket
//! ```

use super::protocol::Frame;
use super::session::{Session, SessionId};
use crate::core::message::ChatId;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

/// Sessions and the room index, always mutated together
#[derive(Default)]
struct HubState {
    /// All registered Sessions indexed by id
    sessions: HashMap<SessionId, Session>,
    /// Room id → member Session ids
    rooms: HashMap<ChatId, HashSet<SessionId>>,
}

impl HubState {
    /// Remove a Session from the global set and from every room it joined
    ///
    /// Returns the Session so the caller decides when its queue closes (on drop).
    fn remove_session(&mut self, session_id: &str) -> Option<Session> {
        let session = self.sessions.remove(session_id)?;
        for room_id in &session.rooms {
            self.remove_member(room_id, session_id);
        }
        Some(session)
    }

    /// Drop one member from a room, discarding the room once empty
    fn remove_member(&mut self, room_id: &str, session_id: &str) {
        if let Some(members) = self.rooms.get_mut(room_id) {
            members.remove(session_id);
            if members.is_empty() {
                self.rooms.remove(room_id);
            }
        }
    }

    /// Enqueue `frame` to each target, evicting those that cannot take it
    fn deliver<'a>(&mut self, targets: impl Iterator<Item = &'a SessionId>, frame: &Frame) -> Delivery {
        let mut delivery = Delivery::default();
        let mut evicted = Vec::new();

        for session_id in targets {
            let Some(session) = self.sessions.get(session_id) else {
                continue;
            };
            match session.try_enqueue(frame.clone()) {
                Ok(()) => delivery.delivered += 1,
                Err(e) => {
                    tracing::warn!(
                        session_id = %session_id,
                        user_id = %session.user_id(),
                        reason = %e,
                        "Evicting session that cannot accept frames"
                    );
                    evicted.push(session_id.clone());
                }
            }
        }

        for session_id in &evicted {
            self.remove_session(session_id);
        }
        delivery.evicted = evicted.len();
        delivery
    }
}

/// Outcome of a broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Sessions whose queue accepted the frame
    pub delivered: usize,
    /// Sessions unregistered because their queue was full or closed
    pub evicted: usize,
}

/// Point-in-time copy of the Hub's indexes, for inspection and invariant checks
#[derive(Debug, Clone, Default)]
pub struct HubSnapshot {
    /// Session id → rooms recorded on the Session
    pub sessions: HashMap<SessionId, HashSet<ChatId>>,
    /// Room id → member Session ids
    pub rooms: HashMap<ChatId, HashSet<SessionId>>,
}

impl HubSnapshot {
    /// Check that both indexes agree
    ///
    /// Every room member is a registered Session that records the room, every
    /// recorded room lists the Session, and no empty room is kept.
    pub fn is_consistent(&self) -> bool {
        let members_registered = self.rooms.iter().all(|(room_id, members)| {
            !members.is_empty()
                && members.iter().all(|id| {
                    self.sessions
                        .get(id)
                        .is_some_and(|rooms| rooms.contains(room_id))
                })
        });

        let rooms_indexed = self.sessions.iter().all(|(id, rooms)| {
            rooms
                .iter()
                .all(|room_id| self.rooms.get(room_id).is_some_and(|m| m.contains(id)))
        });

        members_registered && rooms_indexed
    }
}

/// Serialized registry of Sessions and rooms
pub struct Hub {
    state: RwLock<HubState>,
}

impl Hub {
    /// Create an empty Hub
    pub fn new() -> Self {
        Self {
            state: RwLock::new(HubState::default()),
        }
    }

    /// Take ownership of a Session
    ///
    /// Returns `false` (and drops the argument) if a Session with the same id
    /// is already registered.
    pub async fn register(&self, session: Session) -> bool {
        let mut state = self.state.write().await;
        if state.sessions.contains_key(session.id()) {
            return false;
        }

        tracing::debug!(
            session_id = %session.id(),
            user_id = %session.user_id(),
            "Session registered"
        );
        state.sessions.insert(session.id().to_string(), session);
        true
    }

    /// Remove a Session from the global set and all its rooms, closing its queue
    ///
    /// Returns `false` if it was not registered.
    pub async fn unregister(&self, session_id: &str) -> bool {
        let removed = self.state.write().await.remove_session(session_id);

        match removed {
            Some(session) => {
                tracing::debug!(
                    session_id = %session_id,
                    user_id = %session.user_id(),
                    rooms = session.rooms().len(),
                    "Session unregistered"
                );
                true
            }
            None => false,
        }
    }

    /// Add a registered Session to a room
    ///
    /// Returns `false` if the Session is unknown or already a member.
    pub async fn join_room(&self, session_id: &str, room_id: &str) -> bool {
        let mut state = self.state.write().await;
        let Some(session) = state.sessions.get_mut(session_id) else {
            tracing::debug!(session_id = %session_id, room_id = %room_id, "Join from unregistered session ignored");
            return false;
        };
        if !session.rooms.insert(room_id.to_string()) {
            return false;
        }

        state
            .rooms
            .entry(room_id.to_string())
            .or_default()
            .insert(session_id.to_string());

        tracing::debug!(session_id = %session_id, room_id = %room_id, "Session joined room");
        true
    }

    /// Remove a Session from a room
    ///
    /// Returns `false` if it was not a member.
    pub async fn leave_room(&self, session_id: &str, room_id: &str) -> bool {
        let mut state = self.state.write().await;
        let Some(session) = state.sessions.get_mut(session_id) else {
            return false;
        };
        if !session.rooms.remove(room_id) {
            return false;
        }
        state.remove_member(room_id, session_id);

        tracing::debug!(session_id = %session_id, room_id = %room_id, "Session left room");
        true
    }

    /// Enqueue a frame to every current member of a room
    ///
    /// Members whose queue is full (or already closed) are unregistered in the
    /// same critical section; the others still receive the frame.
    pub async fn broadcast_to_room(&self, room_id: &str, frame: Frame) -> Delivery {
        let mut state = self.state.write().await;
        let Some(members) = state.rooms.get(room_id) else {
            return Delivery::default();
        };
        let members: Vec<SessionId> = members.iter().cloned().collect();

        let delivery = state.deliver(members.iter(), &frame);
        tracing::trace!(
            room_id = %room_id,
            delivered = delivery.delivered,
            evicted = delivery.evicted,
            "Room broadcast"
        );
        delivery
    }

    /// Enqueue a frame to every registered Session, with the same eviction policy
    pub async fn broadcast_all(&self, frame: Frame) -> Delivery {
        let mut state = self.state.write().await;
        let ids: Vec<SessionId> = state.sessions.keys().cloned().collect();
        state.deliver(ids.iter(), &frame)
    }

    /// Number of registered Sessions
    pub async fn connection_count(&self) -> usize {
        self.state.read().await.sessions.len()
    }

    /// Number of rooms with at least one member
    pub async fn room_count(&self) -> usize {
        self.state.read().await.rooms.len()
    }

    pub async fn is_registered(&self, session_id: &str) -> bool {
        self.state.read().await.sessions.contains_key(session_id)
    }

    /// Current members of a room
    pub async fn room_members(&self, room_id: &str) -> HashSet<SessionId> {
        self.state
            .read()
            .await
            .rooms
            .get(room_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Rooms a Session has joined (empty if not registered)
    pub async fn session_rooms(&self, session_id: &str) -> HashSet<ChatId> {
        self.state
            .read()
            .await
            .sessions
            .get(session_id)
            .map(|s| s.rooms().clone())
            .unwrap_or_default()
    }

    /// Whether the user has at least one live Session
    pub async fn is_user_online(&self, user_id: &str) -> bool {
        self.state
            .read()
            .await
            .sessions
            .values()
            .any(|s| s.user_id() == user_id)
    }

    /// Copy both indexes
    pub async fn snapshot(&self) -> HubSnapshot {
        let state = self.state.read().await;
        HubSnapshot {
            sessions: state
                .sessions
                .iter()
                .map(|(id, s)| (id.clone(), s.rooms().clone()))
                .collect(),
            rooms: state.rooms.clone(),
        }
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}
