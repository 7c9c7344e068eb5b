//! Live WebSocket sessions and broadcast.
//!
//! Each connection owns a bounded outbound queue. Broadcasting snapshots the
//! membership first so sessions can come and go while messages are sent.

use crate::dev::environment::Environment;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::mpsc::{self, error::TrySendError};

/// Messages waiting per connection before broadcasts to it are dropped.
pub const OUTBOUND_CAPACITY: usize = 16;

/// Opaque handle for one live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

/// What the server pushes to connected pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerMessage {
    /// Rebuild finished, reload the page.
    Reload,
    /// Server is shutting down; close with a normal closure.
    Close,
}

impl ServerMessage {
    /// Text frame payload, if the message is sent as one.
    pub fn as_text(&self) -> Option<&'static str> {
        match self {
            ServerMessage::Reload => Some("reload"),
            ServerMessage::Close => None,
        }
    }
}

#[derive(Debug)]
struct Connection {
    sender: mpsc::Sender<ServerMessage>,
    environment: Environment,
}

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, Connection>>,
    next_id: AtomicU64,
    /// Set by `close_all`; later sessions are closed on arrival.
    closed: AtomicBool,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session. The receiver yields the messages broadcast to it.
    ///
    /// After [`close_all`](Self::close_all) the session is not registered and
    /// its receiver yields [`ServerMessage::Close`] straight away.
    pub fn register(&self, environment: Environment) -> (ConnectionId, mpsc::Receiver<ServerMessage>) {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = mpsc::channel(OUTBOUND_CAPACITY);

        {
            // Checked under the write lock so `close_all` cannot miss a session.
            let mut connections = self.connections.write();
            if self.closed.load(Ordering::Acquire) {
                drop(connections);
                let _ = sender.try_send(ServerMessage::Close);
                tracing::debug!(?id, "Refused WebSocket after shutdown began");
                return (id, receiver);
            }
            connections.insert(
                id,
                Connection {
                    sender,
                    environment,
                },
            );
        }

        tracing::debug!(?id, ?environment, "WebSocket connected");
        (id, receiver)
    }

    pub fn unregister(&self, id: ConnectionId) {
        if self.connections.write().remove(&id).is_some() {
            tracing::debug!(?id, "WebSocket disconnected");
        }
    }

    /// Send `message` to every registered session. Returns how many accepted it.
    ///
    /// A session whose queue is full misses this message. A session whose
    /// receiver is gone is mid-close and gets removed.
    pub fn broadcast(&self, message: ServerMessage) -> usize {
        let snapshot: Vec<(ConnectionId, mpsc::Sender<ServerMessage>)> = self
            .connections
            .read()
            .iter()
            .map(|(id, conn)| (*id, conn.sender.clone()))
            .collect();

        let mut delivered = 0;
        let mut closed = Vec::new();

        for (id, sender) in snapshot {
            match sender.try_send(message) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::debug!(?id, ?message, "Outbound queue full, dropping message");
                }
                Err(TrySendError::Closed(_)) => closed.push(id),
            }
        }

        if !closed.is_empty() {
            let mut connections = self.connections.write();
            for id in closed {
                connections.remove(&id);
            }
        }

        delivered
    }

    /// Ask every session to close, forget them all and refuse new ones.
    pub fn close_all(&self) {
        let drained: Vec<Connection> = {
            let mut connections = self.connections.write();
            self.closed.store(true, Ordering::Release);
            connections.drain().map(|(_, c)| c).collect()
        };
        for connection in drained {
            // A full queue still closes: dropping the sender ends the session's receive loop.
            let _ = connection.sender.try_send(ServerMessage::Close);
        }
    }

    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.read().is_empty()
    }

    pub fn environment(&self, id: ConnectionId) -> Option<Environment> {
        self.connections.read().get(&id).map(|c| c.environment)
    }
}
