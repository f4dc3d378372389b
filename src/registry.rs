//! Live socket connections, keyed by a per-connection id.
//!
//! Handlers never hold a connection themselves, they look it up here by id.
//! Disconnected connections are simply absent.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use crate::protocol::{ServerEvent, User};

pub type ConnId = Uuid;

/// What the writer half of a socket should do next.
#[derive(Debug, Clone)]
pub enum Outbound {
    Event(ServerEvent),
    Close,
}

pub type OutboundTx = mpsc::UnboundedSender<Outbound>;
pub type OutboundRx = mpsc::UnboundedReceiver<Outbound>;

#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub user: User,
    pub client_version: String,
    pub project_uid: Option<String>,
    pub auth_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConnState {
    Connected,
    Identified(Identity),
    /// Rejected; waiting for the socket to go away. Nothing more is processed.
    Closing,
}

struct Connection {
    tx: OutboundTx,
    state: ConnState,
}

#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    conns: Arc<RwLock<HashMap<ConnId, Connection>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self) -> (ConnId, OutboundRx) {
        let id = Uuid::now_v7();
        let (tx, rx) = mpsc::unbounded_channel();
        self.conns.write().await.insert(
            id,
            Connection {
                tx,
                state: ConnState::Connected,
            },
        );
        (id, rx)
    }

    /// Dropping the entry drops its sender, which ends the writer loop.
    pub async fn unregister(&self, id: ConnId) -> Option<ConnState> {
        self.conns.write().await.remove(&id).map(|conn| conn.state)
    }

    /// Returns false when the connection is gone or closing.
    pub async fn identify(&self, id: ConnId, identity: Identity) -> bool {
        match self.conns.write().await.get_mut(&id) {
            Some(conn) if conn.state != ConnState::Closing => {
                conn.state = ConnState::Identified(identity);
                true
            }
            _ => false,
        }
    }

    pub async fn state(&self, id: ConnId) -> Option<ConnState> {
        self.conns.read().await.get(&id).map(|conn| conn.state.clone())
    }

    pub async fn identity(&self, id: ConnId) -> Option<Identity> {
        match self.state(id).await? {
            ConnState::Identified(identity) => Some(identity),
            ConnState::Connected | ConnState::Closing => None,
        }
    }

    /// Nothing reaches a connection once it is closing.
    pub async fn send_to(&self, id: ConnId, event: ServerEvent) -> bool {
        match self.conns.read().await.get(&id) {
            Some(conn) if conn.state != ConnState::Closing => conn.tx.send(Outbound::Event(event)).is_ok(),
            _ => false,
        }
    }

    /// Freezes the connection and tells its writer to hang up once the queue is flushed.
    pub async fn close(&self, id: ConnId) {
        if let Some(conn) = self.conns.write().await.get_mut(&id) {
            conn.state = ConnState::Closing;
            let _ = conn.tx.send(Outbound::Close);
        }
    }

    /// Sends to every identified connection, the sender included. Returns how many got it.
    pub async fn broadcast_all(&self, event: ServerEvent) -> usize {
        self.broadcast(event, None).await
    }

    pub async fn broadcast_except(&self, except: ConnId, event: ServerEvent) -> usize {
        self.broadcast(event, Some(except)).await
    }

    async fn broadcast(&self, event: ServerEvent, except: Option<ConnId>) -> usize {
        let conns = self.conns.read().await;
        let mut sent = 0;
        for (id, conn) in conns.iter() {
            if Some(*id) == except || !matches!(conn.state, ConnState::Identified(_)) {
                continue;
            }
            // a socket whose writer already stopped just misses the event
            if conn.tx.send(Outbound::Event(event.clone())).is_ok() {
                sent += 1;
            }
        }
        sent
    }

    pub async fn len(&self) -> usize {
        self.conns.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.conns.read().await.is_empty()
    }
}
