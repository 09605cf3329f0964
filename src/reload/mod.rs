// src/reload/mod.rs

//! Reload bus: track connected development clients and broadcast refresh
//! notifications.
//!
//! The bus is transport-agnostic: anything that can push a notification and
//! report a dead client implements [`ReloadSink`]. The bundled transport is
//! the WebSocket listener in [`ws`].

pub mod ws;

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

/// What a notified client should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadScope {
    /// Full page reload.
    Full,
    /// Non-destructive update (stylesheet swap). Clients that cannot honor
    /// it treat it as `Full`.
    Style,
}

impl ReloadScope {
    /// Wire message understood by the client script.
    pub fn message(self) -> &'static str {
        match self {
            ReloadScope::Full => "reload",
            ReloadScope::Style => "refreshcss",
        }
    }
}

/// Returned by a sink once its client is gone.
#[derive(Debug)]
pub struct SinkClosed;

/// Delivery endpoint for one connected client.
pub trait ReloadSink: Send {
    fn send(&mut self, scope: ReloadScope) -> Result<(), SinkClosed>;
}

/// Identifies a connected client for explicit disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientHandle(u64);

/// The set of connected development clients.
///
/// Broadcast is best-effort fire-and-forget: a client whose sink errors is
/// dropped from the set, never retried. Reload notifications are advisory
/// and superseded by the next one, so there is no backlog for clients that
/// were not connected at broadcast time.
#[derive(Default)]
pub struct ReloadBus {
    clients: Mutex<HashMap<u64, Box<dyn ReloadSink>>>,
    next_id: AtomicU64,
}

impl ReloadBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&self, sink: Box<dyn ReloadSink>) -> ClientHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.clients.lock().unwrap().insert(id, sink);
        debug!(client = id, "reload client connected");
        ClientHandle(id)
    }

    pub fn disconnect(&self, handle: ClientHandle) {
        if self.clients.lock().unwrap().remove(&handle.0).is_some() {
            debug!(client = handle.0, "reload client disconnected");
        }
    }

    /// Send `scope` to every connected client, dropping the ones that fail.
    pub fn broadcast(&self, scope: ReloadScope) {
        let mut clients = self.clients.lock().unwrap();

        let mut gone = Vec::new();
        for (id, sink) in clients.iter_mut() {
            if sink.send(scope).is_err() {
                gone.push(*id);
            }
        }
        for id in gone {
            clients.remove(&id);
            debug!(client = id, "reload client dropped (send failed)");
        }

        debug!(?scope, clients = clients.len(), "reload broadcast");
    }

    pub fn client_count(&self) -> usize {
        self.clients.lock().unwrap().len()
    }
}
