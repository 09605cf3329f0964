// src/reload/ws.rs

//! WebSocket transport for the reload bus.
//!
//! A blocking accept loop registers each connection on the bus; a writer
//! thread per client pumps broadcast scopes into the socket. The bus only
//! ever sees the channel sender, so a slow or dead socket never blocks a
//! broadcast.

use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;

use tracing::{debug, info, warn};
use tungstenite::WebSocket;

use crate::errors::WatchError;
use crate::reload::{ReloadBus, ReloadScope, ReloadSink, SinkClosed};

/// Bind the reload listener, preferring `port` and falling back to an
/// ephemeral one when it is taken.
fn reserve_port(port: u16) -> Result<(TcpListener, u16), WatchError> {
    let listener = match TcpListener::bind(("127.0.0.1", port)) {
        Ok(sock) => sock,
        Err(_) => TcpListener::bind("127.0.0.1:0").map_err(WatchError::Bind)?,
    };

    let addr = listener.local_addr().map_err(WatchError::Bind)?;
    Ok((listener, addr.port()))
}

/// Accept WebSocket clients and register them on the bus.
///
/// Returns the port actually bound. The accept thread lives for the rest of
/// the process; clients are torn down when they disconnect or when a send
/// fails.
pub fn spawn_listener(bus: Arc<ReloadBus>, port: u16) -> Result<u16, WatchError> {
    let (listener, port) = reserve_port(port)?;
    info!(port, "reload WebSocket listening");

    thread::spawn(move || {
        for stream in listener.incoming() {
            let stream = match stream {
                Ok(stream) => stream,
                Err(err) => {
                    warn!(%err, "reload accept failed");
                    continue;
                }
            };
            match tungstenite::accept(stream) {
                Ok(socket) => connect_client(&bus, socket),
                Err(err) => warn!(%err, "WebSocket handshake failed"),
            }
        }
    });

    Ok(port)
}

fn connect_client(bus: &Arc<ReloadBus>, mut socket: WebSocket<TcpStream>) {
    let (tx, rx) = mpsc::channel::<ReloadScope>();

    // Writer thread: exits on the first failed write, which makes the bus
    // drop this client on its next broadcast.
    thread::spawn(move || {
        while let Ok(scope) = rx.recv() {
            if let Err(err) = socket.send(scope.message().into()) {
                debug!(%err, "reload client write failed");
                break;
            }
        }
        let _ = socket.close(None);
    });

    let handle = bus.connect(Box::new(ChannelSink(tx)));
    debug!(?handle, "reload client accepted");
}

struct ChannelSink(mpsc::Sender<ReloadScope>);

impl ReloadSink for ChannelSink {
    fn send(&mut self, scope: ReloadScope) -> Result<(), SinkClosed> {
        self.0.send(scope).map_err(|_| SinkClosed)
    }
}
