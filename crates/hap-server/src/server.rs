use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{RwLock, broadcast, mpsc};

use hap_core::{AccessoryHandler, ConnectionAction, ConnectionConfig, ConnectionEngine, Environment, HandlerError};

use crate::error::ServerError;
use crate::registry::ConnectionRegistry;
use crate::system_env::SystemEnv;

/// Size of the read buffer used for each `recv` on a connection's socket.
const READ_BUFFER_SIZE: usize = 8192;

/// How often each connection's task checks its own idle timeout. Kept well
/// under any reasonable `ConnectionConfig::idle_timeout` so the timeout
/// fires close to on time without a dedicated timer per connection.
const TICK_INTERVAL: Duration = Duration::from_secs(30);

/// Tuning knobs for the server's connection handling.
#[derive(Debug, Clone, Copy)]
pub struct ServerConfig {
    /// Per-connection engine configuration (idle timeout, etc).
    pub connection: ConnectionConfig,
    /// Maximum number of concurrent connections the server will accept.
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { connection: ConnectionConfig::default(), max_connections: 10_000 }
    }
}

/// Everything needed to bind and run a [`Server`].
#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    /// Address to bind the listening socket to, e.g. `"0.0.0.0:51826"`.
    pub bind_address: String,
    /// Connection-handling configuration.
    pub server: ServerConfig,
}

impl Default for ServerRuntimeConfig {
    fn default() -> Self {
        Self { bind_address: "0.0.0.0:0".to_string(), server: ServerConfig::default() }
    }
}

struct SharedState {
    registry: RwLock<ConnectionRegistry>,
    shutdown: broadcast::Sender<()>,
}

/// A cheaply cloneable reference to a running [`Server`]'s shared state.
///
/// [`Server::run`] consumes the server to drive its accept loop, so a
/// caller that needs to push events, inspect connection counts, or stop
/// the server while it is running obtains a `ServerHandle` beforehand via
/// [`Server::handle`].
#[derive(Clone)]
pub struct ServerHandle {
    state: Arc<SharedState>,
}

impl ServerHandle {
    /// Number of currently connected controllers.
    pub async fn connection_count(&self) -> usize {
        self.state.registry.read().await.session_count()
    }

    /// Push an out-of-band event to `peer`, if it is currently connected.
    /// The body is encrypted on the connection's own task before being
    /// written, so it reaches the wire encrypted whenever the connection
    /// has completed its pairing handoff. Returns `false` if `peer` is not
    /// a registered connection.
    pub async fn push_event(&self, peer: SocketAddr, body: Bytes) -> bool {
        self.state.registry.read().await.push_event(&peer, body)
    }

    /// Stop the server: the accept loop exits (closing the listening
    /// socket) and every currently registered connection is signalled to
    /// close. Any deferred response in flight on a connection resolves as
    /// a close rather than completing normally.
    pub fn stop(&self) {
        let _ = self.state.shutdown.send(());
    }
}

/// Plain-TCP HAP accessory server.
pub struct Server<H: AccessoryHandler + 'static> {
    listener: TcpListener,
    handler: Arc<H>,
    state: Arc<SharedState>,
    config: ServerConfig,
}

impl<H: AccessoryHandler + 'static> Server<H> {
    /// Bind the listening socket. Does not start accepting connections
    /// yet; call [`Self::run`] for that.
    pub async fn bind(config: ServerRuntimeConfig, handler: H) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(&config.bind_address).await.map_err(ServerError::Transport)?;
        let (shutdown, _) = broadcast::channel(1);
        Ok(Self {
            listener,
            handler: Arc::new(handler),
            state: Arc::new(SharedState { registry: RwLock::new(ConnectionRegistry::new()), shutdown }),
            config: config.server,
        })
    }

    /// The address actually bound, useful when the configured address used
    /// an ephemeral port.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener.local_addr().map_err(ServerError::Transport)
    }

    /// Number of currently connected controllers.
    pub async fn connection_count(&self) -> usize {
        self.state.registry.read().await.session_count()
    }

    /// Push an out-of-band event to `peer`, if it is currently connected.
    /// The body is encrypted on the connection's own task before being
    /// written, so it reaches the wire encrypted whenever the connection
    /// has completed its pairing handoff. Returns `false` if `peer` is not
    /// a registered connection.
    pub async fn push_event(&self, peer: SocketAddr, body: Bytes) -> bool {
        self.state.registry.read().await.push_event(&peer, body)
    }

    /// Obtain a cloneable handle for pushing events, reading connection
    /// counts, or stopping the server from another task while [`Self::run`]
    /// drives the accept loop.
    #[must_use]
    pub fn handle(&self) -> ServerHandle {
        ServerHandle { state: Arc::clone(&self.state) }
    }

    /// Stop the server: the accept loop exits (closing the listening
    /// socket) and every currently registered connection is signalled to
    /// close. Any deferred response in flight on a connection resolves as
    /// a close rather than completing normally.
    pub fn stop(&self) {
        let _ = self.state.shutdown.send(());
    }

    /// Accept connections until the listener errors or [`Self::stop`] (or
    /// [`ServerHandle::stop`]) is called.
    pub async fn run(self) -> Result<(), ServerError> {
        let env = SystemEnv::new();
        let mut shutdown_rx = self.state.shutdown.subscribe();

        loop {
            tokio::select! {
                accept_result = self.listener.accept() => {
                    let (stream, peer_addr) = accept_result.map_err(ServerError::Transport)?;

                    if self.state.registry.read().await.session_count() >= self.config.max_connections {
                        tracing::warn!(%peer_addr, "rejecting connection: at max_connections");
                        drop(stream);
                        continue;
                    }

                    let handler = Arc::clone(&self.handler);
                    let state = Arc::clone(&self.state);
                    let connection_config = self.config.connection;
                    let conn_shutdown = self.state.shutdown.subscribe();

                    tokio::spawn(async move {
                        if let Err(error) =
                            handle_connection(stream, peer_addr, handler, state.clone(), env, connection_config, conn_shutdown).await
                        {
                            tracing::warn!(%peer_addr, %error, "connection closed with error");
                        }
                        state.registry.write().await.unregister(&peer_addr);
                    });
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("server stopping: closing listener");
                    return Ok(());
                }
            }
        }
    }
}

async fn handle_connection<H: AccessoryHandler + 'static, E: Environment>(
    stream: TcpStream,
    peer_addr: SocketAddr,
    handler: Arc<H>,
    state: Arc<SharedState>,
    env: E,
    config: ConnectionConfig,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), ServerError> {
    tracing::info!(%peer_addr, "connection accepted");

    let (mut read_half, mut write_half) = stream.into_split();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Bytes>();
    state.registry.write().await.register(peer_addr, event_tx);

    let mut engine = ConnectionEngine::new(handler, env.clone(), config);
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    let mut ticker = tokio::time::interval(TICK_INTERVAL);
    ticker.tick().await; // first tick fires immediately; consume it

    loop {
        tokio::select! {
            read_result = read_half.read(&mut buf) => {
                let n = read_result.map_err(ServerError::Transport)?;
                if n == 0 {
                    tracing::info!(%peer_addr, "connection closed by peer");
                    break;
                }
                let actions = engine.receive(&buf[..n])?;
                if !execute_actions(actions, &mut write_half, &mut engine, &mut shutdown).await? {
                    break;
                }
            }
            event = event_rx.recv() => {
                match event {
                    Some(body) => {
                        let frame = hap_http::Response::event_push(body);
                        let wire = engine.encode_event(frame)?;
                        write_half.write_all(&wire).await.map_err(ServerError::Transport)?;
                    },
                    None => break,
                }
            }
            _ = ticker.tick() => {
                let actions = engine.tick(env.now());
                if !execute_actions(actions, &mut write_half, &mut engine, &mut shutdown).await? {
                    break;
                }
            }
            _ = shutdown.recv() => {
                tracing::debug!(%peer_addr, "closing connection for server shutdown");
                break;
            }
        }
    }

    Ok(())
}

/// Carry out `actions` against `write_half`, driving any deferred
/// responses to completion. Returns `Ok(false)` if a `Close` action was
/// encountered and the connection's read loop should stop. A deferred
/// response race against `shutdown`: if the server stops before the
/// response resolves, the pending future is dropped and the cancellation
/// is run back through [`ConnectionEngine::resume`] as a close.
async fn execute_actions<H: AccessoryHandler + 'static, E: Environment>(
    actions: Vec<ConnectionAction>,
    write_half: &mut tokio::net::tcp::OwnedWriteHalf,
    engine: &mut ConnectionEngine<H, E>,
    shutdown: &mut broadcast::Receiver<()>,
) -> Result<bool, ServerError> {
    for action in actions {
        match action {
            ConnectionAction::Send(bytes) => {
                write_half.write_all(&bytes).await.map_err(ServerError::Transport)?;
            },
            ConnectionAction::Defer(pending) => {
                let follow_up = tokio::select! {
                    result = pending.0 => engine.resume(result)?,
                    _ = shutdown.recv() => engine.resume(Err(HandlerError::Cancelled))?,
                };
                if !Box::pin(execute_actions(follow_up, write_half, engine, shutdown)).await? {
                    return Ok(false);
                }
            },
            ConnectionAction::Close(reason) => {
                tracing::debug!(?reason, "closing connection");
                return Ok(false);
            },
        }
    }
    Ok(true)
}
