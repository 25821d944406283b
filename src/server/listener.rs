//! Accept loop and per-connection task management.

use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use futures_util::FutureExt;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::handler::{ConnInfo, Engine};
use crate::server::error::SessionError;
use crate::server::handshake;
use crate::server::session::Session;
use crate::types::TypeCollection;

/// Process-wide connection id counter, shared by every listener.
static CONNECTION_ID_COUNTER: AtomicU32 = AtomicU32::new(0);

/// TLS configuration: a PEM certificate chain and private key.
#[derive(Debug, Clone)]
pub struct TlsConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

/// TLS configuration errors
#[derive(Debug)]
pub enum TlsError {
    Io(std::io::Error),
    Tls(rustls::Error),
    MissingPrivateKey,
}

impl std::fmt::Display for TlsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TlsError::Io(e) => write!(f, "I/O error: {}", e),
            TlsError::Tls(e) => write!(f, "TLS error: {}", e),
            TlsError::MissingPrivateKey => write!(f, "no private key found in key file"),
        }
    }
}

impl std::error::Error for TlsError {}

impl From<std::io::Error> for TlsError {
    fn from(e: std::io::Error) -> Self {
        TlsError::Io(e)
    }
}

impl From<rustls::Error> for TlsError {
    fn from(e: rustls::Error) -> Self {
        TlsError::Tls(e)
    }
}

impl TlsConfig {
    /// Load the certificate chain and key into a rustls server config.
    pub fn load(&self) -> Result<Arc<rustls::ServerConfig>, TlsError> {
        let mut cert_reader = BufReader::new(std::fs::File::open(&self.cert_path)?);
        let certs = rustls_pemfile::certs(&mut cert_reader).collect::<Result<Vec<_>, _>>()?;

        let mut key_reader = BufReader::new(std::fs::File::open(&self.key_path)?);
        let key = rustls_pemfile::private_key(&mut key_reader)?.ok_or(TlsError::MissingPrivateKey)?;

        let config = rustls::ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(certs, key)?;
        Ok(Arc::new(config))
    }
}

/// TCP listener bridging PostgreSQL clients onto the engine.
pub struct Listener<E: Engine> {
    listener: TcpListener,
    engine: Arc<E>,
    types: Arc<TypeCollection>,
    tls: Option<Arc<rustls::ServerConfig>>,
    process_id: i32,
}

impl<E: Engine> Listener<E> {
    /// Creates a listener on a bound socket for the given engine.
    pub fn new(listener: TcpListener, engine: Arc<E>) -> Self {
        Listener {
            listener,
            engine,
            types: Arc::new(TypeCollection::new()),
            tls: None,
            process_id: std::process::id() as i32,
        }
    }

    /// Offer TLS to clients that ask for it. Must be set before `serve`.
    pub fn with_tls(mut self, config: Arc<rustls::ServerConfig>) -> Self {
        self.tls = Some(config);
        self
    }

    /// The shared type collection advertised to clients.
    pub fn types(&self) -> &Arc<TypeCollection> {
        &self.types
    }

    /// Accept connections until the socket closes, spawning one independent
    /// task per connection.
    pub async fn serve(self) -> Result<(), std::io::Error> {
        info!(addr = ?self.listener.local_addr().ok(), "listening for PostgreSQL connections");
        loop {
            let (socket, peer_addr) = self.listener.accept().await?;
            let connection_id = CONNECTION_ID_COUNTER.fetch_add(1, Ordering::SeqCst) + 1;
            debug!(connection_id, %peer_addr, "accepted connection");

            let engine = Arc::clone(&self.engine);
            let types = Arc::clone(&self.types);
            let tls = self.tls.clone();
            let process_id = self.process_id;
            tokio::spawn(async move {
                handle_connection(socket, connection_id, engine, types, tls, process_id).await;
            });
        }
    }
}

/// One connection's lifetime: lifecycle hooks around the session, with a
/// panic boundary so a crashing session takes down only itself.
async fn handle_connection<E: Engine>(
    socket: TcpStream,
    connection_id: u32,
    engine: Arc<E>,
    types: Arc<TypeCollection>,
    tls: Option<Arc<rustls::ServerConfig>>,
    process_id: i32,
) {
    let mut conn = ConnInfo {
        connection_id,
        user: String::new(),
    };
    engine.new_connection(&conn);

    let outcome = std::panic::AssertUnwindSafe(drive(
        socket,
        &engine,
        &mut conn,
        &types,
        tls,
        process_id,
    ))
    .catch_unwind()
    .await;

    match outcome {
        Err(_) => error!(connection_id, "session panicked"),
        Ok(Err(e)) => warn!(connection_id, error = %e, "session ended with error"),
        Ok(Ok(())) => debug!(connection_id, "connection closed"),
    }
    engine.connection_closed(&conn);
}

async fn drive<E: Engine>(
    socket: TcpStream,
    engine: &Arc<E>,
    conn: &mut ConnInfo,
    types: &Arc<TypeCollection>,
    tls: Option<Arc<rustls::ServerConfig>>,
    process_id: i32,
) -> Result<(), SessionError> {
    let Some(framed) = handshake::negotiate(socket, engine, conn, tls, process_id).await? else {
        return Ok(());
    };
    Session::new(framed, Arc::clone(engine), conn.clone(), Arc::clone(types))
        .run()
        .await
}
