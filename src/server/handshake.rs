//! Startup negotiation for one client connection.
//!
//! Walks the connection from the first untagged frame to the query phase:
//! opportunistic TLS (offered only when a certificate is configured),
//! GSSAPI declining, the authentication-ok burst, and the initial `USE`
//! statement selecting the client's database.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_rustls::TlsAcceptor;
use tokio_util::codec::Framed;
use tracing::{debug, warn};

use crate::handler::{ConnInfo, Engine, NoopSink};
use crate::protocol::{
    AuthenticationOk, BackendKeyData, BackendMessage, ErrorResponse, GssEncResponse,
    InitialMessage, ParameterStatus, PostgresCodec, ProtocolError, ReadyForQuery, SslResponse,
    StartupCodec, StartupMessage, TransactionIndicator, sql_state,
};
use crate::server::error::SessionError;
use crate::server::stream::ClientStream;

/// User assumed when the client does not name one.
const DEFAULT_USER: &str = "pgbridge";

/// Negotiate the startup phase. Returns the framed stream switched to the
/// query-phase codec, or `None` when the connection ended during startup
/// (EOF, or a fatal database-not-found error already reported to the
/// client).
pub(crate) async fn negotiate<E: Engine>(
    socket: TcpStream,
    engine: &Arc<E>,
    conn: &mut ConnInfo,
    mut tls: Option<Arc<rustls::ServerConfig>>,
    process_id: i32,
) -> Result<Option<Framed<ClientStream, PostgresCodec>>, SessionError> {
    let mut framed = Framed::new(ClientStream::Plain(socket), StartupCodec::new());

    // The initial frame may be one of a few different messages; TLS and
    // GSSAPI negotiation loop back into the startup state.
    let startup = loop {
        let Some(message) = framed.next().await.transpose()? else {
            return Ok(None);
        };
        match message {
            InitialMessage::SslRequest => {
                let offered = tls.take();
                reply(
                    &mut framed,
                    SslResponse {
                        supports_ssl: offered.is_some(),
                    },
                )
                .await?;
                // The client starts its TLS handshake only after reading our
                // reply, so the upgrade happens here rather than at accept.
                if let Some(config) = offered {
                    let stream = framed.into_inner();
                    let ClientStream::Plain(tcp) = stream else {
                        return Err(SessionError::Protocol(ProtocolError::InvalidMessage));
                    };
                    let accepted = TlsAcceptor::from(config).accept(tcp).await?;
                    debug!(connection_id = conn.connection_id, "TLS established");
                    framed = Framed::new(ClientStream::Tls(Box::new(accepted)), StartupCodec::new());
                }
            }
            InitialMessage::GssEncRequest => {
                reply(
                    &mut framed,
                    GssEncResponse {
                        supports_gssapi: false,
                    },
                )
                .await?;
            }
            InitialMessage::Startup(startup) => break startup,
        }
    };

    conn.user = startup
        .user()
        .filter(|user| !user.is_empty())
        .unwrap_or(DEFAULT_USER)
        .to_string();
    debug!(
        connection_id = conn.connection_id,
        user = %conn.user,
        database = ?startup.database(),
        "startup negotiated"
    );

    send_startup_burst(&mut framed, process_id).await?;

    if let Err(e) = select_database(engine, conn, &startup).await {
        let SessionError::DatabaseNotFound(ref db) = e else {
            return Err(e);
        };
        warn!(connection_id = conn.connection_id, database = %db, "database does not exist");
        reply(
            &mut framed,
            ErrorResponse::fatal(sql_state::INVALID_CATALOG_NAME, e.to_string())
                .with_routine("InitPostgres"),
        )
        .await?;
        return Ok(None);
    }

    reply(
        &mut framed,
        ReadyForQuery {
            indicator: TransactionIndicator::Idle,
        },
    )
    .await?;

    Ok(Some(framed.map_codec(StartupCodec::ready)))
}

/// Send one backend frame and flush it.
async fn reply(
    framed: &mut Framed<ClientStream, StartupCodec>,
    message: impl Into<BackendMessage>,
) -> Result<(), SessionError> {
    let message: BackendMessage = message.into();
    framed.send(message).await.map_err(SessionError::from)
}

/// The fixed message burst following a StartupMessage: no real
/// authentication happens, every client is accepted.
async fn send_startup_burst(
    framed: &mut Framed<ClientStream, StartupCodec>,
    process_id: i32,
) -> Result<(), SessionError> {
    reply(framed, AuthenticationOk).await?;
    reply(
        framed,
        ParameterStatus {
            name: "server_version".to_string(),
            value: "15.0".to_string(),
        },
    )
    .await?;
    reply(
        framed,
        ParameterStatus {
            name: "client_encoding".to_string(),
            value: "UTF8".to_string(),
        },
    )
    .await?;
    reply(
        framed,
        BackendKeyData {
            process_id,
            secret_key: 0,
        },
    )
    .await?;
    Ok(())
}

/// Select the session's database through the handler. A database named by
/// the client must exist; without one, the user name is tried and failures
/// are ignored.
async fn select_database<E: Engine>(
    engine: &Arc<E>,
    conn: &ConnInfo,
    startup: &StartupMessage,
) -> Result<(), SessionError> {
    match startup.database() {
        Some(db) => {
            let use_db = format!("USE `{}`;", db);
            engine
                .com_query(conn, &use_db, &mut NoopSink)
                .await
                .map_err(|_| SessionError::DatabaseNotFound(db.to_string()))
        }
        None => {
            // Default database = user name; a missing one is not fatal.
            let use_db = format!("USE `{}`;", conn.user);
            let _ = engine.com_query(conn, &use_db, &mut NoopSink).await;
            Ok(())
        }
    }
}
