//! PostgreSQL wire protocol implementation.
//!
//! This module implements the PostgreSQL v3.0 wire protocol, enabling
//! communication with standard PostgreSQL clients like `psql`. Both Simple
//! Query and Extended Query protocols are supported.
//!
//! ## Architecture
//!
//! ```text
//! +----------+                            +----------+
//! |  Client  |  --- FrontendMessage -->   |  Server  |
//! |  (psql)  |  <-- BackendMessage  ---   |(pgbridge)|
//! +----------+                            +----------+
//!                ^                    ^
//!                |   MessageFormat    |
//!                |  descriptor codec  |
//!                +--------------------+
//! ```
//!
//! ## Terminology
//!
//! - **MessageFormat**: declarative descriptor of one message; a single
//!   generic walker drives both encode and decode
//! - **FrontendMessage**: messages from client to server (Query, Parse, Bind, etc.)
//! - **InitialMessage**: untagged startup-phase frames (Startup, SSL, GSSENC)
//! - **BackendMessage**: messages from server to client (RowDescription, DataRow, etc.)
//! - **Codec**: framing for the wire protocol; query-phase frames are drained
//!   in batches so the session can honor per-batch response semantics

pub mod backend;
pub mod codec;
pub mod error;
pub mod format;
pub mod frontend;
pub mod wire;

pub use backend::{
    AuthenticationOk, BackendKeyData, BackendMessage, BindComplete, CommandComplete, DataRow,
    DataValue, ErrorResponse, FieldDescription, GssEncResponse, ParameterDescription,
    ParameterStatus, ParseComplete, ReadyForQuery, RowDescription, Severity, SslResponse,
    TransactionIndicator, sql_state,
};
pub use codec::{PostgresCodec, StartupCodec};
pub use error::ProtocolError;
pub use format::{Field, FieldFlags, FieldType, FieldValue, Message, MessageFormat};
pub use frontend::{
    Bind, Describe, Execute, FrontendMessage, GssEncRequest, InitialMessage, Parse, Query,
    SslRequest, StartupMessage, Sync, Terminate,
};
