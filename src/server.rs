//! TCP server for PostgreSQL-compatible connections.
//!
//! This module provides the network layer that accepts client connections
//! and drives them against the engine boundary.
//!
//! ## Architecture
//!
//! ```text
//! +----------+
//! | Listener |  <- Accepts TCP connections
//! +----------+
//!      |
//!      v
//! +-----------+     +-----------+
//! | Handshake | --> |  Session  |  <- Simple + extended query protocols
//! +-----------+     +-----------+
//!      |                  |
//!      v                  v
//!  TLS upgrade        Engine (Handler + Translator)
//! ```
//!
//! ## Terminology
//!
//! - **Listener**: accept loop spawning one task per connection
//! - **Handshake**: SSL/GSSAPI negotiation and startup parameter exchange
//! - **Session**: per-client query processing and prepared-statement state
//! - **Meta-query interceptor**: canned rewrites for psql backslash commands

pub mod error;
pub mod handshake;
pub mod listener;
pub mod meta;
pub mod session;
pub mod stream;

pub use error::SessionError;
pub use listener::{Listener, TlsConfig, TlsError};
pub use meta::MetaQuery;
pub use session::Session;
pub use stream::ClientStream;
