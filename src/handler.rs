//! The engine-side execution boundary.
//!
//! The underlying relational engine is an opaque collaborator: the server
//! drives it exclusively through the [`Handler`] trait, feeding it SQL text
//! (or a pre-translated AST) and receiving result batches through a
//! [`ResultSink`] callback. Connection lifecycle hooks mirror the query
//! hooks so the engine can track per-connection state.

use std::future::Future;

use crate::protocol::DataValue;
use crate::translate::Translator;

/// Per-connection identity shared with the engine.
///
/// `user` is empty until startup negotiation has extracted it from the
/// client's StartupMessage.
#[derive(Debug, Clone, Default)]
pub struct ConnInfo {
    pub connection_id: u32,
    pub user: String,
}

/// Opaque error reported by the engine. Crosses the boundary as text and is
/// surfaced to the client in an ErrorResponse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineError {
    message: String,
}

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        EngineError {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for EngineError {}

impl From<String> for EngineError {
    fn from(message: String) -> Self {
        EngineError { message }
    }
}

impl From<&str> for EngineError {
    fn from(message: &str) -> Self {
        EngineError {
            message: message.to_string(),
        }
    }
}

/// Column type as reported by the MySQL-dialect engine.
///
/// The wire layer maps these onto PostgreSQL type OIDs through the shared
/// type collection when building RowDescription frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Null,
    Int8,
    Int16,
    Int24,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt24,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Decimal,
    Date,
    Time,
    Datetime,
    Timestamp,
    Year,
    Char,
    VarChar,
    Text,
    Blob,
    Bit,
    Json,
    Enum,
    Set,
}

/// One result column: the engine-side name and type.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultField {
    pub name: String,
    pub column_type: ColumnType,
}

impl ResultField {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        ResultField {
            name: name.into(),
            column_type,
        }
    }
}

/// One (possibly partial) result batch produced by the engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub fields: Vec<ResultField>,
    pub rows: Vec<Vec<DataValue>>,
    pub rows_affected: u64,
}

/// Receives result batches during query execution.
///
/// The handler may invoke the sink multiple times with partial batches; the
/// `more` flag signals that further batches follow.
pub trait ResultSink: Send {
    fn on_result(&mut self, result: &QueryResult, more: bool) -> Result<(), EngineError>;
}

/// A sink that discards results. Used for synthesized statements (USE,
/// START TRANSACTION, ROLLBACK) whose output is irrelevant.
pub struct NoopSink;

impl ResultSink for NoopSink {
    fn on_result(&mut self, _result: &QueryResult, _more: bool) -> Result<(), EngineError> {
        Ok(())
    }
}

/// Query execution callbacks exposed by the engine.
///
/// `A` is the engine's AST type produced by the [`Translator`]; a statement
/// arrives either as raw SQL (`com_query`, engine re-parses) or already
/// translated (`com_parsed_query`).
pub trait Handler<A>: Send + Sync + 'static {
    /// Called once when a client connection is accepted.
    fn new_connection(&self, conn: &ConnInfo) {
        let _ = conn;
    }

    /// Called once when a client connection is torn down, including on
    /// session panic.
    fn connection_closed(&self, conn: &ConnInfo) {
        let _ = conn;
    }

    /// Execute raw SQL text against the engine.
    fn com_query(
        &self,
        conn: &ConnInfo,
        sql: &str,
        sink: &mut dyn ResultSink,
    ) -> impl Future<Output = Result<(), EngineError>> + Send;

    /// Execute an already-translated statement against the engine.
    fn com_parsed_query(
        &self,
        conn: &ConnInfo,
        sql: &str,
        ast: &A,
        sink: &mut dyn ResultSink,
    ) -> impl Future<Output = Result<(), EngineError>> + Send;
}

/// The full engine boundary: translation plus execution.
///
/// Implemented automatically for any type providing both [`Translator`] and
/// the matching [`Handler`].
pub trait Engine: Translator + Handler<<Self as Translator>::Ast> {}

impl<E> Engine for E where E: Translator + Handler<<E as Translator>::Ast> {}
