//! Per-connection query processing.
//!
//! A session drives one connection through the simple-query and
//! extended-query sub-protocols. Messages arrive in batches (every complete
//! frame the codec found buffered); any error aborts the remainder of the
//! current batch, reports a single ErrorResponse, and finishes the batch
//! with the one mandatory ReadyForQuery.

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio_util::codec::Framed;
use tracing::debug;

use crate::handler::{ConnInfo, Engine, EngineError, NoopSink, QueryResult, ResultSink};
use crate::protocol::{
    BackendMessage, BindComplete, CommandComplete, DataRow, Describe, ErrorResponse, Execute,
    FieldDescription, FrontendMessage, ParameterDescription, ParseComplete, PostgresCodec, Query,
    ReadyForQuery, RowDescription, TransactionIndicator, sql_state,
};
use crate::server::error::SessionError;
use crate::server::meta::{self, MetaQuery};
use crate::server::stream::ClientStream;
use crate::translate::{ConvertedQuery, Translator, convert_query};
use crate::types::TypeCollection;

type AstOf<E> = <E as Translator>::Ast;

/// A single client session in the query phase.
pub struct Session<E: Engine> {
    framed: Framed<ClientStream, PostgresCodec>,
    engine: Arc<E>,
    conn: ConnInfo,
    types: Arc<TypeCollection>,
    /// Named prepared statements. Key "" is the unnamed statement.
    prepared: HashMap<String, ConvertedQuery<AstOf<E>>>,
    /// Named portals. Key "" is the unnamed portal. Cleared on each Sync.
    portals: HashMap<String, ConvertedQuery<AstOf<E>>>,
}

impl<E: Engine> Session<E> {
    pub fn new(
        framed: Framed<ClientStream, PostgresCodec>,
        engine: Arc<E>,
        conn: ConnInfo,
        types: Arc<TypeCollection>,
    ) -> Self {
        Session {
            framed,
            engine,
            conn,
            types,
            prepared: HashMap::new(),
            portals: HashMap::new(),
        }
    }

    /// Process batches until the client terminates or the stream closes.
    pub async fn run(mut self) -> Result<(), SessionError> {
        loop {
            let batch = match self.framed.next().await {
                None => return Ok(()),
                Some(Err(e)) => return self.fatal(e.into()).await,
                Some(Ok(batch)) => batch,
            };
            if self.handle_batch(batch).await?.is_break() {
                return Ok(());
            }
            self.flush().await?;
        }
    }

    async fn handle_batch(
        &mut self,
        batch: Vec<FrontendMessage>,
    ) -> Result<ControlFlow<()>, SessionError> {
        for message in batch {
            let outcome = match message {
                FrontendMessage::Terminate(_) => return Ok(ControlFlow::Break(())),
                FrontendMessage::Query(query) => match self.simple_query(&query).await {
                    Ok(()) => {
                        self.end_of_messages(None).await?;
                        Ok(())
                    }
                    Err(e) => Err(e),
                },
                FrontendMessage::Parse(parse) => self.parse(parse).await,
                FrontendMessage::Bind(bind) => self.bind(bind).await,
                FrontendMessage::Describe(describe) => self.describe(describe).await,
                FrontendMessage::Execute(execute) => self.execute_portal(execute).await,
                FrontendMessage::Sync(_) => {
                    self.portals.clear();
                    self.end_of_messages(None).await?;
                    Ok(())
                }
            };
            if let Err(e) = outcome {
                if !e.is_recoverable() {
                    return Err(e);
                }
                debug!(connection_id = self.conn.connection_id, error = %e, "query failed");
                // Abort the remaining messages in this batch.
                self.end_of_messages(Some(&e)).await?;
                break;
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    /// The simple-query sub-protocol: meta-query interception first, then
    /// translation, with DEALLOCATE handled in the session itself.
    async fn simple_query(&mut self, query: &Query) -> Result<(), SessionError> {
        match meta::intercept(&query.query) {
            Some(MetaQuery::Rewrite(rewrite)) => {
                self.execute(&ConvertedQuery {
                    sql: rewrite.to_string(),
                    ast: None,
                })
                .await
            }
            Some(MetaQuery::Unsupported) => Err(SessionError::Engine(EngineError::new(
                "PSQL command not yet supported",
            ))),
            None => {
                let converted = convert_query(self.engine.as_ref(), &query.query)?;
                // DEALLOCATE must not reach the engine: prepared statements
                // are allocated and released at this layer.
                let deallocate = converted
                    .ast
                    .as_ref()
                    .and_then(|ast| self.engine.deallocate_name(ast));
                match deallocate {
                    Some(name) => self.deallocate(&name, &converted.sql).await,
                    None => self.execute(&converted).await,
                }
            }
        }
    }

    async fn deallocate(&mut self, name: &str, sql: &str) -> Result<(), SessionError> {
        if self.prepared.remove(name).is_none() {
            return Err(SessionError::Engine(EngineError::new(format!(
                "prepared statement {} does not exist",
                name
            ))));
        }
        self.queue(CommandComplete::new(sql)).await
    }

    async fn parse(&mut self, parse: crate::protocol::Parse) -> Result<(), SessionError> {
        let converted = convert_query(self.engine.as_ref(), &parse.query)?;
        self.prepared.insert(parse.name, converted);
        self.queue(ParseComplete).await
    }

    async fn bind(&mut self, bind: crate::protocol::Bind) -> Result<(), SessionError> {
        // TODO: substitute bind.parameter_values into the statement once the
        // engine exposes prepared-statement execution.
        let source = self
            .prepared
            .get(&bind.source_prepared_statement)
            .cloned()
            .unwrap_or_default();
        self.portals.insert(bind.destination_portal, source);
        self.queue(BindComplete).await
    }

    async fn describe(&mut self, describe: Describe) -> Result<(), SessionError> {
        let query = if describe.is_prepared {
            self.prepared.get(&describe.target).cloned().unwrap_or_default()
        } else {
            self.portals.get(&describe.target).cloned().unwrap_or_default()
        };

        self.queue(ParameterDescription::default()).await?;

        if implicitly_commits(&query.sql) {
            return Err(SessionError::Engine(EngineError::new(
                "We do not yet support the Describe message for the given statement",
            )));
        }

        // The statement is executed for its metadata only; everything it
        // does is rolled back before returning to the state machine.
        self.engine
            .com_query(&self.conn, "START TRANSACTION;", &mut NoopSink)
            .await
            .map_err(SessionError::from)?;
        let outcome = self.describe_query(&query).await;
        let _ = self
            .engine
            .com_query(&self.conn, "ROLLBACK;", &mut NoopSink)
            .await;
        outcome
    }

    async fn describe_query(
        &mut self,
        query: &ConvertedQuery<AstOf<E>>,
    ) -> Result<(), SessionError> {
        let mut sink = DescribeSink {
            types: &self.types,
            messages: Vec::new(),
        };
        let result = self.run_handler(query, &mut sink).await;
        let DescribeSink { messages, .. } = sink;
        for message in messages {
            self.queue(message).await?;
        }
        result.map_err(coalesce_syntax_error)
    }

    async fn execute_portal(&mut self, execute: Execute) -> Result<(), SessionError> {
        // TODO: honor execute.row_max
        let query = self.portals.get(&execute.portal).cloned().unwrap_or_default();
        self.execute(&query).await
    }

    /// Run a statement and stream its results: RowDescription and DataRows
    /// per handler batch, then one CommandComplete with the row count.
    async fn execute(&mut self, query: &ConvertedQuery<AstOf<E>>) -> Result<(), SessionError> {
        let mut sink = RowSink {
            types: &self.types,
            complete: CommandComplete::new(query.sql.clone()),
            messages: Vec::new(),
        };
        let result = self.run_handler(query, &mut sink).await;
        let RowSink {
            complete, messages, ..
        } = sink;

        // Frames produced before a mid-stream failure have conceptually
        // already been sent.
        for message in messages {
            self.queue(message).await?;
        }
        result.map_err(coalesce_syntax_error)?;

        self.queue(complete).await
    }

    /// Dispatch to the handler, parsed or raw depending on whether
    /// translation produced an AST.
    async fn run_handler(
        &self,
        query: &ConvertedQuery<AstOf<E>>,
        sink: &mut dyn ResultSink,
    ) -> Result<(), EngineError> {
        match &query.ast {
            Some(ast) => {
                self.engine
                    .com_parsed_query(&self.conn, &query.sql, ast, sink)
                    .await
            }
            None => self.engine.com_query(&self.conn, &query.sql, sink).await,
        }
    }

    /// End of a received batch: one optional ErrorResponse, then the
    /// mandatory ReadyForQuery.
    async fn end_of_messages(&mut self, error: Option<&SessionError>) -> Result<(), SessionError> {
        if let Some(e) = error {
            self.queue(ErrorResponse::error(sql_state::INTERNAL_ERROR, e.to_string()))
                .await?;
        }
        self.queue(ReadyForQuery {
            indicator: TransactionIndicator::Idle,
        })
        .await?;
        self.flush().await
    }

    /// Protocol violations are fatal: report once, then close.
    async fn fatal(&mut self, error: SessionError) -> Result<(), SessionError> {
        let _ = self
            .queue(ErrorResponse::fatal(
                sql_state::PROTOCOL_VIOLATION,
                error.to_string(),
            ))
            .await;
        let _ = self.flush().await;
        Err(error)
    }

    /// Append one frame to the outgoing buffer without flushing.
    async fn queue(&mut self, message: impl Into<BackendMessage>) -> Result<(), SessionError> {
        let message: BackendMessage = message.into();
        self.framed.feed(message).await.map_err(SessionError::from)
    }

    async fn flush(&mut self) -> Result<(), SessionError> {
        SinkExt::<BackendMessage>::flush(&mut self.framed)
            .await
            .map_err(SessionError::from)
    }
}

/// Builds the wire frames for one statement's results.
struct RowSink<'a> {
    types: &'a TypeCollection,
    complete: CommandComplete,
    messages: Vec<BackendMessage>,
}

impl ResultSink for RowSink<'_> {
    fn on_result(&mut self, result: &QueryResult, _more: bool) -> Result<(), EngineError> {
        // RowDescription is re-emitted on every partial batch; see the
        // multi-batch wire test.
        self.messages
            .push(BackendMessage::RowDescription(row_description(
                self.types, result,
            )));
        for row in &result.rows {
            self.messages.push(BackendMessage::DataRow(DataRow {
                values: row.clone(),
            }));
        }
        if self.complete.is_iud() {
            self.complete.rows = result.rows_affected as i32;
        } else {
            self.complete.rows += result.rows.len() as i32;
        }
        Ok(())
    }
}

/// Sink used by Describe: forwards column metadata only.
struct DescribeSink<'a> {
    types: &'a TypeCollection,
    messages: Vec<BackendMessage>,
}

impl ResultSink for DescribeSink<'_> {
    fn on_result(&mut self, result: &QueryResult, _more: bool) -> Result<(), EngineError> {
        self.messages
            .push(BackendMessage::RowDescription(row_description(
                self.types, result,
            )));
        Ok(())
    }
}

fn row_description(types: &TypeCollection, result: &QueryResult) -> RowDescription {
    let fields = result
        .fields
        .iter()
        .map(|field| {
            let pg_type = types.for_column(field.column_type);
            FieldDescription {
                name: field.name.clone(),
                table_oid: 0,
                column_id: 0,
                type_oid: pg_type.oid,
                type_size: pg_type.size,
                type_modifier: -1,
                format_code: 0,
            }
        })
        .collect();
    RowDescription { fields }
}

/// The engine reports unparseable MySQL-dialect text with a position-based
/// syntax error; those statements were valid PostgreSQL that the bridge
/// cannot express yet, so the message is rewritten.
fn coalesce_syntax_error(e: EngineError) -> SessionError {
    if e.message().starts_with("syntax error at position") {
        SessionError::Engine(EngineError::new("This statement is not yet supported"))
    } else {
        SessionError::Engine(e)
    }
}

/// Statements that implicitly commit in the MySQL dialect; Describe cannot
/// roll these back, so they are rejected instead of described.
pub(crate) fn implicitly_commits(sql: &str) -> bool {
    const PREFIXES: &[&str] = &[
        "ALTER",
        "ANALYZE",
        "BEGIN",
        "CACHE",
        "CHANGE",
        "CHECK",
        "CREATE",
        "DROP",
        "FLUSH",
        "GRANT",
        "INSTALL",
        "KILL",
        "LOCK",
        "OPTIMIZE",
        "RENAME",
        "REPAIR",
        "RESET",
        "REVOKE",
        "SET PASSWORD",
        "START",
        "STOP",
        "TRUNCATE",
        "UNINSTALL",
        "UNLOCK",
    ];
    let upper = sql.trim_start().to_uppercase();
    PREFIXES.iter().any(|prefix| upper.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{ColumnType, ResultField};
    use crate::protocol::DataValue;

    #[test]
    fn test_implicitly_commits() {
        assert!(implicitly_commits("CREATE TABLE t (x INT)"));
        assert!(implicitly_commits("  drop table t"));
        assert!(implicitly_commits("START TRANSACTION;"));
        assert!(!implicitly_commits("SELECT 1"));
        assert!(!implicitly_commits("INSERT INTO t VALUES (1)"));
        assert!(!implicitly_commits(""));
    }

    #[test]
    fn test_coalesce_syntax_error() {
        let rewritten = coalesce_syntax_error(EngineError::new("syntax error at position 12"));
        assert_eq!(rewritten.to_string(), "This statement is not yet supported");

        let passthrough = coalesce_syntax_error(EngineError::new("table t not found"));
        assert_eq!(passthrough.to_string(), "table t not found");
    }

    #[test]
    fn test_row_sink_counts_returned_rows() {
        let types = TypeCollection::new();
        let mut sink = RowSink {
            types: &types,
            complete: CommandComplete::new("SELECT * FROM t"),
            messages: Vec::new(),
        };

        let result = QueryResult {
            fields: vec![ResultField::new("id", ColumnType::Int32)],
            rows: vec![
                vec![DataValue::Data(b"1".to_vec())],
                vec![DataValue::Data(b"2".to_vec())],
            ],
            rows_affected: 0,
        };
        sink.on_result(&result, true).unwrap();
        sink.on_result(&result, false).unwrap();

        // Row description + two data rows, twice.
        assert_eq!(sink.messages.len(), 6);
        assert_eq!(sink.complete.rows, 4);
    }

    #[test]
    fn test_row_sink_reports_affected_count_for_dml() {
        let types = TypeCollection::new();
        let mut sink = RowSink {
            types: &types,
            complete: CommandComplete::new("UPDATE t SET x = 1"),
            messages: Vec::new(),
        };

        let result = QueryResult {
            fields: vec![],
            rows: vec![],
            rows_affected: 7,
        };
        sink.on_result(&result, false).unwrap();
        assert_eq!(sink.complete.rows, 7);
    }

    #[test]
    fn test_row_description_maps_types() {
        let types = TypeCollection::new();
        let result = QueryResult {
            fields: vec![
                ResultField::new("id", ColumnType::Int64),
                ResultField::new("name", ColumnType::VarChar),
            ],
            rows: vec![],
            rows_affected: 0,
        };
        let description = row_description(&types, &result);
        assert_eq!(description.fields[0].type_oid, 20);
        assert_eq!(description.fields[0].type_size, 8);
        assert_eq!(description.fields[1].type_oid, 25);
        assert_eq!(description.fields[1].format_code, 0);
    }
}
