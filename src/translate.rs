//! The query translation boundary.
//!
//! PostgreSQL SQL text is parsed and converted into the engine's internal
//! AST by an external [`Translator`]. The server only needs two things from
//! the result: a [`ConvertedQuery`] it can store and execute, and enough
//! visibility to intercept the statements it must handle itself (DEALLOCATE
//! operates on the session's own prepared-statement table and never reaches
//! the engine).

/// The translated form of an incoming SQL string plus an optional
/// pre-parsed AST.
///
/// When the AST is absent the engine re-parses the (canonicalized) SQL text
/// itself. The default value (empty text, no AST) mirrors an absent map
/// entry and is what a Bind or Execute against an unknown name operates on.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertedQuery<A> {
    pub sql: String,
    pub ast: Option<A>,
}

impl<A> Default for ConvertedQuery<A> {
    fn default() -> Self {
        ConvertedQuery {
            sql: String::new(),
            ast: None,
        }
    }
}

/// Translation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslateError {
    /// The PostgreSQL-side parser rejected the text.
    Parse(String),
    /// The statement parsed but could not be converted to the engine AST.
    Convert(String),
    /// More than one statement in a single query text.
    MultipleStatements,
}

impl std::fmt::Display for TranslateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TranslateError::Parse(e) => write!(f, "{}", e),
            TranslateError::Convert(e) => write!(f, "{}", e),
            TranslateError::MultipleStatements => {
                write!(f, "only a single statement at a time is currently supported")
            }
        }
    }
}

impl std::error::Error for TranslateError {}

/// Parses PostgreSQL SQL text and converts it to the engine's AST.
pub trait Translator: Send + Sync + 'static {
    /// A single statement in the PostgreSQL-side parse tree.
    type Parsed;
    /// A single statement in the engine's AST.
    type Ast: Clone + Send + Sync + 'static;

    /// Split and parse the text into individual statements.
    fn parse(&self, sql: &str) -> Result<Vec<Self::Parsed>, TranslateError>;

    /// Convert one parsed statement into the engine AST. `None` means the
    /// engine should re-parse the canonicalized SQL text itself.
    fn convert(&self, statement: Self::Parsed) -> Result<Option<Self::Ast>, TranslateError>;

    /// Canonical SQL text for a parsed statement, used when `convert`
    /// produces no AST.
    fn canonical_sql(&self, statement: &Self::Parsed) -> String;

    /// If the translated statement is DEALLOCATE, the prepared-statement
    /// name it names.
    fn deallocate_name(&self, ast: &Self::Ast) -> Option<String>;
}

/// Run the full translation boundary for one query text.
///
/// Multi-statement batches are rejected; an empty parse yields the original
/// text with no AST.
pub fn convert_query<T: Translator>(
    translator: &T,
    sql: &str,
) -> Result<ConvertedQuery<T::Ast>, TranslateError> {
    let mut statements = translator.parse(sql)?;
    if statements.len() > 1 {
        return Err(TranslateError::MultipleStatements);
    }
    let Some(statement) = statements.pop() else {
        return Ok(ConvertedQuery {
            sql: sql.to_string(),
            ast: None,
        });
    };
    let canonical = translator.canonical_sql(&statement);
    match translator.convert(statement)? {
        Some(ast) => Ok(ConvertedQuery {
            sql: sql.to_string(),
            ast: Some(ast),
        }),
        None => Ok(ConvertedQuery {
            sql: canonical,
            ast: None,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A translator that treats each semicolon-separated chunk as one
    /// statement and "converts" by upper-casing.
    struct SplitTranslator;

    impl Translator for SplitTranslator {
        type Parsed = String;
        type Ast = String;

        fn parse(&self, sql: &str) -> Result<Vec<String>, TranslateError> {
            Ok(sql
                .split(';')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect())
        }

        fn convert(&self, statement: String) -> Result<Option<String>, TranslateError> {
            if statement.starts_with("opaque") {
                // Engine should re-parse this one.
                Ok(None)
            } else {
                Ok(Some(statement.to_uppercase()))
            }
        }

        fn canonical_sql(&self, statement: &String) -> String {
            format!("{};", statement)
        }

        fn deallocate_name(&self, ast: &String) -> Option<String> {
            ast.strip_prefix("DEALLOCATE ").map(str::to_string)
        }
    }

    #[test]
    fn test_convert_query_single() {
        let query = convert_query(&SplitTranslator, "select 1").unwrap();
        assert_eq!(query.sql, "select 1");
        assert_eq!(query.ast.as_deref(), Some("SELECT 1"));
    }

    #[test]
    fn test_convert_query_rejects_multiple_statements() {
        let err = convert_query(&SplitTranslator, "select 1; select 2").unwrap_err();
        assert_eq!(err, TranslateError::MultipleStatements);
        assert_eq!(
            err.to_string(),
            "only a single statement at a time is currently supported"
        );
    }

    #[test]
    fn test_convert_query_canonical_fallback() {
        // No engine AST: the canonicalized text is forwarded instead.
        let query = convert_query(&SplitTranslator, "opaque thing").unwrap();
        assert_eq!(query.sql, "opaque thing;");
        assert!(query.ast.is_none());
    }

    #[test]
    fn test_convert_query_empty() {
        let query = convert_query(&SplitTranslator, "").unwrap();
        assert_eq!(query.sql, "");
        assert!(query.ast.is_none());
    }

    #[test]
    fn test_deallocate_detection() {
        let query = convert_query(&SplitTranslator, "deallocate s1").unwrap();
        let name = SplitTranslator.deallocate_name(query.ast.as_ref().unwrap());
        assert_eq!(name.as_deref(), Some("S1"));
    }
}
