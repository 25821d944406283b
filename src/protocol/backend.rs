//! Messages sent by the backend (server) to the client.

use std::sync::LazyLock;

use crate::protocol::ProtocolError;
use crate::protocol::format::{Field, FieldFlags, FieldType, FieldValue, Message, MessageFormat};

/// SQL State codes for error responses.
///
/// References:
/// - <https://www.postgresql.org/docs/current/errcodes-appendix.html>
pub mod sql_state {
    /// Protocol violation
    pub const PROTOCOL_VIOLATION: &str = "08P01";
    /// Database does not exist
    pub const INVALID_CATALOG_NAME: &str = "3D000";
    /// Internal error
    pub const INTERNAL_ERROR: &str = "XX000";
}

fn header(byte: u8) -> Field {
    Field::new("Header", FieldType::Byte1, FieldValue::Byte(byte)).with_flags(FieldFlags::HEADER)
}

fn message_length() -> Field {
    Field::new("MessageLength", FieldType::Int32, FieldValue::Int32(4))
        .with_flags(FieldFlags::LENGTH_INCLUSIVE)
}

static AUTHENTICATION_OK: LazyLock<MessageFormat> = LazyLock::new(|| {
    MessageFormat::new(
        "AuthenticationOk",
        vec![
            header(b'R'),
            message_length(),
            Field::new("Status", FieldType::Int32, FieldValue::Int32(0)),
        ],
    )
});

/// 'R' - Authentication response (AuthenticationOk)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticationOk;

impl Message for AuthenticationOk {
    fn default_format() -> &'static MessageFormat {
        &AUTHENTICATION_OK
    }

    fn encode(&self) -> Result<MessageFormat, ProtocolError> {
        Ok(Self::default_format().clone())
    }

    fn decode(format: &MessageFormat) -> Result<Self, ProtocolError> {
        Self::default_format().matches_structure(format)?;
        if format.int32("Status")? != 0 {
            return Err(ProtocolError::InvalidMessage);
        }
        Ok(AuthenticationOk)
    }
}

static PARAMETER_STATUS: LazyLock<MessageFormat> = LazyLock::new(|| {
    MessageFormat::new(
        "ParameterStatus",
        vec![
            header(b'S'),
            message_length(),
            Field::new("Name", FieldType::CString, FieldValue::String(String::new())),
            Field::new("Value", FieldType::CString, FieldValue::String(String::new())),
        ],
    )
});

/// 'S' - Parameter status notification
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterStatus {
    pub name: String,
    pub value: String,
}

impl Message for ParameterStatus {
    fn default_format() -> &'static MessageFormat {
        &PARAMETER_STATUS
    }

    fn encode(&self) -> Result<MessageFormat, ProtocolError> {
        let mut format = Self::default_format().clone();
        format.set("Name", FieldValue::String(self.name.clone()))?;
        format.set("Value", FieldValue::String(self.value.clone()))?;
        Ok(format)
    }

    fn decode(format: &MessageFormat) -> Result<Self, ProtocolError> {
        Ok(ParameterStatus {
            name: format.string("Name")?.to_string(),
            value: format.string("Value")?.to_string(),
        })
    }
}

static BACKEND_KEY_DATA: LazyLock<MessageFormat> = LazyLock::new(|| {
    MessageFormat::new(
        "BackendKeyData",
        vec![
            header(b'K'),
            message_length(),
            Field::new("ProcessID", FieldType::Int32, FieldValue::Int32(0)),
            Field::new("SecretKey", FieldType::Int32, FieldValue::Int32(0)),
        ],
    )
});

/// 'K' - Backend key data for cancel requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendKeyData {
    pub process_id: i32,
    pub secret_key: i32,
}

impl Message for BackendKeyData {
    fn default_format() -> &'static MessageFormat {
        &BACKEND_KEY_DATA
    }

    fn encode(&self) -> Result<MessageFormat, ProtocolError> {
        let mut format = Self::default_format().clone();
        format.set("ProcessID", FieldValue::Int32(self.process_id))?;
        format.set("SecretKey", FieldValue::Int32(self.secret_key))?;
        Ok(format)
    }

    fn decode(format: &MessageFormat) -> Result<Self, ProtocolError> {
        Ok(BackendKeyData {
            process_id: format.int32("ProcessID")?,
            secret_key: format.int32("SecretKey")?,
        })
    }
}

static READY_FOR_QUERY: LazyLock<MessageFormat> = LazyLock::new(|| {
    MessageFormat::new(
        "ReadyForQuery",
        vec![
            header(b'Z'),
            message_length(),
            Field::new("Indicator", FieldType::Byte1, FieldValue::Byte(b'I')),
        ],
    )
});

/// Transaction status indicator for ReadyForQuery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionIndicator {
    /// 'I' - Idle (not in a transaction block)
    Idle,
    /// 'T' - In a transaction block
    InTransaction,
    /// 'E' - In a failed transaction block
    Failed,
}

impl TransactionIndicator {
    fn as_byte(self) -> u8 {
        match self {
            TransactionIndicator::Idle => b'I',
            TransactionIndicator::InTransaction => b'T',
            TransactionIndicator::Failed => b'E',
        }
    }

    fn from_byte(byte: u8) -> Result<Self, ProtocolError> {
        match byte {
            b'I' => Ok(TransactionIndicator::Idle),
            b'T' => Ok(TransactionIndicator::InTransaction),
            b'E' => Ok(TransactionIndicator::Failed),
            _ => Err(ProtocolError::InvalidMessage),
        }
    }
}

/// 'Z' - Ready for query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadyForQuery {
    pub indicator: TransactionIndicator,
}

impl Message for ReadyForQuery {
    fn default_format() -> &'static MessageFormat {
        &READY_FOR_QUERY
    }

    fn encode(&self) -> Result<MessageFormat, ProtocolError> {
        let mut format = Self::default_format().clone();
        format.set("Indicator", FieldValue::Byte(self.indicator.as_byte()))?;
        Ok(format)
    }

    fn decode(format: &MessageFormat) -> Result<Self, ProtocolError> {
        Ok(ReadyForQuery {
            indicator: TransactionIndicator::from_byte(format.byte("Indicator")?)?,
        })
    }
}

static PARSE_COMPLETE: LazyLock<MessageFormat> =
    LazyLock::new(|| MessageFormat::new("ParseComplete", vec![header(b'1'), message_length()]));

/// '1' - Parse complete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseComplete;

impl Message for ParseComplete {
    fn default_format() -> &'static MessageFormat {
        &PARSE_COMPLETE
    }

    fn encode(&self) -> Result<MessageFormat, ProtocolError> {
        Ok(Self::default_format().clone())
    }

    fn decode(format: &MessageFormat) -> Result<Self, ProtocolError> {
        Self::default_format().matches_structure(format)?;
        Ok(ParseComplete)
    }
}

static BIND_COMPLETE: LazyLock<MessageFormat> =
    LazyLock::new(|| MessageFormat::new("BindComplete", vec![header(b'2'), message_length()]));

/// '2' - Bind complete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindComplete;

impl Message for BindComplete {
    fn default_format() -> &'static MessageFormat {
        &BIND_COMPLETE
    }

    fn encode(&self) -> Result<MessageFormat, ProtocolError> {
        Ok(Self::default_format().clone())
    }

    fn decode(format: &MessageFormat) -> Result<Self, ProtocolError> {
        Self::default_format().matches_structure(format)?;
        Ok(BindComplete)
    }
}

static PARAMETER_DESCRIPTION: LazyLock<MessageFormat> = LazyLock::new(|| {
    MessageFormat::new(
        "ParameterDescription",
        vec![
            header(b't'),
            message_length(),
            Field::new("ObjectIDCount", FieldType::Int16, FieldValue::Int16(0)),
            Field::new("ObjectIDs", FieldType::Repeated, FieldValue::Groups(vec![]))
                .with_count_ref("ObjectIDCount")
                .with_template(vec![Field::new(
                    "ObjectID",
                    FieldType::Int32,
                    FieldValue::Int32(0),
                )]),
        ],
    )
});

/// 't' - Parameter description
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParameterDescription {
    pub object_ids: Vec<i32>,
}

impl Message for ParameterDescription {
    fn default_format() -> &'static MessageFormat {
        &PARAMETER_DESCRIPTION
    }

    fn encode(&self) -> Result<MessageFormat, ProtocolError> {
        let mut format = Self::default_format().clone();
        format.set("ObjectIDCount", FieldValue::Int16(self.object_ids.len() as i16))?;
        let template = format
            .field("ObjectIDs")
            .ok_or(ProtocolError::MissingField("ObjectIDs"))?
            .clone();
        let groups = self
            .object_ids
            .iter()
            .map(|oid| template.instantiate(vec![FieldValue::Int32(*oid)]))
            .collect::<Result<Vec<_>, _>>()?;
        format.set("ObjectIDs", FieldValue::Groups(groups))?;
        Ok(format)
    }

    fn decode(format: &MessageFormat) -> Result<Self, ProtocolError> {
        let mut object_ids = Vec::new();
        for group in format.groups("ObjectIDs")? {
            let [oid] = group.as_slice() else {
                return Err(ProtocolError::InvalidMessage);
            };
            let FieldValue::Int32(oid) = oid.value else {
                return Err(ProtocolError::InvalidMessage);
            };
            object_ids.push(oid);
        }
        Ok(ParameterDescription { object_ids })
    }
}

static ROW_DESCRIPTION: LazyLock<MessageFormat> = LazyLock::new(|| {
    MessageFormat::new(
        "RowDescription",
        vec![
            header(b'T'),
            message_length(),
            Field::new("FieldCount", FieldType::Int16, FieldValue::Int16(0)),
            Field::new("Fields", FieldType::Repeated, FieldValue::Groups(vec![]))
                .with_count_ref("FieldCount")
                .with_template(vec![
                    Field::new("ColumnName", FieldType::CString, FieldValue::String(String::new())),
                    Field::new("TableObjectID", FieldType::Int32, FieldValue::Int32(0)),
                    Field::new("ColumnAttributeNumber", FieldType::Int16, FieldValue::Int16(0)),
                    Field::new("DataTypeObjectID", FieldType::Int32, FieldValue::Int32(0)),
                    Field::new("DataTypeSize", FieldType::Int16, FieldValue::Int16(0)),
                    Field::new("TypeModifier", FieldType::Int32, FieldValue::Int32(-1)),
                    Field::new("FormatCode", FieldType::Int16, FieldValue::Int16(0)),
                ]),
        ],
    )
});

/// Field description for RowDescription.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescription {
    /// Column name
    pub name: String,
    /// Table OID (0 if not from a table)
    pub table_oid: i32,
    /// Column attribute number (0 if not from a table)
    pub column_id: i16,
    /// Data type OID
    pub type_oid: i32,
    /// Data type size (-1 for variable length)
    pub type_size: i16,
    /// Type modifier (-1 if not applicable)
    pub type_modifier: i32,
    /// Format code (0 = text, 1 = binary)
    pub format_code: i16,
}

/// 'T' - Row description (column metadata)
#[derive(Debug, Clone, PartialEq)]
pub struct RowDescription {
    pub fields: Vec<FieldDescription>,
}

impl Message for RowDescription {
    fn default_format() -> &'static MessageFormat {
        &ROW_DESCRIPTION
    }

    fn encode(&self) -> Result<MessageFormat, ProtocolError> {
        let mut format = Self::default_format().clone();
        format.set("FieldCount", FieldValue::Int16(self.fields.len() as i16))?;
        let template = format
            .field("Fields")
            .ok_or(ProtocolError::MissingField("Fields"))?
            .clone();
        let groups = self
            .fields
            .iter()
            .map(|field| {
                template.instantiate(vec![
                    FieldValue::String(field.name.clone()),
                    FieldValue::Int32(field.table_oid),
                    FieldValue::Int16(field.column_id),
                    FieldValue::Int32(field.type_oid),
                    FieldValue::Int16(field.type_size),
                    FieldValue::Int32(field.type_modifier),
                    FieldValue::Int16(field.format_code),
                ])
            })
            .collect::<Result<Vec<_>, _>>()?;
        format.set("Fields", FieldValue::Groups(groups))?;
        Ok(format)
    }

    fn decode(format: &MessageFormat) -> Result<Self, ProtocolError> {
        let mut fields = Vec::new();
        for group in format.groups("Fields")? {
            let [name, table_oid, column_id, type_oid, type_size, type_modifier, format_code] =
                group.as_slice()
            else {
                return Err(ProtocolError::InvalidMessage);
            };
            let (
                FieldValue::String(name),
                FieldValue::Int32(table_oid),
                FieldValue::Int16(column_id),
                FieldValue::Int32(type_oid),
                FieldValue::Int16(type_size),
                FieldValue::Int32(type_modifier),
                FieldValue::Int16(format_code),
            ) = (
                &name.value,
                &table_oid.value,
                &column_id.value,
                &type_oid.value,
                &type_size.value,
                &type_modifier.value,
                &format_code.value,
            )
            else {
                return Err(ProtocolError::InvalidMessage);
            };
            fields.push(FieldDescription {
                name: name.clone(),
                table_oid: *table_oid,
                column_id: *column_id,
                type_oid: *type_oid,
                type_size: *type_size,
                type_modifier: *type_modifier,
                format_code: *format_code,
            });
        }
        Ok(RowDescription { fields })
    }
}

static DATA_ROW: LazyLock<MessageFormat> = LazyLock::new(|| {
    MessageFormat::new(
        "DataRow",
        vec![
            header(b'D'),
            message_length(),
            Field::new("ColumnCount", FieldType::Int16, FieldValue::Int16(0)),
            Field::new("Columns", FieldType::Repeated, FieldValue::Groups(vec![]))
                .with_count_ref("ColumnCount")
                .with_template(vec![
                    Field::new("ColumnLength", FieldType::Int32, FieldValue::Int32(0)),
                    Field::new("ColumnData", FieldType::ByteN, FieldValue::Bytes(None))
                        .with_count_ref("ColumnLength"),
                ]),
        ],
    )
});

/// A single column value in a data row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataValue {
    /// SQL NULL value (encoded as length -1)
    Null,
    /// Non-NULL value (encoded as length + data bytes)
    Data(Vec<u8>),
}

/// 'D' - Data row
#[derive(Debug, Clone, PartialEq)]
pub struct DataRow {
    pub values: Vec<DataValue>,
}

impl Message for DataRow {
    fn default_format() -> &'static MessageFormat {
        &DATA_ROW
    }

    fn encode(&self) -> Result<MessageFormat, ProtocolError> {
        let mut format = Self::default_format().clone();
        format.set("ColumnCount", FieldValue::Int16(self.values.len() as i16))?;
        let template = format
            .field("Columns")
            .ok_or(ProtocolError::MissingField("Columns"))?
            .clone();
        let groups = self
            .values
            .iter()
            .map(|value| match value {
                DataValue::Null => {
                    template.instantiate(vec![FieldValue::Int32(-1), FieldValue::Bytes(None)])
                }
                DataValue::Data(bytes) => template.instantiate(vec![
                    FieldValue::Int32(bytes.len() as i32),
                    FieldValue::Bytes(Some(bytes.clone())),
                ]),
            })
            .collect::<Result<Vec<_>, _>>()?;
        format.set("Columns", FieldValue::Groups(groups))?;
        Ok(format)
    }

    fn decode(format: &MessageFormat) -> Result<Self, ProtocolError> {
        let mut values = Vec::new();
        for group in format.groups("Columns")? {
            let [_, data] = group.as_slice() else {
                return Err(ProtocolError::InvalidMessage);
            };
            match &data.value {
                FieldValue::Bytes(Some(bytes)) => values.push(DataValue::Data(bytes.clone())),
                FieldValue::Bytes(None) => values.push(DataValue::Null),
                _ => return Err(ProtocolError::InvalidMessage),
            }
        }
        Ok(DataRow { values })
    }
}

static COMMAND_COMPLETE: LazyLock<MessageFormat> = LazyLock::new(|| {
    MessageFormat::new(
        "CommandComplete",
        vec![
            header(b'C'),
            message_length(),
            Field::new("CommandTag", FieldType::CString, FieldValue::String(String::new())),
        ],
    )
});

/// 'C' - Command complete
///
/// Carries the executed query text and the accumulated row count; the
/// command tag is synthesized at encode time following PostgreSQL's tag
/// conventions.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandComplete {
    pub query: String,
    pub rows: i32,
}

impl CommandComplete {
    pub fn new(query: impl Into<String>) -> Self {
        CommandComplete {
            query: query.into(),
            rows: 0,
        }
    }

    /// Whether the query is INSERT/UPDATE/DELETE, which report the
    /// affected-row count rather than the returned-row count.
    pub fn is_iud(&self) -> bool {
        matches!(
            self.keyword().as_str(),
            "INSERT" | "UPDATE" | "DELETE"
        )
    }

    fn keyword(&self) -> String {
        self.query
            .split_whitespace()
            .next()
            .unwrap_or("")
            .to_uppercase()
    }

    fn tag(&self) -> String {
        let keyword = self.keyword();
        match keyword.as_str() {
            "INSERT" => format!("INSERT 0 {}", self.rows),
            "SELECT" | "UPDATE" | "DELETE" => format!("{} {}", keyword, self.rows),
            _ => keyword,
        }
    }
}

impl Message for CommandComplete {
    fn default_format() -> &'static MessageFormat {
        &COMMAND_COMPLETE
    }

    fn encode(&self) -> Result<MessageFormat, ProtocolError> {
        let mut format = Self::default_format().clone();
        format.set("CommandTag", FieldValue::String(self.tag()))?;
        Ok(format)
    }

    /// Rebuilds query/rows from the wire tag. Lossy for queries longer than
    /// their leading keyword; round-trip tests compare encoded bytes.
    fn decode(format: &MessageFormat) -> Result<Self, ProtocolError> {
        let tag = format.string("CommandTag")?;
        let mut parts = tag.split_whitespace();
        let keyword = parts.next().unwrap_or("").to_string();
        let rows = parts.next_back().and_then(|n| n.parse().ok()).unwrap_or(0);
        Ok(CommandComplete {
            query: keyword,
            rows,
        })
    }
}

static ERROR_RESPONSE: LazyLock<MessageFormat> = LazyLock::new(|| {
    MessageFormat::new(
        "ErrorResponse",
        vec![
            header(b'E'),
            message_length(),
            Field::new("Fields", FieldType::Repeated, FieldValue::Groups(vec![]))
                .with_flags(FieldFlags::REPEATED_TERMINATOR)
                .with_template(vec![
                    Field::new("Code", FieldType::Byte1, FieldValue::Byte(0)),
                    Field::new("Value", FieldType::CString, FieldValue::String(String::new())),
                ]),
        ],
    )
});

/// Error severity reported to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Fatal,
}

impl Severity {
    fn as_str(self) -> &'static str {
        match self {
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        }
    }
}

/// 'E' - Error response
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorResponse {
    pub severity: Severity,
    pub sql_state: String,
    pub message: String,
    /// Optional reporting routine name.
    pub routine: Option<String>,
}

impl ErrorResponse {
    pub fn error(sql_state: impl Into<String>, message: impl Into<String>) -> Self {
        ErrorResponse {
            severity: Severity::Error,
            sql_state: sql_state.into(),
            message: message.into(),
            routine: None,
        }
    }

    pub fn fatal(sql_state: impl Into<String>, message: impl Into<String>) -> Self {
        ErrorResponse {
            severity: Severity::Fatal,
            sql_state: sql_state.into(),
            message: message.into(),
            routine: None,
        }
    }

    pub fn with_routine(mut self, routine: impl Into<String>) -> Self {
        self.routine = Some(routine.into());
        self
    }
}

impl Message for ErrorResponse {
    fn default_format() -> &'static MessageFormat {
        &ERROR_RESPONSE
    }

    fn encode(&self) -> Result<MessageFormat, ProtocolError> {
        let mut format = Self::default_format().clone();
        let template = format
            .field("Fields")
            .ok_or(ProtocolError::MissingField("Fields"))?
            .clone();
        let mut pairs = vec![
            (b'S', self.severity.as_str().to_string()),
            (b'V', self.severity.as_str().to_string()),
            (b'C', self.sql_state.clone()),
            (b'M', self.message.clone()),
        ];
        if let Some(routine) = &self.routine {
            pairs.push((b'R', routine.clone()));
        }
        let groups = pairs
            .into_iter()
            .map(|(code, value)| {
                template.instantiate(vec![FieldValue::Byte(code), FieldValue::String(value)])
            })
            .collect::<Result<Vec<_>, _>>()?;
        format.set("Fields", FieldValue::Groups(groups))?;
        Ok(format)
    }

    fn decode(format: &MessageFormat) -> Result<Self, ProtocolError> {
        let mut severity = Severity::Error;
        let mut sql_state = String::new();
        let mut message = String::new();
        let mut routine = None;
        for group in format.groups("Fields")? {
            let [code, value] = group.as_slice() else {
                return Err(ProtocolError::InvalidMessage);
            };
            let (FieldValue::Byte(code), FieldValue::String(value)) = (&code.value, &value.value)
            else {
                return Err(ProtocolError::InvalidMessage);
            };
            match code {
                b'S' => {
                    severity = if value == "FATAL" {
                        Severity::Fatal
                    } else {
                        Severity::Error
                    }
                }
                b'C' => sql_state = value.clone(),
                b'M' => message = value.clone(),
                b'R' => routine = Some(value.clone()),
                _ => {}
            }
        }
        Ok(ErrorResponse {
            severity,
            sql_state,
            message,
            routine,
        })
    }
}

static SSL_RESPONSE: LazyLock<MessageFormat> = LazyLock::new(|| {
    MessageFormat::new(
        "SSLResponse",
        vec![Field::new("Response", FieldType::Byte1, FieldValue::Byte(b'N'))],
    )
});

/// Single-byte reply to SSLRequest: 'S' (willing) or 'N' (declined).
/// This frame carries no header byte and no length field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SslResponse {
    pub supports_ssl: bool,
}

impl Message for SslResponse {
    fn default_format() -> &'static MessageFormat {
        &SSL_RESPONSE
    }

    fn encode(&self) -> Result<MessageFormat, ProtocolError> {
        let mut format = Self::default_format().clone();
        let byte = if self.supports_ssl { b'S' } else { b'N' };
        format.set("Response", FieldValue::Byte(byte))?;
        Ok(format)
    }

    fn decode(format: &MessageFormat) -> Result<Self, ProtocolError> {
        match format.byte("Response")? {
            b'S' => Ok(SslResponse { supports_ssl: true }),
            b'N' => Ok(SslResponse {
                supports_ssl: false,
            }),
            _ => Err(ProtocolError::InvalidMessage),
        }
    }
}

static GSSENC_RESPONSE: LazyLock<MessageFormat> = LazyLock::new(|| {
    MessageFormat::new(
        "GSSENCResponse",
        vec![Field::new("Response", FieldType::Byte1, FieldValue::Byte(b'N'))],
    )
});

/// Single-byte reply to GSSENCRequest: 'G' (willing) or 'N' (declined).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GssEncResponse {
    pub supports_gssapi: bool,
}

impl Message for GssEncResponse {
    fn default_format() -> &'static MessageFormat {
        &GSSENC_RESPONSE
    }

    fn encode(&self) -> Result<MessageFormat, ProtocolError> {
        let mut format = Self::default_format().clone();
        let byte = if self.supports_gssapi { b'G' } else { b'N' };
        format.set("Response", FieldValue::Byte(byte))?;
        Ok(format)
    }

    fn decode(format: &MessageFormat) -> Result<Self, ProtocolError> {
        match format.byte("Response")? {
            b'G' => Ok(GssEncResponse {
                supports_gssapi: true,
            }),
            b'N' => Ok(GssEncResponse {
                supports_gssapi: false,
            }),
            _ => Err(ProtocolError::InvalidMessage),
        }
    }
}

/// Any message the server sends to the client.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendMessage {
    AuthenticationOk(AuthenticationOk),
    ParameterStatus(ParameterStatus),
    BackendKeyData(BackendKeyData),
    ReadyForQuery(ReadyForQuery),
    ParseComplete(ParseComplete),
    BindComplete(BindComplete),
    ParameterDescription(ParameterDescription),
    RowDescription(RowDescription),
    DataRow(DataRow),
    CommandComplete(CommandComplete),
    ErrorResponse(ErrorResponse),
    SslResponse(SslResponse),
    GssEncResponse(GssEncResponse),
}

impl BackendMessage {
    /// Fill this message's descriptor for encoding.
    pub fn to_format(&self) -> Result<MessageFormat, ProtocolError> {
        match self {
            BackendMessage::AuthenticationOk(m) => m.encode(),
            BackendMessage::ParameterStatus(m) => m.encode(),
            BackendMessage::BackendKeyData(m) => m.encode(),
            BackendMessage::ReadyForQuery(m) => m.encode(),
            BackendMessage::ParseComplete(m) => m.encode(),
            BackendMessage::BindComplete(m) => m.encode(),
            BackendMessage::ParameterDescription(m) => m.encode(),
            BackendMessage::RowDescription(m) => m.encode(),
            BackendMessage::DataRow(m) => m.encode(),
            BackendMessage::CommandComplete(m) => m.encode(),
            BackendMessage::ErrorResponse(m) => m.encode(),
            BackendMessage::SslResponse(m) => m.encode(),
            BackendMessage::GssEncResponse(m) => m.encode(),
        }
    }
}

macro_rules! backend_from {
    ($($ty:ident),* $(,)?) => {
        $(impl From<$ty> for BackendMessage {
            fn from(m: $ty) -> BackendMessage {
                BackendMessage::$ty(m)
            }
        })*
    };
}

backend_from!(
    AuthenticationOk,
    ParameterStatus,
    BackendKeyData,
    ReadyForQuery,
    ParseComplete,
    BindComplete,
    ParameterDescription,
    RowDescription,
    DataRow,
    CommandComplete,
    ErrorResponse,
    SslResponse,
    GssEncResponse,
);
