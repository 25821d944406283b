//! Messages sent by the frontend (client): the startup-phase frames matched
//! structurally, and the query-phase frames dispatched by header byte
//! through a process-wide registry.

use std::collections::HashMap;
use std::sync::LazyLock;

use bytes::BytesMut;

use crate::protocol::ProtocolError;
use crate::protocol::format::{Field, FieldFlags, FieldType, FieldValue, Message, MessageFormat};

/// SSLRequest magic number
pub const SSL_REQUEST_CODE: i32 = (1234 << 16) | 5679; // 80877103

/// GSSENCRequest magic number
pub const GSSENC_REQUEST_CODE: i32 = (1234 << 16) | 5680; // 80877104

fn header(byte: u8) -> Field {
    Field::new("Header", FieldType::Byte1, FieldValue::Byte(byte)).with_flags(FieldFlags::HEADER)
}

fn message_length() -> Field {
    Field::new("MessageLength", FieldType::Int32, FieldValue::Int32(4))
        .with_flags(FieldFlags::LENGTH_INCLUSIVE)
}

// ---------------------------------------------------------------------------
// Startup-phase messages (no header byte; matched structurally)
// ---------------------------------------------------------------------------

static STARTUP_MESSAGE: LazyLock<MessageFormat> = LazyLock::new(|| {
    MessageFormat::new(
        "StartupMessage",
        vec![
            message_length(),
            Field::new("ProtocolVersion", FieldType::Int32, FieldValue::Int32(196608)),
            Field::new("Parameters", FieldType::Repeated, FieldValue::Groups(vec![]))
                .with_flags(FieldFlags::REPEATED_TERMINATOR)
                .with_template(vec![
                    Field::new("ParameterName", FieldType::CString, FieldValue::String(String::new())),
                    Field::new("ParameterValue", FieldType::CString, FieldValue::String(String::new())),
                ]),
        ],
    )
});

/// StartupMessage - normal connection startup
#[derive(Debug, Clone, PartialEq)]
pub struct StartupMessage {
    pub protocol_version: i32,
    pub parameters: HashMap<String, String>,
}

impl StartupMessage {
    pub fn user(&self) -> Option<&str> {
        self.parameters.get("user").map(String::as_str)
    }

    pub fn database(&self) -> Option<&str> {
        self.parameters
            .get("database")
            .filter(|db| !db.is_empty())
            .map(String::as_str)
    }
}

impl Message for StartupMessage {
    fn default_format() -> &'static MessageFormat {
        &STARTUP_MESSAGE
    }

    fn encode(&self) -> Result<MessageFormat, ProtocolError> {
        let mut format = Self::default_format().clone();
        format.set("ProtocolVersion", FieldValue::Int32(self.protocol_version))?;
        let template = format
            .field("Parameters")
            .ok_or(ProtocolError::MissingField("Parameters"))?
            .clone();
        let mut groups = Vec::with_capacity(self.parameters.len());
        for (name, value) in &self.parameters {
            groups.push(template.instantiate(vec![
                FieldValue::String(name.clone()),
                FieldValue::String(value.clone()),
            ])?);
        }
        format.set("Parameters", FieldValue::Groups(groups))?;
        Ok(format)
    }

    fn decode(format: &MessageFormat) -> Result<Self, ProtocolError> {
        let protocol_version = format.int32("ProtocolVersion")?;
        if protocol_version >> 16 != 3 {
            return Err(ProtocolError::UnsupportedProtocolVersion(protocol_version));
        }
        let mut parameters = HashMap::new();
        for group in format.groups("Parameters")? {
            let [name, value] = group.as_slice() else {
                return Err(ProtocolError::InvalidMessage);
            };
            let (FieldValue::String(name), FieldValue::String(value)) = (&name.value, &value.value)
            else {
                return Err(ProtocolError::InvalidMessage);
            };
            parameters.insert(name.clone(), value.clone());
        }
        Ok(StartupMessage {
            protocol_version,
            parameters,
        })
    }
}

static SSL_REQUEST: LazyLock<MessageFormat> = LazyLock::new(|| {
    MessageFormat::new(
        "SSLRequest",
        vec![
            Field::new("MessageLength", FieldType::Int32, FieldValue::Int32(8))
                .with_flags(FieldFlags::LENGTH_INCLUSIVE),
            Field::new("RequestCode", FieldType::Int32, FieldValue::Int32(SSL_REQUEST_CODE)),
        ],
    )
});

/// SSLRequest - client wants to negotiate TLS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SslRequest;

impl Message for SslRequest {
    fn default_format() -> &'static MessageFormat {
        &SSL_REQUEST
    }

    fn encode(&self) -> Result<MessageFormat, ProtocolError> {
        Ok(Self::default_format().clone())
    }

    fn decode(format: &MessageFormat) -> Result<Self, ProtocolError> {
        Self::default_format().matches_structure(format)?;
        if format.int32("RequestCode")? != SSL_REQUEST_CODE {
            return Err(ProtocolError::InvalidMessage);
        }
        Ok(SslRequest)
    }
}

static GSSENC_REQUEST: LazyLock<MessageFormat> = LazyLock::new(|| {
    MessageFormat::new(
        "GSSENCRequest",
        vec![
            Field::new("MessageLength", FieldType::Int32, FieldValue::Int32(8))
                .with_flags(FieldFlags::LENGTH_INCLUSIVE),
            Field::new("RequestCode", FieldType::Int32, FieldValue::Int32(GSSENC_REQUEST_CODE)),
        ],
    )
});

/// GSSENCRequest - client wants GSSAPI encryption
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GssEncRequest;

impl Message for GssEncRequest {
    fn default_format() -> &'static MessageFormat {
        &GSSENC_REQUEST
    }

    fn encode(&self) -> Result<MessageFormat, ProtocolError> {
        Ok(Self::default_format().clone())
    }

    fn decode(format: &MessageFormat) -> Result<Self, ProtocolError> {
        Self::default_format().matches_structure(format)?;
        if format.int32("RequestCode")? != GSSENC_REQUEST_CODE {
            return Err(ProtocolError::InvalidMessage);
        }
        Ok(GssEncRequest)
    }
}

/// A startup-phase frame. These carry no header byte, so the payload is
/// matched against each candidate in order; the first that decodes wins.
#[derive(Debug, Clone, PartialEq)]
pub enum InitialMessage {
    Startup(StartupMessage),
    SslRequest,
    GssEncRequest,
}

impl InitialMessage {
    /// Structurally match a startup-phase payload (everything after the
    /// length prefix) against the candidate set.
    pub fn decode(payload: &BytesMut) -> Result<InitialMessage, ProtocolError> {
        let mut attempt = payload.clone();
        if let Ok(format) = StartupMessage::default_format().decode_body(&mut attempt)
            && let Ok(startup) = StartupMessage::decode(&format)
        {
            return Ok(InitialMessage::Startup(startup));
        }

        let mut attempt = payload.clone();
        if let Ok(format) = SslRequest::default_format().decode_body(&mut attempt)
            && SslRequest::decode(&format).is_ok()
        {
            return Ok(InitialMessage::SslRequest);
        }

        let mut attempt = payload.clone();
        if let Ok(format) = GssEncRequest::default_format().decode_body(&mut attempt)
            && GssEncRequest::decode(&format).is_ok()
        {
            return Ok(InitialMessage::GssEncRequest);
        }

        Err(ProtocolError::InvalidMessage)
    }
}

// ---------------------------------------------------------------------------
// Query-phase messages (header byte + length prefix)
// ---------------------------------------------------------------------------

static QUERY: LazyLock<MessageFormat> = LazyLock::new(|| {
    MessageFormat::new(
        "Query",
        vec![
            header(b'Q'),
            message_length(),
            Field::new("String", FieldType::CString, FieldValue::String(String::new())),
        ],
    )
});

/// Query - simple query protocol
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub query: String,
}

impl Message for Query {
    fn default_format() -> &'static MessageFormat {
        &QUERY
    }

    fn encode(&self) -> Result<MessageFormat, ProtocolError> {
        let mut format = Self::default_format().clone();
        format.set("String", FieldValue::String(self.query.clone()))?;
        Ok(format)
    }

    fn decode(format: &MessageFormat) -> Result<Self, ProtocolError> {
        Ok(Query {
            query: format.string("String")?.to_string(),
        })
    }
}

static PARSE: LazyLock<MessageFormat> = LazyLock::new(|| {
    MessageFormat::new(
        "Parse",
        vec![
            header(b'P'),
            message_length(),
            Field::new("Name", FieldType::CString, FieldValue::String(String::new())),
            Field::new("Query", FieldType::CString, FieldValue::String(String::new())),
            Field::new("ParameterCount", FieldType::Int16, FieldValue::Int16(0)),
            Field::new("ParameterTypes", FieldType::Repeated, FieldValue::Groups(vec![]))
                .with_count_ref("ParameterCount")
                .with_template(vec![Field::new(
                    "ObjectID",
                    FieldType::Int32,
                    FieldValue::Int32(0),
                )]),
        ],
    )
});

/// Parse - create a prepared statement
#[derive(Debug, Clone, PartialEq)]
pub struct Parse {
    /// Destination prepared statement name ("" = the unnamed statement).
    pub name: String,
    pub query: String,
    /// Parameter type OIDs declared by the client (0 = unspecified).
    pub parameter_object_ids: Vec<i32>,
}

impl Message for Parse {
    fn default_format() -> &'static MessageFormat {
        &PARSE
    }

    fn encode(&self) -> Result<MessageFormat, ProtocolError> {
        let mut format = Self::default_format().clone();
        format.set("Name", FieldValue::String(self.name.clone()))?;
        format.set("Query", FieldValue::String(self.query.clone()))?;
        format.set(
            "ParameterCount",
            FieldValue::Int16(self.parameter_object_ids.len() as i16),
        )?;
        let template = format
            .field("ParameterTypes")
            .ok_or(ProtocolError::MissingField("ParameterTypes"))?
            .clone();
        let groups = self
            .parameter_object_ids
            .iter()
            .map(|oid| template.instantiate(vec![FieldValue::Int32(*oid)]))
            .collect::<Result<Vec<_>, _>>()?;
        format.set("ParameterTypes", FieldValue::Groups(groups))?;
        Ok(format)
    }

    fn decode(format: &MessageFormat) -> Result<Self, ProtocolError> {
        let mut parameter_object_ids = Vec::new();
        for group in format.groups("ParameterTypes")? {
            let [oid] = group.as_slice() else {
                return Err(ProtocolError::InvalidMessage);
            };
            let FieldValue::Int32(oid) = oid.value else {
                return Err(ProtocolError::InvalidMessage);
            };
            parameter_object_ids.push(oid);
        }
        Ok(Parse {
            name: format.string("Name")?.to_string(),
            query: format.string("Query")?.to_string(),
            parameter_object_ids,
        })
    }
}

static BIND: LazyLock<MessageFormat> = LazyLock::new(|| {
    MessageFormat::new(
        "Bind",
        vec![
            header(b'B'),
            message_length(),
            Field::new("DestinationPortal", FieldType::CString, FieldValue::String(String::new())),
            Field::new(
                "SourcePreparedStatement",
                FieldType::CString,
                FieldValue::String(String::new()),
            ),
            Field::new("ParameterFormatCodeCount", FieldType::Int16, FieldValue::Int16(0)),
            Field::new("ParameterFormatCodes", FieldType::Repeated, FieldValue::Groups(vec![]))
                .with_count_ref("ParameterFormatCodeCount")
                .with_template(vec![Field::new(
                    "FormatCode",
                    FieldType::Int16,
                    FieldValue::Int16(0),
                )]),
            Field::new("ParameterValueCount", FieldType::Int16, FieldValue::Int16(0)),
            Field::new("ParameterValues", FieldType::Repeated, FieldValue::Groups(vec![]))
                .with_count_ref("ParameterValueCount")
                .with_template(vec![
                    Field::new("ParameterLength", FieldType::Int32, FieldValue::Int32(0)),
                    Field::new("ParameterValue", FieldType::ByteN, FieldValue::Bytes(None))
                        .with_count_ref("ParameterLength"),
                ]),
            Field::new("ResultFormatCodeCount", FieldType::Int16, FieldValue::Int16(0)),
            Field::new("ResultFormatCodes", FieldType::Repeated, FieldValue::Groups(vec![]))
                .with_count_ref("ResultFormatCodeCount")
                .with_template(vec![Field::new(
                    "FormatCode",
                    FieldType::Int16,
                    FieldValue::Int16(0),
                )]),
        ],
    )
});

/// Bind - bind a prepared statement into a portal
#[derive(Debug, Clone, PartialEq)]
pub struct Bind {
    pub destination_portal: String,
    pub source_prepared_statement: String,
    pub parameter_format_codes: Vec<i16>,
    /// Bound parameter values (`None` = NULL). Accepted but not yet
    /// substituted into the statement.
    pub parameter_values: Vec<Option<Vec<u8>>>,
    pub result_format_codes: Vec<i16>,
}

fn format_codes_from(groups: &[Vec<Field>]) -> Result<Vec<i16>, ProtocolError> {
    groups
        .iter()
        .map(|group| match group.as_slice() {
            [code] => match code.value {
                FieldValue::Int16(v) => Ok(v),
                _ => Err(ProtocolError::InvalidMessage),
            },
            _ => Err(ProtocolError::InvalidMessage),
        })
        .collect()
}

fn format_code_groups(template: &Field, codes: &[i16]) -> Result<Vec<Vec<Field>>, ProtocolError> {
    codes
        .iter()
        .map(|code| template.instantiate(vec![FieldValue::Int16(*code)]))
        .collect()
}

impl Message for Bind {
    fn default_format() -> &'static MessageFormat {
        &BIND
    }

    fn encode(&self) -> Result<MessageFormat, ProtocolError> {
        let mut format = Self::default_format().clone();
        format.set(
            "DestinationPortal",
            FieldValue::String(self.destination_portal.clone()),
        )?;
        format.set(
            "SourcePreparedStatement",
            FieldValue::String(self.source_prepared_statement.clone()),
        )?;

        format.set(
            "ParameterFormatCodeCount",
            FieldValue::Int16(self.parameter_format_codes.len() as i16),
        )?;
        let template = format
            .field("ParameterFormatCodes")
            .ok_or(ProtocolError::MissingField("ParameterFormatCodes"))?
            .clone();
        format.set(
            "ParameterFormatCodes",
            FieldValue::Groups(format_code_groups(&template, &self.parameter_format_codes)?),
        )?;

        format.set(
            "ParameterValueCount",
            FieldValue::Int16(self.parameter_values.len() as i16),
        )?;
        let template = format
            .field("ParameterValues")
            .ok_or(ProtocolError::MissingField("ParameterValues"))?
            .clone();
        let values = self
            .parameter_values
            .iter()
            .map(|value| match value {
                Some(bytes) => template.instantiate(vec![
                    FieldValue::Int32(bytes.len() as i32),
                    FieldValue::Bytes(Some(bytes.clone())),
                ]),
                None => template.instantiate(vec![FieldValue::Int32(-1), FieldValue::Bytes(None)]),
            })
            .collect::<Result<Vec<_>, _>>()?;
        format.set("ParameterValues", FieldValue::Groups(values))?;

        format.set(
            "ResultFormatCodeCount",
            FieldValue::Int16(self.result_format_codes.len() as i16),
        )?;
        let template = format
            .field("ResultFormatCodes")
            .ok_or(ProtocolError::MissingField("ResultFormatCodes"))?
            .clone();
        format.set(
            "ResultFormatCodes",
            FieldValue::Groups(format_code_groups(&template, &self.result_format_codes)?),
        )?;
        Ok(format)
    }

    fn decode(format: &MessageFormat) -> Result<Self, ProtocolError> {
        let mut parameter_values = Vec::new();
        for group in format.groups("ParameterValues")? {
            let [_, value] = group.as_slice() else {
                return Err(ProtocolError::InvalidMessage);
            };
            let FieldValue::Bytes(bytes) = &value.value else {
                return Err(ProtocolError::InvalidMessage);
            };
            parameter_values.push(bytes.clone());
        }
        Ok(Bind {
            destination_portal: format.string("DestinationPortal")?.to_string(),
            source_prepared_statement: format.string("SourcePreparedStatement")?.to_string(),
            parameter_format_codes: format_codes_from(format.groups("ParameterFormatCodes")?)?,
            parameter_values,
            result_format_codes: format_codes_from(format.groups("ResultFormatCodes")?)?,
        })
    }
}

static DESCRIBE: LazyLock<MessageFormat> = LazyLock::new(|| {
    MessageFormat::new(
        "Describe",
        vec![
            header(b'D'),
            message_length(),
            Field::new("TargetType", FieldType::Byte1, FieldValue::Byte(b'S')),
            Field::new("Target", FieldType::CString, FieldValue::String(String::new())),
        ],
    )
});

/// Describe - describe a prepared statement ('S') or portal ('P')
#[derive(Debug, Clone, PartialEq)]
pub struct Describe {
    pub is_prepared: bool,
    pub target: String,
}

impl Message for Describe {
    fn default_format() -> &'static MessageFormat {
        &DESCRIBE
    }

    fn encode(&self) -> Result<MessageFormat, ProtocolError> {
        let mut format = Self::default_format().clone();
        let target_type = if self.is_prepared { b'S' } else { b'P' };
        format.set("TargetType", FieldValue::Byte(target_type))?;
        format.set("Target", FieldValue::String(self.target.clone()))?;
        Ok(format)
    }

    fn decode(format: &MessageFormat) -> Result<Self, ProtocolError> {
        let is_prepared = match format.byte("TargetType")? {
            b'S' => true,
            b'P' => false,
            _ => return Err(ProtocolError::InvalidMessage),
        };
        Ok(Describe {
            is_prepared,
            target: format.string("Target")?.to_string(),
        })
    }
}

static EXECUTE: LazyLock<MessageFormat> = LazyLock::new(|| {
    MessageFormat::new(
        "Execute",
        vec![
            header(b'E'),
            message_length(),
            Field::new("Portal", FieldType::CString, FieldValue::String(String::new())),
            Field::new("RowMax", FieldType::Int32, FieldValue::Int32(0)),
        ],
    )
});

/// Execute - run a bound portal
#[derive(Debug, Clone, PartialEq)]
pub struct Execute {
    pub portal: String,
    /// Maximum rows to return (0 = unlimited). Not yet honored.
    pub row_max: i32,
}

impl Message for Execute {
    fn default_format() -> &'static MessageFormat {
        &EXECUTE
    }

    fn encode(&self) -> Result<MessageFormat, ProtocolError> {
        let mut format = Self::default_format().clone();
        format.set("Portal", FieldValue::String(self.portal.clone()))?;
        format.set("RowMax", FieldValue::Int32(self.row_max))?;
        Ok(format)
    }

    fn decode(format: &MessageFormat) -> Result<Self, ProtocolError> {
        Ok(Execute {
            portal: format.string("Portal")?.to_string(),
            row_max: format.int32("RowMax")?,
        })
    }
}

static SYNC: LazyLock<MessageFormat> = LazyLock::new(|| {
    MessageFormat::new("Sync", vec![header(b'S'), message_length()])
});

/// Sync - end of an extended-query batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sync;

impl Message for Sync {
    fn default_format() -> &'static MessageFormat {
        &SYNC
    }

    fn encode(&self) -> Result<MessageFormat, ProtocolError> {
        Ok(Self::default_format().clone())
    }

    fn decode(format: &MessageFormat) -> Result<Self, ProtocolError> {
        Self::default_format().matches_structure(format)?;
        Ok(Sync)
    }
}

static TERMINATE: LazyLock<MessageFormat> = LazyLock::new(|| {
    MessageFormat::new("Terminate", vec![header(b'X'), message_length()])
});

/// Terminate - client is closing the connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Terminate;

impl Message for Terminate {
    fn default_format() -> &'static MessageFormat {
        &TERMINATE
    }

    fn encode(&self) -> Result<MessageFormat, ProtocolError> {
        Ok(Self::default_format().clone())
    }

    fn decode(format: &MessageFormat) -> Result<Self, ProtocolError> {
        Self::default_format().matches_structure(format)?;
        Ok(Terminate)
    }
}

/// A decoded query-phase frontend frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FrontendMessage {
    Query(Query),
    Parse(Parse),
    Bind(Bind),
    Describe(Describe),
    Execute(Execute),
    Sync(Sync),
    Terminate(Terminate),
}

impl FrontendMessage {
    /// The descriptor name of this message.
    pub fn name(&self) -> &'static str {
        match self {
            FrontendMessage::Query(_) => Query::default_format().name,
            FrontendMessage::Parse(_) => Parse::default_format().name,
            FrontendMessage::Bind(_) => Bind::default_format().name,
            FrontendMessage::Describe(_) => Describe::default_format().name,
            FrontendMessage::Execute(_) => Execute::default_format().name,
            FrontendMessage::Sync(_) => Sync::default_format().name,
            FrontendMessage::Terminate(_) => Terminate::default_format().name,
        }
    }
}

/// Registry entry for one header-tagged frontend message.
pub struct RegistryEntry {
    pub format: &'static MessageFormat,
    pub decode: fn(&MessageFormat) -> Result<FrontendMessage, ProtocolError>,
}

/// Process-wide dispatch table: header byte -> message descriptor.
/// Initialized once, read-only afterwards.
static HEADER_REGISTRY: LazyLock<HashMap<u8, RegistryEntry>> = LazyLock::new(|| {
    fn entry<M: Message + 'static>(
        table: &mut HashMap<u8, RegistryEntry>,
        decode: fn(&MessageFormat) -> Result<FrontendMessage, ProtocolError>,
    ) {
        let format = M::default_format();
        let byte = format
            .header_byte()
            .expect("registered frontend message must carry a header byte");
        table.insert(byte, RegistryEntry { format, decode });
    }

    let mut table = HashMap::new();
    entry::<Query>(&mut table, |f| Ok(FrontendMessage::Query(Query::decode(f)?)));
    entry::<Parse>(&mut table, |f| Ok(FrontendMessage::Parse(Parse::decode(f)?)));
    entry::<Bind>(&mut table, |f| Ok(FrontendMessage::Bind(Bind::decode(f)?)));
    entry::<Describe>(&mut table, |f| {
        Ok(FrontendMessage::Describe(Describe::decode(f)?))
    });
    entry::<Execute>(&mut table, |f| {
        Ok(FrontendMessage::Execute(Execute::decode(f)?))
    });
    entry::<Sync>(&mut table, |f| Ok(FrontendMessage::Sync(Sync::decode(f)?)));
    entry::<Terminate>(&mut table, |f| {
        Ok(FrontendMessage::Terminate(Terminate::decode(f)?))
    });
    table
});

/// Look up the registered descriptor for a header byte.
pub fn registered(header: u8) -> Option<&'static RegistryEntry> {
    HEADER_REGISTRY.get(&header)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Encode a message and strip the header byte + length prefix,
    /// returning the raw payload a decoder would see.
    fn payload_of<M: Message>(message: &M) -> BytesMut {
        let buf = message.encode().unwrap().encode().unwrap();
        let skip = if M::default_format().header_byte().is_some() {
            5
        } else {
            4
        };
        BytesMut::from(&buf[skip..])
    }

    #[test]
    fn test_query_roundtrip() {
        let message = Query {
            query: "SELECT 1".to_string(),
        };
        let mut payload = payload_of(&message);
        let format = Query::default_format().decode_body(&mut payload).unwrap();
        assert_eq!(Query::decode(&format).unwrap(), message);
    }

    #[test]
    fn test_parse_roundtrip() {
        let message = Parse {
            name: "s1".to_string(),
            query: "SELECT * FROM t WHERE id = $1".to_string(),
            parameter_object_ids: vec![23, 25],
        };
        let mut payload = payload_of(&message);
        let format = Parse::default_format().decode_body(&mut payload).unwrap();
        assert_eq!(Parse::decode(&format).unwrap(), message);
    }

    #[test]
    fn test_bind_roundtrip_with_null_parameter() {
        let message = Bind {
            destination_portal: "".to_string(),
            source_prepared_statement: "s1".to_string(),
            parameter_format_codes: vec![0],
            parameter_values: vec![Some(b"42".to_vec()), None],
            result_format_codes: vec![],
        };
        let mut payload = payload_of(&message);
        let format = Bind::default_format().decode_body(&mut payload).unwrap();
        assert_eq!(Bind::decode(&format).unwrap(), message);
    }

    #[test]
    fn test_describe_target_types() {
        for (is_prepared, byte) in [(true, b'S'), (false, b'P')] {
            let message = Describe {
                is_prepared,
                target: "x".to_string(),
            };
            let buf = message.encode().unwrap().encode().unwrap();
            assert_eq!(buf[5], byte);
            let mut payload = BytesMut::from(&buf[5..]);
            let format = Describe::default_format().decode_body(&mut payload).unwrap();
            assert_eq!(Describe::decode(&format).unwrap(), message);
        }
    }

    #[test]
    fn test_sync_matches_structure_gate() {
        let format = Sync::default_format().clone();
        assert!(Sync::decode(&format).is_ok());
        assert!(Sync::decode(Terminate::default_format()).is_err());
    }

    #[test]
    fn test_initial_message_startup() {
        let message = StartupMessage {
            protocol_version: 196608,
            parameters: HashMap::from([
                ("user".to_string(), "postgres".to_string()),
                ("database".to_string(), "testdb".to_string()),
            ]),
        };
        let payload = payload_of(&message);
        // Structural matching should pick StartupMessage over the requests.
        let decoded = InitialMessage::decode(&payload).unwrap();
        assert_eq!(decoded, InitialMessage::Startup(message));
    }

    #[test]
    fn test_initial_message_ssl_request() {
        let payload = payload_of(&SslRequest);
        assert_eq!(
            InitialMessage::decode(&payload).unwrap(),
            InitialMessage::SslRequest
        );
    }

    #[test]
    fn test_initial_message_gssenc_request() {
        let payload = payload_of(&GssEncRequest);
        assert_eq!(
            InitialMessage::decode(&payload).unwrap(),
            InitialMessage::GssEncRequest
        );
    }

    #[test]
    fn test_initial_message_bad_version() {
        let mut payload = BytesMut::new();
        use bytes::BufMut;
        payload.put_i32(0x0002_0000); // protocol 2.0
        payload.put_u8(0);
        assert!(InitialMessage::decode(&payload).is_err());
    }

    #[test]
    fn test_registry_covers_all_headers() {
        for byte in [b'Q', b'P', b'B', b'D', b'E', b'S', b'X'] {
            assert!(registered(byte).is_some(), "missing header {:?}", byte as char);
        }
        assert!(registered(b'z').is_none());
    }

    #[test]
    fn test_registered_formats_are_valid() {
        for byte in [b'Q', b'P', b'B', b'D', b'E', b'S', b'X'] {
            registered(byte).unwrap().format.validate().unwrap();
        }
    }
}
