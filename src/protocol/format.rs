//! Declarative message descriptors.
//!
//! Every PostgreSQL frame is described by a [`MessageFormat`]: an ordered
//! list of typed fields. A single generic walker drives both encoding and
//! decoding from the descriptor, so adding a new message means adding one
//! descriptor plus one typed struct, not a hand-written codec pair.

use bytes::{Buf, BufMut, BytesMut};

use crate::protocol::ProtocolError;
use crate::protocol::wire;

/// Wire type of a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Single byte, e.g. a message header or a status indicator.
    Byte1,
    Int8,
    Int16,
    Int32,
    /// Null-terminated string.
    CString,
    /// Byte array whose length is carried by a preceding integer field
    /// (referenced through `count_ref`). A length of -1 is the SQL NULL.
    ByteN,
    /// A group of fields repeated `count_ref` times, or until a zero byte
    /// when flagged with `REPEATED_TERMINATOR`.
    Repeated,
}

/// Bitset of field behaviors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FieldFlags(u8);

impl FieldFlags {
    pub const NONE: FieldFlags = FieldFlags(0);
    /// This field is the message header byte. Must be the first field.
    pub const HEADER: FieldFlags = FieldFlags(1);
    /// This field is the message length, counting itself.
    pub const LENGTH_INCLUSIVE: FieldFlags = FieldFlags(1 << 1);
    /// This field is the message length, not counting itself.
    pub const LENGTH_EXCLUSIVE: FieldFlags = FieldFlags(1 << 2);
    /// Repeated group terminated by a zero byte instead of a count.
    pub const REPEATED_TERMINATOR: FieldFlags = FieldFlags(1 << 3);
    /// Field does not contribute to the message length.
    pub const EXCLUDE_IN_LENGTH: FieldFlags = FieldFlags(1 << 4);

    pub const fn contains(self, other: FieldFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether this field carries the message length in either variant.
    pub const fn is_length(self) -> bool {
        self.contains(Self::LENGTH_INCLUSIVE) || self.contains(Self::LENGTH_EXCLUSIVE)
    }
}

impl std::ops::BitOr for FieldFlags {
    type Output = FieldFlags;

    fn bitor(self, rhs: FieldFlags) -> FieldFlags {
        FieldFlags(self.0 | rhs.0)
    }
}

/// Data held by a field. The variant must agree with the field's [`FieldType`].
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Byte(u8),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    String(String),
    /// Byte array cell; `None` is the SQL NULL (wire length -1, no payload).
    Bytes(Option<Vec<u8>>),
    /// Filled instances of a repeated group.
    Groups(Vec<Vec<Field>>),
}

impl FieldValue {
    /// Numeric view of the value, used to resolve count references.
    fn as_count(&self) -> Option<i64> {
        match self {
            FieldValue::Byte(v) => Some(*v as i64),
            FieldValue::Int8(v) => Some(*v as i64),
            FieldValue::Int16(v) => Some(*v as i64),
            FieldValue::Int32(v) => Some(*v as i64),
            _ => None,
        }
    }
}

/// A single field of a message descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: &'static str,
    pub ty: FieldType,
    pub flags: FieldFlags,
    pub value: FieldValue,
    /// Name of the preceding integer field holding this field's count:
    /// the group count for `Repeated`, the byte length for `ByteN`.
    pub count_ref: Option<&'static str>,
    /// Field template for one group instance (`Repeated` only).
    pub template: Vec<Field>,
}

impl Field {
    pub fn new(name: &'static str, ty: FieldType, value: FieldValue) -> Field {
        Field {
            name,
            ty,
            flags: FieldFlags::NONE,
            value,
            count_ref: None,
            template: Vec::new(),
        }
    }

    pub fn with_flags(mut self, flags: FieldFlags) -> Field {
        self.flags = flags;
        self
    }

    pub fn with_count_ref(mut self, count_ref: &'static str) -> Field {
        self.count_ref = Some(count_ref);
        self
    }

    pub fn with_template(mut self, template: Vec<Field>) -> Field {
        self.template = template;
        self
    }

    /// Build one group instance from this repeated field's template,
    /// assigning `values` to the template fields in order.
    pub fn instantiate(&self, values: Vec<FieldValue>) -> Result<Vec<Field>, ProtocolError> {
        if values.len() != self.template.len() {
            return Err(ProtocolError::FieldMismatch(self.name));
        }
        let mut group = self.template.clone();
        for (field, value) in group.iter_mut().zip(values) {
            field.value = value;
        }
        Ok(group)
    }

    /// Encoded size of this field in bytes.
    fn size(&self) -> Result<usize, ProtocolError> {
        match (&self.ty, &self.value) {
            (FieldType::Byte1, FieldValue::Byte(_)) => Ok(1),
            (FieldType::Int8, FieldValue::Int8(_)) => Ok(1),
            (FieldType::Int16, FieldValue::Int16(_)) => Ok(2),
            (FieldType::Int32, FieldValue::Int32(_)) => Ok(4),
            (FieldType::CString, FieldValue::String(s)) => Ok(s.len() + 1),
            (FieldType::ByteN, FieldValue::Bytes(Some(b))) => Ok(b.len()),
            (FieldType::ByteN, FieldValue::Bytes(None)) => Ok(0),
            (FieldType::Repeated, FieldValue::Groups(groups)) => {
                let mut total = 0;
                for group in groups {
                    for field in group {
                        total += field.size()?;
                    }
                }
                if self.flags.contains(FieldFlags::REPEATED_TERMINATOR) {
                    total += 1;
                }
                Ok(total)
            }
            _ => Err(ProtocolError::FieldMismatch(self.name)),
        }
    }

    fn write(&self, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        match (&self.ty, &self.value) {
            (FieldType::Byte1, FieldValue::Byte(v)) => dst.put_u8(*v),
            (FieldType::Int8, FieldValue::Int8(v)) => dst.put_i8(*v),
            (FieldType::Int16, FieldValue::Int16(v)) => dst.put_i16(*v),
            (FieldType::Int32, FieldValue::Int32(v)) => dst.put_i32(*v),
            (FieldType::CString, FieldValue::String(s)) => wire::put_cstring(dst, s),
            (FieldType::ByteN, FieldValue::Bytes(Some(b))) => dst.put_slice(b),
            // NULL cell: the referenced length field already encodes -1.
            (FieldType::ByteN, FieldValue::Bytes(None)) => {}
            (FieldType::Repeated, FieldValue::Groups(groups)) => {
                for group in groups {
                    for field in group {
                        field.write(dst)?;
                    }
                }
                if self.flags.contains(FieldFlags::REPEATED_TERMINATOR) {
                    dst.put_u8(0);
                }
            }
            _ => return Err(ProtocolError::FieldMismatch(self.name)),
        }
        Ok(())
    }

    /// Decode this field in place. `earlier` holds the already-decoded
    /// fields preceding it (top-level fields or group siblings), used to
    /// resolve count references.
    fn read(&mut self, src: &mut BytesMut, earlier: &[Field]) -> Result<(), ProtocolError> {
        match self.ty {
            FieldType::Byte1 => self.value = FieldValue::Byte(wire::get_u8(src)?),
            FieldType::Int8 => self.value = FieldValue::Int8(wire::get_i8(src)?),
            FieldType::Int16 => self.value = FieldValue::Int16(wire::get_i16(src)?),
            FieldType::Int32 => self.value = FieldValue::Int32(wire::get_i32(src)?),
            FieldType::CString => self.value = FieldValue::String(wire::get_cstring(src)?),
            FieldType::ByteN => {
                let len = self.resolve_count(earlier)?;
                if len < 0 {
                    self.value = FieldValue::Bytes(None);
                } else {
                    if len as usize > src.len() {
                        return Err(ProtocolError::InsufficientData);
                    }
                    self.value = FieldValue::Bytes(Some(wire::get_bytes(src, len as usize)?));
                }
            }
            FieldType::Repeated => {
                let mut groups = Vec::new();
                if self.flags.contains(FieldFlags::REPEATED_TERMINATOR) {
                    while let Some(&next) = src.first() {
                        if next == 0 {
                            src.advance(1);
                            break;
                        }
                        groups.push(read_group(src, &self.template)?);
                    }
                } else {
                    let count = self.resolve_count(earlier)?;
                    if count < 0 {
                        return Err(ProtocolError::InvalidMessage);
                    }
                    // A count cannot exceed one group per remaining byte.
                    if count as usize > src.len().max(1) {
                        return Err(ProtocolError::InvalidMessage);
                    }
                    for _ in 0..count {
                        groups.push(read_group(src, &self.template)?);
                    }
                }
                self.value = FieldValue::Groups(groups);
            }
        }
        Ok(())
    }

    fn resolve_count(&self, earlier: &[Field]) -> Result<i64, ProtocolError> {
        let Some(name) = self.count_ref else {
            return Err(ProtocolError::MissingField(self.name));
        };
        earlier
            .iter()
            .rev()
            .find(|f| f.name == name)
            .and_then(|f| f.value.as_count())
            .ok_or(ProtocolError::MissingField(name))
    }
}

fn read_group(src: &mut BytesMut, template: &[Field]) -> Result<Vec<Field>, ProtocolError> {
    let mut group = template.to_vec();
    for i in 0..group.len() {
        let (earlier, rest) = group.split_at_mut(i);
        rest[0].read(src, earlier)?;
    }
    Ok(group)
}

/// Immutable description of one message: its name and ordered field list.
///
/// A default descriptor (with default data) is owned by each message type;
/// encoding overlays per-instance data on a copy, decoding fills a copy from
/// the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageFormat {
    pub name: &'static str,
    pub fields: Vec<Field>,
}

impl MessageFormat {
    pub fn new(name: &'static str, fields: Vec<Field>) -> MessageFormat {
        MessageFormat { name, fields }
    }

    /// Validate the descriptor invariants: at most one header field and it
    /// must be first, at most one length field.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        let headers = self
            .fields
            .iter()
            .filter(|f| f.flags.contains(FieldFlags::HEADER))
            .count();
        if headers > 1 {
            return Err(ProtocolError::InvalidMessage);
        }
        if headers == 1
            && !self
                .fields
                .first()
                .is_some_and(|f| f.flags.contains(FieldFlags::HEADER))
        {
            return Err(ProtocolError::InvalidMessage);
        }
        let lengths = self.fields.iter().filter(|f| f.flags.is_length()).count();
        if lengths > 1 {
            return Err(ProtocolError::InvalidMessage);
        }
        Ok(())
    }

    /// The message's header byte, when it has one.
    pub fn header_byte(&self) -> Option<u8> {
        let first = self.fields.first()?;
        if !first.flags.contains(FieldFlags::HEADER) {
            return None;
        }
        match first.value {
            FieldValue::Byte(b) => Some(b),
            _ => None,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Overlay per-instance data onto a field. Errors if the field is absent.
    pub fn set(&mut self, name: &str, value: FieldValue) -> Result<(), ProtocolError> {
        let Some(field) = self.fields.iter_mut().find(|f| f.name == name) else {
            return Err(ProtocolError::MissingField("unknown"));
        };
        field.value = value;
        Ok(())
    }

    pub fn byte(&self, name: &'static str) -> Result<u8, ProtocolError> {
        match self.field(name).map(|f| &f.value) {
            Some(FieldValue::Byte(v)) => Ok(*v),
            Some(_) => Err(ProtocolError::FieldMismatch(name)),
            None => Err(ProtocolError::MissingField(name)),
        }
    }

    pub fn int16(&self, name: &'static str) -> Result<i16, ProtocolError> {
        match self.field(name).map(|f| &f.value) {
            Some(FieldValue::Int16(v)) => Ok(*v),
            Some(_) => Err(ProtocolError::FieldMismatch(name)),
            None => Err(ProtocolError::MissingField(name)),
        }
    }

    pub fn int32(&self, name: &'static str) -> Result<i32, ProtocolError> {
        match self.field(name).map(|f| &f.value) {
            Some(FieldValue::Int32(v)) => Ok(*v),
            Some(_) => Err(ProtocolError::FieldMismatch(name)),
            None => Err(ProtocolError::MissingField(name)),
        }
    }

    pub fn string(&self, name: &'static str) -> Result<&str, ProtocolError> {
        match self.field(name).map(|f| &f.value) {
            Some(FieldValue::String(s)) => Ok(s),
            Some(_) => Err(ProtocolError::FieldMismatch(name)),
            None => Err(ProtocolError::MissingField(name)),
        }
    }

    pub fn groups(&self, name: &'static str) -> Result<&[Vec<Field>], ProtocolError> {
        match self.field(name).map(|f| &f.value) {
            Some(FieldValue::Groups(groups)) => Ok(groups),
            Some(_) => Err(ProtocolError::FieldMismatch(name)),
            None => Err(ProtocolError::MissingField(name)),
        }
    }

    /// Serialize the message: header byte (if present), computed length
    /// (if a length field is present), then every remaining field in order.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut dst = BytesMut::new();

        for (i, field) in self.fields.iter().enumerate() {
            if field.flags.contains(FieldFlags::HEADER) {
                field.write(&mut dst)?;
                continue;
            }
            if field.flags.is_length() {
                let mut payload = 0usize;
                for later in &self.fields[i + 1..] {
                    if later.flags.contains(FieldFlags::EXCLUDE_IN_LENGTH) {
                        continue;
                    }
                    payload += later.size()?;
                }
                let length = if field.flags.contains(FieldFlags::LENGTH_INCLUSIVE) {
                    payload + 4
                } else {
                    payload
                };
                dst.put_i32(length as i32);
                continue;
            }
            field.write(&mut dst)?;
        }
        Ok(dst.to_vec())
    }

    /// Decode a message payload (everything after the header byte and the
    /// length field) against this descriptor, returning a filled copy.
    /// The entire payload must be consumed.
    pub fn decode_body(&self, src: &mut BytesMut) -> Result<MessageFormat, ProtocolError> {
        let mut decoded = self.clone();
        for i in 0..decoded.fields.len() {
            let (earlier, rest) = decoded.fields.split_at_mut(i);
            let field = &mut rest[0];
            if field.flags.contains(FieldFlags::HEADER) || field.flags.is_length() {
                continue;
            }
            field.read(src, earlier)?;
        }
        if !src.is_empty() {
            return Err(ProtocolError::TrailingBytes(src.len()));
        }
        Ok(decoded)
    }

    /// Check that two descriptors describe the same message: same name and
    /// the same field sequence with compatible types, flags and count
    /// references. Held data is ignored. The name check matters for
    /// messages whose field shapes coincide (Sync and Terminate differ only
    /// in their header byte, which is data).
    pub fn matches_structure(&self, other: &MessageFormat) -> Result<(), ProtocolError> {
        fn fields_match(a: &[Field], b: &[Field]) -> bool {
            a.len() == b.len()
                && a.iter().zip(b).all(|(x, y)| {
                    x.name == y.name
                        && x.ty == y.ty
                        && x.flags == y.flags
                        && x.count_ref == y.count_ref
                        && fields_match(&x.template, &y.template)
                })
        }

        if self.name == other.name && fields_match(&self.fields, &other.fields) {
            Ok(())
        } else {
            Err(ProtocolError::StructureMismatch {
                expected: self.name,
                actual: other.name,
            })
        }
    }
}

/// A concrete message type paired with its descriptor.
///
/// Encoding produces a filled copy of the default descriptor; decoding reads
/// a filled descriptor back into the typed struct.
pub trait Message: Sized {
    /// The default descriptor for this message type.
    fn default_format() -> &'static MessageFormat;

    /// Fill a copy of the default descriptor with this instance's data.
    fn encode(&self) -> Result<MessageFormat, ProtocolError>;

    /// Build an instance from a filled descriptor.
    fn decode(format: &MessageFormat) -> Result<Self, ProtocolError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A synthetic format exercising every field type.
    fn sample_format() -> MessageFormat {
        MessageFormat::new(
            "Sample",
            vec![
                Field::new("Header", FieldType::Byte1, FieldValue::Byte(b'?'))
                    .with_flags(FieldFlags::HEADER),
                Field::new("MessageLength", FieldType::Int32, FieldValue::Int32(4))
                    .with_flags(FieldFlags::LENGTH_INCLUSIVE),
                Field::new("Label", FieldType::CString, FieldValue::String(String::new())),
                Field::new("Count", FieldType::Int16, FieldValue::Int16(0)),
                Field::new("Items", FieldType::Repeated, FieldValue::Groups(vec![]))
                    .with_count_ref("Count")
                    .with_template(vec![
                        Field::new("ItemLength", FieldType::Int32, FieldValue::Int32(0)),
                        Field::new("ItemData", FieldType::ByteN, FieldValue::Bytes(None))
                            .with_count_ref("ItemLength"),
                    ]),
            ],
        )
    }

    fn filled_sample() -> MessageFormat {
        let mut format = sample_format();
        format
            .set("Label", FieldValue::String("abc".to_string()))
            .unwrap();
        format.set("Count", FieldValue::Int16(2)).unwrap();
        let items = format.field("Items").unwrap().clone();
        format
            .set(
                "Items",
                FieldValue::Groups(vec![
                    items
                        .instantiate(vec![
                            FieldValue::Int32(2),
                            FieldValue::Bytes(Some(b"hi".to_vec())),
                        ])
                        .unwrap(),
                    items
                        .instantiate(vec![FieldValue::Int32(-1), FieldValue::Bytes(None)])
                        .unwrap(),
                ]),
            )
            .unwrap();
        format
    }

    #[test]
    fn test_encode_layout() {
        let buf = filled_sample().encode().unwrap();
        // '?', length, "abc\0", count, (2, "hi"), (-1)
        assert_eq!(buf[0], b'?');
        let length = i32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]);
        // 4 (self) + 4 (label) + 2 (count) + 4+2 (item 1) + 4 (item 2)
        assert_eq!(length, 20);
        assert_eq!(&buf[5..9], b"abc\0");
    }

    #[test]
    fn test_length_field_invariant() {
        // Inclusive: on-wire length equals the bytes following the header.
        let buf = filled_sample().encode().unwrap();
        let length = i32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]) as usize;
        assert_eq!(length, buf.len() - 1);
    }

    #[test]
    fn test_length_exclusive() {
        let format = MessageFormat::new(
            "Exclusive",
            vec![
                Field::new("MessageLength", FieldType::Int32, FieldValue::Int32(0))
                    .with_flags(FieldFlags::LENGTH_EXCLUSIVE),
                Field::new("Value", FieldType::Int32, FieldValue::Int32(7)),
            ],
        );
        let buf = format.encode().unwrap();
        let length = i32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        // Exclusive: counts only the bytes after the length field itself.
        assert_eq!(length, buf.len() - 4);
        assert_eq!(length, 4);
    }

    #[test]
    fn test_decode_roundtrip() {
        let filled = filled_sample();
        let buf = filled.encode().unwrap();
        // Strip header + length, then decode the payload.
        let mut payload = BytesMut::from(&buf[5..]);
        let decoded = sample_format().decode_body(&mut payload).unwrap();
        assert_eq!(decoded, filled);
    }

    #[test]
    fn test_decode_trailing_bytes() {
        let mut payload = BytesMut::from(&b"abc\0\x00\x00junk"[..]);
        let err = sample_format().decode_body(&mut payload);
        assert!(matches!(err, Err(ProtocolError::TrailingBytes(_))));
    }

    #[test]
    fn test_decode_negative_count() {
        let mut payload = BytesMut::new();
        wire::put_cstring(&mut payload, "x");
        payload.put_i16(-1);
        let err = sample_format().decode_body(&mut payload);
        assert!(matches!(err, Err(ProtocolError::InvalidMessage)));
    }

    #[test]
    fn test_decode_overflowing_count() {
        let mut payload = BytesMut::new();
        wire::put_cstring(&mut payload, "x");
        payload.put_i16(i16::MAX);
        let err = sample_format().decode_body(&mut payload);
        assert!(matches!(err, Err(ProtocolError::InvalidMessage)));
    }

    #[test]
    fn test_repeated_terminator() {
        let format = MessageFormat::new(
            "Terminated",
            vec![
                Field::new("Fields", FieldType::Repeated, FieldValue::Groups(vec![]))
                    .with_flags(FieldFlags::REPEATED_TERMINATOR)
                    .with_template(vec![
                        Field::new("Code", FieldType::Byte1, FieldValue::Byte(0)),
                        Field::new("Value", FieldType::CString, FieldValue::String(String::new())),
                    ]),
            ],
        );

        let field = format.field("Fields").unwrap().clone();
        let mut filled = format.clone();
        filled
            .set(
                "Fields",
                FieldValue::Groups(vec![
                    field
                        .instantiate(vec![
                            FieldValue::Byte(b'S'),
                            FieldValue::String("ERROR".to_string()),
                        ])
                        .unwrap(),
                ]),
            )
            .unwrap();

        let buf = filled.encode().unwrap();
        assert_eq!(buf, b"SERROR\0\0");

        let mut payload = BytesMut::from(&buf[..]);
        let decoded = format.decode_body(&mut payload).unwrap();
        assert_eq!(decoded, filled);
    }

    #[test]
    fn test_matches_structure() {
        assert!(sample_format().matches_structure(&filled_sample()).is_ok());

        let mut other = sample_format();
        other.name = "Other";
        other.fields.pop();
        assert!(matches!(
            sample_format().matches_structure(&other),
            Err(ProtocolError::StructureMismatch { .. })
        ));
    }

    #[test]
    fn test_validate() {
        assert!(sample_format().validate().is_ok());

        // Header not first.
        let bad = MessageFormat::new(
            "Bad",
            vec![
                Field::new("Value", FieldType::Int32, FieldValue::Int32(0)),
                Field::new("Header", FieldType::Byte1, FieldValue::Byte(b'X'))
                    .with_flags(FieldFlags::HEADER),
            ],
        );
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_header_byte() {
        assert_eq!(sample_format().header_byte(), Some(b'?'));

        let headerless = MessageFormat::new(
            "NoHeader",
            vec![Field::new("Value", FieldType::Int32, FieldValue::Int32(0))],
        );
        assert_eq!(headerless.header_byte(), None);
    }
}
