//! Partial-key matching.
//!
//! A search key is a prefix of a record key: field `i` of the search key is
//! compared with key field `i` of the record, and fields past the end of the
//! search key are ignored. The comparison rule depends on the record field:
//!
//! - binary: same length and same bytes
//! - variable-length character: equal after stripping trailing blanks from
//!   both sides
//! - fixed-length character and numeric: plain value equality
//!
//! Character data given as raw bytes is decoded through the session's
//! [`CharConverter`] first. A search key longer than the record key never
//! matches, and neither does one that reaches a key field the record holds
//! no value for.

use std::borrow::Cow;

use crate::{
    convert::CharConverter,
    error::ConversionError,
    record::{FieldKind, FieldValue, Record},
};

/// Whether `key` matches the leading key fields of `record`.
///
/// Fails only when raw character bytes cannot be decoded.
pub fn compare_keys<C: CharConverter + ?Sized>(
    key: &[FieldValue],
    record: &Record,
    converter: &C,
) -> Result<bool, ConversionError> {
    if key.len() > record.key_len() {
        return Ok(false);
    }

    let mut fields = record.key();
    for search in key {
        // Record shorter than its format
        let Some((desc, value)) = fields.next() else {
            return Ok(false);
        };
        if !field_matches(desc.kind, search, value, converter)? {
            return Ok(false);
        }
    }

    Ok(true)
}

fn field_matches<C: CharConverter + ?Sized>(
    kind: FieldKind,
    search: &FieldValue,
    value: &FieldValue,
    converter: &C,
) -> Result<bool, ConversionError> {
    let matched = match kind {
        FieldKind::Binary => match (search, value) {
            (FieldValue::Bytes(a), FieldValue::Bytes(b)) => a.len() == b.len() && a == b,
            _ => false,
        },
        FieldKind::VarChar => {
            match (as_text(search, converter)?, as_text(value, converter)?) {
                (Some(a), Some(b)) => strip_trailing_blanks(&a) == strip_trailing_blanks(&b),
                _ => false,
            }
        },
        FieldKind::FixedChar => match (as_text(search, converter)?, as_text(value, converter)?) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
        FieldKind::Numeric => search == value,
    };
    Ok(matched)
}

fn as_text<'a, C: CharConverter + ?Sized>(
    value: &'a FieldValue,
    converter: &C,
) -> Result<Option<Cow<'a, str>>, ConversionError> {
    match value {
        FieldValue::Text(s) => Ok(Some(Cow::Borrowed(s))),
        FieldValue::Bytes(b) => converter.decode(b).map(|s| Some(Cow::Owned(s))),
        FieldValue::Int(_) | FieldValue::Decimal(_) => Ok(None),
    }
}

fn strip_trailing_blanks(s: &str) -> &str {
    s.trim_end_matches(' ')
}
