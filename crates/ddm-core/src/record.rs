//! Record model for keyed and sequential files.
//!
//! A [`RecordFormat`] describes the fields of a file and which of them, in
//! order, make up the key. Records share their format through an `Arc` since
//! a fetch returns many records of the same format.

use std::sync::Arc;

/// How a field is stored on the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// Fixed-length character; trailing blanks are significant
    FixedChar,
    /// Variable-length character; trailing blanks are insignificant in keys
    VarChar,
    /// Raw bytes compared byte for byte
    Binary,
    /// Any numeric type (binary, packed, zoned, float)
    Numeric,
}

/// One field of a record format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescription {
    /// Field name
    pub name: String,
    /// Storage kind
    pub kind: FieldKind,
    /// Length in bytes (maximum length for variable fields)
    pub length: usize,
}

impl FieldDescription {
    /// Describe a field.
    pub fn new(name: impl Into<String>, kind: FieldKind, length: usize) -> Self {
        Self { name: name.into(), kind, length }
    }
}

/// Field layout of a file plus its key definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFormat {
    name: String,
    fields: Vec<FieldDescription>,
    key_fields: Vec<usize>,
}

impl RecordFormat {
    /// Format without a key.
    pub fn new(name: impl Into<String>, fields: Vec<FieldDescription>) -> Self {
        Self { name: name.into(), fields, key_fields: Vec::new() }
    }

    /// Set the key as field names in key order.
    ///
    /// Returns `None` if a name does not exist in the format.
    pub fn with_key(mut self, names: &[&str]) -> Option<Self> {
        self.key_fields = names.iter().map(|name| self.field_index(name)).collect::<Option<_>>()?;
        Some(self)
    }

    /// Format name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All fields in record order.
    pub fn fields(&self) -> &[FieldDescription] {
        &self.fields
    }

    /// Position of a field by name.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Number of key fields.
    pub fn key_field_count(&self) -> usize {
        self.key_fields.len()
    }

    /// Description of the `i`th key field.
    pub fn key_field(&self, i: usize) -> Option<&FieldDescription> {
        self.key_fields.get(i).and_then(|&idx| self.fields.get(idx))
    }
}

/// A field value, either from a record or from a search key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Decoded character data
    Text(String),
    /// Raw bytes; host-encoded text when it appears in a character field
    Bytes(Vec<u8>),
    /// Integer
    Int(i64),
    /// Decimal kept in its canonical string form to avoid rounding
    Decimal(String),
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(b: Vec<u8>) -> Self {
        Self::Bytes(b)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

/// One fetched record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    record_number: u32,
    format: Arc<RecordFormat>,
    fields: Vec<FieldValue>,
}

impl Record {
    /// Build a record. `fields` are in format order.
    pub fn new(format: Arc<RecordFormat>, record_number: u32, fields: Vec<FieldValue>) -> Self {
        Self { record_number, format, fields }
    }

    /// Relative record number within the file.
    pub fn record_number(&self) -> u32 {
        self.record_number
    }

    /// Format this record was read with.
    pub fn format(&self) -> &RecordFormat {
        &self.format
    }

    /// Field value by position.
    pub fn field(&self, i: usize) -> Option<&FieldValue> {
        self.fields.get(i)
    }

    /// Field value by name.
    pub fn field_by_name(&self, name: &str) -> Option<&FieldValue> {
        self.format.field_index(name).and_then(|i| self.fields.get(i))
    }

    /// Number of key fields.
    pub fn key_len(&self) -> usize {
        self.format.key_field_count()
    }

    /// Key fields in key order, paired with their descriptions.
    pub fn key(&self) -> impl Iterator<Item = (&FieldDescription, &FieldValue)> {
        self.format
            .key_fields
            .iter()
            .filter_map(|&idx| Some((self.format.fields.get(idx)?, self.fields.get(idx)?)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer_format() -> Arc<RecordFormat> {
        let format = RecordFormat::new(
            "CUSTREC",
            vec![
                FieldDescription::new("CUSNUM", FieldKind::Numeric, 6),
                FieldDescription::new("LSTNAM", FieldKind::VarChar, 20),
                FieldDescription::new("INIT", FieldKind::FixedChar, 3),
            ],
        )
        .with_key(&["LSTNAM", "INIT"])
        .unwrap();
        Arc::new(format)
    }

    #[test]
    fn key_follows_key_order() {
        let record = Record::new(
            customer_format(),
            7,
            vec![FieldValue::Int(938472), "Henning".into(), "G K".into()],
        );

        let key: Vec<_> = record.key().map(|(d, v)| (d.name.as_str(), v.clone())).collect();
        assert_eq!(key, vec![("LSTNAM", "Henning".into()), ("INIT", "G K".into())]);
        assert_eq!(record.key_len(), 2);
        assert_eq!(record.field_by_name("CUSNUM"), Some(&FieldValue::Int(938472)));
    }

    #[test]
    fn unknown_key_field_rejected() {
        let format = RecordFormat::new("F", vec![FieldDescription::new("A", FieldKind::Binary, 4)]);
        assert!(format.with_key(&["B"]).is_none());
    }
}
