//! Key comparison against raw byte keys.
//!
//! Raw character bytes go through the CCSID decoders; invalid data must come
//! back as an error, never a panic.

#![no_main]

use std::sync::Arc;

use ddm_core::{
    Ccsid, CharConverter, FieldDescription, FieldKind, FieldValue, Record, RecordFormat,
    compare_keys,
};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&selector, raw)) = data.split_first() else {
        return;
    };

    let ccsid = match selector % 4 {
        0 => Ccsid::EBCDIC_US,
        1 => Ccsid::UTF8,
        2 => Ccsid::UTF16,
        _ => Ccsid::UCS2,
    };

    let kind = match (selector >> 2) % 3 {
        0 => FieldKind::VarChar,
        1 => FieldKind::FixedChar,
        _ => FieldKind::Binary,
    };

    let Some(format) = RecordFormat::new("F", vec![FieldDescription::new("K", kind, raw.len())])
        .with_key(&["K"])
    else {
        return;
    };

    let stored = match ccsid.decode(raw) {
        Ok(text) if kind != FieldKind::Binary => FieldValue::Text(text),
        _ => FieldValue::Bytes(raw.to_vec()),
    };
    let record = Record::new(Arc::new(format), 1, vec![stored]);

    let result = compare_keys(&[FieldValue::Bytes(raw.to_vec())], &record, &ccsid);
    if ccsid.decode(raw).is_ok() || kind == FieldKind::Binary {
        assert_eq!(result, Ok(true));
    }
});
