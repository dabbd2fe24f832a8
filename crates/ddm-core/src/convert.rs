//! Host character decoding.
//!
//! Key comparison only needs to decode: a search key may carry a character
//! field as raw host bytes, and those bytes must become a string before
//! trailing blanks can be stripped. Encoding is provided for building keys.
//!
//! Supported CCSIDs:
//! - 37: EBCDIC US/Canada (single byte, total mapping)
//! - 1208: UTF-8
//! - 1200 and 13488: UTF-16 big-endian

use crate::error::ConversionError;

/// Decodes host character data.
pub trait CharConverter {
    /// CCSID this converter handles.
    fn ccsid(&self) -> u16;

    /// Decode host bytes into a string.
    fn decode(&self, bytes: &[u8]) -> Result<String, ConversionError>;

    /// Encode a string into host bytes.
    fn encode(&self, s: &str) -> Result<Vec<u8>, ConversionError>;
}

/// A supported CCSID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ccsid(u16);

impl Ccsid {
    /// EBCDIC US/Canada
    pub const EBCDIC_US: Self = Self(37);
    /// UTF-8
    pub const UTF8: Self = Self(1208);
    /// UTF-16 big-endian
    pub const UTF16: Self = Self(1200);
    /// UCS-2 big-endian, decoded as UTF-16
    pub const UCS2: Self = Self(13488);

    /// Look up a CCSID.
    pub fn new(id: u16) -> Result<Self, ConversionError> {
        match id {
            37 | 1208 | 1200 | 13488 => Ok(Self(id)),
            _ => Err(ConversionError::UnsupportedCcsid(id)),
        }
    }

    /// Numeric id.
    pub fn id(self) -> u16 {
        self.0
    }
}

impl Default for Ccsid {
    fn default() -> Self {
        Self::EBCDIC_US
    }
}

impl CharConverter for Ccsid {
    fn ccsid(&self) -> u16 {
        self.0
    }

    fn decode(&self, bytes: &[u8]) -> Result<String, ConversionError> {
        match self.0 {
            37 => Ok(bytes.iter().map(|&b| char::from(CP037_TO_LATIN1[usize::from(b)])).collect()),
            1208 => String::from_utf8(bytes.to_vec()).map_err(|e| ConversionError::InvalidData {
                ccsid: self.0,
                reason: e.to_string(),
            }),
            _ => decode_utf16be(self.0, bytes),
        }
    }

    fn encode(&self, s: &str) -> Result<Vec<u8>, ConversionError> {
        match self.0 {
            37 => s
                .chars()
                .map(|ch| {
                    u8::try_from(u32::from(ch))
                        .ok()
                        .and_then(|latin1| CP037_TO_LATIN1.iter().position(|&c| c == latin1))
                        .map(|pos| pos as u8)
                        .ok_or(ConversionError::Unmappable { ccsid: self.0, ch })
                })
                .collect(),
            1208 => Ok(s.as_bytes().to_vec()),
            _ => Ok(s.encode_utf16().flat_map(u16::to_be_bytes).collect()),
        }
    }
}

fn decode_utf16be(ccsid: u16, bytes: &[u8]) -> Result<String, ConversionError> {
    if bytes.len() % 2 != 0 {
        return Err(ConversionError::InvalidData {
            ccsid,
            reason: format!("odd byte count {}", bytes.len()),
        });
    }

    let units = bytes.chunks_exact(2).map(|pair| u16::from_be_bytes([pair[0], pair[1]]));
    char::decode_utf16(units)
        .collect::<Result<String, _>>()
        .map_err(|e| ConversionError::InvalidData { ccsid, reason: e.to_string() })
}

/// CCSID 37 to ISO-8859-1. The mapping is a bijection on bytes.
#[rustfmt::skip]
const CP037_TO_LATIN1: [u8; 256] = [
    0x00, 0x01, 0x02, 0x03, 0x9C, 0x09, 0x86, 0x7F, 0x97, 0x8D, 0x8E, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F,
    0x10, 0x11, 0x12, 0x13, 0x9D, 0x85, 0x08, 0x87, 0x18, 0x19, 0x92, 0x8F, 0x1C, 0x1D, 0x1E, 0x1F,
    0x80, 0x81, 0x82, 0x83, 0x84, 0x0A, 0x17, 0x1B, 0x88, 0x89, 0x8A, 0x8B, 0x8C, 0x05, 0x06, 0x07,
    0x90, 0x91, 0x16, 0x93, 0x94, 0x95, 0x96, 0x04, 0x98, 0x99, 0x9A, 0x9B, 0x14, 0x15, 0x9E, 0x1A,
    0x20, 0xA0, 0xE2, 0xE4, 0xE0, 0xE1, 0xE3, 0xE5, 0xE7, 0xF1, 0xA2, 0x2E, 0x3C, 0x28, 0x2B, 0x7C,
    0x26, 0xE9, 0xEA, 0xEB, 0xE8, 0xED, 0xEE, 0xEF, 0xEC, 0xDF, 0x21, 0x24, 0x2A, 0x29, 0x3B, 0xAC,
    0x2D, 0x2F, 0xC2, 0xC4, 0xC0, 0xC1, 0xC3, 0xC5, 0xC7, 0xD1, 0xA6, 0x2C, 0x25, 0x5F, 0x3E, 0x3F,
    0xF8, 0xC9, 0xCA, 0xCB, 0xC8, 0xCD, 0xCE, 0xCF, 0xCC, 0x60, 0x3A, 0x23, 0x40, 0x27, 0x3D, 0x22,
    0xD8, 0x61, 0x62, 0x63, 0x64, 0x65, 0x66, 0x67, 0x68, 0x69, 0xAB, 0xBB, 0xF0, 0xFD, 0xFE, 0xB1,
    0xB0, 0x6A, 0x6B, 0x6C, 0x6D, 0x6E, 0x6F, 0x70, 0x71, 0x72, 0xAA, 0xBA, 0xE6, 0xB8, 0xC6, 0xA4,
    0xB5, 0x7E, 0x73, 0x74, 0x75, 0x76, 0x77, 0x78, 0x79, 0x7A, 0xA1, 0xBF, 0xD0, 0xDD, 0xDE, 0xAE,
    0x5E, 0xA3, 0xA5, 0xB7, 0xA9, 0xA7, 0xB6, 0xBC, 0xBD, 0xBE, 0x5B, 0x5D, 0xAF, 0xA8, 0xB4, 0xD7,
    0x7B, 0x41, 0x42, 0x43, 0x44, 0x45, 0x46, 0x47, 0x48, 0x49, 0xAD, 0xF4, 0xF6, 0xF2, 0xF3, 0xF5,
    0x7D, 0x4A, 0x4B, 0x4C, 0x4D, 0x4E, 0x4F, 0x50, 0x51, 0x52, 0xB9, 0xFB, 0xFC, 0xF9, 0xFA, 0xFF,
    0x5C, 0xF7, 0x53, 0x54, 0x55, 0x56, 0x57, 0x58, 0x59, 0x5A, 0xB2, 0xD4, 0xD6, 0xD2, 0xD3, 0xD5,
    0x30, 0x31, 0x32, 0x33, 0x34, 0x35, 0x36, 0x37, 0x38, 0x39, 0xB3, 0xDB, 0xDC, 0xD9, 0xDA, 0x9F,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ebcdic_letters_digits_blank() {
        let text = Ccsid::EBCDIC_US.decode(&[0xC1, 0xC2, 0xC3, 0x40, 0xF1, 0xF2]).unwrap();
        assert_eq!(text, "ABC 12");
    }

    #[test]
    fn ebcdic_encode() {
        assert_eq!(Ccsid::EBCDIC_US.encode("HELLO").unwrap(), vec![0xC8, 0xC5, 0xD3, 0xD3, 0xD6]);
        assert!(matches!(
            Ccsid::EBCDIC_US.encode("\u{20AC}"),
            Err(ConversionError::Unmappable { ccsid: 37, .. })
        ));
    }

    #[test]
    fn ebcdic_table_is_a_bijection() {
        let mut seen = [false; 256];
        for &b in &CP037_TO_LATIN1 {
            assert!(!seen[usize::from(b)], "duplicate mapping to {b:#04x}");
            seen[usize::from(b)] = true;
        }
    }

    #[test]
    fn ebcdic_roundtrip_all_bytes() {
        let all: Vec<u8> = (0..=255).collect();
        let text = Ccsid::EBCDIC_US.decode(&all).unwrap();
        assert_eq!(Ccsid::EBCDIC_US.encode(&text).unwrap(), all);
    }

    #[test]
    fn utf8_invalid_sequence() {
        let err = Ccsid::UTF8.decode(&[0x41, 0xFF]).unwrap_err();
        assert!(matches!(err, ConversionError::InvalidData { ccsid: 1208, .. }));
    }

    #[test]
    fn utf16_decode() {
        assert_eq!(Ccsid::UTF16.decode(&[0x00, 0x41, 0x00, 0x20]).unwrap(), "A ");
        assert!(Ccsid::UCS2.decode(&[0x00]).is_err());
        // Unpaired high surrogate
        assert!(Ccsid::UTF16.decode(&[0xD8, 0x00, 0x00, 0x41]).is_err());
    }

    #[test]
    fn unsupported_ccsid() {
        assert_eq!(Ccsid::new(65535), Err(ConversionError::UnsupportedCcsid(65535)));
        assert_eq!(Ccsid::new(13488).map(Ccsid::id), Ok(13488));
    }
}
