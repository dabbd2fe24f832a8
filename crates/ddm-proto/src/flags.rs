//! Format byte of the DDM header.
//!
//! Byte 3 of the header packs four single-bit flags into its high nibble and
//! the DSS type code into its low nibble. Bits are numbered from the most
//! significant end, as host documentation does:
//!
//! ```text
//!  bit:   0      1        2          3          4..7
//!       ┌─────┬───────┬──────────┬──────────┬──────────┐
//!       │ rsv │ chain │ cont-err │ same-cor │ DSS type │
//!       └─────┴───────┴──────────┴──────────┴──────────┘
//! ```

use bitflags::bitflags;

use crate::errors::ProtocolError;

bitflags! {
    /// Flag bits in the high nibble of the format byte.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FormatFlags: u8 {
        /// Reserved, preserved as received
        const RESERVED = 0x80;
        /// Another DSS follows this one in the same batch
        const CHAINED = 0x40;
        /// The receiver should keep processing the chain after an error
        const CONTINUE_ON_ERROR = 0x20;
        /// The next chained DSS reuses this correlation id
        const SAME_CORRELATOR = 0x10;
    }
}

impl FormatFlags {
    /// Mask selecting the flag nibble.
    pub const MASK: u8 = 0xF0;
}

/// DSS type carried in the low nibble of the format byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DssType {
    /// Request (RQSDSS)
    Request = 0x01,
    /// Reply (RPYDSS)
    Reply = 0x02,
    /// Object (OBJDSS)
    Object = 0x03,
    /// Communication (CMNDSS)
    Communication = 0x04,
}

impl DssType {
    /// Mask selecting the type nibble.
    pub const MASK: u8 = 0x0F;

    /// Parse a type nibble.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value & Self::MASK {
            0x01 => Some(Self::Request),
            0x02 => Some(Self::Reply),
            0x03 => Some(Self::Object),
            0x04 => Some(Self::Communication),
            _ => None,
        }
    }

    /// Raw nibble value.
    pub fn to_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for DssType {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_u8(value).ok_or(ProtocolError::UnknownDssType(value & Self::MASK))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_bits_do_not_overlap_type_nibble() {
        assert_eq!(FormatFlags::all().bits() & DssType::MASK, 0);
        assert_eq!(FormatFlags::all().bits(), FormatFlags::MASK);
    }

    #[test]
    fn dss_type_roundtrip() {
        for ty in [DssType::Request, DssType::Reply, DssType::Object, DssType::Communication] {
            assert_eq!(DssType::from_u8(ty.to_u8()), Some(ty));
        }
    }

    #[test]
    fn unknown_type_nibble() {
        assert_eq!(DssType::from_u8(0x00), None);
        assert_eq!(DssType::from_u8(0x0F), None);
        assert!(matches!(DssType::try_from(0x49), Err(ProtocolError::UnknownDssType(0x09))));
    }

    #[test]
    fn type_parse_ignores_flag_nibble() {
        assert_eq!(DssType::from_u8(0x51), Some(DssType::Request));
    }
}
