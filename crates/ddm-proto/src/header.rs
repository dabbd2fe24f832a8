//! The 6-byte DDM frame header.
//!
//! ```text
//! Offset  Len  Field
//! 0       2    Length (big-endian, includes header; high bit = continued)
//! 2       1    GDS id (0xD0)
//! 3       1    Format flags (see [`crate::flags`])
//! 4       2    Correlation id (big-endian)
//! ```
//!
//! Parsing goes through `zerocopy`, so the layout is checked at compile time
//! and every accessor is a plain field read. Setters touch only the bits they
//! own; flipping one flag never disturbs another flag, the type nibble, the
//! length or the correlation id.

use std::fmt;

use bytes::BufMut;
use zerocopy::{
    FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned, byteorder::big_endian::U16,
};

use crate::{
    errors::{ProtocolError, Result},
    flags::{DssType, FormatFlags},
};

/// Fixed-size DDM header.
#[derive(Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct FrameHeader {
    length: U16,
    gds_id: u8,
    format: u8,
    correlation_id: U16,
}

impl FrameHeader {
    /// Header size in bytes.
    pub const SIZE: usize = 6;

    /// Architecture marker written in byte 2.
    pub const GDS_ID: u8 = 0xD0;

    /// Largest frame (header included) a single length field can describe.
    pub const MAX_FRAME_LENGTH: usize = 0x7FFF;

    /// High bit of a 16-bit length field; set means "more data follows".
    pub const CONTINUATION_BIT: u16 = 0x8000;

    /// Mask extracting the numeric part of a length field.
    pub const LENGTH_MASK: u16 = 0x7FFF;

    /// Length value written on the head frame of a segmented message.
    pub const CONTINUED_LENGTH: u16 = 0xFFFF;

    /// Create a header for an empty frame of the given type.
    pub fn new(dss_type: DssType, correlation_id: u16) -> Self {
        Self {
            length: U16::new(Self::SIZE as u16),
            gds_id: Self::GDS_ID,
            format: dss_type.to_u8(),
            correlation_id: U16::new(correlation_id),
        }
    }

    /// Decode a header from the first [`Self::SIZE`] bytes of `bytes`.
    ///
    /// Trailing bytes are ignored.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::read_from_prefix(bytes)
            .map(|(header, _)| header)
            .map_err(|_| ProtocolError::FrameTooShort { expected: Self::SIZE, actual: bytes.len() })
    }

    /// Encode to wire bytes.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out.copy_from_slice(self.as_bytes());
        out
    }

    /// Append the wire bytes to `dst`.
    pub fn encode_into(&self, dst: &mut impl BufMut) {
        dst.put_slice(self.as_bytes());
    }

    /// Numeric frame length with the continuation bit masked off.
    ///
    /// The high bit is reserved for continuation and is never part of the
    /// length, whether or not [`Self::is_continued`] holds.
    pub fn length(&self) -> u16 {
        self.length.get() & Self::LENGTH_MASK
    }

    /// Length field exactly as transmitted.
    pub fn raw_length(&self) -> u16 {
        self.length.get()
    }

    /// Overwrite the length field.
    pub fn set_length(&mut self, length: u16) {
        self.length = U16::new(length);
    }

    /// Whether the length field signals a segmented message.
    pub fn is_continued(&self) -> bool {
        self.length.get() & Self::CONTINUATION_BIT != 0
    }

    /// Mark this header as the head of a segmented message.
    pub fn set_continued(&mut self) {
        self.length = U16::new(Self::CONTINUED_LENGTH);
    }

    /// GDS id byte.
    pub fn gds_id(&self) -> u8 {
        self.gds_id
    }

    /// Overwrite the GDS id byte.
    pub fn set_gds_id(&mut self, gds_id: u8) {
        self.gds_id = gds_id;
    }

    /// Whether byte 2 carries the standard DDM marker.
    pub fn has_valid_gds_id(&self) -> bool {
        self.gds_id == Self::GDS_ID
    }

    /// Raw format byte.
    pub fn format_byte(&self) -> u8 {
        self.format
    }

    /// Flag nibble of the format byte.
    pub fn flags(&self) -> FormatFlags {
        FormatFlags::from_bits_truncate(self.format & FormatFlags::MASK)
    }

    /// Set or clear one or more flag bits, leaving every other bit alone.
    pub fn set_flags(&mut self, flags: FormatFlags, on: bool) {
        if on {
            self.format |= flags.bits();
        } else {
            self.format &= !flags.bits();
        }
    }

    /// Another DSS follows in the same chain.
    pub fn is_chained(&self) -> bool {
        self.flags().contains(FormatFlags::CHAINED)
    }

    /// Set or clear the chained bit.
    pub fn set_chained(&mut self, on: bool) {
        self.set_flags(FormatFlags::CHAINED, on);
    }

    /// Continue-on-error bit.
    pub fn is_continue_on_error(&self) -> bool {
        self.flags().contains(FormatFlags::CONTINUE_ON_ERROR)
    }

    /// Set or clear the continue-on-error bit.
    pub fn set_continue_on_error(&mut self, on: bool) {
        self.set_flags(FormatFlags::CONTINUE_ON_ERROR, on);
    }

    /// Same-correlator bit.
    pub fn is_same_correlator(&self) -> bool {
        self.flags().contains(FormatFlags::SAME_CORRELATOR)
    }

    /// Set or clear the same-correlator bit.
    pub fn set_same_correlator(&mut self, on: bool) {
        self.set_flags(FormatFlags::SAME_CORRELATOR, on);
    }

    /// DSS type, or `None` if the type nibble is not a known code.
    pub fn dss_type(&self) -> Option<DssType> {
        DssType::from_u8(self.format)
    }

    /// Raw type nibble.
    pub fn dss_type_raw(&self) -> u8 {
        self.format & DssType::MASK
    }

    /// Replace the type nibble.
    pub fn set_dss_type(&mut self, dss_type: DssType) {
        self.format = (self.format & FormatFlags::MASK) | dss_type.to_u8();
    }

    /// Correlation id.
    pub fn correlation_id(&self) -> u16 {
        self.correlation_id.get()
    }

    /// Overwrite the correlation id.
    pub fn set_correlation_id(&mut self, correlation_id: u16) {
        self.correlation_id = U16::new(correlation_id);
    }
}

impl fmt::Debug for FrameHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameHeader")
            .field("length", &self.length())
            .field("continued", &self.is_continued())
            .field("gds_id", &format_args!("{:#04x}", self.gds_id))
            .field("flags", &self.flags())
            .field("dss_type", &self.dss_type_raw())
            .field("correlation_id", &self.correlation_id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn decode_request_header() {
        let bytes = hex!("0026 D0 41 0001");
        let header = FrameHeader::from_bytes(&bytes).unwrap();

        assert_eq!(header.length(), 0x26);
        assert!(!header.is_continued());
        assert!(header.has_valid_gds_id());
        assert!(header.is_chained());
        assert!(!header.is_continue_on_error());
        assert!(!header.is_same_correlator());
        assert_eq!(header.dss_type(), Some(DssType::Request));
        assert_eq!(header.correlation_id(), 1);
    }

    #[test]
    fn decode_continued_header() {
        let header = FrameHeader::from_bytes(&hex!("FFFF D0 03 0002")).unwrap();

        assert!(header.is_continued());
        assert_eq!(header.raw_length(), 0xFFFF);
        assert_eq!(header.length(), 0x7FFF);
        assert_eq!(header.dss_type(), Some(DssType::Object));
    }

    #[test]
    fn length_masked_even_without_continuation_semantics() {
        // A stray high bit never leaks into the numeric length
        let header = FrameHeader::from_bytes(&hex!("8010 D0 02 0000")).unwrap();
        assert!(header.is_continued());
        assert_eq!(header.length(), 0x10);
    }

    #[test]
    fn encode_matches_wire_layout() {
        let mut header = FrameHeader::new(DssType::Reply, 0x1234);
        header.set_length(0x0100);
        header.set_chained(true);
        header.set_same_correlator(true);

        assert_eq!(header.to_bytes(), hex!("0100 D0 52 1234"));
    }

    #[test]
    fn decode_ignores_trailing_bytes() {
        let header = FrameHeader::from_bytes(&hex!("000A D0 01 0007 DEADBEEF")).unwrap();
        assert_eq!(header.length(), 10);
        assert_eq!(header.correlation_id(), 7);
    }

    #[test]
    fn short_input_rejected() {
        let err = FrameHeader::from_bytes(&[0x00, 0x06, 0xD0]).unwrap_err();
        assert!(matches!(err, ProtocolError::FrameTooShort { expected: 6, actual: 3 }));
    }

    #[test]
    fn unknown_type_preserved() {
        let header = FrameHeader::from_bytes(&hex!("0006 D0 4E 0001")).unwrap();
        assert_eq!(header.dss_type(), None);
        assert_eq!(header.dss_type_raw(), 0x0E);
        assert_eq!(header.to_bytes(), hex!("0006 D0 4E 0001"));
    }

    #[test]
    fn reserved_bit_survives_flag_updates() {
        let mut header = FrameHeader::from_bytes(&hex!("0006 D0 81 0001")).unwrap();
        header.set_chained(true);
        header.set_chained(false);
        assert_eq!(header.format_byte(), 0x81);
    }

    fn any_type() -> impl Strategy<Value = DssType> {
        prop_oneof![Just(DssType::Request), Just(DssType::Reply), Just(DssType::Object)]
    }

    /// One flag mutation applied through the public setters.
    #[derive(Debug, Clone)]
    enum Mutation {
        Chained(bool),
        ContinueOnError(bool),
        SameCorrelator(bool),
        Type(DssType),
    }

    fn any_mutation() -> impl Strategy<Value = Mutation> {
        prop_oneof![
            any::<bool>().prop_map(Mutation::Chained),
            any::<bool>().prop_map(Mutation::ContinueOnError),
            any::<bool>().prop_map(Mutation::SameCorrelator),
            any_type().prop_map(Mutation::Type),
        ]
    }

    proptest! {
        #[test]
        fn flag_setters_are_independent(
            raw in any::<[u8; 6]>(),
            mutation in any_mutation(),
        ) {
            let before = FrameHeader::from_bytes(&raw).unwrap();
            let mut after = before;

            match mutation {
                Mutation::Chained(on) => {
                    after.set_chained(on);
                    prop_assert_eq!(after.is_chained(), on);
                    prop_assert_eq!(after.is_continue_on_error(), before.is_continue_on_error());
                    prop_assert_eq!(after.is_same_correlator(), before.is_same_correlator());
                    prop_assert_eq!(after.dss_type_raw(), before.dss_type_raw());
                },
                Mutation::ContinueOnError(on) => {
                    after.set_continue_on_error(on);
                    prop_assert_eq!(after.is_continue_on_error(), on);
                    prop_assert_eq!(after.is_chained(), before.is_chained());
                    prop_assert_eq!(after.is_same_correlator(), before.is_same_correlator());
                    prop_assert_eq!(after.dss_type_raw(), before.dss_type_raw());
                },
                Mutation::SameCorrelator(on) => {
                    after.set_same_correlator(on);
                    prop_assert_eq!(after.is_same_correlator(), on);
                    prop_assert_eq!(after.is_chained(), before.is_chained());
                    prop_assert_eq!(after.is_continue_on_error(), before.is_continue_on_error());
                    prop_assert_eq!(after.dss_type_raw(), before.dss_type_raw());
                },
                Mutation::Type(ty) => {
                    after.set_dss_type(ty);
                    prop_assert_eq!(after.dss_type(), Some(ty));
                    prop_assert_eq!(after.flags(), before.flags());
                },
            }

            prop_assert_eq!(after.raw_length(), before.raw_length());
            prop_assert_eq!(after.correlation_id(), before.correlation_id());
            prop_assert_eq!(after.gds_id(), before.gds_id());
            prop_assert_eq!(after.format_byte() & FormatFlags::RESERVED.bits(),
                before.format_byte() & FormatFlags::RESERVED.bits());
        }

        #[test]
        fn encode_decode_is_identity(raw in any::<[u8; 6]>()) {
            let header = FrameHeader::from_bytes(&raw).unwrap();
            prop_assert_eq!(header.to_bytes(), raw);
        }
    }
}
