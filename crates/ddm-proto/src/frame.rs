//! Logical DDM messages.
//!
//! A [`Frame`] is one DSS as the application sees it: a header plus a
//! payload of any length. Whether it crosses the wire as a single frame or as
//! a head frame with continuation packets is decided by [`crate::segment`];
//! the length field of `header` is recomputed on every write.

use bytes::Bytes;

use crate::{flags::DssType, header::FrameHeader};

/// One logical DDM message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Header as received, or as it will be written (length is recomputed)
    pub header: FrameHeader,

    /// Payload bytes (DDM objects), header excluded
    pub payload: Bytes,
}

impl Frame {
    /// Create a frame from a header and payload.
    pub fn new(header: FrameHeader, payload: impl Into<Bytes>) -> Self {
        Self { header, payload: payload.into() }
    }

    /// Request DSS.
    pub fn request(correlation_id: u16, payload: impl Into<Bytes>) -> Self {
        Self::new(FrameHeader::new(DssType::Request, correlation_id), payload)
    }

    /// Reply DSS.
    pub fn reply(correlation_id: u16, payload: impl Into<Bytes>) -> Self {
        Self::new(FrameHeader::new(DssType::Reply, correlation_id), payload)
    }

    /// Object DSS.
    pub fn object(correlation_id: u16, payload: impl Into<Bytes>) -> Self {
        Self::new(FrameHeader::new(DssType::Object, correlation_id), payload)
    }

    /// Header plus payload length, independent of segmentation.
    pub fn logical_length(&self) -> usize {
        FrameHeader::SIZE + self.payload.len()
    }

    /// Whether this frame needs continuation packets on the wire.
    pub fn is_segmented(&self) -> bool {
        self.logical_length() > FrameHeader::MAX_FRAME_LENGTH
    }

    /// Correlation id shortcut.
    pub fn correlation_id(&self) -> u16 {
        self.header.correlation_id()
    }
}

/// Builds a chain of DSSs sent back to back.
///
/// Every frame but the last gets the chained bit. The same-correlator bit is
/// set on a frame when the frame after it carries the same correlation id,
/// which is how a reply and its trailing object DSSs are tied together.
#[derive(Debug, Default)]
pub struct ChainBuilder {
    frames: Vec<Frame>,
}

impl ChainBuilder {
    /// Start an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a frame.
    #[must_use]
    pub fn push(mut self, frame: Frame) -> Self {
        self.frames.push(frame);
        self
    }

    /// Finish the chain, fixing up chain and same-correlator bits.
    pub fn build(mut self) -> Vec<Frame> {
        let next_ids: Vec<Option<u16>> =
            (0..self.frames.len()).map(|i| self.frames.get(i + 1).map(Frame::correlation_id)).collect();

        for (frame, next) in self.frames.iter_mut().zip(next_ids) {
            let header = &mut frame.header;
            header.set_chained(next.is_some());
            header.set_same_correlator(next == Some(header.correlation_id()));
        }

        self.frames
    }
}
