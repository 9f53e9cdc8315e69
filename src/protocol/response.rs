//! Response envelope shared by events, errors and replies.
//!
//! Common header layout (server byte order, as delivered by the transport):
//! ```text
//! ┌──────────┬──────────────┬──────────┬─────────────────┐
//! │ Kind     │ Detail/Code  │ Sequence │ Body...         │
//! │ 1 byte   │ 1 byte       │ u16      │                 │
//! └──────────┴──────────────┴──────────┴─────────────────┘
//! ```
//!
//! A kind of `0` marks an error; its code sits in the second byte. Replies
//! carry a u32 length (in 4-byte units beyond the 32-byte header) at offset 4.

use std::fmt;

use super::{BufferView, DecoderId, ProtocolObject};
use crate::error::{Error, Result};

/// Minimum bytes needed to read the common header.
pub const RESPONSE_HEADER_SIZE: usize = 4;

/// Fixed size of a reply before its variable-length tail.
pub const REPLY_HEADER_SIZE: usize = 32;

/// Kind byte value that marks an error.
pub const ERROR_KIND: u8 = 0;

/// Kind byte value that marks a reply.
pub const REPLY_KIND: u8 = 1;

/// Set on the kind byte of events generated by a client (SendEvent).
pub const SYNTHETIC_MASK: u8 = 0x80;

/// Generic response: read-only overlay on the first bytes of a view.
#[derive(Debug, Clone)]
pub struct Response {
    view: BufferView,
}

impl Response {
    /// Wrap a view, checking that the common header is present.
    pub fn new(view: BufferView) -> Result<Self> {
        if view.len() < RESPONSE_HEADER_SIZE {
            return Err(Error::range(0, RESPONSE_HEADER_SIZE, view.len()));
        }
        Ok(Self { view })
    }

    /// Kind byte (0 = error, 1 = reply, otherwise event code).
    #[inline]
    pub fn kind(&self) -> u8 {
        self.view.as_slice()[0]
    }

    /// Second header byte (event detail or error code).
    #[inline]
    pub fn detail(&self) -> u8 {
        self.view.as_slice()[1]
    }

    /// Sequence number (low 16 bits of the request counter).
    #[inline]
    pub fn sequence(&self) -> u16 {
        let raw = self.view.as_slice();
        u16::from_ne_bytes([raw[2], raw[3]])
    }

    /// Check if the kind byte marks an error.
    #[inline]
    pub fn is_error(&self) -> bool {
        self.kind() == ERROR_KIND
    }

    /// Get the underlying view.
    #[inline]
    pub fn view(&self) -> &BufferView {
        &self.view
    }

    /// Consume into the underlying view.
    pub fn into_view(self) -> BufferView {
        self.view
    }
}

impl ProtocolObject for Response {
    const NAME: &'static str = "Response";

    fn from_view(view: BufferView) -> Result<Self> {
        Response::new(view)
    }

    fn view(&self) -> &BufferView {
        &self.view
    }
}

/// Cast a response to `T` if `decoder` (or the generic fallback `G`) is `T`.
fn cast_as<T, G>(response: &Response, decoder: Option<DecoderId>) -> Result<T>
where
    T: ProtocolObject,
    G: ProtocolObject,
{
    let actual = decoder.unwrap_or_else(DecoderId::of::<G>);
    if !actual.is::<T>() {
        return Err(Error::TypeMismatch {
            expected: T::NAME,
            actual: actual.name(),
        });
    }
    T::from_view(response.view.clone())
}

/// An event, classified through the event dispatch table.
#[derive(Debug, Clone)]
pub struct Event {
    response: Response,
    decoder: Option<DecoderId>,
}

impl Event {
    pub(crate) fn classified(response: Response, decoder: Option<DecoderId>) -> Self {
        Self { response, decoder }
    }

    /// The generic response header.
    #[inline]
    pub fn response(&self) -> &Response {
        &self.response
    }

    /// Raw kind byte, including the synthetic bit.
    #[inline]
    pub fn kind(&self) -> u8 {
        self.response.kind()
    }

    /// Event opcode used for dispatch (synthetic bit cleared).
    #[inline]
    pub fn opcode(&self) -> u8 {
        self.response.kind() & !SYNTHETIC_MASK
    }

    /// Check if the event was sent by a client rather than the server.
    #[inline]
    pub fn is_synthetic(&self) -> bool {
        self.response.kind() & SYNTHETIC_MASK != 0
    }

    /// Sequence number of the last request processed by the server.
    #[inline]
    pub fn sequence(&self) -> u16 {
        self.response.sequence()
    }

    /// Registered decoder, or `None` for the generic event type.
    #[inline]
    pub fn decoder(&self) -> Option<DecoderId> {
        self.decoder
    }

    /// Name of the decoded type (`"Event"` when unregistered).
    pub fn name(&self) -> &'static str {
        self.decoder.map_or(Self::NAME, |d| d.name())
    }

    /// Check if this event was classified as `T`.
    pub fn is<T: ProtocolObject>(&self) -> bool {
        self.decoder.unwrap_or_else(DecoderId::of::<Event>).is::<T>()
    }

    /// Decode as the registered type `T`.
    pub fn cast<T: ProtocolObject>(&self) -> Result<T> {
        cast_as::<T, Event>(&self.response, self.decoder)
    }
}

impl ProtocolObject for Event {
    const NAME: &'static str = "Event";

    fn from_view(view: BufferView) -> Result<Self> {
        Ok(Self::classified(Response::new(view)?, None))
    }

    fn view(&self) -> &BufferView {
        self.response.view()
    }
}

/// A server error, classified through the error dispatch table.
#[derive(Debug, Clone)]
pub struct ProtocolError {
    response: Response,
    decoder: Option<DecoderId>,
}

impl ProtocolError {
    pub(crate) fn classified(response: Response, decoder: Option<DecoderId>) -> Self {
        Self { response, decoder }
    }

    /// The generic response header.
    #[inline]
    pub fn response(&self) -> &Response {
        &self.response
    }

    /// Error code used for dispatch.
    #[inline]
    pub fn code(&self) -> u8 {
        self.response.detail()
    }

    /// Sequence number of the failed request.
    #[inline]
    pub fn sequence(&self) -> u16 {
        self.response.sequence()
    }

    /// Registered decoder, or `None` for the generic error type.
    #[inline]
    pub fn decoder(&self) -> Option<DecoderId> {
        self.decoder
    }

    /// Name of the decoded type (`"Error"` when unregistered).
    pub fn name(&self) -> &'static str {
        self.decoder.map_or(Self::NAME, |d| d.name())
    }

    /// Check if this error was classified as `T`.
    pub fn is<T: ProtocolObject>(&self) -> bool {
        self.decoder
            .unwrap_or_else(DecoderId::of::<ProtocolError>)
            .is::<T>()
    }

    /// Decode as the registered type `T`.
    pub fn cast<T: ProtocolObject>(&self) -> Result<T> {
        cast_as::<T, ProtocolError>(&self.response, self.decoder)
    }
}

impl ProtocolObject for ProtocolError {
    const NAME: &'static str = "Error";

    fn from_view(view: BufferView) -> Result<Self> {
        Ok(Self::classified(Response::new(view)?, None))
    }

    fn view(&self) -> &BufferView {
        self.response.view()
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (code {}, sequence {})",
            self.name(),
            self.code(),
            self.sequence()
        )
    }
}

impl std::error::Error for ProtocolError {}

/// Generic reply: a response sized by its declared length.
#[derive(Debug, Clone)]
pub struct Reply {
    response: Response,
    length: u32,
}

impl Reply {
    /// Narrow a raw reply buffer to its declared size.
    ///
    /// The declared size is `32 + 4 * length`. A shorter buffer is a range
    /// error; trailing bytes beyond the declared size are dropped.
    pub fn sized(view: BufferView) -> Result<BufferView> {
        let length = view.u32_at(4)? as usize;
        let declared = length
            .checked_mul(4)
            .and_then(|tail| tail.checked_add(REPLY_HEADER_SIZE))
            .ok_or_else(|| Error::range(REPLY_HEADER_SIZE, usize::MAX, view.len()))?;
        if declared == view.len() {
            return Ok(view);
        }
        view.borrow(0, declared)
    }

    /// Reply length field, in 4-byte units beyond the fixed header.
    #[inline]
    pub fn length(&self) -> u32 {
        self.length
    }

    /// Sequence number of the request this reply answers.
    #[inline]
    pub fn sequence(&self) -> u16 {
        self.response.sequence()
    }

    /// The generic response header.
    #[inline]
    pub fn response(&self) -> &Response {
        &self.response
    }
}

impl ProtocolObject for Reply {
    const NAME: &'static str = "Reply";

    /// Requires the full fixed header.
    fn from_view(view: BufferView) -> Result<Self> {
        if view.len() < REPLY_HEADER_SIZE {
            return Err(Error::range(0, REPLY_HEADER_SIZE, view.len()));
        }
        let length = view.u32_at(4)?;
        Ok(Self {
            response: Response::new(view)?,
            length,
        })
    }

    fn view(&self) -> &BufferView {
        self.response.view()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Expose(BufferView);

    impl ProtocolObject for Expose {
        const NAME: &'static str = "Expose";
        fn from_view(view: BufferView) -> Result<Self> {
            Ok(Self(view))
        }
        fn view(&self) -> &BufferView {
            &self.0
        }
    }

    fn raw(kind: u8, detail: u8, sequence: u16) -> BufferView {
        let mut buf = vec![0u8; 32];
        buf[0] = kind;
        buf[1] = detail;
        buf[2..4].copy_from_slice(&sequence.to_ne_bytes());
        BufferView::owned(buf)
    }

    #[test]
    fn test_header_fields() {
        let response = Response::new(raw(12, 7, 0xBEEF)).unwrap();
        assert_eq!(response.kind(), 12);
        assert_eq!(response.detail(), 7);
        assert_eq!(response.sequence(), 0xBEEF);
        assert!(!response.is_error());
    }

    #[test]
    fn test_header_too_short() {
        let short = BufferView::owned(vec![1u8, 2, 3]);
        assert!(matches!(Response::new(short), Err(Error::Range { .. })));
    }

    #[test]
    fn test_event_synthetic_bit() {
        let event = Event::from_view(raw(0x80 | 12, 0, 1)).unwrap();
        assert!(event.is_synthetic());
        assert_eq!(event.opcode(), 12);
        assert_eq!(event.kind(), 0x8C);
    }

    #[test]
    fn test_generic_event_cast() {
        let event = Event::from_view(raw(99, 0, 1)).unwrap();
        assert_eq!(event.name(), "Event");
        assert!(event.is::<Event>());
        assert!(event.cast::<Event>().is_ok());
        assert!(matches!(
            event.cast::<Expose>(),
            Err(Error::TypeMismatch {
                expected: "Expose",
                actual: "Event"
            })
        ));
    }

    #[test]
    fn test_classified_event_cast() {
        let response = Response::new(raw(12, 0, 5)).unwrap();
        let event = Event::classified(response, Some(DecoderId::of::<Expose>()));
        assert_eq!(event.name(), "Expose");
        assert!(event.is::<Expose>());
        assert!(!event.is::<Event>());
        assert_eq!(event.cast::<Expose>().unwrap().size(), 32);
    }

    #[test]
    fn test_error_code_and_display() {
        let error = ProtocolError::from_view(raw(0, 3, 42)).unwrap();
        assert_eq!(error.code(), 3);
        assert_eq!(error.sequence(), 42);
        assert_eq!(error.name(), "Error");
        assert_eq!(error.to_string(), "Error (code 3, sequence 42)");
    }

    #[test]
    fn test_reply_sized() {
        let mut buf = vec![0u8; 48];
        buf[0] = REPLY_KIND;
        buf[4..8].copy_from_slice(&2u32.to_ne_bytes());
        let view = Reply::sized(BufferView::owned(buf)).unwrap();
        assert_eq!(view.len(), 40);

        let reply = Reply::from_view(view).unwrap();
        assert_eq!(reply.length(), 2);
    }

    #[test]
    fn test_reply_shorter_than_declared() {
        let mut buf = vec![0u8; 32];
        buf[0] = REPLY_KIND;
        buf[4..8].copy_from_slice(&1u32.to_ne_bytes());
        assert!(matches!(
            Reply::sized(BufferView::owned(buf)),
            Err(Error::Range { .. })
        ));
    }

    #[test]
    fn test_reply_requires_fixed_header() {
        let short = BufferView::owned(vec![REPLY_KIND, 0, 1, 0]);
        assert!(matches!(
            Reply::from_view(short),
            Err(Error::Range {
                offset: 0,
                length: 32,
                available: 4
            })
        ));
    }
}
