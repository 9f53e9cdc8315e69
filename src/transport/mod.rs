//! Transport module - boundary with the low-level connection library.
//!
//! The binding core never speaks the wire protocol itself. Everything that
//! touches the socket goes through [`Transport`]:
//! - Establishing the connection ([`Connector`])
//! - Flushing and sending pre-encoded requests
//! - Waiting for or polling events
//! - Resolving a sequence number to its reply or error
//! - Extension presence queries
//!
//! [`ScriptedTransport`] is an in-memory implementation that replays
//! queued server output.

mod scripted;

use std::io;

use bytes::Bytes;

use crate::cookie::RequestDescriptor;
use crate::display::DisplayTarget;
use crate::extension::{ExtensionKey, ExtensionPresence};

pub use scripted::{ScriptedTransport, SentRequest};

/// Outcome of waiting for a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// Raw reply buffer.
    Reply(Bytes),
    /// Raw error buffer (kind byte 0).
    Error(Bytes),
}

/// A live connection to the server.
///
/// Raw buffers handed back by the transport are owned by the caller from
/// then on; the binding wraps them without copying.
pub trait Transport {
    /// Release the connection. Calling it again has no effect.
    fn disconnect(&mut self);

    /// Write any buffered requests to the server.
    fn flush(&mut self) -> io::Result<()>;

    /// Maximum request length the server accepts, in 4-byte units.
    fn maximum_request_length(&mut self) -> u32;

    /// Start fetching the maximum request length without blocking.
    fn prefetch_maximum_request_length(&mut self);

    /// Block until the server sends an event or error.
    fn wait_for_event(&mut self) -> io::Result<Bytes>;

    /// Return the next event or error if one is already queued.
    fn poll_for_event(&mut self) -> io::Result<Option<Bytes>>;

    /// Ask the server whether the extension behind `key` is present.
    fn query_extension(&mut self, key: &ExtensionKey) -> io::Result<ExtensionPresence>;

    /// Queue a pre-encoded request and return its sequence number.
    fn send_request(&mut self, request: &RequestDescriptor, data: Bytes) -> io::Result<u32>;

    /// Block until `sequence` resolves to a reply or an error.
    fn wait_for_reply(&mut self, sequence: u32) -> io::Result<ReplyOutcome>;

    /// Block until the void request `sequence` is processed; return its error if any.
    fn request_check(&mut self, sequence: u32) -> io::Result<Option<Bytes>>;

    /// Allocate a fresh resource id.
    fn generate_id(&mut self) -> io::Result<u32>;

    /// Raw connection setup block sent by the server.
    fn setup(&self) -> Bytes;
}

/// Establishes transports for a display.
pub trait Connector {
    /// Transport produced by this connector.
    type Transport: Transport;

    /// Connect to `target`, returning the transport and the preferred screen.
    fn connect(&self, target: &DisplayTarget) -> io::Result<(Self::Transport, usize)>;
}
