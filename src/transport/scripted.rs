//! In-memory transport that replays scripted server output.
//!
//! Clones share state, so a test can keep one handle to queue events,
//! replies and errors while the connection owns another, and inspect
//! afterwards what the connection did (flushes, sent requests, extension
//! queries, disconnects).
//!
//! # Example
//!
//! ```
//! use xcb_binding::extension::{ExtensionKey, ExtensionPresence};
//! use xcb_binding::transport::{ScriptedTransport, Transport};
//!
//! let script = ScriptedTransport::new();
//! script.set_extension("RANDR", ExtensionPresence::present(140, 89, 147));
//!
//! let mut transport = script.clone();
//! let presence = transport.query_extension(&ExtensionKey::new("RANDR")).unwrap();
//! assert_eq!(presence.major_opcode, 140);
//! assert_eq!(script.extension_queries("RANDR"), 1);
//! ```

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;

use super::{Connector, ReplyOutcome, Transport};
use crate::cookie::RequestDescriptor;
use crate::display::DisplayTarget;
use crate::extension::{ExtensionKey, ExtensionPresence};

/// Default maximum request length (4-byte units).
pub const DEFAULT_MAX_REQUEST_LENGTH: u32 = 65535;

/// First resource id handed out by `generate_id`.
const RESOURCE_ID_BASE: u32 = 0x0040_0000;

/// A request recorded by the scripted transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentRequest {
    /// Sequence number assigned to the request.
    pub sequence: u32,
    /// Request flags.
    pub request: RequestDescriptor,
    /// Encoded request bytes.
    pub data: Bytes,
}

#[derive(Debug)]
struct State {
    events: VecDeque<Bytes>,
    replies: HashMap<u32, ReplyOutcome>,
    check_errors: HashMap<u32, Bytes>,
    extensions: HashMap<String, ExtensionPresence>,
    extension_queries: HashMap<String, usize>,
    sent: Vec<SentRequest>,
    next_sequence: u32,
    next_id: u32,
    max_request_length: u32,
    prefetched: bool,
    flushes: usize,
    disconnects: usize,
    refuse: bool,
    setup: Bytes,
}

impl Default for State {
    fn default() -> Self {
        Self {
            events: VecDeque::new(),
            replies: HashMap::new(),
            check_errors: HashMap::new(),
            extensions: HashMap::new(),
            extension_queries: HashMap::new(),
            sent: Vec::new(),
            next_sequence: 1,
            next_id: RESOURCE_ID_BASE,
            max_request_length: DEFAULT_MAX_REQUEST_LENGTH,
            prefetched: false,
            flushes: 0,
            disconnects: 0,
            refuse: false,
            setup: Bytes::new(),
        }
    }
}

/// Scripted, shared-state transport.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    state: Arc<Mutex<State>>,
}

impl ScriptedTransport {
    /// Create an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a raw event (or error, kind byte 0) for wait/poll.
    pub fn push_event(&self, raw: impl Into<Bytes>) {
        self.state().events.push_back(raw.into());
    }

    /// Script the reply for `sequence`.
    pub fn set_reply(&self, sequence: u32, raw: impl Into<Bytes>) {
        self.state()
            .replies
            .insert(sequence, ReplyOutcome::Reply(raw.into()));
    }

    /// Script an error for `sequence`, seen by both reply and check.
    pub fn set_error(&self, sequence: u32, raw: impl Into<Bytes>) {
        let raw = raw.into();
        let mut state = self.state();
        state.check_errors.insert(sequence, raw.clone());
        state.replies.insert(sequence, ReplyOutcome::Error(raw));
    }

    /// Script the presence answer for extension `name`.
    pub fn set_extension(&self, name: &str, presence: ExtensionPresence) {
        self.state().extensions.insert(name.to_string(), presence);
    }

    /// Set the maximum request length reported to the connection.
    pub fn set_max_request_length(&self, length: u32) {
        self.state().max_request_length = length;
    }

    /// Set the connection setup block.
    pub fn set_setup(&self, raw: impl Into<Bytes>) {
        self.state().setup = raw.into();
    }

    /// Make every subsequent `connect` fail.
    pub fn refuse_connections(&self) {
        self.state().refuse = true;
    }

    /// Number of presence queries made for `name`.
    pub fn extension_queries(&self, name: &str) -> usize {
        self.state()
            .extension_queries
            .get(name)
            .copied()
            .unwrap_or(0)
    }

    /// Requests sent so far, in order.
    pub fn sent_requests(&self) -> Vec<SentRequest> {
        self.state().sent.clone()
    }

    /// Number of flushes.
    pub fn flush_count(&self) -> usize {
        self.state().flushes
    }

    /// Whether the maximum request length was prefetched.
    pub fn prefetched(&self) -> bool {
        self.state().prefetched
    }

    /// Number of times `disconnect` was called.
    pub fn disconnect_count(&self) -> usize {
        self.state().disconnects
    }

    /// Number of queued events not yet consumed.
    pub fn pending_events(&self) -> usize {
        self.state().events.len()
    }
}

fn closed(what: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("no scripted {}", what),
    )
}

impl Transport for ScriptedTransport {
    fn disconnect(&mut self) {
        self.state().disconnects += 1;
    }

    fn flush(&mut self) -> io::Result<()> {
        self.state().flushes += 1;
        Ok(())
    }

    fn maximum_request_length(&mut self) -> u32 {
        self.state().max_request_length
    }

    fn prefetch_maximum_request_length(&mut self) {
        self.state().prefetched = true;
    }

    fn wait_for_event(&mut self) -> io::Result<Bytes> {
        self.state().events.pop_front().ok_or_else(|| closed("event"))
    }

    fn poll_for_event(&mut self) -> io::Result<Option<Bytes>> {
        Ok(self.state().events.pop_front())
    }

    fn query_extension(&mut self, key: &ExtensionKey) -> io::Result<ExtensionPresence> {
        let name = key.name().unwrap_or_default();
        let mut state = self.state();
        *state
            .extension_queries
            .entry(name.to_string())
            .or_insert(0) += 1;
        Ok(state.extensions.get(name).copied().unwrap_or_default())
    }

    fn send_request(&mut self, request: &RequestDescriptor, data: Bytes) -> io::Result<u32> {
        let mut state = self.state();
        let sequence = state.next_sequence;
        state.next_sequence = state.next_sequence.wrapping_add(1);
        state.sent.push(SentRequest {
            sequence,
            request: *request,
            data,
        });
        Ok(sequence)
    }

    fn wait_for_reply(&mut self, sequence: u32) -> io::Result<ReplyOutcome> {
        self.state()
            .replies
            .remove(&sequence)
            .ok_or_else(|| closed("reply"))
    }

    fn request_check(&mut self, sequence: u32) -> io::Result<Option<Bytes>> {
        Ok(self.state().check_errors.remove(&sequence))
    }

    fn generate_id(&mut self) -> io::Result<u32> {
        let mut state = self.state();
        let id = state.next_id;
        state.next_id = state.next_id.wrapping_add(1);
        Ok(id)
    }

    fn setup(&self) -> Bytes {
        self.state().setup.clone()
    }
}

impl Connector for ScriptedTransport {
    type Transport = ScriptedTransport;

    fn connect(&self, target: &DisplayTarget) -> io::Result<(Self::Transport, usize)> {
        if self.state().refuse {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                format!("display {} refused the connection", target),
            ));
        }
        Ok((self.clone(), target.screen()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_queue_order() {
        let script = ScriptedTransport::new();
        script.push_event(vec![2u8; 32]);
        script.push_event(vec![3u8; 32]);

        let mut transport = script.clone();
        assert_eq!(transport.poll_for_event().unwrap().unwrap()[0], 2);
        assert_eq!(transport.wait_for_event().unwrap()[0], 3);
        assert!(transport.poll_for_event().unwrap().is_none());
        assert!(transport.wait_for_event().is_err());
    }

    #[test]
    fn test_sequence_numbers() {
        let mut transport = ScriptedTransport::new();
        let request = RequestDescriptor::reply();
        assert_eq!(transport.send_request(&request, Bytes::new()).unwrap(), 1);
        assert_eq!(transport.send_request(&request, Bytes::new()).unwrap(), 2);
        assert_eq!(transport.sent_requests().len(), 2);
    }

    #[test]
    fn test_error_resolves_once() {
        let script = ScriptedTransport::new();
        script.set_error(4, vec![0u8; 32]);

        let mut transport = script.clone();
        assert!(matches!(
            transport.wait_for_reply(4).unwrap(),
            ReplyOutcome::Error(_)
        ));
        assert!(transport.request_check(4).unwrap().is_some());
        assert!(transport.request_check(4).unwrap().is_none());
    }

    #[test]
    fn test_unknown_extension_is_absent() {
        let mut transport = ScriptedTransport::new();
        let presence = transport
            .query_extension(&ExtensionKey::new("XINERAMA"))
            .unwrap();
        assert!(!presence.present);
        assert_eq!(transport.extension_queries("XINERAMA"), 1);
    }

    #[test]
    fn test_generate_id_is_monotonic() {
        let mut transport = ScriptedTransport::new();
        let first = transport.generate_id().unwrap();
        assert_eq!(transport.generate_id().unwrap(), first + 1);
    }

    #[test]
    fn test_generate_id_wraps() {
        let mut transport = ScriptedTransport::new();
        transport.state().next_id = u32::MAX;
        assert_eq!(transport.generate_id().unwrap(), u32::MAX);
        assert_eq!(transport.generate_id().unwrap(), 0);
    }

    #[test]
    fn test_pending_events() {
        let script = ScriptedTransport::new();
        script.push_event(vec![2u8; 32]);
        script.push_event(vec![3u8; 32]);
        assert_eq!(script.pending_events(), 2);

        script.clone().poll_for_event().unwrap();
        assert_eq!(script.pending_events(), 1);
    }
}
