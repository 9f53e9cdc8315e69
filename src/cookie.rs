//! Pending requests.
//!
//! A [`Cookie`] ties an issued request's sequence number to its eventual
//! reply or error. Resolving it consumes it:
//! - [`Cookie::reply`] blocks for the reply of a reply-bearing request
//! - [`Cookie::check`] blocks until a checked void request is processed
//!
//! Unchecked void requests may simply be dropped. Dropping a checked or
//! reply-bearing cookie loses any error the server reports for it.
//!
//! # Example
//!
//! ```ignore
//! let cookie = conn.send_request::<GetGeometryReply>(RequestDescriptor::reply(), encoded)?;
//! conn.flush()?;
//! let geometry = cookie.reply()?;
//! ```

use std::fmt;
use std::marker::PhantomData;

use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::protocol::{BufferView, ProtocolObject, Reply};
use crate::transport::{ReplyOutcome, Transport};

/// Reply and error handling flags supplied by a request constructor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestDescriptor {
    /// No reply is expected.
    pub is_void: bool,
    /// Errors are collected for the caller instead of delivered as events.
    pub is_checked: bool,
}

impl RequestDescriptor {
    /// Create a descriptor from its flags.
    pub const fn new(is_void: bool, is_checked: bool) -> Self {
        Self {
            is_void,
            is_checked,
        }
    }

    /// Request that produces a reply.
    pub const fn reply() -> Self {
        Self::new(false, true)
    }

    /// Void request whose error is collected by [`Cookie::check`].
    pub const fn checked_void() -> Self {
        Self::new(true, true)
    }

    /// Fire-and-forget void request.
    pub const fn unchecked_void() -> Self {
        Self::new(true, false)
    }
}

/// Handle on an issued request.
#[must_use = "dropping a checked or reply-bearing cookie discards its error"]
pub struct Cookie<'c, T: Transport, R = Reply> {
    conn: &'c Connection<T>,
    sequence: u32,
    request: RequestDescriptor,
    _reply: PhantomData<fn() -> R>,
}

impl<'c, T: Transport, R> Cookie<'c, T, R> {
    pub(crate) fn new(conn: &'c Connection<T>, sequence: u32, request: RequestDescriptor) -> Self {
        Self {
            conn,
            sequence,
            request,
            _reply: PhantomData,
        }
    }

    /// Sequence number assigned by the transport.
    #[inline]
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Flags of the originating request.
    #[inline]
    pub fn request(&self) -> RequestDescriptor {
        self.request
    }

    /// Raise the error recorded for a checked void request, if any.
    ///
    /// Fails with [`Error::NotCheckable`] unless the request is both void
    /// and checked.
    pub fn check(self) -> Result<()> {
        if !(self.request.is_void && self.request.is_checked) {
            return Err(Error::NotCheckable);
        }
        match self.conn.request_check(self.sequence)? {
            Some(raw) => Err(self.conn.protocol_error(raw)),
            None => Ok(()),
        }
    }
}

impl<'c, T: Transport, R: ProtocolObject> Cookie<'c, T, R> {
    /// Block until the reply arrives and decode it as `R`.
    ///
    /// A server error is raised instead; no partial reply is returned.
    /// Fails with [`Error::NoReply`] for void requests.
    pub fn reply(self) -> Result<R> {
        if self.request.is_void {
            return Err(Error::NoReply);
        }
        match self.conn.wait_for_reply(self.sequence)? {
            ReplyOutcome::Reply(raw) => {
                let view = Reply::sized(BufferView::from_bytes(raw))?;
                R::from_view(view)
            }
            ReplyOutcome::Error(raw) => Err(self.conn.protocol_error(raw)),
        }
    }
}

impl<T: Transport, R> fmt::Debug for Cookie<'_, T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cookie")
            .field("sequence", &self.sequence)
            .field("request", &self.request)
            .finish()
    }
}
