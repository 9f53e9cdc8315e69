//! Protocol module - buffer views, response envelopes and list decoding.
//!
//! This module implements the generic object model every generated
//! protocol message is built on:
//! - Ownership-aware zero-copy buffer views
//! - Common response header for events, errors and replies
//! - Sequence decoder for fixed-size and self-describing elements

mod constants;
mod list;
mod object;
mod response;
mod view;

pub use constants::{
    COPY_FROM_PARENT, CURRENT_TIME, NONE, NO_SYMBOL, X_PROTOCOL, X_PROTOCOL_REVISION, X_TCP_PORT,
};
pub use list::{Format, List, Scalar, Value};
pub use object::{DecoderId, ProtocolObject};
pub use response::{
    Event, ProtocolError, Reply, Response, ERROR_KIND, REPLY_HEADER_SIZE, REPLY_KIND,
    RESPONSE_HEADER_SIZE, SYNTHETIC_MASK,
};
pub use view::{BufferView, Ownership};
