//! # xcb-binding
//!
//! Binding core for an X11-style display server protocol.
//!
//! This crate sits between generated protocol modules and a low-level
//! transport. It does not encode requests itself; it provides:
//!
//! - **Buffer views**: zero-copy owned and borrowed windows over raw protocol bytes
//! - **Sequences**: decoding lists of scalars and fixed- or variable-size elements
//! - **Dispatch**: 256-slot opcode tables mapping events and errors to decoders
//! - **Extensions**: a process-wide registry plus a per-connection cache
//! - **Connection**: event waiting and polling, request issue, reply cookies
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use xcb_binding::dispatch::OpcodeSpec;
//! use xcb_binding::extension::{ExtensionKey, ExtensionModule, Registry};
//! use xcb_binding::protocol::{BufferView, ProtocolObject};
//! use xcb_binding::transport::ScriptedTransport;
//! use xcb_binding::ConnectionBuilder;
//!
//! struct Expose(BufferView);
//!
//! impl ProtocolObject for Expose {
//!     const NAME: &'static str = "Expose";
//!     fn from_view(view: BufferView) -> xcb_binding::Result<Self> {
//!         Ok(Self(view))
//!     }
//!     fn view(&self) -> &BufferView {
//!         &self.0
//!     }
//! }
//!
//! struct Core;
//!
//! impl ExtensionModule for Core {
//!     fn new(_key: ExtensionKey) -> Self {
//!         Core
//!     }
//! }
//!
//! let registry = Arc::new(Registry::new());
//! registry.add_core::<Core>(&[OpcodeSpec::of::<Expose>(12)], &[]).unwrap();
//!
//! let server = ScriptedTransport::new();
//! let mut raw = vec![0u8; 32];
//! raw[0] = 12;
//! server.push_event(raw);
//!
//! let conn = ConnectionBuilder::new()
//!     .display(":0")
//!     .registry(registry)
//!     .connect(&server)
//!     .unwrap();
//!
//! let event = conn.wait_for_event().unwrap();
//! assert_eq!(event.name(), "Expose");
//! let expose: Expose = event.cast().unwrap();
//! assert_eq!(expose.size(), 32);
//! ```

pub mod dispatch;
pub mod error;
pub mod extension;
pub mod protocol;
pub mod transport;

mod connection;
mod cookie;
mod display;

pub use connection::{Connection, ConnectionBuilder};
pub use cookie::{Cookie, RequestDescriptor};
pub use display::{DisplayTarget, DISPLAY_ENV};
pub use error::{Error, Result};
