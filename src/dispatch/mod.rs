//! Dispatch module - opcode tables for events and errors.
//!
//! Provides:
//! - [`OpcodeTable`] - maps an opcode byte to its registered decoder
//! - [`DispatchTables`] - the event/error table pair owned by a connection
//! - [`OpcodeSpec`] - an extension's local event/error number and decoder
//!
//! Lookups never fail: opcodes without a registered decoder classify as the
//! generic [`Event`](crate::protocol::Event) or
//! [`ProtocolError`](crate::protocol::ProtocolError).

mod table;

pub use table::{DispatchTables, OpcodeSpec, OpcodeTable, TABLE_SIZE};
