//! Per-connection opcode tables.
//!
//! One table maps event opcodes, the other error codes, to the decoder
//! registered for them. Extensions occupy the slots
//! `first_event + number` / `first_error + number` negotiated with the
//! server. The opcode domain is one byte, so each table is a fixed
//! 256-slot array and never reallocates.
//!
//! # Example
//!
//! ```
//! use xcb_binding::dispatch::OpcodeTable;
//! use xcb_binding::protocol::{BufferView, DecoderId};
//!
//! let mut table = OpcodeTable::new();
//! table.register(64, 2, DecoderId::of::<BufferView>()).unwrap();
//!
//! assert_eq!(table.lookup(66), Some(DecoderId::of::<BufferView>()));
//! assert_eq!(table.lookup(65), None);
//! ```

use tracing::{trace, warn};

use crate::error::{Error, Result};
use crate::protocol::{DecoderId, Event, ProtocolError, ProtocolObject, Response, SYNTHETIC_MASK};

/// Number of slots in a table (one per opcode byte).
pub const TABLE_SIZE: usize = 256;

/// Local event or error number declared by an extension, with its decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeSpec {
    /// Number relative to the extension's base.
    pub number: u8,
    /// Decoder for that number.
    pub decoder: DecoderId,
}

impl OpcodeSpec {
    /// Declare `T` as the decoder for local `number`.
    pub fn of<T: ProtocolObject>(number: u8) -> Self {
        Self {
            number,
            decoder: DecoderId::of::<T>(),
        }
    }
}

/// Table mapping an opcode byte to its registered decoder.
#[derive(Debug, Clone)]
pub struct OpcodeTable {
    /// Registered decoders by opcode.
    slots: [Option<DecoderId>; TABLE_SIZE],
    /// One past the highest registered opcode.
    len: usize,
}

impl OpcodeTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            slots: [None; TABLE_SIZE],
            len: 0,
        }
    }

    /// Register `decoder` at `base + number`.
    ///
    /// Re-registering the same decoder at the same slot is a no-op.
    /// Fails with [`Error::Range`] if the slot does not fit in one byte.
    pub fn register(&mut self, base: u8, number: u8, decoder: DecoderId) -> Result<()> {
        let index = base as usize + number as usize;
        if index >= TABLE_SIZE {
            return Err(Error::range(base as usize, number as usize + 1, TABLE_SIZE));
        }

        match self.slots[index] {
            Some(existing) if existing == decoder => return Ok(()),
            Some(existing) => {
                warn!(
                    "Opcode {} re-registered: {} replaces {}",
                    index,
                    decoder.name(),
                    existing.name()
                );
            }
            None => {}
        }

        self.slots[index] = Some(decoder);
        self.len = self.len.max(index + 1);
        Ok(())
    }

    /// Register every `OpcodeSpec` relative to `base`.
    ///
    /// Nothing is written unless every slot fits.
    pub fn register_all(&mut self, base: u8, specs: &[OpcodeSpec]) -> Result<()> {
        Self::check_fits(base, specs)?;
        for spec in specs {
            self.register(base, spec.number, spec.decoder)?;
        }
        Ok(())
    }

    /// Fail with [`Error::Range`] if any `base + number` is past the last slot.
    fn check_fits(base: u8, specs: &[OpcodeSpec]) -> Result<()> {
        match specs.iter().map(|spec| spec.number).max() {
            Some(highest) if base as usize + highest as usize >= TABLE_SIZE => Err(Error::range(
                base as usize,
                highest as usize + 1,
                TABLE_SIZE,
            )),
            _ => Ok(()),
        }
    }

    /// Get the decoder for `opcode`, or `None` for the generic type.
    #[inline]
    pub fn lookup(&self, opcode: u8) -> Option<DecoderId> {
        self.slots[opcode as usize]
    }

    /// One past the highest registered opcode.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if nothing is registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of occupied slots.
    pub fn registered(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}

impl Default for OpcodeTable {
    fn default() -> Self {
        Self::new()
    }
}

/// The event and error tables of one connection.
#[derive(Debug, Clone, Default)]
pub struct DispatchTables {
    /// Event decoders by event opcode.
    pub events: OpcodeTable,
    /// Error decoders by error code.
    pub errors: OpcodeTable,
}

impl DispatchTables {
    /// Create empty tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an extension's declared events and errors at its bases.
    ///
    /// Either both tables are updated or neither is.
    pub fn register_extension(
        &mut self,
        first_event: u8,
        events: &[OpcodeSpec],
        first_error: u8,
        errors: &[OpcodeSpec],
    ) -> Result<()> {
        OpcodeTable::check_fits(first_event, events)?;
        OpcodeTable::check_fits(first_error, errors)?;
        self.events.register_all(first_event, events)?;
        self.errors.register_all(first_error, errors)
    }

    /// Classify a non-error response as an event.
    pub fn classify_event(&self, response: Response) -> Event {
        let opcode = response.kind() & !SYNTHETIC_MASK;
        let decoder = self.events.lookup(opcode);
        trace!(
            "Event opcode {} -> {}",
            opcode,
            decoder.map_or(Event::NAME, |d| d.name())
        );
        Event::classified(response, decoder)
    }

    /// Classify an error response by its code.
    pub fn classify_error(&self, response: Response) -> ProtocolError {
        let code = response.detail();
        let decoder = self.errors.lookup(code);
        trace!(
            "Error code {} -> {}",
            code,
            decoder.map_or(ProtocolError::NAME, |d| d.name())
        );
        ProtocolError::classified(response, decoder)
    }
}
