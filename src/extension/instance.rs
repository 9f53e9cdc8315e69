//! Resolved extension instances.

use std::any::Any;
use std::fmt;

use super::ExtensionKey;

/// Generated protocol module for one extension (or the core protocol).
///
/// One module value is constructed per connection the first time the
/// extension is used.
pub trait ExtensionModule: Send + Sync + 'static {
    /// Construct the module for `key`.
    fn new(key: ExtensionKey) -> Self
    where
        Self: Sized;
}

/// Server answer to an extension presence query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExtensionPresence {
    /// Whether the server provides the extension.
    pub present: bool,
    /// Major opcode of the extension's requests.
    pub major_opcode: u8,
    /// Base of the extension's event opcodes.
    pub first_event: u8,
    /// Base of the extension's error codes.
    pub first_error: u8,
}

impl ExtensionPresence {
    /// Present extension with the given bases.
    pub fn present(major_opcode: u8, first_event: u8, first_error: u8) -> Self {
        Self {
            present: true,
            major_opcode,
            first_event,
            first_error,
        }
    }

    /// Extension the server does not provide.
    pub fn absent() -> Self {
        Self::default()
    }
}

/// An extension resolved on one connection.
///
/// Opcode bases are fixed at resolution time and never change.
pub struct Extension {
    key: ExtensionKey,
    major_opcode: u8,
    first_event: u8,
    first_error: u8,
    module_name: &'static str,
    module: Box<dyn Any + Send + Sync>,
}

impl Extension {
    pub(crate) fn new(
        key: ExtensionKey,
        presence: ExtensionPresence,
        module_name: &'static str,
        module: Box<dyn Any + Send + Sync>,
    ) -> Self {
        Self {
            key,
            major_opcode: presence.major_opcode,
            first_event: presence.first_event,
            first_error: presence.first_error,
            module_name,
            module,
        }
    }

    /// Key this extension was resolved for.
    #[inline]
    pub fn key(&self) -> ExtensionKey {
        self.key
    }

    /// Major opcode (0 for core).
    #[inline]
    pub fn major_opcode(&self) -> u8 {
        self.major_opcode
    }

    /// First event opcode (0 for core).
    #[inline]
    pub fn first_event(&self) -> u8 {
        self.first_event
    }

    /// First error code (0 for core).
    #[inline]
    pub fn first_error(&self) -> u8 {
        self.first_error
    }

    /// Type name of the registered module.
    #[inline]
    pub fn module_name(&self) -> &'static str {
        self.module_name
    }

    /// The generated module, if it is an `M`.
    pub fn module<M: ExtensionModule>(&self) -> Option<&M> {
        self.module.downcast_ref::<M>()
    }
}

impl fmt::Debug for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extension")
            .field("key", &self.key)
            .field("module", &self.module_name)
            .field("major_opcode", &self.major_opcode)
            .field("first_event", &self.first_event)
            .field("first_error", &self.first_error)
            .finish()
    }
}
