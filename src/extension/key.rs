//! Extension identities.

use std::fmt;

/// Opaque, hashable identity of a protocol extension.
///
/// Keys are compared by the extension name they were created with.
/// [`ExtensionKey::CORE`] is reserved for the always-present core protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExtensionKey {
    name: Option<&'static str>,
}

impl ExtensionKey {
    /// The core protocol.
    pub const CORE: Self = Self { name: None };

    /// Key for the extension the server knows as `name`.
    pub const fn new(name: &'static str) -> Self {
        Self { name: Some(name) }
    }

    /// Extension name queried on the server (`None` for core).
    #[inline]
    pub fn name(&self) -> Option<&'static str> {
        self.name
    }

    /// Check if this is the core protocol key.
    #[inline]
    pub fn is_core(&self) -> bool {
        self.name.is_none()
    }
}

impl fmt::Display for ExtensionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name.unwrap_or("core"))
    }
}
