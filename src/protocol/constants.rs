//! Basic protocol constants.

/// Protocol major version.
pub const X_PROTOCOL: u16 = 11;

/// Protocol minor version.
pub const X_PROTOCOL_REVISION: u16 = 0;

/// Base TCP port; display `n` listens on `X_TCP_PORT + n`.
pub const X_TCP_PORT: u16 = 6000;

/// The `None` resource id.
pub const NONE: u32 = 0;

/// `CopyFromParent` for window attributes.
pub const COPY_FROM_PARENT: u32 = 0;

/// `CurrentTime` timestamp.
pub const CURRENT_TIME: u32 = 0;

/// `NoSymbol` keysym.
pub const NO_SYMBOL: u32 = 0;
