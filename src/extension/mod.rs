//! Extension module - keys, registry and per-connection instances.
//!
//! Provides:
//! - [`ExtensionKey`] - identity of an extension (or the core protocol)
//! - [`Registry`] - process-wide map from key to generated module
//! - [`ExtensionCache`] - per-connection memo of resolved extensions
//! - [`Extension`] - one resolved extension with its opcode bases
//!
//! # Workflow
//!
//! 1. Generated code registers the core module and each extension module
//! 2. A connection resolves the core protocol at opcode base 0
//! 3. First use of an extension queries the server for its bases
//! 4. The extension's events and errors enter the dispatch tables

mod cache;
mod instance;
mod key;
mod registry;

pub use cache::ExtensionCache;
pub use instance::{Extension, ExtensionModule, ExtensionPresence};
pub use key::ExtensionKey;
pub use registry::Registry;
