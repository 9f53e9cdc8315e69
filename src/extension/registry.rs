//! Process-wide extension registry.
//!
//! Generated protocol code registers the core protocol module once, and
//! each extension module under its [`ExtensionKey`], together with the
//! local numbers of the events and errors it declares. Connections consult
//! the registry the first time an extension is used.
//!
//! Registration is init-once: the first registration for a key wins and
//! later ones are ignored.
//!
//! # Example
//!
//! ```
//! use xcb_binding::extension::{ExtensionKey, ExtensionModule, Registry};
//!
//! struct Shape;
//!
//! impl ExtensionModule for Shape {
//!     fn new(_key: ExtensionKey) -> Self {
//!         Shape
//!     }
//! }
//!
//! let registry = Registry::new();
//! let key = ExtensionKey::new("SHAPE");
//! assert!(registry.add_extension::<Shape>(key, &[], &[]).unwrap());
//! assert!(!registry.add_extension::<Shape>(key, &[], &[]).unwrap());
//! assert!(registry.contains(&key));
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use tracing::{debug, warn};

use super::{Extension, ExtensionKey, ExtensionModule, ExtensionPresence};
use crate::dispatch::OpcodeSpec;
use crate::error::{Error, Result};

/// Constructor for a module value.
type Constructor = fn(ExtensionKey) -> Box<dyn Any + Send + Sync>;

fn construct<M: ExtensionModule>(key: ExtensionKey) -> Box<dyn Any + Send + Sync> {
    Box::new(M::new(key))
}

/// Registration record for one module.
pub(crate) struct Entry {
    construct: Constructor,
    module_name: &'static str,
    events: Vec<OpcodeSpec>,
    errors: Vec<OpcodeSpec>,
}

impl Entry {
    fn new<M: ExtensionModule>(
        key: &ExtensionKey,
        events: &[OpcodeSpec],
        errors: &[OpcodeSpec],
    ) -> Result<Self> {
        validate_specs(key, "event", events)?;
        validate_specs(key, "error", errors)?;
        Ok(Self {
            construct: construct::<M>,
            module_name: std::any::type_name::<M>(),
            events: events.to_vec(),
            errors: errors.to_vec(),
        })
    }

    /// Declared events, relative to the extension's first event.
    pub(crate) fn events(&self) -> &[OpcodeSpec] {
        &self.events
    }

    /// Declared errors, relative to the extension's first error.
    pub(crate) fn errors(&self) -> &[OpcodeSpec] {
        &self.errors
    }

    /// Build a new instance with the resolved opcode bases.
    pub(crate) fn instantiate(&self, key: ExtensionKey, presence: ExtensionPresence) -> Extension {
        Extension::new(key, presence, self.module_name, (self.construct)(key))
    }
}

/// Reject `OpcodeSpec` lists that bind one number to two different decoders.
fn validate_specs(key: &ExtensionKey, kind: &str, specs: &[OpcodeSpec]) -> Result<()> {
    let mut seen = HashMap::with_capacity(specs.len());
    for spec in specs {
        if let Some(previous) = seen.insert(spec.number, spec.decoder) {
            if previous != spec.decoder {
                return Err(Error::InvalidExtension(format!(
                    "{}: {} {} declared as both {} and {}",
                    key,
                    kind,
                    spec.number,
                    previous.name(),
                    spec.decoder.name()
                )));
            }
        }
    }
    Ok(())
}

/// Registry of protocol modules by extension key.
pub struct Registry {
    /// Core protocol module (set at most once).
    core: OnceLock<Arc<Entry>>,
    /// Extension modules by key.
    extensions: RwLock<HashMap<ExtensionKey, Arc<Entry>>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            core: OnceLock::new(),
            extensions: RwLock::new(HashMap::new()),
        }
    }

    /// The process-wide registry used by default.
    pub fn global() -> Arc<Registry> {
        static GLOBAL: OnceLock<Arc<Registry>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(Registry::new())).clone()
    }

    /// Register the core protocol module.
    ///
    /// Only the first call has an effect; returns whether this call
    /// installed the module.
    pub fn add_core<M: ExtensionModule>(
        &self,
        events: &[OpcodeSpec],
        errors: &[OpcodeSpec],
    ) -> Result<bool> {
        let entry = Arc::new(Entry::new::<M>(&ExtensionKey::CORE, events, errors)?);
        let module_name = entry.module_name;
        let installed = self.core.set(entry).is_ok();
        if installed {
            debug!("Registered core protocol {}", module_name);
        } else {
            warn!("Core protocol already registered, ignoring {}", module_name);
        }
        Ok(installed)
    }

    /// Register an extension module under `key`.
    ///
    /// Only the first registration of a key has an effect; returns whether
    /// this call installed the module.
    pub fn add_extension<M: ExtensionModule>(
        &self,
        key: ExtensionKey,
        events: &[OpcodeSpec],
        errors: &[OpcodeSpec],
    ) -> Result<bool> {
        if key.is_core() {
            return Err(Error::InvalidExtension(
                "the core key is reserved for add_core".to_string(),
            ));
        }
        let entry = Entry::new::<M>(&key, events, errors)?;

        let mut extensions = self
            .extensions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if extensions.contains_key(&key) {
            debug!("Extension {} already registered", key);
            return Ok(false);
        }
        debug!(
            "Registered extension {} ({} events, {} errors)",
            key,
            entry.events.len(),
            entry.errors.len()
        );
        extensions.insert(key, Arc::new(entry));
        Ok(true)
    }

    /// Check if a core module is registered.
    pub fn has_core(&self) -> bool {
        self.core.get().is_some()
    }

    /// Check if a module is registered for `key` (core included).
    pub fn contains(&self, key: &ExtensionKey) -> bool {
        self.entry(key).is_some()
    }

    /// Look up the registration for `key`.
    pub(crate) fn entry(&self, key: &ExtensionKey) -> Option<Arc<Entry>> {
        if key.is_core() {
            return self.core.get().cloned();
        }
        self.extensions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
