//! Per-connection cache of resolved extensions.
//!
//! The first lookup of a key resolves it: the registry supplies the
//! constructor, the transport reports the opcode bases, and the declared
//! events and errors are entered into the connection's dispatch tables.
//! Later lookups return the same `Arc` without touching the transport.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use super::{Extension, ExtensionKey, ExtensionPresence, Registry};
use crate::dispatch::DispatchTables;
use crate::error::{Error, Result};

/// Resolved extensions of one connection, by key.
#[derive(Debug, Default)]
pub struct ExtensionCache {
    core: Option<Arc<Extension>>,
    extensions: HashMap<ExtensionKey, Arc<Extension>>,
    /// Keys the server reported as absent.
    absent: HashSet<ExtensionKey>,
}

impl ExtensionCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the core protocol at opcode base 0, if one is registered.
    ///
    /// Returns `Ok(None)` when no core module was registered.
    pub fn load_core(
        &mut self,
        registry: &Registry,
        tables: &mut DispatchTables,
    ) -> Result<Option<Arc<Extension>>> {
        if let Some(core) = &self.core {
            return Ok(Some(core.clone()));
        }
        let Some(entry) = registry.entry(&ExtensionKey::CORE) else {
            return Ok(None);
        };

        let core = Arc::new(entry.instantiate(ExtensionKey::CORE, ExtensionPresence::default()));
        tables.register_extension(0, entry.events(), 0, entry.errors())?;
        debug!(
            "Core protocol {} loaded ({} events, {} errors)",
            core.module_name(),
            entry.events().len(),
            entry.errors().len()
        );
        self.core = Some(core.clone());
        Ok(Some(core))
    }

    /// Get the extension for `key`, resolving it on first use.
    ///
    /// `query` asks the server whether the extension is present; it is
    /// called at most once per key.
    pub fn get_or_resolve<Q>(
        &mut self,
        key: &ExtensionKey,
        registry: &Registry,
        tables: &mut DispatchTables,
        query: Q,
    ) -> Result<Arc<Extension>>
    where
        Q: FnOnce(&ExtensionKey) -> Result<ExtensionPresence>,
    {
        if key.is_core() {
            return self.core.clone().ok_or(Error::NoCoreRegistered);
        }
        if let Some(ext) = self.extensions.get(key) {
            return Ok(ext.clone());
        }
        if self.absent.contains(key) {
            return Err(Error::ExtensionNotPresent(key.to_string()));
        }

        let entry = registry
            .entry(key)
            .ok_or_else(|| Error::UnknownExtension(key.to_string()))?;

        let presence = query(key)?;
        if !presence.present {
            debug!("Extension {} not present on server", key);
            self.absent.insert(*key);
            return Err(Error::ExtensionNotPresent(key.to_string()));
        }

        tables.register_extension(
            presence.first_event,
            entry.events(),
            presence.first_error,
            entry.errors(),
        )?;
        let ext = Arc::new(entry.instantiate(*key, presence));
        debug!(
            "Extension {} resolved: major {}, first event {}, first error {}",
            key,
            ext.major_opcode(),
            ext.first_event(),
            ext.first_error()
        );

        self.extensions.insert(*key, ext.clone());
        Ok(ext)
    }

    /// The resolved core protocol, if any.
    pub fn core(&self) -> Option<&Arc<Extension>> {
        self.core.as_ref()
    }

    /// Number of resolved extensions (core excluded).
    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    /// Check if no extension has been resolved yet.
    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    /// Drop every cached instance.
    pub fn clear(&mut self) {
        self.core = None;
        self.extensions.clear();
        self.absent.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::OpcodeSpec;
    use crate::extension::ExtensionModule;
    use crate::protocol::{BufferView, DecoderId, ProtocolObject};

    struct Core;
    struct Damage;

    impl ExtensionModule for Core {
        fn new(_key: ExtensionKey) -> Self {
            Core
        }
    }

    impl ExtensionModule for Damage {
        fn new(_key: ExtensionKey) -> Self {
            Damage
        }
    }

    struct DamageNotify(BufferView);

    impl ProtocolObject for DamageNotify {
        const NAME: &'static str = "DamageNotify";
        fn from_view(view: BufferView) -> Result<Self> {
            Ok(Self(view))
        }
        fn view(&self) -> &BufferView {
            &self.0
        }
    }

    const DAMAGE: ExtensionKey = ExtensionKey::new("DAMAGE");

    fn registry() -> Registry {
        let registry = Registry::new();
        registry.add_core::<Core>(&[], &[]).unwrap();
        registry
            .add_extension::<Damage>(DAMAGE, &[OpcodeSpec::of::<DamageNotify>(0)], &[])
            .unwrap();
        registry
    }

    #[test]
    fn test_resolution_is_memoized() {
        let registry = registry();
        let mut tables = DispatchTables::new();
        let mut cache = ExtensionCache::new();
        let mut queries = 0;

        let first = cache
            .get_or_resolve(&DAMAGE, &registry, &mut tables, |_| {
                queries += 1;
                Ok(ExtensionPresence::present(143, 91, 152))
            })
            .unwrap();
        let second = cache
            .get_or_resolve(&DAMAGE, &registry, &mut tables, |_| {
                panic!("cached extension queried again")
            })
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(queries, 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(
            tables.events.lookup(91),
            Some(DecoderId::of::<DamageNotify>())
        );
    }

    #[test]
    fn test_unknown_extension() {
        let registry = registry();
        let mut cache = ExtensionCache::new();
        let result = cache.get_or_resolve(
            &ExtensionKey::new("GLX"),
            &registry,
            &mut DispatchTables::new(),
            |_| panic!("unregistered extension must not be queried"),
        );
        assert!(matches!(result, Err(Error::UnknownExtension(name)) if name == "GLX"));
    }

    #[test]
    fn test_extension_not_present() {
        let registry = registry();
        let mut tables = DispatchTables::new();
        let mut cache = ExtensionCache::new();

        let result = cache.get_or_resolve(&DAMAGE, &registry, &mut tables, |_| {
            Ok(ExtensionPresence::absent())
        });
        assert!(matches!(result, Err(Error::ExtensionNotPresent(_))));
        assert!(cache.is_empty());
        assert!(tables.events.is_empty());

        let again = cache.get_or_resolve(&DAMAGE, &registry, &mut tables, |_| {
            panic!("absent extension queried again")
        });
        assert!(matches!(again, Err(Error::ExtensionNotPresent(_))));
    }

    #[test]
    fn test_failed_registration_is_not_cached() {
        let registry = Registry::new();
        registry
            .add_extension::<Damage>(
                DAMAGE,
                &[
                    OpcodeSpec::of::<DamageNotify>(0),
                    OpcodeSpec::of::<DamageNotify>(10),
                ],
                &[],
            )
            .unwrap();
        let mut tables = DispatchTables::new();
        let mut cache = ExtensionCache::new();

        let result = cache.get_or_resolve(&DAMAGE, &registry, &mut tables, |_| {
            Ok(ExtensionPresence::present(143, 250, 152))
        });

        assert!(matches!(result, Err(Error::Range { .. })));
        assert_eq!(tables.events.lookup(250), None);
        assert!(tables.events.is_empty());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_core_requires_registration() {
        let mut cache = ExtensionCache::new();
        let mut tables = DispatchTables::new();

        assert!(cache
            .load_core(&Registry::new(), &mut tables)
            .unwrap()
            .is_none());
        assert!(matches!(
            cache.get_or_resolve(&ExtensionKey::CORE, &Registry::new(), &mut tables, |_| {
                panic!("core is never queried")
            }),
            Err(Error::NoCoreRegistered)
        ));

        let registry = registry();
        let core = cache.load_core(&registry, &mut tables).unwrap().unwrap();
        let again = cache
            .get_or_resolve(&ExtensionKey::CORE, &registry, &mut tables, |_| {
                panic!("core is never queried")
            })
            .unwrap();
        assert!(Arc::ptr_eq(&core, &again));
        assert_eq!(core.major_opcode(), 0);
    }

    #[test]
    fn test_clear() {
        let registry = registry();
        let mut tables = DispatchTables::new();
        let mut cache = ExtensionCache::new();
        cache.load_core(&registry, &mut tables).unwrap();
        cache
            .get_or_resolve(&DAMAGE, &registry, &mut tables, |_| {
                Ok(ExtensionPresence::present(143, 91, 152))
            })
            .unwrap();

        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.core().is_none());
    }
}
