//! Connection builder and connection object.
//!
//! The [`ConnectionBuilder`] resolves the display target and registry, then
//! asks a [`Connector`] for a transport. The resulting [`Connection`]:
//! 1. Owns the transport until `disconnect()` or drop
//! 2. Resolves the core protocol at opcode base 0
//! 3. Lazily resolves and caches extensions
//! 4. Classifies incoming events and errors through its dispatch tables
//!
//! A connection is used from one thread at a time; all protocol operations
//! take `&self` and run synchronously.
//!
//! # Example
//!
//! ```
//! use xcb_binding::transport::ScriptedTransport;
//! use xcb_binding::{ConnectionBuilder, Error};
//!
//! let server = ScriptedTransport::new();
//! server.push_event({
//!     let mut raw = vec![0u8; 32];
//!     raw[0] = 12;
//!     raw
//! });
//!
//! let conn = ConnectionBuilder::new().display(":0").connect(&server).unwrap();
//! let event = conn.wait_for_event().unwrap();
//! assert_eq!(event.opcode(), 12);
//!
//! conn.disconnect();
//! assert!(matches!(conn.flush(), Err(Error::InvalidConnection)));
//! ```

use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, trace};

use crate::cookie::{Cookie, RequestDescriptor};
use crate::dispatch::DispatchTables;
use crate::display::DisplayTarget;
use crate::error::{Error, Result};
use crate::extension::{Extension, ExtensionCache, ExtensionKey, ExtensionModule, Registry};
use crate::protocol::{BufferView, Event, ProtocolObject, Response};
use crate::transport::{Connector, ReplyOutcome, Transport};

/// Builder for configuring and creating a connection.
#[derive(Default)]
pub struct ConnectionBuilder {
    display: Option<String>,
    registry: Option<Arc<Registry>>,
}

impl ConnectionBuilder {
    /// Create a new connection builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the display to connect to.
    ///
    /// Default: the `DISPLAY` environment variable.
    pub fn display(mut self, display: &str) -> Self {
        self.display = Some(display.to_string());
        self
    }

    /// Use a private extension registry.
    ///
    /// Default: [`Registry::global`].
    pub fn registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Connect through `connector`.
    ///
    /// Fails with [`Error::Connection`] if the server cannot be reached.
    pub fn connect<C: Connector>(self, connector: &C) -> Result<Connection<C::Transport>> {
        let target = DisplayTarget::resolve(self.display.as_deref())?;
        debug!("Connecting to display {}", target);

        let (transport, pref_screen) = connector
            .connect(&target)
            .map_err(|e| Error::Connection(format!("{}: {}", target, e)))?;

        Connection::establish(transport, pref_screen, self.registry)
    }

    /// Build a connection around an already established transport.
    pub fn wrap<T: Transport>(self, transport: T, pref_screen: usize) -> Result<Connection<T>> {
        Connection::establish(transport, pref_screen, self.registry)
    }
}

/// A connection to the server.
pub struct Connection<T: Transport> {
    /// Live transport; `None` once disconnected.
    transport: RefCell<Option<T>>,
    /// Preferred screen reported at connect time.
    pref_screen: usize,
    /// Registry extensions are resolved from.
    registry: Arc<Registry>,
    /// Resolved extensions.
    extensions: RefCell<ExtensionCache>,
    /// Event and error decoders.
    tables: RefCell<DispatchTables>,
}

impl<T: Transport> Connection<T> {
    fn establish(
        transport: T,
        pref_screen: usize,
        registry: Option<Arc<Registry>>,
    ) -> Result<Self> {
        let registry = registry.unwrap_or_else(Registry::global);
        let mut extensions = ExtensionCache::new();
        let mut tables = DispatchTables::new();

        if extensions.load_core(&registry, &mut tables)?.is_none() {
            debug!("No core protocol registered; events and errors decode generically");
        }
        debug!("Connected, preferred screen {}", pref_screen);

        Ok(Self {
            transport: RefCell::new(Some(transport)),
            pref_screen,
            registry,
            extensions: RefCell::new(extensions),
            tables: RefCell::new(tables),
        })
    }

    /// Run `f` against the live transport.
    fn with_transport<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut T) -> std::io::Result<R>,
    {
        let mut transport = self.transport.borrow_mut();
        let transport = transport.as_mut().ok_or(Error::InvalidConnection)?;
        Ok(f(transport)?)
    }

    /// Preferred screen number.
    #[inline]
    pub fn pref_screen(&self) -> usize {
        self.pref_screen
    }

    /// Check if the transport is still live.
    pub fn is_connected(&self) -> bool {
        self.transport.borrow().is_some()
    }

    /// Registry extensions are resolved from.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Release the transport. Safe to call more than once.
    pub fn disconnect(&self) {
        if let Some(mut transport) = self.transport.borrow_mut().take() {
            transport.disconnect();
            debug!("Disconnected");
        }
    }

    /// Write buffered requests to the server.
    pub fn flush(&self) -> Result<()> {
        self.with_transport(|t| t.flush())
    }

    /// Maximum request length the server accepts, in 4-byte units.
    pub fn maximum_request_length(&self) -> Result<u32> {
        self.with_transport(|t| Ok(t.maximum_request_length()))
    }

    /// Start fetching the maximum request length without blocking.
    pub fn prefetch_maximum_request_length(&self) -> Result<()> {
        self.with_transport(|t| {
            t.prefetch_maximum_request_length();
            Ok(())
        })
    }

    /// Allocate a fresh resource id.
    pub fn generate_id(&self) -> Result<u32> {
        self.with_transport(|t| t.generate_id())
    }

    /// Connection setup block, as an owned view.
    pub fn setup(&self) -> Result<BufferView> {
        self.with_transport(|t| Ok(BufferView::from_bytes(t.setup())))
    }

    /// Block until the next event; a server error is raised instead.
    pub fn wait_for_event(&self) -> Result<Event> {
        let raw = self.with_transport(|t| t.wait_for_event())?;
        self.classify(raw)
    }

    /// Return the next event if one is queued; a server error is raised instead.
    ///
    /// `Ok(None)` means no event is available yet.
    pub fn poll_for_event(&self) -> Result<Option<Event>> {
        match self.with_transport(|t| t.poll_for_event())? {
            Some(raw) => self.classify(raw).map(Some),
            None => Ok(None),
        }
    }

    /// Get the extension for `key`, resolving it with the server on first use.
    ///
    /// Every call for the same key returns the same instance.
    pub fn extension(&self, key: &ExtensionKey) -> Result<Arc<Extension>> {
        if !self.is_connected() {
            return Err(Error::InvalidConnection);
        }
        let mut extensions = self.extensions.borrow_mut();
        let mut tables = self.tables.borrow_mut();
        extensions.get_or_resolve(key, &self.registry, &mut tables, |key| {
            self.with_transport(|t| t.query_extension(key))
        })
    }

    /// The core protocol instance.
    ///
    /// Fails with [`Error::NoCoreRegistered`] if no core module was loaded.
    pub fn core(&self) -> Result<Arc<Extension>> {
        self.extension(&ExtensionKey::CORE)
    }

    /// Run `f` against the core module, so core members read as if they
    /// belonged to the connection.
    ///
    /// Fails with [`Error::TypeMismatch`] if the registered core module is
    /// not an `M`.
    pub fn with_core<M, R, F>(&self, f: F) -> Result<R>
    where
        M: ExtensionModule,
        F: FnOnce(&M) -> R,
    {
        let core = self.core()?;
        let module = core.module::<M>().ok_or_else(|| Error::TypeMismatch {
            expected: std::any::type_name::<M>(),
            actual: core.module_name(),
        })?;
        Ok(f(module))
    }

    /// Snapshot of the event and error dispatch tables.
    pub fn dispatch_tables(&self) -> DispatchTables {
        self.tables.borrow().clone()
    }

    /// Issue a pre-encoded request and return its cookie.
    pub fn send_request<R: ProtocolObject>(
        &self,
        request: RequestDescriptor,
        data: Bytes,
    ) -> Result<Cookie<'_, T, R>> {
        let sequence = self.with_transport(|t| t.send_request(&request, data))?;
        trace!(
            "Request {} sent (void: {}, checked: {})",
            sequence,
            request.is_void,
            request.is_checked
        );
        Ok(Cookie::new(self, sequence, request))
    }

    pub(crate) fn wait_for_reply(&self, sequence: u32) -> Result<ReplyOutcome> {
        self.with_transport(|t| t.wait_for_reply(sequence))
    }

    pub(crate) fn request_check(&self, sequence: u32) -> Result<Option<Bytes>> {
        self.with_transport(|t| t.request_check(sequence))
    }

    /// Decode a raw error buffer into the error to raise.
    pub(crate) fn protocol_error(&self, raw: Bytes) -> Error {
        match Response::new(BufferView::from_bytes(raw)) {
            Ok(response) => Error::Protocol(self.tables.borrow().classify_error(response)),
            Err(e) => e,
        }
    }

    /// Classify a raw event-queue buffer.
    fn classify(&self, raw: Bytes) -> Result<Event> {
        let response = Response::new(BufferView::from_bytes(raw))?;
        let tables = self.tables.borrow();
        if response.is_error() {
            return Err(Error::Protocol(tables.classify_error(response)));
        }
        Ok(tables.classify_event(response))
    }
}

impl<T: Transport> Drop for Connection<T> {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl<T: Transport> fmt::Debug for Connection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("connected", &self.is_connected())
            .field("pref_screen", &self.pref_screen)
            .field("extensions", &self.extensions.borrow().len())
            .finish()
    }
}
