//! Event loop - example of classifying server events.
//!
//! This example demonstrates:
//! - Registering the core protocol and an extension with `Registry`
//! - Resolving the extension with `conn.extension()`
//! - Draining the event queue with `poll_for_event()`
//! - Telling server errors apart from events
//!
//! The server side is a `ScriptedTransport` with a few queued buffers, so
//! the example runs without a display:
//!
//! ```sh
//! cargo run --example events
//! ```

use std::sync::Arc;

use xcb_binding::dispatch::OpcodeSpec;
use xcb_binding::extension::{ExtensionKey, ExtensionModule, ExtensionPresence, Registry};
use xcb_binding::protocol::{BufferView, ProtocolObject};
use xcb_binding::transport::ScriptedTransport;
use xcb_binding::{ConnectionBuilder, Error};

/// Expose event: a region of `window` needs redrawing.
struct Expose(BufferView);

impl Expose {
    fn window(&self) -> u32 {
        self.0.u32_at(4).unwrap_or_default()
    }
}

impl ProtocolObject for Expose {
    const NAME: &'static str = "Expose";

    fn from_view(view: BufferView) -> xcb_binding::Result<Self> {
        Ok(Self(view))
    }

    fn view(&self) -> &BufferView {
        &self.0
    }
}

/// RandR screen change notification.
struct ScreenChangeNotify(BufferView);

impl ProtocolObject for ScreenChangeNotify {
    const NAME: &'static str = "ScreenChangeNotify";

    fn from_view(view: BufferView) -> xcb_binding::Result<Self> {
        Ok(Self(view))
    }

    fn view(&self) -> &BufferView {
        &self.0
    }
}

struct Core;

impl ExtensionModule for Core {
    fn new(_key: ExtensionKey) -> Self {
        Core
    }
}

struct RandR;

impl ExtensionModule for RandR {
    fn new(_key: ExtensionKey) -> Self {
        RandR
    }
}

const RANDR: ExtensionKey = ExtensionKey::new("RANDR");

fn event(kind: u8, detail: u8, sequence: u16) -> Vec<u8> {
    let mut raw = vec![0u8; 32];
    raw[0] = kind;
    raw[1] = detail;
    raw[2..4].copy_from_slice(&sequence.to_ne_bytes());
    raw
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let registry = Arc::new(Registry::new());
    registry.add_core::<Core>(&[OpcodeSpec::of::<Expose>(12)], &[])?;
    registry.add_extension::<RandR>(RANDR, &[OpcodeSpec::of::<ScreenChangeNotify>(0)], &[])?;

    let server = ScriptedTransport::new();
    server.set_extension("RANDR", ExtensionPresence::present(140, 89, 147));

    let mut expose = event(12, 0, 1);
    expose[4..8].copy_from_slice(&0x0040_0001u32.to_ne_bytes());
    server.push_event(expose);
    server.push_event(event(89, 0, 2));
    server.push_event(event(0, 3, 3));
    server.push_event(event(33, 0, 4));

    let conn = ConnectionBuilder::new()
        .display(":0")
        .registry(registry)
        .connect(&server)?;

    let randr = conn.extension(&RANDR)?;
    println!(
        "RANDR: major opcode {}, first event {}",
        randr.major_opcode(),
        randr.first_event()
    );

    loop {
        match conn.poll_for_event() {
            Ok(Some(event)) if event.is::<Expose>() => {
                let expose: Expose = event.cast()?;
                println!("Expose on window {:#x}", expose.window());
            }
            Ok(Some(event)) => {
                println!("{} (sequence {})", event.name(), event.sequence());
            }
            Ok(None) => break,
            Err(Error::Protocol(err)) => println!("Server error: {}", err),
            Err(e) => return Err(e.into()),
        }
    }

    conn.disconnect();
    Ok(())
}
