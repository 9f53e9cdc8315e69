//! Display target parsing.
//!
//! A display string has the form `[protocol/][host]:display[.screen]`,
//! e.g. `:0`, `localhost:10.1` or `unix/:0`. When no display is given the
//! `DISPLAY` environment variable is used.
//!
//! # Example
//!
//! ```
//! use xcb_binding::DisplayTarget;
//!
//! let target = DisplayTarget::parse("tcp/example.org:2.1").unwrap();
//! assert_eq!(target.protocol(), Some("tcp"));
//! assert_eq!(target.host(), "example.org");
//! assert_eq!(target.display(), 2);
//! assert_eq!(target.screen(), 1);
//! assert_eq!(target.tcp_port(), 6002);
//! ```

use std::fmt;

use crate::error::{Error, Result};
use crate::protocol::X_TCP_PORT;

/// Environment variable consulted when no display is given.
pub const DISPLAY_ENV: &str = "DISPLAY";

/// Parsed display target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayTarget {
    protocol: Option<String>,
    host: String,
    display: u16,
    screen: usize,
}

impl DisplayTarget {
    /// Parse a display string.
    pub fn parse(name: &str) -> Result<Self> {
        let invalid = || Error::InvalidDisplay(name.to_string());

        let (prefix, number) = name.rsplit_once(':').ok_or_else(invalid)?;
        let (protocol, host) = match prefix.split_once('/') {
            Some((protocol, host)) if !protocol.is_empty() => (Some(protocol.to_string()), host),
            Some(_) => return Err(invalid()),
            None => (None, prefix),
        };

        let (display, screen) = match number.split_once('.') {
            Some((display, screen)) => (display, screen.parse::<usize>().map_err(|_| invalid())?),
            None => (number, 0),
        };
        let display = display.parse::<u16>().map_err(|_| invalid())?;

        Ok(Self {
            protocol,
            host: host.to_string(),
            display,
            screen,
        })
    }

    /// Resolve `name`, falling back to `$DISPLAY` when it is `None`.
    pub fn resolve(name: Option<&str>) -> Result<Self> {
        match name {
            Some(name) => Self::parse(name),
            None => {
                let name = std::env::var(DISPLAY_ENV)
                    .map_err(|_| Error::InvalidDisplay(format!("${} is not set", DISPLAY_ENV)))?;
                Self::parse(&name)
            }
        }
    }

    /// Explicit transport protocol (`tcp`, `unix`, ...).
    pub fn protocol(&self) -> Option<&str> {
        self.protocol.as_deref()
    }

    /// Host name (empty for the local machine).
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Display number.
    pub fn display(&self) -> u16 {
        self.display
    }

    /// Screen number requested by the display string.
    pub fn screen(&self) -> usize {
        self.screen
    }

    /// Check if the target names the local machine.
    pub fn is_local(&self) -> bool {
        self.host.is_empty() || self.protocol.as_deref() == Some("unix")
    }

    /// TCP port the display listens on.
    pub fn tcp_port(&self) -> u16 {
        X_TCP_PORT.saturating_add(self.display)
    }
}

impl fmt::Display for DisplayTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(protocol) = &self.protocol {
            write!(f, "{}/", protocol)?;
        }
        write!(f, "{}:{}.{}", self.host, self.display, self.screen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_local() {
        let target = DisplayTarget::parse(":0").unwrap();
        assert_eq!(target.host(), "");
        assert_eq!(target.display(), 0);
        assert_eq!(target.screen(), 0);
        assert!(target.protocol().is_none());
        assert!(target.is_local());
    }

    #[test]
    fn test_parse_host_and_screen() {
        let target = DisplayTarget::parse("localhost:10.1").unwrap();
        assert_eq!(target.host(), "localhost");
        assert_eq!(target.display(), 10);
        assert_eq!(target.screen(), 1);
        assert!(!target.is_local());
        assert_eq!(target.tcp_port(), 6010);
    }

    #[test]
    fn test_parse_protocol() {
        let target = DisplayTarget::parse("unix/:1").unwrap();
        assert_eq!(target.protocol(), Some("unix"));
        assert!(target.is_local());
        assert_eq!(target.to_string(), "unix/:1.0");
    }

    #[test]
    fn test_parse_invalid() {
        for name in ["", "localhost", ":", ":x", ":0.y", "/:0", "host:0.1.2"] {
            assert!(
                matches!(DisplayTarget::parse(name), Err(Error::InvalidDisplay(_))),
                "{:?} should be rejected",
                name
            );
        }
    }

    #[test]
    fn test_resolve_explicit_wins() {
        let target = DisplayTarget::resolve(Some(":3")).unwrap();
        assert_eq!(target.display(), 3);
    }
}
