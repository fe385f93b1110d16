//! # Serial Link Module
//!
//! Everything that touches the physical device lives here: finding it, opening it,
//! splitting its byte stream into lines, and keeping the connection alive.
//!
//! - [`discovery`] - picks the serial port to open (override path or enumeration match)
//! - [`framer`] - delimiter-based line framing for inbound bytes and outbound commands
//! - [`lifecycle`] - the link actor: open/close transitions and the reconnect poll
//!
//! ## Transport seam
//!
//! The lifecycle never calls `serialport` directly. It opens connections through a
//! [`PortOpener`], which hands back independent read and write halves. The system
//! implementation ([`SystemPortOpener`]) clones the OS handle so the reader pump can
//! block on reads while the link task writes.
//!
//! ```rust,no_run
//! # #[cfg(feature = "serial")]
//! # {
//! use boardlink::serial::{PortOpener, SystemPortOpener};
//!
//! let opener = SystemPortOpener::default();
//! let halves = opener.open("/dev/ttyACM0", 9600).expect("open");
//! # drop(halves);
//! # }
//! ```

pub mod discovery;
pub mod errors;
pub mod framer;
pub mod lifecycle;

pub use discovery::{DeviceDescriptor, Discovery, MatchPolicy, PortEnumerator, SystemEnumerator};
pub use errors::{DiscoveryError, LinkError};
pub use framer::{encode_line, Delimiter, LineFramer};
pub use lifecycle::{LinkHandle, LinkManager, LinkOptions, LinkState, RECONNECT_INTERVAL};

use std::io::{Read, Write};
use std::time::Duration;

/// Fixed line speed of the board controller firmware.
pub const BAUD_RATE: u32 = 9600;

/// Read half of an open connection. Reads are expected to time out periodically
/// (`ErrorKind::TimedOut`) so the reader pump can notice a stop request.
pub type LinkReader = Box<dyn Read + Send>;

/// Write half of an open connection.
pub type LinkWriter = Box<dyn Write + Send>;

/// Both halves of a freshly opened connection.
pub struct LinkHalves {
    pub reader: LinkReader,
    pub writer: LinkWriter,
}

impl std::fmt::Debug for LinkHalves {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkHalves").finish_non_exhaustive()
    }
}

/// Opens a transport to a device path. Called from the blocking pool.
pub trait PortOpener: Send + Sync {
    fn open(&self, path: &str, baud_rate: u32) -> std::io::Result<LinkHalves>;
}

/// Opens real serial ports via the `serialport` crate (8N1, no flow control).
#[derive(Debug, Clone)]
pub struct SystemPortOpener {
    /// Read timeout; bounds how long a stop request waits on the reader pump.
    pub read_timeout: Duration,
}

impl Default for SystemPortOpener {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_millis(200),
        }
    }
}

#[cfg(feature = "serial")]
impl PortOpener for SystemPortOpener {
    fn open(&self, path: &str, baud_rate: u32) -> std::io::Result<LinkHalves> {
        log::debug!("Opening serial port {} at {} baud", path, baud_rate);
        let port = serialport::new(path, baud_rate)
            .timeout(self.read_timeout)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .flow_control(serialport::FlowControl::None)
            .open()
            .map_err(std::io::Error::from)?;
        let reader = port.try_clone().map_err(std::io::Error::from)?;
        Ok(LinkHalves {
            reader: Box::new(reader),
            writer: Box::new(port),
        })
    }
}

#[cfg(not(feature = "serial"))]
impl PortOpener for SystemPortOpener {
    fn open(&self, path: &str, _baud_rate: u32) -> std::io::Result<LinkHalves> {
        Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            format!("cannot open {}: serial support not compiled in", path),
        ))
    }
}
