//! Port discovery: decide which serial device to open.
//!
//! An explicit override path short-circuits everything (hardware is never queried).
//! Otherwise the enumeration backend is asked for the current port list on every
//! attempt and the first port accepted by the [`MatchPolicy`] wins.

use log::{debug, trace};
use std::sync::Arc;

use super::errors::DiscoveryError;

/// Manufacturer marker reported by genuine boards.
pub const DEFAULT_MANUFACTURER_MARKER: &str = "Arduino";
/// USB vendor id of the reference board.
pub const DEFAULT_VENDOR_ID: &str = "2341";
/// USB product id of the reference board (Uno R3).
pub const DEFAULT_PRODUCT_ID: &str = "0043";

/// Identifying record of one serial device as seen by enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceDescriptor {
    pub path: String,
    pub manufacturer: Option<String>,
    /// Lowercase 4-digit hex, e.g. `"2341"`.
    pub vendor_id: Option<String>,
    /// Lowercase 4-digit hex, e.g. `"0043"`.
    pub product_id: Option<String>,
}

impl DeviceDescriptor {
    /// Descriptor for an explicitly configured path (no vendor metadata).
    pub fn from_path(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }
}

/// How enumerated ports are matched against the expected board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchPolicy {
    /// Manufacturer string contains the marker (case-sensitive).
    Manufacturer { marker: String },
    /// Vendor and product ids both equal (hex, case-insensitive).
    UsbId {
        vendor_id: String,
        product_id: String,
    },
}

impl Default for MatchPolicy {
    fn default() -> Self {
        MatchPolicy::Manufacturer {
            marker: DEFAULT_MANUFACTURER_MARKER.to_string(),
        }
    }
}

impl MatchPolicy {
    pub fn matches(&self, port: &DeviceDescriptor) -> bool {
        match self {
            MatchPolicy::Manufacturer { marker } => port
                .manufacturer
                .as_deref()
                .is_some_and(|m| m.contains(marker.as_str())),
            MatchPolicy::UsbId {
                vendor_id,
                product_id,
            } => {
                let same = |have: &Option<String>, want: &str| {
                    have.as_deref()
                        .is_some_and(|h| h.eq_ignore_ascii_case(want))
                };
                same(&port.vendor_id, vendor_id) && same(&port.product_id, product_id)
            }
        }
    }
}

/// Source of the current serial port list.
pub trait PortEnumerator: Send + Sync {
    fn list(&self) -> Result<Vec<DeviceDescriptor>, DiscoveryError>;
}

/// Enumerates ports through `serialport::available_ports`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnumerator;

#[cfg(feature = "serial")]
impl PortEnumerator for SystemEnumerator {
    fn list(&self) -> Result<Vec<DeviceDescriptor>, DiscoveryError> {
        let ports =
            serialport::available_ports().map_err(|e| DiscoveryError::Backend(e.to_string()))?;
        Ok(ports
            .into_iter()
            .map(|p| match p.port_type {
                serialport::SerialPortType::UsbPort(info) => DeviceDescriptor {
                    path: p.port_name,
                    manufacturer: info.manufacturer,
                    vendor_id: Some(format!("{:04x}", info.vid)),
                    product_id: Some(format!("{:04x}", info.pid)),
                },
                _ => DeviceDescriptor::from_path(p.port_name),
            })
            .collect())
    }
}

#[cfg(not(feature = "serial"))]
impl PortEnumerator for SystemEnumerator {
    fn list(&self) -> Result<Vec<DeviceDescriptor>, DiscoveryError> {
        Err(DiscoveryError::Unsupported)
    }
}

/// Device selection: override path or policy match over an enumeration backend.
#[derive(Clone)]
pub struct Discovery {
    override_path: Option<String>,
    policy: MatchPolicy,
    enumerator: Arc<dyn PortEnumerator>,
}

impl std::fmt::Debug for Discovery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Discovery")
            .field("override_path", &self.override_path)
            .field("policy", &self.policy)
            .finish()
    }
}

impl Discovery {
    pub fn new(
        override_path: Option<String>,
        policy: MatchPolicy,
        enumerator: Arc<dyn PortEnumerator>,
    ) -> Self {
        Self {
            override_path: override_path.filter(|p| !p.trim().is_empty()),
            policy,
            enumerator,
        }
    }

    /// Discovery backed by the OS port list.
    pub fn system(override_path: Option<String>, policy: MatchPolicy) -> Self {
        Self::new(override_path, policy, Arc::new(SystemEnumerator))
    }

    pub fn override_path(&self) -> Option<&str> {
        self.override_path.as_deref()
    }

    pub fn policy(&self) -> &MatchPolicy {
        &self.policy
    }

    /// Select the device to open. `Ok(None)` means nothing matched.
    pub fn discover(&self) -> Result<Option<DeviceDescriptor>, DiscoveryError> {
        if let Some(path) = &self.override_path {
            trace!("Using configured device path {}", path);
            return Ok(Some(DeviceDescriptor::from_path(path.clone())));
        }
        let ports = self.enumerator.list()?;
        debug!("Enumerated {} serial port(s)", ports.len());
        Ok(ports.into_iter().find(|p| self.policy.matches(p)))
    }

    /// Every enumerated port paired with whether the policy accepts it.
    /// Always enumerates, even when an override is set.
    pub fn candidates(&self) -> Result<Vec<(DeviceDescriptor, bool)>, DiscoveryError> {
        Ok(self
            .enumerator
            .list()?
            .into_iter()
            .map(|p| {
                let accepted = self.policy.matches(&p);
                (p, accepted)
            })
            .collect())
    }
}
