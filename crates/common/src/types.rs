use serde::{Deserialize, Serialize};

/// Maximum number of tracked devices the runtime reports. Slot tables are
/// sized to this; exceeding it is a configuration error, not a growth signal.
pub const MAX_TRACKED_DEVICES: usize = 16;

/// The head-mounted display always occupies slot 0.
pub const HMD_DEVICE_INDEX: DeviceIndex = DeviceIndex(0);

/// Index of a tracked device as reported by the runtime.
///
/// The index IS the device identity: pose arrays and the render-model slot
/// table are indexed by it, never by an arbitrary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceIndex(pub u32);

impl DeviceIndex {
    /// Whether the index falls inside the fixed device table.
    pub fn in_bounds(self) -> bool {
        (self.0 as usize) < MAX_TRACKED_DEVICES
    }

    pub fn as_usize(self) -> usize {
        self.0 as usize
    }

    pub fn is_hmd(self) -> bool {
        self == HMD_DEVICE_INDEX
    }
}

impl std::fmt::Display for DeviceIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Class of a tracked device as reported by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceClass {
    Invalid,
    Hmd,
    Controller,
    GenericTracker,
    TrackingReference,
    /// Classes this build does not know about.
    Other,
}

impl DeviceClass {
    /// One-character tag used in pose diagnostics.
    pub fn tag(self) -> char {
        match self {
            DeviceClass::Controller => 'C',
            DeviceClass::Hmd => 'H',
            DeviceClass::Invalid => 'I',
            DeviceClass::GenericTracker => 'G',
            DeviceClass::TrackingReference => 'T',
            DeviceClass::Other => '?',
        }
    }
}

/// Left or right eye of the stereo pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Eye {
    Left,
    Right,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hmd_is_slot_zero() {
        assert!(HMD_DEVICE_INDEX.is_hmd());
        assert!(HMD_DEVICE_INDEX.in_bounds());
        assert!(!DeviceIndex(1).is_hmd());
    }

    #[test]
    fn bounds_check() {
        assert!(DeviceIndex(15).in_bounds());
        assert!(!DeviceIndex(16).in_bounds());
        assert!(!DeviceIndex(u32::MAX).in_bounds());
    }

    #[test]
    fn class_tags() {
        assert_eq!(DeviceClass::Controller.tag(), 'C');
        assert_eq!(DeviceClass::Hmd.tag(), 'H');
        assert_eq!(DeviceClass::Invalid.tag(), 'I');
        assert_eq!(DeviceClass::GenericTracker.tag(), 'G');
        assert_eq!(DeviceClass::TrackingReference.tag(), 'T');
        assert_eq!(DeviceClass::Other.tag(), '?');
    }
}
