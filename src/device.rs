//! Tap controller interface.
//!
//! The driver side is external: it reports tap masks and connection changes
//! as [`DeviceEvent`]s and accepts haptic commands through [`TapDevice`].

use tracing::info;

/// Inbound event from the tap controller driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    /// Fingers tapped together, one bit per finger (5 bits)
    Tap { mask: u8 },
    Connected {
        device_id: String,
        name: String,
        firmware: u32,
    },
    Disconnected { device_id: String },
}

/// Commands sent back to the controller.
pub trait TapDevice: Send {
    /// Play a vibration pattern (alternating on/off durations in ms)
    fn vibrate(&mut self, pattern: &[u32]);
}

/// Device handle that only logs commands (no hardware attached)
#[derive(Debug, Default)]
pub struct LoggingDevice;

impl LoggingDevice {
    pub fn new() -> Self {
        Self
    }
}

impl TapDevice for LoggingDevice {
    fn vibrate(&mut self, pattern: &[u32]) {
        info!("vibrate {pattern:?}");
    }
}
