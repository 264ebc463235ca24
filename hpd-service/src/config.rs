//! Configuration types for the HPD service

use embassy_time::Duration;

/// Debounce policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Variant {
    /// Glitch filtering with an ordered, rate-limited message queue
    #[default]
    Queued,
    /// Level-only debounce with a direct IRQ report, used by older dongles
    Simple,
}

/// Timing thresholds and policy for one HPD line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Edges closer together than this are noise
    pub glitch_threshold: Duration,
    /// A low pulse up to this long is an IRQ rather than a disconnect
    pub irq_threshold: Duration,
    /// A level must stay stable this long before it is reported
    pub level_debounce: Duration,
    /// Minimum gap between two queued deliveries
    pub queue_gap: Duration,
    /// Debounce policy
    pub variant: Variant,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            glitch_threshold: Duration::from_micros(150),
            irq_threshold: Duration::from_millis(2),
            level_debounce: Duration::from_millis(100),
            queue_gap: Duration::from_millis(4),
            variant: Variant::Queued,
        }
    }
}

impl Config {
    /// Configuration used by the older level-only boards
    pub fn simple() -> Self {
        Self {
            variant: Variant::Simple,
            ..Self::default()
        }
    }
}
