//! Configuration types for the charge manager service

use dock_services::power::{ChargeSupplier, SUPPLIER_COUNT};
use embassy_time::Duration;

/// Maximum time for a source to recover after a hard reset
pub const T_SRC_RECOVER_MAX: Duration = Duration::from_millis(1000);
/// Time for a source to turn VBUS on
pub const T_SRC_TURN_ON: Duration = Duration::from_millis(275);
/// Time for VBUS to discharge to vSafe0V
pub const T_SAFE_0V: Duration = Duration::from_millis(650);

/// Time allowed for a requested power swap to turn a source port into a charging sink
pub const POWER_SWAP_TIMEOUT: Duration = Duration::from_millis(
    T_SRC_RECOVER_MAX.as_millis() + T_SRC_TURN_ON.as_millis() + T_SAFE_0V.as_millis() + 500,
);

/// Number of records kept by the PD event log
pub const DEFAULT_LOG_DEPTH: usize = 16;

/// Charge manager configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Priority per supplier, indexed by [`ChargeSupplier::index`]. Lower values win.
    pub supplier_priority: [u8; SUPPLIER_COUNT],
    /// How long a delayed override waits for its power swap
    pub power_swap_timeout: Duration,
}

impl Config {
    /// Priority value of `supplier`
    pub fn priority(&self, supplier: ChargeSupplier) -> u8 {
        self.supplier_priority[supplier.index()]
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // Declaration order, PD first
            supplier_priority: [0, 1, 2, 3, 4, 5, 6, 7],
            power_swap_timeout: POWER_SWAP_TIMEOUT,
        }
    }
}
