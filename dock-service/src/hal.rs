//! Hardware abstraction consumed by the dock services
//!
//! Boards implement these traits on top of their PD stack, charger and GPIO drivers.
//! All methods are expected to be non-blocking; anything that needs to wait is expressed
//! by the services as a deferred call.
use crate::hpd::HpdEvent;
use crate::power::{PortId, PowerRole};
use crate::Error;

/// Receiver for debounced HPD events, usually the DisplayPort alt-mode code of the PD stack
pub trait HpdSink {
    /// Hand a debounced HPD event to the PD protocol layer
    fn send_hpd(&mut self, port: PortId, event: HpdEvent);
}

/// Port-level operations of the PD stack
pub trait PdPort {
    /// Current power role of the port
    fn role(&mut self, port: PortId) -> PowerRole;
    /// Returns true if a partner is attached and a contract is in place
    fn is_connected(&mut self, port: PortId) -> bool;
    /// Ask the partner for a power-role swap
    fn request_power_swap(&mut self, port: PortId);
    /// Ask the PD stack to re-evaluate the power it requests on this port
    fn set_new_power_request(&mut self, port: PortId);
}

/// Board charge path control
pub trait ChargeBoard {
    /// Switch the hardware charge path to `port`, `None` disables charging.
    ///
    /// The board may veto a port with [`Error::Rejected`], but must always accept `None`.
    fn set_active_charge_port(&mut self, port: Option<PortId>) -> Result<(), Error>;
    /// Apply an input current limit to the charger
    fn set_charge_limit(&mut self, current_ma: u32);
    /// Measured VBUS voltage on the active charge port
    fn vbus_voltage_mv(&mut self) -> u32;
}

/// Kind of a persisted diagnostic record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LogKind {
    /// Charge state of a port changed
    McuCharge,
}

/// Power measurements carried in a log record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Measurements {
    /// Advertised voltage in mV
    pub voltage_max_mv: u32,
    /// Current VBUS voltage in mV
    pub voltage_now_mv: u32,
    /// Advertised current in mA
    pub current_max_ma: u32,
}

/// A persisted diagnostic record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LogEntry {
    /// Record kind
    pub kind: LogKind,
    /// Port the record refers to
    pub port: PortId,
    /// Kind-specific flags
    pub flags: u16,
    /// Measurements at the time of the record
    pub payload: Measurements,
}

/// Sink for diagnostic records
pub trait EventLog {
    /// Persist a record, the default implementation drops it
    fn log_event(&mut self, _entry: LogEntry) {}
}
