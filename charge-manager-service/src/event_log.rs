//! PD event log
//!
//! Charge state changes are recorded as [`LogEntry`] values. Boards that persist them
//! elsewhere implement [`EventLog`] themselves; [`PdLog`] keeps the most recent ones in RAM
//! until the host reads them.
use dock_services::hal::{EventLog, LogEntry};
use dock_services::{error, trace};
use heapless::Deque;

use crate::host::{ChargeType, PortRole};

/// Port partner is dual-role capable
pub const CHARGE_FLAGS_DUAL_ROLE: u16 = 1 << 15;
/// A delayed override is waiting for a power swap
pub const CHARGE_FLAGS_DELAYED_OVERRIDE: u16 = 1 << 14;
/// An override port is set
pub const CHARGE_FLAGS_OVERRIDE: u16 = 1 << 13;
/// Position of the charge type field
pub const CHARGE_FLAGS_TYPE_SHIFT: u16 = 3;
/// Charge type field
pub const CHARGE_FLAGS_TYPE_MASK: u16 = 0xf << CHARGE_FLAGS_TYPE_SHIFT;
/// Port role field
pub const CHARGE_FLAGS_ROLE_MASK: u16 = 0x7;

/// Pack the charge flags of a log record
pub fn charge_flags(
    role: PortRole,
    charge_type: ChargeType,
    dualrole: bool,
    override_set: bool,
    delayed_override: bool,
) -> u16 {
    let mut flags =
        ((role as u16) & CHARGE_FLAGS_ROLE_MASK) | (((charge_type as u16) << CHARGE_FLAGS_TYPE_SHIFT) & CHARGE_FLAGS_TYPE_MASK);
    if dualrole {
        flags |= CHARGE_FLAGS_DUAL_ROLE;
    }
    if override_set {
        flags |= CHARGE_FLAGS_OVERRIDE;
    }
    if delayed_override {
        flags |= CHARGE_FLAGS_DELAYED_OVERRIDE;
    }
    flags
}

/// Bounded in-memory event log, the oldest record is overwritten when full
#[derive(Debug, Default)]
pub struct PdLog<const DEPTH: usize> {
    entries: Deque<LogEntry, DEPTH>,
    /// Records lost to overwrites since the last read
    lost: u32,
}

impl<const DEPTH: usize> PdLog<DEPTH> {
    /// Create an empty log
    pub const fn new() -> Self {
        Self {
            entries: Deque::new(),
            lost: 0,
        }
    }

    /// Number of unread records
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there is nothing to read
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records overwritten before they were read
    pub fn lost(&self) -> u32 {
        self.lost
    }

    /// Take the oldest unread record
    pub fn read(&mut self) -> Option<LogEntry> {
        let entry = self.entries.pop_front();
        if self.entries.is_empty() {
            self.lost = 0;
        }
        entry
    }
}

impl<const DEPTH: usize> EventLog for PdLog<DEPTH> {
    fn log_event(&mut self, entry: LogEntry) {
        if self.entries.is_full() {
            self.entries.pop_front();
            self.lost = self.lost.wrapping_add(1);
        }
        trace!("PD log: port {} flags {:#x}", entry.port.0, entry.flags);
        if let Err(entry) = self.entries.push_back(entry) {
            error!("PD log: no room for port {} entry", entry.port.0);
        }
    }
}

#[cfg(test)]
mod test {
    use dock_services::hal::{LogKind, Measurements};
    use dock_services::power::PortId;

    use super::*;

    fn entry(port: u8) -> LogEntry {
        LogEntry {
            kind: LogKind::McuCharge,
            port: PortId(port),
            flags: 0,
            payload: Measurements::default(),
        }
    }

    #[test]
    fn test_flags() {
        let flags = charge_flags(PortRole::Sink, ChargeType::Pd, true, false, true);
        assert_eq!(flags & CHARGE_FLAGS_ROLE_MASK, PortRole::Sink as u16);
        assert_eq!((flags & CHARGE_FLAGS_TYPE_MASK) >> CHARGE_FLAGS_TYPE_SHIFT, ChargeType::Pd as u16);
        assert_ne!(flags & CHARGE_FLAGS_DUAL_ROLE, 0);
        assert_eq!(flags & CHARGE_FLAGS_OVERRIDE, 0);
        assert_ne!(flags & CHARGE_FLAGS_DELAYED_OVERRIDE, 0);
    }

    #[test]
    fn test_overwrites_oldest() {
        let mut log: PdLog<2> = PdLog::new();
        log.log_event(entry(0));
        log.log_event(entry(1));
        log.log_event(entry(2));

        assert_eq!(log.len(), 2);
        assert_eq!(log.lost(), 1);
        assert_eq!(log.read().map(|e| e.port), Some(PortId(1)));
        assert_eq!(log.read().map(|e| e.port), Some(PortId(2)));
        assert_eq!(log.read(), None);
        assert_eq!(log.lost(), 0);
    }
}
