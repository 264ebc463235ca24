use dock_services::hal::{LogEntry, LogKind, Measurements};

use super::*;
use crate::event_log::charge_flags;
use crate::host::{ChargeType, PortRole, PowerInfo};

/// VBUS on a port that sources or sinks without charging
const VSAFE5V_MV: u32 = 5000;

impl<const N: usize> ChargeManager<N> {
    /// Supplier shown for a port that is not charging: best priority, then most power
    fn displayed_supplier(&self, index: usize) -> Option<(ChargeSupplier, ChargePortInfo)> {
        let mut shown: Option<(ChargeSupplier, ChargePortInfo)> = None;
        for supplier in ChargeSupplier::ALL {
            let Some(info) = self.available[supplier.index()][index].filter(ChargePortInfo::is_available) else {
                continue;
            };

            let better = match shown {
                None => true,
                Some((current, current_info)) => {
                    let priority = self.config.priority(supplier);
                    let current_priority = self.config.priority(current);
                    priority < current_priority
                        || (priority == current_priority && info.power() > current_info.power())
                }
            };
            if better {
                shown = Some((supplier, info));
            }
        }
        shown
    }

    /// Describe what is going on at `port`, `None` reports a disconnected port
    pub fn power_info<H: Platform>(&self, hal: &mut H, port: Option<PortId>) -> PowerInfo {
        let Some(port) = port.filter(|port| port.index() < N) else {
            return PowerInfo::DISCONNECTED;
        };
        let index = port.index();

        let supplier = if self.active.port == Some(port) {
            self.active
                .supplier
                .map(|supplier| (supplier, self.available[supplier.index()][index].unwrap_or_default()))
        } else {
            self.displayed_supplier(index)
        };

        let role = if self.active.port == Some(port) {
            PortRole::Sink
        } else if hal.is_connected(port) && hal.role(port) == PowerRole::Source {
            PortRole::Source
        } else if supplier.is_some() {
            PortRole::SinkNotCharging
        } else {
            PortRole::Disconnected
        };
        let dualrole = self.dualrole[index] == DualRoleCapability::DualRole;

        match supplier {
            Some((supplier, info)) if role != PortRole::Source => {
                let voltage_now_mv = if role == PortRole::SinkNotCharging {
                    VSAFE5V_MV
                } else {
                    hal.vbus_voltage_mv()
                };
                PowerInfo {
                    role,
                    charge_type: ChargeType::from(supplier),
                    dualrole,
                    meas: Measurements {
                        voltage_max_mv: info.voltage_mv,
                        voltage_now_mv,
                        current_max_ma: info.current_ma,
                    },
                    max_power_uw: info.power(),
                }
            }
            _ => PowerInfo {
                role,
                charge_type: ChargeType::None,
                dualrole,
                meas: Measurements {
                    voltage_now_mv: if role == PortRole::Source { VSAFE5V_MV } else { 0 },
                    ..Measurements::default()
                },
                max_power_uw: 0,
            },
        }
    }

    /// Record the state of `port` in the event log
    pub(super) fn write_log<H: Platform>(&mut self, hal: &mut H, port: PortId) {
        self.save_log[port.index()] = false;

        let info = self.power_info(hal, Some(port));
        let flags = charge_flags(
            info.role,
            info.charge_type,
            info.dualrole,
            self.override_port.port() == Some(port),
            self.delayed_override_port() == Some(port),
        );
        hal.log_event(LogEntry {
            kind: LogKind::McuCharge,
            port,
            flags,
            payload: info.meas,
        });
    }
}
