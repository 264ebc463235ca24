//! Host command interface
use dock_services::hal::Measurements;
use dock_services::power::{ChargeSupplier, PortId};
use dock_services::Error;

use crate::manager::Override;

/// Power-info selector for whichever port is charging
pub const PD_POWER_CHARGING_PORT: u8 = 0xff;
/// Raw override value for [`Override::Off`]
pub const OVERRIDE_OFF: i16 = -1;
/// Raw override value for [`Override::DontCharge`]
pub const OVERRIDE_DONT_CHARGE: i16 = -2;

/// Power role of a port as reported to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum PortRole {
    /// Nothing attached
    Disconnected = 0,
    /// Port provides power
    Source = 1,
    /// Port is the active charge port
    Sink = 2,
    /// Port offers charge that is not being used
    SinkNotCharging = 3,
}

/// Charger type as reported to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ChargeType {
    /// No charger
    None = 0,
    /// USB PD contract
    Pd = 1,
    /// Type-C current advertisement
    TypeC = 2,
    /// Vendor specific charger
    Proprietary = 3,
    /// BC1.2 dedicated charging port
    Bc12Dcp = 4,
    /// BC1.2 charging downstream port
    Bc12Cdp = 5,
    /// BC1.2 standard downstream port
    Bc12Sdp = 6,
    /// Unidentified charger
    Other = 7,
    /// VBUS present, nothing else known
    Vbus = 8,
}

impl From<ChargeSupplier> for ChargeType {
    fn from(supplier: ChargeSupplier) -> Self {
        match supplier {
            ChargeSupplier::Pd => ChargeType::Pd,
            ChargeSupplier::TypeC => ChargeType::TypeC,
            ChargeSupplier::Proprietary => ChargeType::Proprietary,
            ChargeSupplier::Bc12Dcp => ChargeType::Bc12Dcp,
            ChargeSupplier::Bc12Cdp => ChargeType::Bc12Cdp,
            ChargeSupplier::Bc12Sdp => ChargeType::Bc12Sdp,
            ChargeSupplier::Other => ChargeType::Other,
            ChargeSupplier::Vbus => ChargeType::Vbus,
        }
    }
}

/// Power state of a port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PowerInfo {
    /// Power role of the port
    pub role: PortRole,
    /// Best charger on the port
    pub charge_type: ChargeType,
    /// Partner is dual-role capable
    pub dualrole: bool,
    /// Voltage and current of the port
    pub meas: Measurements,
    /// Advertised power in mA * mV
    pub max_power_uw: u32,
}

impl PowerInfo {
    /// Report for a port with nothing attached
    pub const DISCONNECTED: Self = Self {
        role: PortRole::Disconnected,
        charge_type: ChargeType::None,
        dualrole: false,
        meas: Measurements {
            voltage_max_mv: 0,
            voltage_now_mv: 0,
            current_max_ma: 0,
        },
        max_power_uw: 0,
    };
}

/// Port selector of the power-info command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerInfoPort {
    /// A specific port
    Port(PortId),
    /// The active charge port
    Charging,
}

impl PowerInfoPort {
    /// Decode the raw selector
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            PD_POWER_CHARGING_PORT => PowerInfoPort::Charging,
            port => PowerInfoPort::Port(PortId(port)),
        }
    }
}

impl Override {
    /// Decode a raw override value for a board with `port_count` ports
    pub fn from_raw(raw: i16, port_count: usize) -> Result<Self, Error> {
        match raw {
            OVERRIDE_OFF => Ok(Override::Off),
            OVERRIDE_DONT_CHARGE => Ok(Override::DontCharge),
            port if port >= 0 && (port as usize) < port_count => Ok(Override::Port(PortId(port as u8))),
            _ => Err(Error::InvalidParams),
        }
    }

    /// Raw value reported to the host
    pub fn to_raw(self) -> i16 {
        match self {
            Override::Off => OVERRIDE_OFF,
            Override::DontCharge => OVERRIDE_DONT_CHARGE,
            Override::Port(port) => port.0 as i16,
        }
    }
}

/// Host commands handled by the charge manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HostCommand {
    /// Power info for a raw port selector, see [`PD_POWER_CHARGING_PORT`]
    PowerInfo(u8),
    /// Set the override from its raw value
    ChargePortOverride(i16),
}

/// Host command result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HostResponse {
    /// Power state of the requested port
    PowerInfo(PowerInfo),
    /// Command applied
    Complete,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_override_from_raw() {
        assert_eq!(Override::from_raw(-1, 2), Ok(Override::Off));
        assert_eq!(Override::from_raw(-2, 2), Ok(Override::DontCharge));
        assert_eq!(Override::from_raw(1, 2), Ok(Override::Port(PortId(1))));
        assert_eq!(Override::from_raw(2, 2), Err(Error::InvalidParams));
        assert_eq!(Override::from_raw(-3, 2), Err(Error::InvalidParams));
        assert_eq!(Override::from_raw(i16::MAX, 2), Err(Error::InvalidParams));
    }

    #[test]
    fn test_override_raw_round_trip() {
        for target in [Override::Off, Override::DontCharge, Override::Port(PortId(0))] {
            assert_eq!(Override::from_raw(target.to_raw(), 1), Ok(target));
        }
    }

    #[test]
    fn test_power_info_selector() {
        assert_eq!(PowerInfoPort::from_raw(0xff), PowerInfoPort::Charging);
        assert_eq!(PowerInfoPort::from_raw(1), PowerInfoPort::Port(PortId(1)));
    }

    #[test]
    fn test_charge_type_codes() {
        assert_eq!(ChargeType::from(ChargeSupplier::Pd) as u8, 1);
        assert_eq!(ChargeType::from(ChargeSupplier::Vbus) as u8, 8);
        assert_eq!(PortRole::SinkNotCharging as u8, 3);
    }
}
