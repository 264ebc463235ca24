//! Power related vocabulary shared between the charge manager and its collaborators

/// Port ID new type
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PortId(pub u8);

impl PortId {
    /// Index into per-port tables
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Current power role of a port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerRole {
    /// Port is providing power
    Source,
    /// Port is consuming power
    Sink,
}

/// Dual-role capability of the attached port partner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DualRoleCapability {
    /// Nothing is known about the partner yet
    #[default]
    Unknown,
    /// Partner can only provide power
    Dedicated,
    /// Partner can act as either source or sink
    DualRole,
}

/// Charge suppliers
///
/// The default priority follows declaration order, highest priority first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChargeSupplier {
    /// Negotiated USB-PD contract
    Pd,
    /// Type-C current advertisement
    TypeC,
    /// Proprietary charger detection
    Proprietary,
    /// BC1.2 dedicated charging port
    Bc12Dcp,
    /// BC1.2 charging downstream port
    Bc12Cdp,
    /// BC1.2 standard downstream port
    Bc12Sdp,
    /// Anything else that reports charge
    Other,
    /// Bare VBUS presence
    Vbus,
}

/// Number of charge supplier kinds
pub const SUPPLIER_COUNT: usize = 8;

impl ChargeSupplier {
    /// Every supplier, in declaration order
    pub const ALL: [ChargeSupplier; SUPPLIER_COUNT] = [
        ChargeSupplier::Pd,
        ChargeSupplier::TypeC,
        ChargeSupplier::Proprietary,
        ChargeSupplier::Bc12Dcp,
        ChargeSupplier::Bc12Cdp,
        ChargeSupplier::Bc12Sdp,
        ChargeSupplier::Other,
        ChargeSupplier::Vbus,
    ];

    /// Index into per-supplier tables
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Charge available from one supplier on one port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChargePortInfo {
    /// Max available current in mA
    pub current_ma: u32,
    /// Available voltage in mV
    pub voltage_mv: u32,
}

impl ChargePortInfo {
    /// No charge available
    pub const NONE: Self = Self {
        current_ma: 0,
        voltage_mv: 0,
    };

    /// Create a new charge report
    pub const fn new(current_ma: u32, voltage_mv: u32) -> Self {
        Self { current_ma, voltage_mv }
    }

    /// Power in mA * mV, the unit used for comparing suppliers
    pub fn power(&self) -> u32 {
        self.current_ma.saturating_mul(self.voltage_mv)
    }

    /// Maximum power in mW
    pub fn max_power_mw(&self) -> u32 {
        self.power() / 1000
    }

    /// True if both current and voltage are nonzero
    pub fn is_available(&self) -> bool {
        self.current_ma != 0 && self.voltage_mv != 0
    }
}
