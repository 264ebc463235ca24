//! Charge port arbitration
//!
//! Charge suppliers on every port report what they can provide; the manager picks the port
//! and supplier the system charges from and tells the board and the PD stack about it.
//! Selection only runs once every (supplier, port) pair has reported at least once, so the
//! manager never commits to a port before it knows what is attached.
use dock_services::deferred::Deferred;
use dock_services::hal::{ChargeBoard, EventLog, PdPort};
use dock_services::power::{
    ChargePortInfo, ChargeSupplier, DualRoleCapability, PortId, PowerRole, SUPPLIER_COUNT,
};
use dock_services::{debug, error, info, warn, Error};
use embassy_time::{Duration, Instant};

use crate::config::Config;
use crate::host::{HostCommand, HostResponse, PowerInfoPort};

mod power_info;
mod refresh;

/// Everything the charge manager needs from the board
pub trait Platform: PdPort + ChargeBoard + EventLog {}

impl<T: PdPort + ChargeBoard + EventLog> Platform for T {}

/// Charge port override
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Override {
    /// Normal arbitration
    #[default]
    Off,
    /// Do not charge from any port
    DontCharge,
    /// Always prefer this port while it has charge
    Port(PortId),
}

impl Override {
    /// Port forced by the override, if any
    pub fn port(self) -> Option<PortId> {
        match self {
            Override::Port(port) => Some(port),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum Callback {
    Refresh,
    OverrideTimeout,
}

/// Override waiting for a power swap to complete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DelayedOverride {
    port: PortId,
    deadline: Instant,
}

/// Charge parameters currently applied to the hardware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Active {
    port: Option<PortId>,
    supplier: Option<ChargeSupplier>,
    /// `None` until the first refresh applied a limit
    current_ma: Option<u32>,
    current_uncapped_ma: Option<u32>,
    voltage_mv: u32,
}

/// Charge manager for `N` ports
pub struct ChargeManager<const N: usize> {
    config: Config,
    /// Charge per supplier and port, `None` until reported
    available: [[Option<ChargePortInfo>; N]; SUPPLIER_COUNT],
    registration_time: [Option<Instant>; N],
    ceil: [Option<u32>; N],
    dualrole: [DualRoleCapability; N],
    /// Ports with a change that still needs a log record
    save_log: [bool; N],
    active: Active,
    override_port: Override,
    delayed_override: Option<DelayedOverride>,
    seeded: bool,
    deferred: Deferred<Callback, 2>,
}

impl<const N: usize> ChargeManager<N> {
    /// Create a manager with nothing reported yet
    pub fn new(config: Config) -> Self {
        Self {
            config,
            available: [[None; N]; SUPPLIER_COUNT],
            registration_time: [None; N],
            ceil: [None; N],
            dualrole: [DualRoleCapability::Unknown; N],
            save_log: [false; N],
            active: Active::default(),
            override_port: Override::Off,
            delayed_override: None,
            seeded: false,
            deferred: Deferred::new(),
        }
    }

    fn check_port(port: PortId) -> Result<usize, Error> {
        if port.index() < N {
            Ok(port.index())
        } else {
            Err(Error::InvalidPort)
        }
    }

    fn defer(&mut self, callback: Callback, now: Instant, delay: Duration) {
        if let Err(e) = self.deferred.call(callback, now, delay) {
            error!("Failed to schedule {:?}: {:?}", callback, e);
        }
    }

    fn schedule_refresh(&mut self, now: Instant) {
        self.defer(Callback::Refresh, now, Duration::from_ticks(0));
    }

    /// Returns true once every supplier has reported on every port
    pub fn is_seeded(&mut self) -> bool {
        if !self.seeded {
            self.seeded = self.available.iter().flatten().all(Option::is_some);
            if self.seeded {
                info!("Charge manager seeded");
            }
        }
        self.seeded
    }

    /// Report the charge `supplier` can provide on `port`
    pub fn update_charge<H: Platform>(
        &mut self,
        hal: &mut H,
        supplier: ChargeSupplier,
        port: PortId,
        info: ChargePortInfo,
        now: Instant,
    ) -> Result<(), Error> {
        let index = Self::check_port(port)?;
        let cell = self.available[supplier.index()][index];
        if cell == Some(info) {
            return Ok(());
        }

        debug!(
            "Port {} supplier {:?}: {}mA {}mV",
            port.0, supplier, info.current_ma, info.voltage_mv
        );
        let charge_appeared = info.current_ma > 0 && cell.is_some_and(|previous| previous.current_ma == 0);
        self.save_log[index] = true;
        if charge_appeared {
            self.clear_override_for_dedicated(hal, port);
        }

        self.available[supplier.index()][index] = Some(info);
        self.registration_time[index] = Some(now);

        if let Some(delayed) = self.delayed_override {
            if delayed.port == port
                && info.current_ma > 0
                && hal.role(port) == PowerRole::Sink
                && now < delayed.deadline
            {
                info!("Power swap complete on port {}", port.0);
                self.set_override(hal, Override::Port(port), now)?;
            }
        }

        if self.is_seeded() {
            self.schedule_refresh(now);
        }
        Ok(())
    }

    /// Report the dual-role capability of the partner on `port`
    pub fn update_dualrole<H: Platform>(
        &mut self,
        hal: &mut H,
        port: PortId,
        capability: DualRoleCapability,
        now: Instant,
    ) -> Result<(), Error> {
        let index = Self::check_port(port)?;
        if self.dualrole[index] == capability {
            return Ok(());
        }

        debug!("Port {} dual-role: {:?}", port.0, capability);
        self.dualrole[index] = capability;

        // Only a partner turning out to be a dedicated charger while it offers charge matters
        let has_charge = self
            .available
            .iter()
            .any(|supplier| supplier[index].is_some_and(|info| info.current_ma > 0));
        if capability != DualRoleCapability::Dedicated || !has_charge {
            return Ok(());
        }

        self.clear_override_for_dedicated(hal, port);
        if self.is_seeded() {
            self.schedule_refresh(now);
        }
        Ok(())
    }

    /// Limit the charge current drawn from `port`, `None` removes the limit
    pub fn set_ceil(&mut self, port: PortId, ceil: Option<u32>, now: Instant) -> Result<(), Error> {
        let index = Self::check_port(port)?;
        if self.ceil[index] == ceil {
            return Ok(());
        }

        self.ceil[index] = ceil;
        if self.active.port == Some(port) && self.is_seeded() {
            self.schedule_refresh(now);
        }
        Ok(())
    }

    /// Select an override.
    ///
    /// A port that is currently sourcing but has a dual-role partner is asked to swap roles and
    /// becomes the override once it reports charge as a sink. If that does not happen within
    /// [`Config::power_swap_timeout`] the request is abandoned and the override is turned off.
    pub fn set_override<H: Platform>(&mut self, hal: &mut H, target: Override, now: Instant) -> Result<(), Error> {
        if let Override::Port(port) = target {
            Self::check_port(port)?;
        }

        // A port that is not sinking has to swap first, which needs a dual-role partner
        let swap_port = match target {
            Override::Port(port) if hal.role(port) != PowerRole::Sink => {
                if self.dualrole[port.index()] != DualRoleCapability::DualRole {
                    warn!("Port {} cannot sink, override rejected", port.0);
                    return Err(Error::InvalidParams);
                }
                Some(port)
            }
            _ => None,
        };

        info!("Charge override: {:?}", target);

        if let Some(delayed) = self.delayed_override.take() {
            if target != Override::Port(delayed.port) {
                self.cleanup_override_port(hal, Some(delayed.port));
            }
            self.deferred.cancel(Callback::OverrideTimeout);
        }

        match swap_port {
            Some(port) => {
                let timeout = self.config.power_swap_timeout;
                self.delayed_override = Some(DelayedOverride {
                    port,
                    deadline: now + timeout,
                });
                self.defer(Callback::OverrideTimeout, now, timeout);
                hal.request_power_swap(port);
            }
            None => {
                if self.override_port != target {
                    self.cleanup_override_port(hal, self.override_port.port());
                    self.override_port = target;
                    if self.is_seeded() {
                        self.schedule_refresh(now);
                    }
                }
            }
        }
        Ok(())
    }

    /// Current override
    pub fn override_port(&self) -> Override {
        self.override_port
    }

    /// Port waiting for a power swap before it becomes the override
    pub fn delayed_override_port(&self) -> Option<PortId> {
        self.delayed_override.map(|delayed| delayed.port)
    }

    /// Port the system is charging from
    pub fn active_charge_port(&self) -> Option<PortId> {
        self.active.port
    }

    /// Supplier the system is charging from
    pub fn active_supplier(&self) -> Option<ChargeSupplier> {
        self.active.supplier
    }

    /// Input current limit applied to the charger
    pub fn charge_current_ma(&self) -> u32 {
        self.active.current_ma.unwrap_or(0)
    }

    /// Last time any supplier reported on `port`
    pub fn registration_time(&self, port: PortId) -> Option<Instant> {
        self.registration_time.get(port.index()).copied().flatten()
    }

    /// When [`ChargeManager::process`] next has work to do
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deferred.next_deadline()
    }

    /// Run every deferred call that is due at `now`
    pub fn process<H: Platform>(&mut self, hal: &mut H, now: Instant) {
        while let Some(callback) = self.deferred.pop_expired(now) {
            match callback {
                Callback::Refresh => self.refresh(hal),
                Callback::OverrideTimeout => {
                    if let Some(delayed) = self.delayed_override {
                        warn!("Power swap on port {} timed out", delayed.port.0);
                        if let Err(e) = self.set_override(hal, Override::Off, now) {
                            error!("Failed to clear override: {:?}", e);
                        }
                    }
                }
            }
        }
    }

    /// Handle a host command
    pub fn host_command<H: Platform>(
        &mut self,
        hal: &mut H,
        command: HostCommand,
        now: Instant,
    ) -> Result<HostResponse, Error> {
        match command {
            HostCommand::PowerInfo(port) => {
                let port = match PowerInfoPort::from_raw(port) {
                    PowerInfoPort::Port(port) => {
                        Self::check_port(port)?;
                        Some(port)
                    }
                    PowerInfoPort::Charging => self.active.port,
                };
                Ok(HostResponse::PowerInfo(self.power_info(hal, port)))
            }
            HostCommand::ChargePortOverride(raw) => {
                let target = Override::from_raw(raw, N)?;
                self.set_override(hal, target, now)?;
                Ok(HostResponse::Complete)
            }
        }
    }

    /// Swap a dual-role override port that is sinking back to sourcing
    fn cleanup_override_port<H: Platform>(&self, hal: &mut H, port: Option<PortId>) {
        let Some(port) = port else {
            return;
        };

        if self.dualrole[port.index()] == DualRoleCapability::DualRole && hal.role(port) == PowerRole::Sink {
            info!("Releasing override port {}", port.0);
            hal.request_power_swap(port);
        }
    }

    /// A dedicated charger was plugged into `port`, drop any override pointing elsewhere
    fn clear_override_for_dedicated<H: Platform>(&mut self, hal: &mut H, port: PortId) {
        if self.override_port.port() == Some(port) || self.dualrole[port.index()] != DualRoleCapability::Dedicated {
            return;
        }

        if self.override_port != Override::Off {
            info!("Dedicated charger on port {}, clearing override", port.0);
        }
        self.cleanup_override_port(hal, self.override_port.port());
        self.override_port = Override::Off;

        if let Some(delayed) = self.delayed_override.take() {
            self.cleanup_override_port(hal, Some(delayed.port));
            self.deferred.cancel(Callback::OverrideTimeout);
        }
    }
}
