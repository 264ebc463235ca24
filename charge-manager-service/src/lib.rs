//! Charge manager service
//!
//! Arbitrates between every charge supplier on every USB-C port of a dock and keeps the
//! board's charge path, the charger input limit and the PD power requests in line with the
//! result. Charging tasks and the host talk to the service through a [`Context`].
#![no_std]
#![warn(missing_docs)]
use dock_services::power::{ChargePortInfo, ChargeSupplier, DualRoleCapability, PortId};
use dock_services::{info, trace, Error};
use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::mutex::Mutex;
use embassy_time::{Instant, Timer};

pub mod config;
pub mod event_log;
pub mod host;
pub mod manager;

pub use config::Config;
pub use host::{HostCommand, HostResponse, PowerInfo};
pub use manager::{ChargeManager, Override, Platform};

/// Number of slots for requests
const REQUEST_CHANNEL_SIZE: usize = 1;

/// Request to the charge manager service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Request {
    /// A supplier reports the charge available on a port
    UpdateCharge {
        /// Reporting supplier
        supplier: ChargeSupplier,
        /// Port the charge is available on
        port: PortId,
        /// Available charge, [`ChargePortInfo::NONE`] when the supplier has nothing to offer
        info: ChargePortInfo,
    },
    /// The dual-role capability of a port partner is known or changed
    UpdateDualRole {
        /// Port of the partner
        port: PortId,
        /// New capability
        capability: DualRoleCapability,
    },
    /// Limit the current drawn from a port
    SetCeil {
        /// Limited port
        port: PortId,
        /// Limit in mA, `None` removes it
        ceil: Option<u32>,
    },
    /// Select an override
    SetOverride(Override),
    /// Read the override
    GetOverride,
    /// Read the active charge port
    GetActiveChargePort,
    /// Host command
    Host(HostCommand),
}

/// Data for a charge manager response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ResponseData {
    /// The request was completed successfully
    Complete,
    /// Current override
    Override(Override),
    /// Current charge port
    ActiveChargePort(Option<PortId>),
    /// Host command result
    Host(HostResponse),
}

impl ResponseData {
    /// Returns an InvalidParams error if the response is not complete
    pub fn complete_or_err(self) -> Result<(), Error> {
        match self {
            ResponseData::Complete => Ok(()),
            _ => Err(Error::InvalidParams),
        }
    }
}

/// Wrapper type to make code cleaner
pub type Response = Result<ResponseData, Error>;

/// Channels between the charge manager service and its clients
pub struct Context {
    /// Serializes clients so each one gets its own response
    lock: Mutex<NoopRawMutex, ()>,
    request: Channel<NoopRawMutex, Request, REQUEST_CHANNEL_SIZE>,
    response: Channel<NoopRawMutex, Response, REQUEST_CHANNEL_SIZE>,
}

impl Context {
    /// Create a new context
    pub const fn new() -> Self {
        Self {
            lock: Mutex::new(()),
            request: Channel::new(),
            response: Channel::new(),
        }
    }

    /// Send a request and wait for the service to answer it
    pub async fn execute(&self, request: Request) -> Response {
        let _guard = self.lock.lock().await;
        self.request.send(request).await;
        self.response.receive().await
    }

    /// Wait for a request
    pub async fn wait_request(&self) -> Request {
        self.request.receive().await
    }

    /// Answer the request currently being processed
    pub async fn send_response(&self, response: Response) {
        self.response.send(response).await
    }

    /// Report the charge `supplier` can provide on `port`
    pub async fn update_charge(&self, supplier: ChargeSupplier, port: PortId, info: ChargePortInfo) -> Result<(), Error> {
        self.execute(Request::UpdateCharge { supplier, port, info })
            .await?
            .complete_or_err()
    }

    /// Report the dual-role capability of the partner on `port`
    pub async fn update_dualrole(&self, port: PortId, capability: DualRoleCapability) -> Result<(), Error> {
        self.execute(Request::UpdateDualRole { port, capability })
            .await?
            .complete_or_err()
    }

    /// Limit the current drawn from `port`
    pub async fn set_ceil(&self, port: PortId, ceil: Option<u32>) -> Result<(), Error> {
        self.execute(Request::SetCeil { port, ceil }).await?.complete_or_err()
    }

    /// Select an override
    pub async fn set_override(&self, target: Override) -> Result<(), Error> {
        self.execute(Request::SetOverride(target)).await?.complete_or_err()
    }

    /// Current override
    pub async fn get_override(&self) -> Result<Override, Error> {
        match self.execute(Request::GetOverride).await? {
            ResponseData::Override(current) => Ok(current),
            _ => Err(Error::InvalidParams),
        }
    }

    /// Port the system is charging from
    pub async fn active_charge_port(&self) -> Result<Option<PortId>, Error> {
        match self.execute(Request::GetActiveChargePort).await? {
            ResponseData::ActiveChargePort(port) => Ok(port),
            _ => Err(Error::InvalidParams),
        }
    }

    /// Run a host command
    pub async fn host_command(&self, command: HostCommand) -> Result<HostResponse, Error> {
        match self.execute(Request::Host(command)).await? {
            ResponseData::Host(response) => Ok(response),
            _ => Err(Error::InvalidParams),
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

/// Charge manager service for `N` ports
pub struct Service<'a, const N: usize, H: Platform> {
    context: &'a Context,
    manager: ChargeManager<N>,
    hal: H,
}

impl<'a, const N: usize, H: Platform> Service<'a, N, H> {
    /// Create a new service
    pub fn new(context: &'a Context, config: Config, hal: H) -> Self {
        Self {
            context,
            manager: ChargeManager::new(config),
            hal,
        }
    }

    /// Arbitration state
    pub fn manager(&self) -> &ChargeManager<N> {
        &self.manager
    }

    /// Board access
    pub fn hal(&mut self) -> &mut H {
        &mut self.hal
    }

    /// Handle one request, then run every deferred call that is due so the request's effects
    /// are applied before the response goes out
    pub fn process_request(&mut self, request: Request, now: Instant) -> Response {
        let response = match request {
            Request::UpdateCharge { supplier, port, info } => {
                trace!("Received charge update for port {}", port.0);
                self.manager
                    .update_charge(&mut self.hal, supplier, port, info, now)
                    .map(|_| ResponseData::Complete)
            }
            Request::UpdateDualRole { port, capability } => {
                info!("Received dual-role update for port {}: {:?}", port.0, capability);
                self.manager
                    .update_dualrole(&mut self.hal, port, capability, now)
                    .map(|_| ResponseData::Complete)
            }
            Request::SetCeil { port, ceil } => {
                info!("Received ceiling for port {}: {:?}", port.0, ceil);
                self.manager.set_ceil(port, ceil, now).map(|_| ResponseData::Complete)
            }
            Request::SetOverride(target) => self
                .manager
                .set_override(&mut self.hal, target, now)
                .map(|_| ResponseData::Complete),
            Request::GetOverride => Ok(ResponseData::Override(self.manager.override_port())),
            Request::GetActiveChargePort => Ok(ResponseData::ActiveChargePort(self.manager.active_charge_port())),
            Request::Host(command) => {
                info!("Received host command {:?}", command);
                self.manager
                    .host_command(&mut self.hal, command, now)
                    .map(ResponseData::Host)
            }
        };

        self.manager.process(&mut self.hal, now);
        response
    }

    /// Wait for a request or the next deferred deadline and handle it
    pub async fn process(&mut self) {
        let deadline = self.manager.next_deadline();
        let wake = async {
            match deadline {
                Some(deadline) => Timer::at(deadline).await,
                None => core::future::pending().await,
            }
        };

        match select(self.context.wait_request(), wake).await {
            Either::First(request) => {
                let response = self.process_request(request, Instant::now());
                self.context.send_response(response).await;
            }
            Either::Second(()) => self.manager.process(&mut self.hal, Instant::now()),
        }
    }

    /// Run the service forever
    pub async fn run(&mut self) -> ! {
        info!("Starting charge manager service");
        loop {
            self.process().await;
        }
    }
}

#[cfg(test)]
mod test {
    use embassy_futures::block_on;
    use embassy_futures::join::join;

    use super::*;
    use crate::manager::test::{at, MockPlatform, PORTS};

    fn seed(service: &mut Service<'_, PORTS, MockPlatform>) {
        for port in 0..PORTS as u8 {
            let request = Request::UpdateDualRole {
                port: PortId(port),
                capability: DualRoleCapability::Dedicated,
            };
            assert_eq!(service.process_request(request, at(0)), Ok(ResponseData::Complete));
            for supplier in ChargeSupplier::ALL {
                let request = Request::UpdateCharge {
                    supplier,
                    port: PortId(port),
                    info: ChargePortInfo::NONE,
                };
                assert_eq!(service.process_request(request, at(0)), Ok(ResponseData::Complete));
            }
        }
    }

    #[test]
    fn test_request_applied_before_response() {
        let context = Context::new();
        let mut service: Service<'_, PORTS, MockPlatform> = Service::new(&context, Config::default(), MockPlatform::new());
        seed(&mut service);

        let request = Request::UpdateCharge {
            supplier: ChargeSupplier::Pd,
            port: PortId(1),
            info: ChargePortInfo::new(3000, 5000),
        };
        assert_eq!(service.process_request(request, at(1)), Ok(ResponseData::Complete));

        assert_eq!(
            service.process_request(Request::GetActiveChargePort, at(1)),
            Ok(ResponseData::ActiveChargePort(Some(PortId(1))))
        );
        assert_eq!(service.hal().active, Some(PortId(1)));
        assert_eq!(service.manager().charge_current_ma(), 3000);
    }

    #[test]
    fn test_errors_returned() {
        let context = Context::new();
        let mut service: Service<'_, PORTS, MockPlatform> = Service::new(&context, Config::default(), MockPlatform::new());

        let request = Request::SetCeil {
            port: PortId(4),
            ceil: Some(500),
        };
        assert_eq!(service.process_request(request, at(0)), Err(Error::InvalidPort));
        assert_eq!(
            service.process_request(Request::Host(HostCommand::ChargePortOverride(-5)), at(0)),
            Err(Error::InvalidParams)
        );
    }

    #[test]
    fn test_override_requests() {
        let context = Context::new();
        let mut service: Service<'_, PORTS, MockPlatform> = Service::new(&context, Config::default(), MockPlatform::new());
        seed(&mut service);

        let request = Request::UpdateCharge {
            supplier: ChargeSupplier::Pd,
            port: PortId(0),
            info: ChargePortInfo::new(3000, 5000),
        };
        assert_eq!(service.process_request(request, at(1)), Ok(ResponseData::Complete));

        let target = Override::Port(PortId(0));
        assert_eq!(
            service.process_request(Request::SetOverride(target), at(2)),
            Ok(ResponseData::Complete)
        );
        assert_eq!(
            service.process_request(Request::GetOverride, at(2)),
            Ok(ResponseData::Override(target))
        );
        assert_eq!(
            service.process_request(Request::GetActiveChargePort, at(2)),
            Ok(ResponseData::ActiveChargePort(Some(PortId(0))))
        );
    }

    #[test]
    fn test_context_round_trip() {
        let context = Context::new();

        let (result, ()) = block_on(join(context.get_override(), async {
            assert_eq!(context.wait_request().await, Request::GetOverride);
            context
                .send_response(Ok(ResponseData::Override(Override::DontCharge)))
                .await;
        }));
        assert_eq!(result, Ok(Override::DontCharge));

        let (result, ()) = block_on(join(context.set_ceil(PortId(0), None), async {
            context.wait_request().await;
            context.send_response(Err(Error::InvalidPort)).await;
        }));
        assert_eq!(result, Err(Error::InvalidPort));
    }
}
