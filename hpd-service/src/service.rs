//! Interrupt handoff and the HPD task loop
use core::cell::Cell;

use critical_section::Mutex;
use dock_services::hal::HpdSink;
use dock_services::power::PortId;
use dock_services::{error, info};
use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{Instant, Timer};
use embedded_hal::digital::InputPin;

use crate::config::Config;
use crate::debounce::{Debouncer, Stats};
use crate::Error;

/// Number of raw edges buffered between the interrupt and the task
pub const EDGE_CHANNEL_SIZE: usize = 8;

/// A raw edge captured in interrupt context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Edge {
    /// Line level after the edge
    pub level: bool,
    /// When the interrupt fired
    pub timestamp: Instant,
}

/// Handoff from the GPIO interrupt to the HPD task
pub struct EdgeChannel {
    edges: Channel<CriticalSectionRawMutex, Edge, EDGE_CHANNEL_SIZE>,
    /// Edges lost because the task fell behind
    dropped: Mutex<Cell<u32>>,
}

impl EdgeChannel {
    /// Create an empty channel
    pub const fn new() -> Self {
        Self {
            edges: Channel::new(),
            dropped: Mutex::new(Cell::new(0)),
        }
    }

    /// Record an edge, callable from interrupt context
    pub fn on_edge(&self, level: bool, timestamp: Instant) {
        if self.edges.try_send(Edge { level, timestamp }).is_err() {
            critical_section::with(|cs| {
                let dropped = self.dropped.borrow(cs);
                dropped.set(dropped.get().wrapping_add(1));
            });
        }
    }

    /// Number of edges dropped so far
    pub fn dropped(&self) -> u32 {
        critical_section::with(|cs| self.dropped.borrow(cs).get())
    }

    /// Take the oldest pending edge without waiting
    pub fn try_take(&self) -> Option<Edge> {
        self.edges.try_receive().ok()
    }

    async fn take(&self) -> Edge {
        self.edges.receive().await
    }
}

impl Default for EdgeChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// HPD service for one line
pub struct Service<'a, I, S> {
    edges: &'a EdgeChannel,
    debouncer: Debouncer,
    pin: I,
    sink: S,
    /// Dropped edge count already logged
    dropped_logged: u32,
}

impl<'a, I: InputPin, S: HpdSink> Service<'a, I, S> {
    /// Create the service, sampling the current line level as the starting point.
    ///
    /// The board enables the GPIO interrupt once this returns; its handler calls
    /// [`EdgeChannel::on_edge`].
    pub fn new(
        edges: &'a EdgeChannel,
        port: PortId,
        config: Config,
        mut pin: I,
        sink: S,
        now: Instant,
    ) -> Result<Self, Error> {
        let level = pin.is_high().map_err(|_| Error::Pin)?;
        Ok(Self {
            edges,
            debouncer: Debouncer::new(port, config, level, now),
            pin,
            sink,
            dropped_logged: 0,
        })
    }

    /// Enable or disable edge evaluation depending on the DisplayPort configuration
    pub fn set_dp_connected(&mut self, connected: bool) {
        self.debouncer.set_dp_connected(connected);
    }

    /// Diagnostic snapshot
    pub fn stats(&self) -> Stats {
        self.debouncer.stats()
    }

    /// Wait for an edge or the next deferred deadline, then handle everything that is due
    pub async fn process(&mut self) {
        let deadline = self.debouncer.next_deadline();
        let wake = async {
            match deadline {
                Some(deadline) => Timer::at(deadline).await,
                None => core::future::pending().await,
            }
        };

        if let Either::First(edge) = select(self.edges.take(), wake).await {
            self.debouncer.on_edge(edge.level, edge.timestamp);
            // Edges that piled up meanwhile are evaluated before any deferred work
            while let Some(edge) = self.edges.try_take() {
                self.debouncer.on_edge(edge.level, edge.timestamp);
            }
        }

        self.debouncer.process(Instant::now(), &mut self.pin, &mut self.sink);

        let dropped = self.edges.dropped();
        if dropped != self.dropped_logged {
            error!("HPD{}: {} edges dropped", self.debouncer.port().0, dropped);
            self.dropped_logged = dropped;
        }
    }

    /// Run the service forever
    pub async fn run(&mut self) -> ! {
        info!("Starting HPD service for port {}", self.debouncer.port().0);
        loop {
            self.process().await;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_edge_handoff() {
        let edges = EdgeChannel::new();
        edges.on_edge(true, Instant::from_millis(1));
        edges.on_edge(false, Instant::from_millis(2));

        assert_eq!(
            edges.try_take(),
            Some(Edge {
                level: true,
                timestamp: Instant::from_millis(1)
            })
        );
        assert_eq!(edges.try_take().map(|edge| edge.level), Some(false));
        assert_eq!(edges.try_take(), None);
        assert_eq!(edges.dropped(), 0);
    }

    #[test]
    fn test_edge_overflow_counted() {
        let edges = EdgeChannel::new();
        for i in 0..EDGE_CHANNEL_SIZE as u64 + 3 {
            edges.on_edge(i % 2 == 0, Instant::from_millis(i));
        }

        assert_eq!(edges.dropped(), 3);
        // The oldest edges are kept, newer ones are lost
        assert_eq!(edges.try_take().map(|edge| edge.timestamp), Some(Instant::from_millis(0)));
    }
}
