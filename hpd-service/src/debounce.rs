//! HPD debounce engine
//!
//! Raw HPD edges are classified by the time since the previous edge:
//!
//! | edge    | time since previous edge   | meaning                                  |
//! |---------|----------------------------|------------------------------------------|
//! | rising  | `<= glitch_threshold`      | glitch, ignored                          |
//! | rising  | `<= irq_threshold`         | end of an IRQ pulse                      |
//! | rising  | `> irq_threshold`          | end of a real low level                  |
//! | falling | `<= irq_threshold`         | possibly the start of an IRQ pulse       |
//! | falling | `> irq_threshold`          | end of a real high level                 |
//!
//! Every edge re-arms a level check that reports the settled line level once it has been stable
//! for `level_debounce`. Pulses are queued and delivered in order, `queue_gap` apart, following
//! the HPD-to-PD converter queuing rules:
//! 1. An IRQ following a queued IRQ or High is transmitted after it.
//! 2. A Low discards any pending updates.
//! 3. An IRQ is never sent while a Low is pending, a High is injected first.
use dock_services::deferred::Deferred;
use dock_services::hal::HpdSink;
use dock_services::hpd::HpdEvent;
use dock_services::power::PortId;
use dock_services::{debug, error, info, trace, warn};
use embassy_time::{Duration, Instant};
use embedded_hal::digital::InputPin;

use crate::config::{Config, Variant};
use crate::queue::MessageQueue;

/// Deferred work of one HPD line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum Callback {
    /// Report the settled line level
    LevelConfirm,
    /// Deliver the oldest queued event
    QueueDrain,
    /// Report an IRQ pulse directly
    Irq,
}

/// Number of distinct callbacks
const CALLBACK_COUNT: usize = 3;

/// Diagnostic snapshot of a debouncer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Stats {
    /// Glitches seen since the line was last debounced into an event
    pub pending_glitches: u32,
    /// Glitches seen since bring-up
    pub total_glitches: u32,
    /// Events waiting for delivery
    pub queue_depth: usize,
    /// Events dropped on queue overflow
    pub queue_evicted: u32,
    /// Last event delivered upstream
    pub reported: HpdEvent,
}

/// Debounce state of one HPD line
pub struct Debouncer {
    port: PortId,
    config: Config,
    /// Level seen on the last edge
    prev_level: bool,
    /// Time of the last edge
    prev_timestamp: Instant,
    /// Last event delivered upstream
    reported: HpdEvent,
    glitch_count: u32,
    total_glitches: u32,
    /// Edges are only evaluated while the partner is configured as DFP_D
    dp_connected: bool,
    queue: MessageQueue,
    deferred: Deferred<Callback, CALLBACK_COUNT>,
}

impl Debouncer {
    /// Create a debouncer for a line currently at `level`
    pub fn new(port: PortId, config: Config, level: bool, now: Instant) -> Self {
        info!("HPD{}: initial level {}", port.0, level);
        Self {
            port,
            config,
            prev_level: level,
            prev_timestamp: now,
            reported: HpdEvent::None,
            glitch_count: 0,
            total_glitches: 0,
            dp_connected: true,
            queue: MessageQueue::new(),
            deferred: Deferred::new(),
        }
    }

    /// Port this line belongs to
    pub fn port(&self) -> PortId {
        self.port
    }

    /// Last event delivered upstream
    pub fn reported(&self) -> HpdEvent {
        self.reported
    }

    /// Enable or disable edge evaluation depending on the DisplayPort configuration
    pub fn set_dp_connected(&mut self, connected: bool) {
        if self.dp_connected != connected {
            debug!("HPD{}: DFP_D connected {}", self.port.0, connected);
        }
        self.dp_connected = connected;
    }

    /// Diagnostic snapshot
    pub fn stats(&self) -> Stats {
        Stats {
            pending_glitches: self.glitch_count,
            total_glitches: self.total_glitches,
            queue_depth: self.queue.depth(),
            queue_evicted: self.queue.evicted(),
            reported: self.reported,
        }
    }

    /// Earliest time at which [`Self::process`] has work to do
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deferred.next_deadline()
    }

    fn defer(&mut self, callback: Callback, now: Instant, delay: Duration) {
        if self.deferred.call(callback, now, delay).is_err() {
            // Every callback has its own slot
            error!("HPD{}: no deferred slot for {:?}", self.port.0, callback);
        }
    }

    fn glitch(&mut self) {
        self.glitch_count = self.glitch_count.wrapping_add(1);
        self.total_glitches = self.total_glitches.wrapping_add(1);
    }

    /// Queue an event, starting the drain if it is idle
    fn launch(&mut self, event: HpdEvent, now: Instant) {
        self.queue.push_evicting(event);
        if !self.deferred.is_pending(Callback::QueueDrain) {
            self.defer(Callback::QueueDrain, now, Duration::from_ticks(0));
        }
    }

    /// Evaluate a raw edge, `level` is the line level after the edge
    pub fn on_edge(&mut self, level: bool, now: Instant) {
        let delta = now.saturating_duration_since(self.prev_timestamp);
        self.prev_timestamp = now;

        // Any edge invalidates a pending level report
        self.deferred.cancel(Callback::LevelConfirm);

        match self.config.variant {
            Variant::Queued => self.queued_edge(level, delta, now),
            Variant::Simple => self.simple_edge(level, delta, now),
        }
    }

    fn queued_edge(&mut self, level: bool, delta: Duration, now: Instant) {
        if level == self.prev_level {
            warn!("HPD{}: duplicate edge, level {}", self.port.0, level);
            self.glitch();
            self.defer(Callback::LevelConfirm, now, self.config.level_debounce);
            return;
        }
        self.prev_level = level;

        if !self.dp_connected {
            return;
        }

        if level {
            if delta <= self.config.glitch_threshold {
                trace!("HPD{}: glitch after {}us", self.port.0, delta.as_micros());
                self.glitch();
                self.defer(Callback::LevelConfirm, now, self.config.level_debounce);
                return;
            }

            if delta <= self.config.irq_threshold {
                let last = self.queue.newest().unwrap_or(self.reported);
                if last == HpdEvent::Low {
                    warn!(
                        "HPD{}: IRQ while low pending after {} glitches, injecting high",
                        self.port.0,
                        self.glitch_count
                    );
                    self.queue.reset();
                    self.queue.push_evicting(HpdEvent::High);
                } else if self.queue.depth() > 1 {
                    self.queue.reset();
                    self.queue.push_evicting(last);
                }

                self.launch(HpdEvent::Irq, now);
                self.glitch_count = 0;
                return;
            }

            // A completed low, even if shorter than the level debounce
            self.queue.reset();
            self.launch(HpdEvent::Low, now);
            self.defer(Callback::LevelConfirm, now, self.config.level_debounce);
            self.glitch_count = 0;
        } else {
            if delta <= self.config.irq_threshold {
                self.glitch();
            } else {
                // A completed high, even if shorter than the level debounce
                self.launch(HpdEvent::High, now);
                self.glitch_count = 0;
            }
            self.defer(Callback::LevelConfirm, now, self.config.level_debounce);
        }
    }

    fn simple_edge(&mut self, level: bool, delta: Duration, now: Instant) {
        // Bounces never become the recorded level
        if delta <= self.config.glitch_threshold {
            trace!("HPD{}: glitch after {}us", self.port.0, delta.as_micros());
            self.glitch();
            self.defer(Callback::LevelConfirm, now, self.config.level_debounce);
            return;
        }

        let rising = !self.prev_level && level;
        self.prev_level = level;

        if !self.dp_connected {
            return;
        }

        if rising && delta <= self.config.irq_threshold {
            self.defer(Callback::Irq, now, Duration::from_ticks(0));
        } else if delta > self.config.irq_threshold {
            self.defer(Callback::LevelConfirm, now, self.config.level_debounce);
        } else {
            self.glitch();
        }
    }

    fn deliver<S: HpdSink>(&mut self, sink: &mut S, event: HpdEvent) {
        debug!("HPD{}: sending {:?}", self.port.0, event);
        self.reported = event;
        sink.send_hpd(self.port, event);
    }

    fn level_confirm<I: InputPin, S: HpdSink>(&mut self, pin: &mut I, sink: &mut S) {
        let level = match pin.is_high() {
            Ok(level) => level,
            Err(_) => {
                error!("HPD{}: failed to read line level", self.port.0);
                return;
            }
        };

        // Simple variant: the line moved again after the edge that armed this check
        if self.config.variant == Variant::Simple && level != self.prev_level {
            return;
        }

        let event = HpdEvent::from_level(level);
        if event != self.reported {
            self.deliver(sink, event);
        }
    }

    fn queue_drain<S: HpdSink>(&mut self, now: Instant, sink: &mut S) {
        if self.queue.is_empty() {
            debug!("HPD{}: queue empty", self.port.0);
            return;
        }

        while let Some(event) = self.queue.pop() {
            // Levels are only sent when they change what upstream already knows
            if event != HpdEvent::Irq && event == self.reported {
                trace!("HPD{}: dropping repeated {:?}", self.port.0, event);
                continue;
            }

            self.deliver(sink, event);
            break;
        }

        if !self.queue.is_empty() {
            self.defer(Callback::QueueDrain, now, self.config.queue_gap);
        }
    }

    /// Run all deferred work due at `now`
    pub fn process<I: InputPin, S: HpdSink>(&mut self, now: Instant, pin: &mut I, sink: &mut S) {
        while let Some(callback) = self.deferred.pop_expired(now) {
            match callback {
                Callback::LevelConfirm => self.level_confirm(pin, sink),
                Callback::QueueDrain => self.queue_drain(now, sink),
                Callback::Irq => self.deliver(sink, HpdEvent::Irq),
            }
        }
    }
}
