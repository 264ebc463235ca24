//! DisplayPort hot-plug-detect service
//!
//! Turns the raw HPD line of a DisplayPort alt-mode dongle into debounced `High`, `Low` and
//! `Irq` events for the PD stack.
#![no_std]
#![warn(missing_docs)]

pub mod config;
pub mod debounce;
pub mod queue;
pub mod service;

pub use config::{Config, Variant};
pub use debounce::{Debouncer, Stats};
pub use service::{Edge, EdgeChannel, Service};

/// HPD service error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The HPD line could not be read
    Pin,
}
