//! Dock Services Interface Exports

#![no_std]
#![warn(missing_docs)]

pub mod deferred;
pub mod fmt;
pub mod hal;
pub mod hpd;
pub mod power;

/// Error type shared by the dock services
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Port index out of range
    InvalidPort,
    /// Parameters out of range or not applicable in the current state
    InvalidParams,
    /// The board refused the request
    Rejected,
    /// A fixed-size table is full
    Full,
}

impl<T> From<Error> for Result<T, Error> {
    fn from(error: Error) -> Self {
        Err(error)
    }
}
