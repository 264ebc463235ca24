//! Deferred calls for cooperative, single-threaded services
//!
//! A [`Deferred`] table holds at most one pending invocation per callback identity.
//! Arming a callback that is already pending replaces its deadline, which is what
//! debounce retriggering relies on. Interrupt handlers never touch the table; they hand
//! their input to the owning task, which then arms or cancels entries here and runs
//! whatever has expired.
use embassy_time::{Duration, Instant};

use crate::{trace, Error};

/// A pending invocation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Entry<K> {
    /// Callback identity
    key: K,
    /// When the callback becomes due
    deadline: Instant,
    /// Arming order, breaks ties between equal deadlines
    sequence: u32,
}

/// Fixed-size table of deferred calls keyed by callback identity
pub struct Deferred<K, const N: usize> {
    entries: [Option<Entry<K>>; N],
    next_sequence: u32,
}

impl<K: Copy + PartialEq, const N: usize> Deferred<K, N> {
    /// Create an empty table
    pub const fn new() -> Self {
        Self {
            entries: [const { None }; N],
            next_sequence: 0,
        }
    }

    fn slot_of(&self, key: K) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| matches!(entry, Some(entry) if entry.key == key))
    }

    /// Arm `key` to run `delay` after `now`, replacing any pending invocation of it.
    ///
    /// A zero delay means "at the next opportunity".
    pub fn call(&mut self, key: K, now: Instant, delay: Duration) -> Result<(), Error> {
        let slot = match self.slot_of(key) {
            Some(slot) => slot,
            None => self.entries.iter().position(Option::is_none).ok_or(Error::Full)?,
        };

        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.wrapping_add(1);
        self.entries[slot] = Some(Entry {
            key,
            deadline: now + delay,
            sequence,
        });
        trace!("Deferred slot {} armed for {}us", slot, delay.as_micros());
        Ok(())
    }

    /// Cancel any pending invocation of `key`
    pub fn cancel(&mut self, key: K) {
        if let Some(slot) = self.slot_of(key) {
            self.entries[slot] = None;
        }
    }

    /// Returns true if `key` has a pending invocation
    pub fn is_pending(&self, key: K) -> bool {
        self.slot_of(key).is_some()
    }

    /// Deadline of the pending invocation of `key`, if any
    pub fn deadline(&self, key: K) -> Option<Instant> {
        self.slot_of(key)
            .and_then(|slot| self.entries[slot].as_ref())
            .map(|entry| entry.deadline)
    }

    fn earliest(&self) -> Option<(usize, Entry<K>)> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(slot, entry)| entry.map(|entry| (slot, entry)))
            .min_by(|(_, a), (_, b)| {
                a.deadline
                    .cmp(&b.deadline)
                    .then_with(|| (a.sequence.wrapping_sub(b.sequence) as i32).cmp(&0))
            })
    }

    /// Earliest pending deadline, if anything is armed
    pub fn next_deadline(&self) -> Option<Instant> {
        self.earliest().map(|(_, entry)| entry.deadline)
    }

    /// Remove and return the earliest invocation that is due at `now`
    pub fn pop_expired(&mut self, now: Instant) -> Option<K> {
        let (slot, entry) = self.earliest()?;
        if entry.deadline > now {
            return None;
        }

        self.entries[slot] = None;
        Some(entry.key)
    }
}

impl<K: Copy + PartialEq, const N: usize> Default for Deferred<K, N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    enum Call {
        A,
        B,
        C,
    }

    fn at(ms: u64) -> Instant {
        Instant::from_millis(ms)
    }

    #[test]
    fn test_rearm_replaces_deadline() {
        let mut deferred: Deferred<Call, 2> = Deferred::new();
        deferred.call(Call::A, at(0), Duration::from_millis(100)).unwrap();
        deferred.call(Call::A, at(50), Duration::from_millis(100)).unwrap();

        assert_eq!(deferred.deadline(Call::A), Some(at(150)));
        assert_eq!(deferred.pop_expired(at(100)), None);
        assert_eq!(deferred.pop_expired(at(150)), Some(Call::A));
        assert!(!deferred.is_pending(Call::A));
    }

    #[test]
    fn test_cancel() {
        let mut deferred: Deferred<Call, 2> = Deferred::new();
        deferred.call(Call::A, at(0), Duration::from_millis(10)).unwrap();
        deferred.cancel(Call::A);
        deferred.cancel(Call::B);

        assert_eq!(deferred.next_deadline(), None);
        assert_eq!(deferred.pop_expired(at(1000)), None);
    }

    #[test]
    fn test_expiry_order() {
        let mut deferred: Deferred<Call, 3> = Deferred::new();
        deferred.call(Call::A, at(0), Duration::from_millis(30)).unwrap();
        deferred.call(Call::B, at(0), Duration::from_millis(10)).unwrap();
        // Same deadline as B, armed later
        deferred.call(Call::C, at(5), Duration::from_millis(5)).unwrap();

        assert_eq!(deferred.next_deadline(), Some(at(10)));
        assert_eq!(deferred.pop_expired(at(40)), Some(Call::B));
        assert_eq!(deferred.pop_expired(at(40)), Some(Call::C));
        assert_eq!(deferred.pop_expired(at(40)), Some(Call::A));
        assert_eq!(deferred.pop_expired(at(40)), None);
    }

    #[test]
    fn test_full_table() {
        let mut deferred: Deferred<Call, 1> = Deferred::new();
        deferred.call(Call::A, at(0), Duration::from_millis(1)).unwrap();
        assert_eq!(deferred.call(Call::B, at(0), Duration::from_millis(1)), Err(Error::Full));
        // Re-arming an existing key never needs a new slot
        assert!(deferred.call(Call::A, at(0), Duration::from_millis(2)).is_ok());
    }
}
