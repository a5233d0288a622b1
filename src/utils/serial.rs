use std::sync::atomic::{AtomicU32, Ordering};

/// The serial counter shared by every part of the compositor core.
///
/// Pings, grabs, enter/leave and keyboard events all draw from it, so two serials handed
/// to clients are never equal unless they refer to the same event.
pub static SERIAL_COUNTER: SerialCounter = SerialCounter::new();

/// A serial type, whose comparison takes into account the wrapping-around behavior of the
/// underlying counter.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Serial(u32);

impl PartialOrd for Serial {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        let distance = self.0.abs_diff(other.0);
        if distance < u32::MAX / 2 {
            self.0.partial_cmp(&other.0)
        } else {
            // wrap-around occurred, invert comparison
            other.0.partial_cmp(&self.0)
        }
    }
}

impl From<u32> for Serial {
    fn from(n: u32) -> Self {
        Serial(n)
    }
}

impl From<Serial> for u32 {
    fn from(serial: Serial) -> u32 {
        serial.0
    }
}

impl Serial {
    /// Checks if a serial was generated after or is equal to another given serial
    pub fn is_no_older_than(&self, other: &Serial) -> bool {
        other <= self
    }
}

/// Hands out [`Serial`]s, skipping 0 and wrapping on overflow.
#[derive(Debug)]
pub struct SerialCounter {
    serial: AtomicU32,
}

impl SerialCounter {
    /// A counter whose first serial is 1
    pub const fn new() -> SerialCounter {
        SerialCounter {
            serial: AtomicU32::new(1),
        }
    }

    /// Retrieve the next serial from the counter
    pub fn next_serial(&self) -> Serial {
        let _ = self
            .serial
            .compare_exchange(0, 1, Ordering::AcqRel, Ordering::SeqCst);
        Serial(self.serial.fetch_add(1, Ordering::AcqRel))
    }
}

impl Default for SerialCounter {
    fn default() -> Self {
        SerialCounter::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter_at(initial_value: u32) -> SerialCounter {
        SerialCounter {
            serial: AtomicU32::new(initial_value),
        }
    }

    #[test]
    fn serials_increase() {
        let counter = SerialCounter::new();
        let first = counter.next_serial();
        let second = counter.next_serial();

        assert_eq!(u32::from(first), 1);
        assert!(first < second);
        assert!(second.is_no_older_than(&first));
        assert!(!first.is_no_older_than(&second));
    }

    #[test]
    fn zero_is_skipped_after_wrap() {
        let counter = counter_at(u32::MAX);
        let last = counter.next_serial();
        let wrapped = counter.next_serial();

        assert_eq!(last, Serial::from(u32::MAX));
        assert_eq!(wrapped, Serial::from(1));
        assert!(last < wrapped);
    }
}
