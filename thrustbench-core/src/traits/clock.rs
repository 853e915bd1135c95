//! Monotonic time source

/// Monotonic millisecond clock
///
/// Values never go backwards; the epoch is boot.
pub trait Clock {
    /// Milliseconds since boot
    fn now_ms(&self) -> u64;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}
