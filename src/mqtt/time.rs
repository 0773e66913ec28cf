//! Millisecond time source.

/// A monotonic millisecond counter.
///
/// The counter is 32 bits wide and is expected to wrap, roughly every 49.7
/// days. The engine only ever subtracts two readings, so wrapping is harmless.
///
/// Any `FnMut() -> u32` is a clock, which covers plain functions reading a
/// hardware tick counter as well as closures over `std::time::Instant`.
pub trait Clock {
    /// Current time in milliseconds.
    fn now_ms(&mut self) -> u32;
}

impl<F> Clock for F
where
    F: FnMut() -> u32,
{
    fn now_ms(&mut self) -> u32 {
        self()
    }
}

/// Milliseconds from `start` to `later`, correct across one counter wrap.
#[inline]
pub const fn elapsed(later: u32, start: u32) -> u32 {
    later.wrapping_sub(start)
}
