//! Inter-frame silence derived from the line speed.

use core::time::Duration;

/// Threshold used above [`FIXED_SILENCE_ABOVE_BAUD`] and before any baud rate is known.
pub const MIN_SILENCE: Duration = Duration::from_millis(2);

/// Above this rate 3.5 character times drop below the millisecond clock
/// resolution, so the threshold is pinned to [`MIN_SILENCE`].
pub const FIXED_SILENCE_ABOVE_BAUD: u32 = 19_200;

/// Returns the silence that marks the end of a frame at `baud`, or `None`
/// for a zero baud rate.
///
/// Rates up to 19200 use `35000 / baud + 1` milliseconds, roughly 3.5
/// eleven-bit characters rounded up.
pub const fn silence_threshold(baud: u32) -> Option<Duration> {
    if baud == 0 {
        return None;
    }
    if baud > FIXED_SILENCE_ABOVE_BAUD {
        return Some(MIN_SILENCE);
    }
    Some(Duration::from_millis((35_000 / baud + 1) as u64))
}
