//! The browser's preference-file timestamp format: 100-ns ticks since
//! 1601-01-01 (Windows `FILETIME` epoch), computed the same way on POSIX
//! from Unix time (spec §4.G).

use std::time::{SystemTime, UNIX_EPOCH};

/// Microseconds between the Windows epoch (1601-01-01) and the Unix epoch
/// (1970-01-01).
const UNIX_EPOCH_OFFSET_100NS: u64 = 116_444_736_000_000_000;

pub fn now_as_windows_ticks() -> u64 {
    let since_unix_epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let ticks_since_unix = since_unix_epoch.as_nanos() as u64 / 100;
    UNIX_EPOCH_OFFSET_100NS + ticks_since_unix
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_are_monotonically_increasing() {
        let a = now_as_windows_ticks();
        std::thread::sleep(std::time::Duration::from_millis(1));
        let b = now_as_windows_ticks();
        assert!(b > a);
    }

    #[test]
    fn ticks_are_well_past_the_windows_epoch() {
        assert!(now_as_windows_ticks() > UNIX_EPOCH_OFFSET_100NS);
    }
}
