//! Ephemeral profile directories (spec §4.F): create one per launch, and
//! sweep stale ones left behind by crashed prior runs. Supplemented from
//! `original_source`'s `ChromeLauncher_posix.cpp`, which uses the same
//! name-prefix + mtime-age heuristic for housekeeping.

use std::path::PathBuf;
use std::time::Duration;

pub const PROFILE_PREFIX: &str = "cdp-core-profile-";

pub fn create_ephemeral_profile_dir() -> std::io::Result<PathBuf> {
    let suffix: String = std::iter::repeat_with(fastrand::alphanumeric).take(16).collect();
    let mut dir = std::env::temp_dir();
    dir.push(format!("{PROFILE_PREFIX}{suffix}"));
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Remove prefix-matching directories under the temp dir whose contents
/// haven't been touched in at least `min_age`. Best-effort: directories
/// still held open by a lingering process are skipped rather than erroring
/// the whole sweep.
pub fn sweep_stale_profiles(min_age: Duration) -> usize {
    let tmp = std::env::temp_dir();
    let Ok(entries) = std::fs::read_dir(&tmp) else { return 0 };

    let mut removed = 0;
    for entry in entries.flatten() {
        let Some(name) = entry.file_name().to_str().map(str::to_string) else { continue };
        if !name.starts_with(PROFILE_PREFIX) {
            continue;
        }
        let Ok(metadata) = entry.metadata() else { continue };
        let Ok(modified) = metadata.modified() else { continue };
        let Ok(age) = modified.elapsed() else { continue };
        if age < min_age {
            continue;
        }
        if std::fs::remove_dir_all(entry.path()).is_ok() {
            removed += 1;
        }
    }
    removed
}
