//! Writes the profile's three preference files atomically, and guards
//! against signing into a profile directory this run didn't create
//! (spec §4.G "Safety rail", §8 invariant 8).

use std::path::Path;

use serde_json::{Value, json};

use crate::error::ProvisionError;

const OWNED_MARKER: &str = ".cdp-core-owned";

/// Refuse to touch `profile_dir` unless it carries the marker this crate
/// (or the browser supervisor that created it) left behind, or the caller
/// explicitly opts in.
pub fn ensure_profile_dir_is_safe(profile_dir: &Path, opt_in: bool) -> Result<(), ProvisionError> {
    let marker = profile_dir.join(OWNED_MARKER);
    if marker.is_file() || opt_in {
        std::fs::create_dir_all(profile_dir)?;
        std::fs::write(&marker, b"")?;
        return Ok(());
    }
    Err(ProvisionError::UnsafeProfileDir(profile_dir.to_path_buf()))
}

/// Write `Default/Secure Preferences`, `Default/Preferences`, and
/// `Local State` under `profile_dir`, each via write-to-temp-then-rename
/// so the browser never observes a partially written file.
pub fn write_profile_files(profile_dir: &Path, secure_preferences: &Value) -> Result<(), ProvisionError> {
    let default_dir = profile_dir.join("Default");
    std::fs::create_dir_all(&default_dir)?;

    atomic_write_json(&default_dir.join("Secure Preferences"), secure_preferences)?;
    atomic_write_json(&default_dir.join("Preferences"), &json!({}))?;
    atomic_write_json(
        &profile_dir.join("Local State"),
        &json!({ "profile": { "info_cache": { "Default": { "name": "Default" } } } }),
    )?;
    Ok(())
}

fn atomic_write_json(path: &Path, value: &Value) -> Result<(), ProvisionError> {
    let contents = serde_json::to_vec(value)?;
    let tmp_path = path.with_file_name(format!(
        "{}.tmp-cdp-core",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("prefs")
    ));
    std::fs::write(&tmp_path, &contents)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn refuses_unowned_profile_dir_without_opt_in() {
        let dir = tempfile::tempdir().unwrap();
        let profile = dir.path().join("profile");
        let err = ensure_profile_dir_is_safe(&profile, false).unwrap_err();
        assert!(matches!(err, ProvisionError::UnsafeProfileDir(_)));
    }

    #[test]
    fn opting_in_creates_the_marker_for_next_time() {
        let dir = tempfile::tempdir().unwrap();
        let profile = dir.path().join("profile");
        ensure_profile_dir_is_safe(&profile, true).unwrap();
        ensure_profile_dir_is_safe(&profile, false).unwrap();
    }

    #[test]
    fn writes_all_three_files() {
        let dir = tempfile::tempdir().unwrap();
        let profile = dir.path().to_path_buf();
        write_profile_files(&profile, &json!({"extensions": {}})).unwrap();
        assert!(profile.join("Default/Secure Preferences").is_file());
        assert!(profile.join("Default/Preferences").is_file());
        assert!(profile.join("Local State").is_file());
    }
}
