//! Locates Chromium-family installations (spec §4.F "Discovery").
//! Grounded on `chromiumoxide`'s `default_executable` (enrichment from the
//! rest of the pack — the teacher itself never launches a browser), but
//! generalized from "first match wins" to "enumerate, then rank".

use std::path::{Path, PathBuf};
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Stable,
    Beta,
    Dev,
    Canary,
    Chromium,
    Custom,
}

#[derive(Debug, Clone)]
pub struct Installation {
    pub path: PathBuf,
    pub channel: Channel,
    pub version: Option<String>,
    pub mtime: SystemTime,
}

const CANDIDATE_NAMES: &[&str] =
    &["google-chrome-stable", "google-chrome", "google-chrome-beta", "google-chrome-unstable", "chromium", "chromium-browser", "chrome"];

#[cfg(target_os = "macos")]
const MACOS_CANDIDATE_PATHS: &[&str] = &[
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Google Chrome Beta.app/Contents/MacOS/Google Chrome Beta",
    "/Applications/Google Chrome Canary.app/Contents/MacOS/Google Chrome Canary",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
];

#[cfg(windows)]
const WINDOWS_CANDIDATE_PATHS: &[&str] = &[
    "C:\\Program Files\\Google\\Chrome\\Application\\chrome.exe",
    "C:\\Program Files (x86)\\Google\\Chrome\\Application\\chrome.exe",
    "C:\\Program Files\\Google\\Chrome Beta\\Application\\chrome.exe",
    "C:\\Program Files\\Google\\Chrome SxS\\Application\\chrome.exe",
];

/// Enumerate every installation this host can find, sorted by mtime
/// descending (spec §4.F).
pub fn discover_installations() -> Vec<Installation> {
    let mut found = Vec::new();

    if let Ok(path) = std::env::var("CHROME") {
        if let Some(installation) = installation_from_path(Path::new(&path), Channel::Custom) {
            found.push(installation);
        }
    }

    for name in CANDIDATE_NAMES {
        if let Ok(path) = which::which(name) {
            if let Some(installation) = installation_from_path(&path, channel_for_name(name)) {
                found.push(installation);
            }
        }
    }

    #[cfg(target_os = "macos")]
    for path in MACOS_CANDIDATE_PATHS {
        if let Some(installation) = installation_from_path(Path::new(path), channel_for_name(path)) {
            found.push(installation);
        }
    }

    #[cfg(windows)]
    for path in WINDOWS_CANDIDATE_PATHS {
        if let Some(installation) = installation_from_path(Path::new(path), channel_for_name(path)) {
            found.push(installation);
        }
    }

    found.sort_by(|a, b| b.mtime.cmp(&a.mtime));
    found.dedup_by(|a, b| a.path == b.path);
    found
}

/// Prefer the freshest stable build; fall back to the freshest of any
/// channel (spec §4.F `find_best`).
pub fn find_best(installations: &[Installation]) -> Option<Installation> {
    installations
        .iter()
        .filter(|i| i.channel == Channel::Stable)
        .max_by_key(|i| i.mtime)
        .or_else(|| installations.iter().max_by_key(|i| i.mtime))
        .cloned()
}

fn channel_for_name(name: &str) -> Channel {
    let lower = name.to_ascii_lowercase();
    if lower.contains("canary") {
        Channel::Canary
    } else if lower.contains("beta") {
        Channel::Beta
    } else if lower.contains("unstable") || lower.contains("dev") {
        Channel::Dev
    } else if lower.contains("chromium") {
        Channel::Chromium
    } else {
        Channel::Stable
    }
}

fn installation_from_path(path: &Path, channel: Channel) -> Option<Installation> {
    let metadata = std::fs::metadata(path).ok()?;
    if !metadata.is_file() {
        return None;
    }
    let mtime = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
    Some(Installation { path: path.to_path_buf(), channel, version: probe_version(path), mtime })
}

fn probe_version(path: &Path) -> Option<String> {
    let output = std::process::Command::new(path).arg("--version").output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if text.is_empty() { None } else { Some(text) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn installation(channel: Channel, mtime_offset_secs: u64) -> Installation {
        Installation {
            path: PathBuf::from(format!("/fake/{mtime_offset_secs}")),
            channel,
            version: None,
            mtime: SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(mtime_offset_secs),
        }
    }

    #[test]
    fn prefers_freshest_stable_over_a_newer_non_stable() {
        let installations = vec![installation(Channel::Canary, 100), installation(Channel::Stable, 50)];
        let best = find_best(&installations).unwrap();
        assert_eq!(best.channel, Channel::Stable);
    }

    #[test]
    fn falls_back_to_freshest_of_any_channel_when_no_stable_exists() {
        let installations = vec![installation(Channel::Dev, 10), installation(Channel::Canary, 20)];
        let best = find_best(&installations).unwrap();
        assert_eq!(best.channel, Channel::Canary);
    }

    #[test]
    fn empty_list_has_no_best() {
        assert!(find_best(&[]).is_none());
    }
}
