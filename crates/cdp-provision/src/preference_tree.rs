//! Builds the per-extension preference entry and the signed
//! `Secure Preferences` tree around it (spec §4.G).

use std::path::{Path, PathBuf};

use cdp_crypto::{CHROMIUM_HMAC_SEED, PathEncoding, derive_from_path, hmac_hex};
use serde_json::{Map, Value, json};

use crate::canonical_json::{canonical_string, canonicalize_for_mac};
use crate::epoch::now_as_windows_ticks;
use crate::error::ProvisionError;

/// One extension ready to be signed into the preference tree.
#[derive(Debug, Clone)]
pub struct ExtensionRecord {
    pub id: String,
    pub path: PathBuf,
    pub manifest_version: u32,
    pub api_permissions: Vec<String>,
    pub explicit_host_permissions: Vec<String>,
    pub scriptable_host_permissions: Vec<String>,
    pub manifest_permissions: Vec<String>,
    pub incognito: bool,
    pub file_access: bool,
}

/// Read `manifest.json` out of `ext_dir`, canonicalize the path, and
/// derive the extension's deterministic ID (spec §4.G, §8 invariant 7).
pub fn record_for_extension(
    ext_dir: &Path,
    incognito: bool,
    file_access: bool,
) -> Result<ExtensionRecord, ProvisionError> {
    if !ext_dir.is_dir() {
        return Err(ProvisionError::InvalidPath(ext_dir.to_path_buf()));
    }
    let manifest_path = ext_dir.join("manifest.json");
    if !manifest_path.is_file() {
        return Err(ProvisionError::MissingManifest(ext_dir.to_path_buf()));
    }
    let manifest: Value = serde_json::from_str(&std::fs::read_to_string(&manifest_path)?)?;
    let manifest_version = manifest.get("manifest_version").and_then(Value::as_u64).unwrap_or(2) as u32;

    let canonical = std::fs::canonicalize(ext_dir)?;
    let canonical_str = canonical.to_string_lossy().into_owned();
    let encoding = if cfg!(windows) { PathEncoding::Windows } else { PathEncoding::Posix };
    let id = derive_from_path(&canonical_str, encoding);

    let mut api_permissions = Vec::new();
    let mut explicit_host_permissions = Vec::new();
    for perm in manifest.get("permissions").and_then(Value::as_array).into_iter().flatten() {
        let Some(s) = perm.as_str() else { continue };
        if s == "<all_urls>" || s.contains("://") {
            explicit_host_permissions.push(s.to_string());
        } else {
            api_permissions.push(s.to_string());
        }
    }
    let scriptable_host_permissions: Vec<String> = manifest
        .get("host_permissions")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect();

    Ok(ExtensionRecord {
        id,
        path: canonical,
        manifest_version,
        api_permissions,
        explicit_host_permissions,
        scriptable_host_permissions,
        manifest_permissions: Vec::new(),
        incognito,
        file_access,
    })
}

/// The per-extension JSON entry stored (unsigned) under
/// `extensions.settings.<id>` (spec §4.G preference tree).
pub fn build_entry(record: &ExtensionRecord) -> Value {
    json!({
        "path": record.path.to_string_lossy(),
        "install_time": now_as_windows_ticks().to_string(),
        "creation_flags": 38,
        "location": 4,
        "incognito_enabled": record.incognito,
        "newAllowFileAccess": record.file_access,
        "granted_permissions": {
            "api": record.api_permissions,
            "explicit_host": record.explicit_host_permissions,
            "scriptable_host": record.scriptable_host_permissions,
            "manifest_permissions": record.manifest_permissions,
        },
        "service_worker_registration_info": {
            "version": record.manifest_version.to_string(),
        },
        "was_installed_by_default": false,
        "was_installed_by_oem": false,
        "state": 1,
    })
}

/// Build the full `Secure Preferences` document: extension entries,
/// developer-mode flag, and the three-layer MAC tree (per-extension,
/// dev-mode, super-MAC) described in spec §4.G.
pub fn build_secure_preferences(sid: &str, entries: &[(String, Value)]) -> Value {
    let mut settings = Map::new();
    let mut setting_macs = Map::new();

    for (id, entry) in entries {
        let canonical_entry = canonicalize_for_mac(entry);
        let mac = hmac_hex(
            &CHROMIUM_HMAC_SEED,
            &[sid.as_bytes(), format!("extensions.settings.{id}").as_bytes(), canonical_entry.as_bytes()],
        )
        .to_uppercase();
        settings.insert(id.clone(), entry.clone());
        setting_macs.insert(id.clone(), Value::String(mac));
    }

    let dev_mac = hmac_hex(&CHROMIUM_HMAC_SEED, &[sid.as_bytes(), b"extensions.ui.developer_mode", b"true"]).to_uppercase();

    let macs_tree = json!({
        "extensions": {
            "settings": Value::Object(setting_macs),
            "ui": { "developer_mode": dev_mac },
        }
    });
    let super_mac_input = canonical_string(&macs_tree);
    let super_mac = hmac_hex(&CHROMIUM_HMAC_SEED, &[sid.as_bytes(), super_mac_input.as_bytes()]).to_uppercase();

    json!({
        "extensions": {
            "settings": Value::Object(settings),
            "ui": { "developer_mode": true },
        },
        "protection": {
            "macs": macs_tree,
            "super_mac": super_mac,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_secure_preferences_is_deterministic() {
        let entry = build_entry(&ExtensionRecord {
            id: "a".repeat(32),
            path: PathBuf::from("/opt/ext/foo"),
            manifest_version: 3,
            api_permissions: vec!["tabs".to_string()],
            explicit_host_permissions: vec![],
            scriptable_host_permissions: vec![],
            manifest_permissions: vec![],
            incognito: true,
            file_access: false,
        });
        let entries = vec![("a".repeat(32), entry)];
        let a = build_secure_preferences("sid-1", &entries);
        let b = build_secure_preferences("sid-1", &entries);
        assert_eq!(a, b);
        assert_ne!(a["protection"]["super_mac"], Value::Null);
    }

    #[test]
    fn different_sid_changes_every_mac() {
        let entry = build_entry(&ExtensionRecord {
            id: "b".repeat(32),
            path: PathBuf::from("/opt/ext/bar"),
            manifest_version: 2,
            api_permissions: vec![],
            explicit_host_permissions: vec![],
            scriptable_host_permissions: vec![],
            manifest_permissions: vec![],
            incognito: false,
            file_access: false,
        });
        let entries = vec![("b".repeat(32), entry)];
        let a = build_secure_preferences("sid-1", &entries);
        let b = build_secure_preferences("sid-2", &entries);
        assert_ne!(a["protection"]["super_mac"], b["protection"]["super_mac"]);
    }
}
