//! Extension pre-provisioning (spec §4.G): makes a Chromium profile accept
//! unpacked extensions on start by writing a correctly HMAC-signed
//! `Secure Preferences` tree alongside the usual `Preferences`/`Local
//! State` files.

mod canonical_json;
mod epoch;
mod error;
mod preference_tree;
mod writer;

use std::path::{Path, PathBuf};

use tracing::info;

pub use error::ProvisionError;
pub use preference_tree::ExtensionRecord;

/// What to provision: a set of unpacked extension directories plus the
/// two per-extension flags the CLI exposes (spec §6).
#[derive(Debug, Clone)]
pub struct ProvisionRequest {
    pub extensions: Vec<PathBuf>,
    pub incognito: bool,
    pub file_access: bool,
}

/// Provision `profile_dir` for every extension in `request`, returning
/// the derived extension IDs in input order.
///
/// `opt_in_unowned` must be `true` when `profile_dir` wasn't created by
/// this process (spec §4.G "Safety rail"): a bad MAC resets the profile,
/// so writing into a directory a human is actively using is refused by
/// default.
pub fn provision_profile(
    profile_dir: &Path,
    request: &ProvisionRequest,
    opt_in_unowned: bool,
) -> Result<Vec<String>, ProvisionError> {
    writer::ensure_profile_dir_is_safe(profile_dir, opt_in_unowned)?;

    let sid = cdp_crypto::resolve_user_scope()?;

    let mut ids = Vec::with_capacity(request.extensions.len());
    let mut entries = Vec::with_capacity(request.extensions.len());
    for ext_dir in &request.extensions {
        let record = preference_tree::record_for_extension(ext_dir, request.incognito, request.file_access)?;
        info!(id = %record.id, path = %record.path.display(), "provisioning extension");
        entries.push((record.id.clone(), preference_tree::build_entry(&record)));
        ids.push(record.id);
    }

    let secure_preferences = preference_tree::build_secure_preferences(&sid, &entries);
    writer::write_profile_files(profile_dir, &secure_preferences)?;
    Ok(ids)
}
