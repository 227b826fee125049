use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not resolve a machine identifier to sign with: {0}")]
    Signing(#[from] cdp_crypto::MachineIdError),
    #[error("extension path does not exist or is not a directory: {0}")]
    InvalidPath(PathBuf),
    #[error("extension path has no manifest.json: {0}")]
    MissingManifest(PathBuf),
    #[error(
        "refusing to write into a profile directory not created by this run; \
         pass an explicit opt-in if this is intentional: {0}"
    )]
    UnsafeProfileDir(PathBuf),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
