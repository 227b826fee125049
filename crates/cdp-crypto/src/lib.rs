//! Cryptographic primitives for the extension provisioner (4.G): extension
//! ID derivation and the HMAC machinery behind `Secure Preferences`.

mod extension_id;
mod machine_id;
mod signing;

pub use extension_id::{PathEncoding, derive_from_manifest_key, derive_from_path};
pub use machine_id::{MachineIdError, resolve_user_scope};
pub use signing::{CHROMIUM_HMAC_SEED, hmac_hex};
