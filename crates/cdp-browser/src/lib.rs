//! Discovery, launch, readiness polling, and teardown of an external
//! Chromium-family browser process (spec §4.F).

mod discovery;
mod error;
mod launch_options;
mod port;
mod profile;
mod supervisor;

pub use discovery::{discover_installations, find_best, Channel, Installation};
pub use error::BrowserError;
pub use launch_options::LaunchOptions;
pub use port::allocate_port;
pub use profile::{create_ephemeral_profile_dir, sweep_stale_profiles, PROFILE_PREFIX};
pub use supervisor::{BrowserSupervisor, TargetDescriptor, VersionInfo};
