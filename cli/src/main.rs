//! `add_extension`: pre-provisions a Chromium profile so it accepts a set
//! of unpacked extensions without the first-run "remove this extension?"
//! prompt (spec §6 "CLI surface").

use std::path::PathBuf;

use anyhow::{Context, Result};
use cdp_provision::{provision_profile, ProvisionRequest};
use clap::Parser;
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

/// `add_extension <profile_dir> <ext_path>... [--no-incognito] [--no-file-access]`
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Profile directory to provision.
    profile_dir: PathBuf,

    /// Unpacked extension directories, each containing a manifest.json.
    #[arg(required = true)]
    extensions: Vec<PathBuf>,

    /// Optional TOML file of defaults; CLI flags below still win.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Don't mark the extensions incognito-enabled.
    #[arg(long)]
    no_incognito: bool,

    /// Don't grant file:// access.
    #[arg(long)]
    no_file_access: bool,

    /// Provision a directory this run didn't create (spec §4.G safety rail).
    #[arg(long)]
    adopt_existing: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct ProvisionConfig {
    incognito: bool,
    file_access: bool,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self { incognito: true, file_access: true }
    }
}

impl ProvisionConfig {
    fn load(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    }
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ProvisionConfig::load(path)?,
        None => ProvisionConfig::default(),
    };

    let request = ProvisionRequest {
        extensions: args.extensions,
        incognito: config.incognito && !args.no_incognito,
        file_access: config.file_access && !args.no_file_access,
    };

    match provision_profile(&args.profile_dir, &request, args.adopt_existing) {
        Ok(ids) => {
            for id in ids {
                println!("{id}");
            }
            Ok(())
        }
        Err(err) => {
            eprintln!("add_extension: {err}");
            std::process::exit(1);
        }
    }
}
