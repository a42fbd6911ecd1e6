// SPDX-License-Identifier: Apache-2.0
//! Vivarium Admin CLI
//!
//! Operator tooling for inspecting and hand-editing profile snapshots and
//! service config outside of a running `vivariumd` process. Modeled on
//! `jitos-cli`'s shape (`clap` + `anyhow`), but talks directly to
//! the persistence layer rather than over HTTP: nothing in this workspace
//! implements an HTTP client, and the remote key-value store a real
//! deployment runs against is out of scope. Snapshots here are the same
//! canonical bytes `vivarium-store` reads and writes, so a file dumped from
//! (or destined for) the real remote store round-trips through these
//! commands unchanged.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use vivarium_config::{ConfigService, FsConfigStore};
use vivarium_core::wire::{canonical_bytes, from_canonical_bytes};
use vivarium_core::{Profile, UserId};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode a canonical profile snapshot file and log its summary.
    InspectProfile {
        /// Path to a file holding canonical profile bytes.
        #[clap(long)]
        file: PathBuf,
    },
    /// Write a freshly seeded profile's canonical bytes to a file.
    SeedProfile {
        /// The user id to seed a profile for.
        #[clap(long)]
        user_id: u64,
        /// Destination file for the canonical bytes.
        #[clap(long)]
        out: PathBuf,
    },
    /// Load a profile snapshot, set its coin balance, and write the result.
    SetCoins {
        /// Path to the existing canonical profile bytes.
        #[clap(long)]
        file: PathBuf,
        /// New coin balance.
        #[clap(long)]
        amount: u64,
        /// Destination file for the updated canonical bytes (defaults to `file`).
        #[clap(long)]
        out: Option<PathBuf>,
    },
    /// Dump a service config value as JSON.
    ShowConfig {
        /// Config key, e.g. `vivariumd_prefs`.
        #[clap(long)]
        key: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::InspectProfile { file } => inspect_profile(&file),
        Command::SeedProfile { user_id, out } => seed_profile(user_id, &out),
        Command::SetCoins { file, amount, out } => set_coins(&file, amount, out.as_deref().unwrap_or(&file)),
        Command::ShowConfig { key } => show_config(&key),
    }
}

fn inspect_profile(file: &PathBuf) -> Result<()> {
    let bytes = fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    let profile = from_canonical_bytes(&bytes).context("decoding canonical profile bytes")?;
    log_summary(&profile);
    Ok(())
}

fn seed_profile(user_id: u64, out: &PathBuf) -> Result<()> {
    let profile = Profile::seeded(UserId::new(user_id), &[]);
    write_profile(&profile, out)
}

fn set_coins(file: &PathBuf, amount: u64, out: &PathBuf) -> Result<()> {
    let bytes = fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    let mut profile = from_canonical_bytes(&bytes).context("decoding canonical profile bytes")?;
    let previous = profile.core.coins;
    profile.core.coins = amount;
    write_profile(&profile, out)?;
    tracing::info!(user_id = %profile.user_id, previous, amount, "coin balance overwritten");
    Ok(())
}

fn write_profile(profile: &Profile, out: &PathBuf) -> Result<()> {
    let bytes = canonical_bytes(profile).context("encoding canonical profile bytes")?;
    fs::write(out, &bytes).with_context(|| format!("writing {}", out.display()))?;
    tracing::info!(path = %out.display(), "wrote profile snapshot");
    Ok(())
}

fn log_summary(profile: &Profile) {
    tracing::info!(
        user_id = %profile.user_id,
        coins = profile.core.coins,
        world_slimes = profile.inventory.world_slimes.len(),
        world_eggs = profile.inventory.world_eggs.len(),
        egg_tools = profile.inventory.egg_tools.len(),
        food_tools = profile.inventory.food_tools.len(),
        captured_slimes = profile.inventory.captured_slimes.len(),
        "profile summary"
    );
    if let Ok(pretty) = serde_json::to_string_pretty(profile) {
        tracing::debug!(%pretty, "full profile");
    }
}

fn show_config(key: &str) -> Result<()> {
    let store = FsConfigStore::new().context("opening config store")?;
    let service = ConfigService::new(store);
    let value: Option<Value> = service.load(key).with_context(|| format!("loading config key {key}"))?;
    match value {
        Some(v) => tracing::info!(%key, value = %v, "config value"),
        None => tracing::warn!(%key, "config key not set"),
    }
    Ok(())
}
