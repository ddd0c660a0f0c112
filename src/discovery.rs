//! Hardware manifest and serial port discovery
//!
//! `hardware.json` lists the AMIB boards of a machine by serial number. The
//! master is the board with the lowest number; its device node is found by
//! matching the serial number against the udev `by-id` symlinks.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::link::LinkError;

/// One board entry of the manifest
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct BoardEntry {
    #[serde(rename = "serialNumber")]
    pub serial_number: String,
}

/// Contents of `hardware.json`
#[derive(Debug, Clone, Deserialize)]
pub struct HardwareManifest {
    pub name: String,
    #[serde(rename = "AMIBs")]
    pub boards: BTreeMap<String, BoardEntry>,
}

/// The master board picked from the manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterBoard {
    pub number: u32,
    pub serial_number: String,
}

impl HardwareManifest {
    /// Load the manifest from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read hardware file: {}", path.display()))?;

        Self::from_json(&contents)
            .with_context(|| format!("Invalid hardware file: {}", path.display()))
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        serde_json::from_str(contents).context("Failed to parse hardware JSON")
    }

    /// Board with the lowest `AMIB<n>` number
    pub fn master(&self) -> Result<MasterBoard> {
        let mut best: Option<MasterBoard> = None;

        for (name, entry) in &self.boards {
            let number = parse_board_name(name)?;
            if best.as_ref().map_or(true, |b| number < b.number) {
                best = Some(MasterBoard {
                    number,
                    serial_number: entry.serial_number.clone(),
                });
            }
        }

        let master = best
            .with_context(|| format!("Hardware '{}' lists no AMIB boards", self.name))?;
        debug!("Master board is AMIB{} ({})", master.number, master.serial_number);
        Ok(master)
    }
}

fn parse_board_name(name: &str) -> Result<u32> {
    name.strip_prefix("AMIB")
        .and_then(|n| n.parse().ok())
        .with_context(|| format!("Malformed board name '{}', expected AMIB<n>", name))
}

/// Find the device whose `by-id` link name contains `serial`
pub fn find_port_by_serial(dir: impl AsRef<Path>, serial: &str) -> Result<PathBuf> {
    let dir = dir.as_ref();
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to list serial devices in {}", dir.display()))?;

    let mut matches: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.contains(serial))
        })
        .collect();
    matches.sort();

    let port = matches
        .into_iter()
        .next()
        .with_context(|| format!("No serial device with serial number {} found", serial))?;
    info!("Found master at {}", port.display());
    Ok(port)
}

/// Pick the master's device: CLI port, then config port, then the manifest
///
/// A master missing from `serial_dir` is a [`LinkError::NotConnected`].
pub fn resolve_port(cli_port: Option<&str>, config: &AppConfig) -> Result<PathBuf> {
    if let Some(port) = cli_port.or(config.port.as_deref()) {
        return Ok(PathBuf::from(port));
    }

    let manifest = HardwareManifest::load(&config.hardware_file)
        .context("Non-existent or invalid hardware file")?;
    let master = manifest.master()?;
    info!(
        "Looking for master AMIB{} ({}) in {}",
        master.number, master.serial_number, config.serial_dir
    );

    find_port_by_serial(&config.serial_dir, &master.serial_number)
        .map_err(|e| LinkError::NotConnected(format!("{:#}", e)).into())
}
