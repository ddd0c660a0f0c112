//! Configuration management for the AMIB console
//!
//! Handles loading and validating the YAML configuration file. Every field has
//! a default, so running without a config file is fine.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tokio::fs;
use tracing::debug;

use crate::registry::BUILD_ID;
use crate::serial::{baud_constant, DEFAULT_BAUD_RATE};

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Serial device of the master board; discovered from the manifest if unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    /// Path to the hardware manifest
    #[serde(default = "default_hardware_file")]
    pub hardware_file: String,
    /// Line speed of the master's serial port
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Build id the master must report
    #[serde(default = "default_build_id")]
    pub build_id: u32,
    /// Delay after opening the port before the handshake (boards reset on open)
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    /// Capacity of the value report channel
    #[serde(default = "default_report_buffer")]
    pub report_buffer: usize,
    /// Directory searched for serial devices by serial number
    #[serde(default = "default_serial_dir")]
    pub serial_dir: String,
    /// Scripted console test sequences
    #[serde(default)]
    pub tests: Vec<TestSequence>,
}

/// Named list of console lines run by the `test` command
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct TestSequence {
    pub name: String,
    pub steps: Vec<String>,
}

/// Reserved test name that runs every sequence
pub const ALL_TESTS: &str = "all";

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: None,
            hardware_file: default_hardware_file(),
            baud_rate: default_baud_rate(),
            build_id: default_build_id(),
            settle_ms: default_settle_ms(),
            report_buffer: default_report_buffer(),
            serial_dir: default_serial_dir(),
            tests: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path))?;

        Self::from_yaml(&contents).with_context(|| format!("Invalid config file: {}", path))
    }

    /// Load configuration, falling back to defaults when the file is absent
    pub async fn load_or_default(path: &str) -> Result<Self> {
        if !Path::new(path).exists() {
            debug!("No config file at {}, using defaults", path);
            return Ok(Self::default());
        }
        Self::load(path).await
    }

    /// Parse and validate YAML text
    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: AppConfig =
            serde_yaml::from_str(contents).context("Failed to parse YAML config")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        if self.hardware_file.is_empty() {
            anyhow::bail!("hardware_file cannot be empty");
        }

        if baud_constant(self.baud_rate).is_none() {
            anyhow::bail!("Unsupported baud_rate {}", self.baud_rate);
        }

        if self.report_buffer == 0 {
            anyhow::bail!("report_buffer must be at least 1");
        }

        let mut names = HashSet::new();
        for (idx, test) in self.tests.iter().enumerate() {
            if test.name.is_empty() {
                anyhow::bail!("Test {} name cannot be empty", idx);
            }
            if test.name.contains(char::is_whitespace) {
                anyhow::bail!("Test name '{}' cannot contain whitespace", test.name);
            }
            if test.name == ALL_TESTS {
                anyhow::bail!("Test name '{}' is reserved", ALL_TESTS);
            }
            if !names.insert(test.name.as_str()) {
                anyhow::bail!("Duplicate test name '{}'", test.name);
            }
            if test.steps.is_empty() {
                anyhow::bail!("Test '{}' has no steps", test.name);
            }
        }

        Ok(())
    }
}

// Default value functions
fn default_hardware_file() -> String { "hardware.json".to_string() }
fn default_baud_rate() -> u32 { DEFAULT_BAUD_RATE }
fn default_build_id() -> u32 { BUILD_ID }
fn default_settle_ms() -> u64 { 1000 }
fn default_report_buffer() -> usize { 64 }
fn default_serial_dir() -> String { "/dev/serial/by-id".to_string() }
