//! Telemetry report document exchanged between the agent and the server

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::hash::Hash;
use std::net::IpAddr;
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use super::enums::{EquipmentCategory, EquipmentStatus};

/// Placeholder value used when a fact could not be collected
pub const UNKNOWN: &str = "Unknown";

static MAC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9A-Fa-f]{2}[:-]){5}[0-9A-Fa-f]{2}$").expect("valid MAC regex"));

fn validate_mac(value: &str) -> Result<(), ValidationError> {
    if value == UNKNOWN || MAC_RE.is_match(value) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_mac_address"))
    }
}

fn validate_ip(value: &str) -> Result<(), ValidationError> {
    if value == UNKNOWN || value.parse::<IpAddr>().is_ok() {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_ip_address"))
    }
}

/// CPU facts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CpuInfo {
    pub model: String,
    pub vendor: String,
    pub physical_cores: Option<u32>,
    pub logical_cores: u32,
    pub frequency_mhz: u64,
    pub usage_percent: f32,
}

/// Memory facts (bytes)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MemoryInfo {
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub swap_total_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DiskInfo {
    pub name: String,
    pub mount_point: String,
    pub file_system: String,
    pub total_bytes: u64,
    pub available_bytes: u64,
    pub removable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GpuInfo {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct NetworkAdapter {
    pub name: String,
    pub mac_address: String,
    pub received_bytes: u64,
    pub transmitted_bytes: u64,
}

/// One installed software package
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Validate, ToSchema)]
pub struct SoftwareEntry {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 100))]
    pub version: String,
    #[validate(length(max = 255))]
    pub publisher: Option<String>,
}

/// One attached peripheral (monitor, printer, keyboard, ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Validate, ToSchema)]
pub struct PeripheralEntry {
    #[validate(length(min = 1, max = 50))]
    pub kind: String,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(max = 255))]
    pub serial_number: Option<String>,
}

/// Self-contained host snapshot produced by one collection run.
///
/// Required keys are always present; facets that could not be probed carry
/// sentinel values (`"Unknown"`, empty lists, `null`).
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ReportDocument {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub category: EquipmentCategory,
    #[validate(length(min = 1, max = 255))]
    pub serial_number: String,
    #[validate(length(min = 1, max = 255))]
    pub unique_serial_number: String,
    #[validate(custom(function = "validate_mac"))]
    pub mac_address: String,
    #[validate(custom(function = "validate_ip"))]
    pub ip_address: String,
    #[validate(range(min = 0))]
    pub network_in: i64,
    #[validate(range(min = 0))]
    pub network_out: i64,
    pub is_online: bool,
    pub status: EquipmentStatus,
    pub purchase_date: Option<NaiveDate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 255))]
    pub manufacturer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 255))]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 255))]
    pub location: Option<String>,
    #[serde(default)]
    pub cpu_info: Option<CpuInfo>,
    #[serde(default)]
    pub memory_info: Option<MemoryInfo>,
    #[serde(default)]
    pub disk_info: Vec<DiskInfo>,
    #[serde(default)]
    pub gpu_info: Vec<GpuInfo>,
    #[serde(default)]
    #[validate(nested)]
    pub installed_software: Vec<SoftwareEntry>,
    #[serde(default)]
    pub network_adapters: Vec<NetworkAdapter>,
    #[serde(default)]
    #[validate(nested)]
    pub peripherals: Vec<PeripheralEntry>,
    /// Delete child records that are no longer reported
    #[serde(default)]
    pub remove_stale: bool,
}

/// Outcome of ingesting one report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct IngestResult {
    pub created: bool,
    pub equipment_id: i32,
    pub software_synced: u64,
    pub peripherals_synced: u64,
    pub software_removed: u64,
    pub peripherals_removed: u64,
}

/// Difference between stored child records and a new report
#[derive(Debug, PartialEq, Eq)]
pub struct Reconciliation<'a, T, K> {
    /// Reported entries with no stored counterpart
    pub to_add: Vec<&'a T>,
    /// Stored keys no longer reported
    pub stale: Vec<K>,
}

/// Diff reported entries against stored keys.
///
/// Duplicate entries in `reported` are collapsed onto their first occurrence.
pub fn reconcile<'a, T, K, F>(existing: &[K], reported: &'a [T], key: F) -> Reconciliation<'a, T, K>
where
    K: Eq + Hash + Clone,
    F: Fn(&T) -> K,
{
    let stored: HashSet<&K> = existing.iter().collect();
    let mut seen: HashSet<K> = HashSet::with_capacity(reported.len());
    let mut to_add = Vec::new();
    for entry in reported {
        let k = key(entry);
        if seen.contains(&k) {
            continue;
        }
        if !stored.contains(&k) {
            to_add.push(entry);
        }
        seen.insert(k);
    }
    let stale = existing.iter().filter(|k| !seen.contains(*k)).cloned().collect();
    Reconciliation { to_add, stale }
}

impl SoftwareEntry {
    pub fn key(&self) -> (String, String) {
        (self.name.clone(), self.version.clone())
    }
}

impl PeripheralEntry {
    pub fn key(&self) -> (String, String) {
        (self.kind.clone(), self.name.clone())
    }
}
