//! Builds a report document from host probes

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};
use uuid::Uuid;
use validator::Validate;

use crate::models::{
    enums::{EquipmentCategory, EquipmentStatus},
    report::{
        CpuInfo, DiskInfo, GpuInfo, MemoryInfo, NetworkAdapter, PeripheralEntry, ReportDocument,
        SoftwareEntry, UNKNOWN,
    },
};

use super::config::CollectionSettings;
use super::platform::{Chassis, Facet, OsInfo, Platform, ProbeError};

/// Firmware placeholders that do not identify a machine
const PLACEHOLDER_SERIALS: &[&str] = &[
    "to be filled by o.e.m.",
    "default string",
    "system serial number",
    "not specified",
    "none",
    "0",
    "0123456789",
];

const NULL_MAC: &str = "00:00:00:00:00:00";

/// Everything the probes returned for one run
#[derive(Debug, Clone)]
pub struct HostFacts {
    pub hostname: Facet<String>,
    pub serial_number: Facet<String>,
    pub manufacturer: Facet<String>,
    pub model: Facet<String>,
    pub chassis: Facet<Chassis>,
    pub os: Facet<OsInfo>,
    pub cpu: Facet<CpuInfo>,
    pub memory: Facet<MemoryInfo>,
    pub disks: Facet<Vec<DiskInfo>>,
    pub gpus: Facet<Vec<GpuInfo>>,
    pub network_adapters: Facet<Vec<NetworkAdapter>>,
    pub installed_software: Facet<Vec<SoftwareEntry>>,
    pub peripherals: Facet<Vec<PeripheralEntry>>,
    pub primary_ip: Facet<String>,
}

pub struct Collector {
    platform: Arc<dyn Platform>,
    settings: CollectionSettings,
    permits: Arc<Semaphore>,
}

impl Collector {
    pub fn new(platform: Arc<dyn Platform>, settings: CollectionSettings) -> Self {
        let permits = Arc::new(Semaphore::new(settings.max_parallel_probes.max(1)));
        Self {
            platform,
            settings,
            permits,
        }
    }

    /// Run every probe and assemble the report. Never fails: unavailable
    /// facts become sentinels.
    pub async fn collect(&self) -> ReportDocument {
        let facts = self.probe_all().await;
        assemble(facts, &self.settings)
    }

    pub async fn probe_all(&self) -> HostFacts {
        let (
            hostname,
            serial_number,
            manufacturer,
            model,
            chassis,
            os,
            cpu,
            memory,
            disks,
            gpus,
            network_adapters,
            installed_software,
            peripherals,
            primary_ip,
        ) = tokio::join!(
            self.probe("hostname", |p| p.hostname()),
            self.probe("serial_number", |p| p.serial_number()),
            self.probe("manufacturer", |p| p.manufacturer()),
            self.probe("model", |p| p.model()),
            self.probe("chassis", |p| p.chassis()),
            self.probe("os_info", |p| p.os_info()),
            self.probe("cpu", |p| p.cpu()),
            self.probe("memory", |p| p.memory()),
            self.probe("disks", |p| p.disks()),
            self.probe("gpus", |p| p.gpus()),
            self.probe("network_adapters", |p| p.network_adapters()),
            self.probe("installed_software", |p| p.installed_software()),
            self.probe("peripherals", |p| p.peripherals()),
            self.probe("primary_ip", |p| p.primary_ip()),
        );

        HostFacts {
            hostname,
            serial_number,
            manufacturer,
            model,
            chassis,
            os,
            cpu,
            memory,
            disks,
            gpus,
            network_adapters,
            installed_software,
            peripherals,
            primary_ip,
        }
    }

    /// Run one probe on the blocking pool under the semaphore and timeout.
    /// The permit moves into the blocking task so a hung probe keeps holding it.
    async fn probe<T, F>(&self, name: &'static str, probe: F) -> Facet<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn Platform) -> Result<T, ProbeError> + Send + 'static,
    {
        let permit = match Arc::clone(&self.permits).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return Facet::Unavailable,
        };
        let platform = Arc::clone(&self.platform);
        let task = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            probe(platform.as_ref())
        });

        match tokio::time::timeout(self.probe_timeout(), task).await {
            Ok(Ok(Ok(value))) => {
                debug!(probe = name, "Probe succeeded");
                Facet::Available(value)
            }
            Ok(Ok(Err(e))) => {
                warn!(probe = name, error = %e, "Probe failed");
                Facet::Unavailable
            }
            Ok(Err(e)) => {
                warn!(probe = name, error = %e, "Probe panicked");
                Facet::Unavailable
            }
            Err(_) => {
                warn!(probe = name, timeout = ?self.probe_timeout(), "Probe timed out");
                Facet::Unavailable
            }
        }
    }

    fn probe_timeout(&self) -> Duration {
        self.settings.probe_timeout()
    }
}

fn usable_serial(serial: &str) -> bool {
    let lowered = serial.trim().to_lowercase();
    !lowered.is_empty() && !PLACEHOLDER_SERIALS.contains(&lowered.as_str())
}

fn category_for(chassis: &Facet<Chassis>, default_category: &str) -> EquipmentCategory {
    match chassis {
        Facet::Available(Chassis::Laptop) => EquipmentCategory::Laptop,
        Facet::Available(Chassis::Server) => EquipmentCategory::Server,
        _ => default_category.parse().unwrap_or(EquipmentCategory::Pc),
    }
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Drop entries the server would reject so one odd package cannot fail the report
fn storable<T: Validate>(entries: Vec<T>, facet: &'static str) -> Vec<T> {
    let reported = entries.len();
    let kept: Vec<T> = entries.into_iter().filter(|e| e.validate().is_ok()).collect();
    if kept.len() < reported {
        warn!(facet, dropped = reported - kept.len(), "Dropping oversized or empty entries");
    }
    kept
}

fn short_text(value: Option<String>) -> Option<String> {
    value.filter(|v| v.chars().count() <= 255)
}

/// Turn probe results into a report with every required key present
pub fn assemble(facts: HostFacts, settings: &CollectionSettings) -> ReportDocument {
    let hostname = facts
        .hostname
        .into_option()
        .filter(|h| !h.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string());

    let serial_number = facts
        .serial_number
        .into_option()
        .map(|s| s.trim().to_string())
        .filter(|s| usable_serial(s))
        .unwrap_or_else(|| format!("UNKNOWN-{}", hostname));

    let suffix = Uuid::new_v4().simple().to_string();
    let unique_serial_number = format!("{}-{}", serial_number, &suffix[..8]);

    let adapters = facts.network_adapters.or_default();
    let mac_address = adapters
        .iter()
        .map(|a| a.mac_address.as_str())
        .find(|mac| *mac != NULL_MAC && !mac.is_empty())
        .unwrap_or(UNKNOWN)
        .to_string();
    let network_in = adapters.iter().map(|a| to_i64(a.received_bytes)).fold(0i64, i64::saturating_add);
    let network_out = adapters
        .iter()
        .map(|a| to_i64(a.transmitted_bytes))
        .fold(0i64, i64::saturating_add);

    let primary_ip = facts.primary_ip.into_option();
    let is_online = primary_ip.is_some();

    let mut installed_software = facts.installed_software.or_default();
    if let Facet::Available(os) = facts.os {
        installed_software.push(SoftwareEntry {
            name: os.name,
            version: os.version,
            publisher: None,
        });
    }

    ReportDocument {
        name: hostname,
        category: category_for(&facts.chassis, &settings.default_category),
        serial_number,
        unique_serial_number,
        mac_address,
        ip_address: primary_ip.unwrap_or_else(|| UNKNOWN.to_string()),
        network_in,
        network_out,
        is_online,
        status: EquipmentStatus::Working,
        purchase_date: None,
        manufacturer: short_text(facts.manufacturer.into_option()),
        model: short_text(facts.model.into_option()),
        location: settings.default_location.clone().filter(|l| !l.trim().is_empty()),
        cpu_info: facts.cpu.into_option(),
        memory_info: facts.memory.into_option(),
        disk_info: facts.disks.or_default(),
        gpu_info: facts.gpus.or_default(),
        installed_software: storable(installed_software, "installed_software"),
        network_adapters: adapters,
        peripherals: storable(facts.peripherals.or_default(), "peripherals"),
        remove_stale: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::platform::MockPlatform;
    use validator::Validate;

    fn settings() -> CollectionSettings {
        CollectionSettings {
            probe_timeout_secs: 1,
            default_location: Some("Main office".to_string()),
            ..CollectionSettings::default()
        }
    }

    fn failing_platform() -> MockPlatform {
        let mut platform = MockPlatform::new();
        platform.expect_hostname().returning(|| Err(ProbeError::Missing));
        platform.expect_serial_number().returning(|| Err(ProbeError::Unsupported));
        platform.expect_manufacturer().returning(|| Err(ProbeError::Unsupported));
        platform.expect_model().returning(|| Err(ProbeError::Unsupported));
        platform.expect_chassis().returning(|| Err(ProbeError::Unsupported));
        platform.expect_os_info().returning(|| Err(ProbeError::Missing));
        platform.expect_cpu().returning(|| Err(ProbeError::Failed("boom".into())));
        platform.expect_memory().returning(|| Err(ProbeError::Missing));
        platform.expect_disks().returning(|| Err(ProbeError::Failed("boom".into())));
        platform.expect_gpus().returning(|| Err(ProbeError::Unsupported));
        platform.expect_network_adapters().returning(|| Err(ProbeError::Missing));
        platform.expect_installed_software().returning(|| Err(ProbeError::Unsupported));
        platform.expect_peripherals().returning(|| Err(ProbeError::Unsupported));
        platform.expect_primary_ip().returning(|| Err(ProbeError::Missing));
        platform
    }

    #[tokio::test]
    async fn test_all_probes_failing_still_yields_every_required_key() {
        let collector = Collector::new(Arc::new(failing_platform()), settings());
        let report = collector.collect().await;

        let json = serde_json::to_value(&report).unwrap();
        for key in [
            "name",
            "category",
            "serial_number",
            "unique_serial_number",
            "mac_address",
            "ip_address",
            "network_in",
            "network_out",
            "is_online",
            "status",
            "purchase_date",
        ] {
            assert!(json.get(key).is_some(), "missing key {}", key);
        }

        assert_eq!(report.name, UNKNOWN);
        assert_eq!(report.serial_number, "UNKNOWN-Unknown");
        assert_eq!(report.mac_address, UNKNOWN);
        assert_eq!(report.ip_address, UNKNOWN);
        assert!(!report.is_online);
        assert!(report.cpu_info.is_none());
        assert!(report.installed_software.is_empty());
        assert!(report.validate().is_ok());
    }

    #[tokio::test]
    async fn test_slow_probe_times_out_without_failing_collection() {
        let mut platform = MockPlatform::new();
        platform.expect_hostname().returning(|| {
            std::thread::sleep(Duration::from_millis(1500));
            Ok("late-host".to_string())
        });
        platform.expect_serial_number().returning(|| Ok("SN-42".to_string()));
        platform.expect_manufacturer().returning(|| Ok("Dell Inc.".to_string()));
        platform.expect_model().returning(|| Err(ProbeError::Missing));
        platform.expect_chassis().returning(|| Ok(Chassis::Laptop));
        platform.expect_os_info().returning(|| Err(ProbeError::Missing));
        platform.expect_cpu().returning(|| Err(ProbeError::Missing));
        platform.expect_memory().returning(|| Err(ProbeError::Missing));
        platform.expect_disks().returning(|| Ok(Vec::new()));
        platform.expect_gpus().returning(|| Ok(Vec::new()));
        platform.expect_network_adapters().returning(|| Ok(Vec::new()));
        platform.expect_installed_software().returning(|| Ok(Vec::new()));
        platform.expect_peripherals().returning(|| Ok(Vec::new()));
        platform.expect_primary_ip().returning(|| Ok("10.0.0.5".to_string()));

        let collector = Collector::new(Arc::new(platform), settings());
        let report = collector.collect().await;

        assert_eq!(report.name, UNKNOWN);
        assert_eq!(report.serial_number, "SN-42");
        assert_eq!(report.manufacturer.as_deref(), Some("Dell Inc."));
        assert_eq!(report.category, EquipmentCategory::Laptop);
        assert_eq!(report.ip_address, "10.0.0.5");
        assert!(report.is_online);
    }

    fn facts() -> HostFacts {
        HostFacts {
            hostname: Facet::Available("ws-17".to_string()),
            serial_number: Facet::Available("To Be Filled By O.E.M.".to_string()),
            manufacturer: Facet::Unavailable,
            model: Facet::Unavailable,
            chassis: Facet::Available(Chassis::Desktop),
            os: Facet::Available(OsInfo {
                name: "Debian GNU/Linux".to_string(),
                version: "12".to_string(),
                kernel: None,
            }),
            cpu: Facet::Unavailable,
            memory: Facet::Unavailable,
            disks: Facet::Unavailable,
            gpus: Facet::Unavailable,
            network_adapters: Facet::Available(vec![
                NetworkAdapter {
                    name: "docker0".to_string(),
                    mac_address: NULL_MAC.to_string(),
                    received_bytes: 5,
                    transmitted_bytes: 5,
                },
                NetworkAdapter {
                    name: "eth0".to_string(),
                    mac_address: "aa:bb:cc:dd:ee:ff".to_string(),
                    received_bytes: 100,
                    transmitted_bytes: 40,
                },
            ]),
            installed_software: Facet::Available(Vec::new()),
            peripherals: Facet::Unavailable,
            primary_ip: Facet::Unavailable,
        }
    }

    #[test]
    fn test_placeholder_serial_falls_back_to_hostname() {
        let report = assemble(facts(), &settings());

        assert_eq!(report.serial_number, "UNKNOWN-ws-17");
        assert!(report.unique_serial_number.starts_with("UNKNOWN-ws-17-"));
        assert_eq!(report.category, EquipmentCategory::Pc);
    }

    #[test]
    fn test_network_facts_are_aggregated() {
        let report = assemble(facts(), &settings());

        assert_eq!(report.mac_address, "aa:bb:cc:dd:ee:ff");
        assert_eq!(report.network_in, 105);
        assert_eq!(report.network_out, 45);
        assert_eq!(report.location.as_deref(), Some("Main office"));
        assert_eq!(report.installed_software.len(), 1);
        assert_eq!(report.installed_software[0].name, "Debian GNU/Linux");
    }

    #[test]
    fn test_entries_the_server_would_reject_are_dropped() {
        let mut host = facts();
        host.installed_software = Facet::Available(vec![
            SoftwareEntry {
                name: "git".to_string(),
                version: "2.43".to_string(),
                publisher: None,
            },
            SoftwareEntry {
                name: "odd-package".to_string(),
                version: "1".repeat(101),
                publisher: None,
            },
        ]);
        host.manufacturer = Facet::Available("m".repeat(256));

        let report = assemble(host, &settings());

        let names: Vec<&str> = report.installed_software.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["git", "Debian GNU/Linux"]);
        assert!(report.manufacturer.is_none());
        assert!(report.validate().is_ok());
    }
}
