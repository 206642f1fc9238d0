//! Host probes
//!
//! Every probe is a blocking call returning `Result<_, ProbeError>`; the
//! collector runs them on the blocking pool and turns failures into sentinels.

use std::net::UdpSocket;
use std::process::Command;
use sysinfo::{Disks, Networks, System};
use thiserror::Error;

use crate::models::report::{
    CpuInfo, DiskInfo, GpuInfo, MemoryInfo, NetworkAdapter, PeripheralEntry, SoftwareEntry,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("not supported on this platform")]
    Unsupported,

    #[error("no value reported")]
    Missing,

    #[error("probe failed: {0}")]
    Failed(String),
}

/// A fact that may not be collectable on every host
#[derive(Debug, Clone, PartialEq)]
pub enum Facet<T> {
    Unavailable,
    Available(T),
}

impl<T> Facet<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            Facet::Available(value) => Some(value),
            Facet::Unavailable => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Facet::Available(_))
    }
}

impl<T: Default> Facet<T> {
    pub fn or_default(self) -> T {
        self.into_option().unwrap_or_default()
    }
}

/// Enclosure reported by the firmware
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chassis {
    Desktop,
    Laptop,
    Server,
    Other,
}

impl Chassis {
    /// Map an SMBIOS chassis type code
    pub fn from_smbios(code: u32) -> Self {
        match code {
            3..=7 | 13 | 15 | 16 | 35 | 36 => Chassis::Desktop,
            8..=10 | 14 | 30..=32 => Chassis::Laptop,
            17 | 23 | 25 | 28 | 29 => Chassis::Server,
            _ => Chassis::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsInfo {
    pub name: String,
    pub version: String,
    pub kernel: Option<String>,
}

#[cfg_attr(test, mockall::automock)]
pub trait Platform: Send + Sync {
    fn hostname(&self) -> Result<String, ProbeError>;
    fn serial_number(&self) -> Result<String, ProbeError>;
    fn manufacturer(&self) -> Result<String, ProbeError>;
    fn model(&self) -> Result<String, ProbeError>;
    fn chassis(&self) -> Result<Chassis, ProbeError>;
    fn os_info(&self) -> Result<OsInfo, ProbeError>;
    fn cpu(&self) -> Result<CpuInfo, ProbeError>;
    fn memory(&self) -> Result<MemoryInfo, ProbeError>;
    fn disks(&self) -> Result<Vec<DiskInfo>, ProbeError>;
    fn gpus(&self) -> Result<Vec<GpuInfo>, ProbeError>;
    fn network_adapters(&self) -> Result<Vec<NetworkAdapter>, ProbeError>;
    fn installed_software(&self) -> Result<Vec<SoftwareEntry>, ProbeError>;
    fn peripherals(&self) -> Result<Vec<PeripheralEntry>, ProbeError>;
    /// Address of the interface used for outbound traffic
    fn primary_ip(&self) -> Result<String, ProbeError>;
}

/// Probes backed by `sysinfo`, DMI files and package manager queries
#[derive(Debug, Default, Clone, Copy)]
pub struct SysinfoPlatform;

impl SysinfoPlatform {
    pub fn new() -> Self {
        Self
    }
}

impl Platform for SysinfoPlatform {
    fn hostname(&self) -> Result<String, ProbeError> {
        System::host_name().ok_or(ProbeError::Missing)
    }

    fn serial_number(&self) -> Result<String, ProbeError> {
        if cfg!(target_os = "linux") {
            read_dmi("product_serial").or_else(|_| read_dmi("board_serial"))
        } else if cfg!(windows) {
            powershell("(Get-CimInstance Win32_BIOS).SerialNumber").and_then(non_empty)
        } else {
            Err(ProbeError::Unsupported)
        }
    }

    fn manufacturer(&self) -> Result<String, ProbeError> {
        if cfg!(target_os = "linux") {
            read_dmi("sys_vendor")
        } else if cfg!(windows) {
            powershell("(Get-CimInstance Win32_ComputerSystem).Manufacturer").and_then(non_empty)
        } else {
            Err(ProbeError::Unsupported)
        }
    }

    fn model(&self) -> Result<String, ProbeError> {
        if cfg!(target_os = "linux") {
            read_dmi("product_name")
        } else if cfg!(windows) {
            powershell("(Get-CimInstance Win32_ComputerSystem).Model").and_then(non_empty)
        } else {
            Err(ProbeError::Unsupported)
        }
    }

    fn chassis(&self) -> Result<Chassis, ProbeError> {
        let raw = if cfg!(target_os = "linux") {
            read_dmi("chassis_type")?
        } else if cfg!(windows) {
            powershell("(Get-CimInstance Win32_SystemEnclosure).ChassisTypes | Select-Object -First 1")?
        } else {
            return Err(ProbeError::Unsupported);
        };
        raw.trim()
            .parse::<u32>()
            .map(Chassis::from_smbios)
            .map_err(|e| ProbeError::Failed(format!("chassis type '{}': {}", raw.trim(), e)))
    }

    fn os_info(&self) -> Result<OsInfo, ProbeError> {
        let name = System::name().ok_or(ProbeError::Missing)?;
        Ok(OsInfo {
            name,
            version: System::os_version().unwrap_or_default(),
            kernel: System::kernel_version(),
        })
    }

    fn cpu(&self) -> Result<CpuInfo, ProbeError> {
        let mut sys = System::new();
        sys.refresh_cpu();
        // Usage needs two samples
        std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        sys.refresh_cpu();

        let first = sys.cpus().first().ok_or(ProbeError::Missing)?;
        Ok(CpuInfo {
            model: first.brand().trim().to_string(),
            vendor: first.vendor_id().to_string(),
            physical_cores: sys.physical_core_count().map(|n| n as u32),
            logical_cores: sys.cpus().len() as u32,
            frequency_mhz: first.frequency(),
            usage_percent: sys.global_cpu_info().cpu_usage(),
        })
    }

    fn memory(&self) -> Result<MemoryInfo, ProbeError> {
        let mut sys = System::new();
        sys.refresh_memory();
        if sys.total_memory() == 0 {
            return Err(ProbeError::Missing);
        }
        Ok(MemoryInfo {
            total_bytes: sys.total_memory(),
            used_bytes: sys.used_memory(),
            swap_total_bytes: sys.total_swap(),
        })
    }

    fn disks(&self) -> Result<Vec<DiskInfo>, ProbeError> {
        let disks = Disks::new_with_refreshed_list();
        Ok(disks
            .iter()
            .map(|d| DiskInfo {
                name: d.name().to_string_lossy().to_string(),
                mount_point: d.mount_point().display().to_string(),
                file_system: d.file_system().to_string_lossy().to_string(),
                total_bytes: d.total_space(),
                available_bytes: d.available_space(),
                removable: d.is_removable(),
            })
            .collect())
    }

    fn gpus(&self) -> Result<Vec<GpuInfo>, ProbeError> {
        if cfg!(target_os = "linux") {
            let output = run("lspci", &[])?;
            Ok(parse_lspci_gpus(&output))
        } else if cfg!(windows) {
            let output = powershell("Get-CimInstance Win32_VideoController | ForEach-Object { $_.Name }")?;
            Ok(output
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(|name| GpuInfo { name: name.to_string() })
                .collect())
        } else {
            Err(ProbeError::Unsupported)
        }
    }

    fn network_adapters(&self) -> Result<Vec<NetworkAdapter>, ProbeError> {
        let networks = Networks::new_with_refreshed_list();
        Ok(networks
            .iter()
            .filter(|(name, _)| name.as_str() != "lo")
            .map(|(name, data)| NetworkAdapter {
                name: name.to_string(),
                mac_address: data.mac_address().to_string(),
                received_bytes: data.total_received(),
                transmitted_bytes: data.total_transmitted(),
            })
            .collect())
    }

    fn installed_software(&self) -> Result<Vec<SoftwareEntry>, ProbeError> {
        if cfg!(target_os = "linux") {
            let listing = run(
                "dpkg-query",
                &["-W", "-f", "${Package}\t${Version}\t${Maintainer}\n"],
            )
            .or_else(|_| {
                run(
                    "rpm",
                    &["-qa", "--queryformat", "%{NAME}\t%{VERSION}-%{RELEASE}\t%{VENDOR}\n"],
                )
            })?;
            Ok(parse_software_listing(&listing))
        } else if cfg!(windows) {
            let listing = powershell(
                "Get-ItemProperty HKLM:\\Software\\Microsoft\\Windows\\CurrentVersion\\Uninstall\\*, \
                 HKLM:\\Software\\WOW6432Node\\Microsoft\\Windows\\CurrentVersion\\Uninstall\\* \
                 | Where-Object { $_.DisplayName } \
                 | ForEach-Object { \"$($_.DisplayName)`t$($_.DisplayVersion)`t$($_.Publisher)\" }",
            )?;
            Ok(parse_software_listing(&listing))
        } else {
            Err(ProbeError::Unsupported)
        }
    }

    fn peripherals(&self) -> Result<Vec<PeripheralEntry>, ProbeError> {
        if cfg!(target_os = "linux") {
            let mut found = connected_monitors();
            if let Ok(printers) = run("lpstat", &["-p"]) {
                found.extend(parse_lpstat_printers(&printers));
            }
            Ok(found)
        } else if cfg!(windows) {
            let monitors = powershell("Get-CimInstance Win32_DesktopMonitor | ForEach-Object { $_.Name }")
                .unwrap_or_default();
            let printers = powershell("Get-CimInstance Win32_Printer | ForEach-Object { $_.Name }")
                .unwrap_or_default();
            let entries = |kind: &str, listing: &str| -> Vec<PeripheralEntry> {
                listing
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(|name| PeripheralEntry {
                        kind: kind.to_string(),
                        name: name.to_string(),
                        serial_number: None,
                    })
                    .collect()
            };
            let mut found = entries("monitor", &monitors);
            found.extend(entries("printer", &printers));
            Ok(found)
        } else {
            Err(ProbeError::Unsupported)
        }
    }

    fn primary_ip(&self) -> Result<String, ProbeError> {
        // Connecting a UDP socket sends nothing but selects the outbound interface
        let socket = UdpSocket::bind("0.0.0.0:0").map_err(|e| ProbeError::Failed(e.to_string()))?;
        socket
            .connect("8.8.8.8:80")
            .map_err(|e| ProbeError::Failed(e.to_string()))?;
        let address = socket
            .local_addr()
            .map_err(|e| ProbeError::Failed(e.to_string()))?
            .ip();
        if address.is_unspecified() {
            return Err(ProbeError::Missing);
        }
        Ok(address.to_string())
    }
}

fn non_empty(value: String) -> Result<String, ProbeError> {
    let value = value.trim().to_string();
    if value.is_empty() {
        Err(ProbeError::Missing)
    } else {
        Ok(value)
    }
}

fn read_dmi(field: &str) -> Result<String, ProbeError> {
    std::fs::read_to_string(format!("/sys/class/dmi/id/{}", field))
        .map_err(|e| ProbeError::Failed(format!("{}: {}", field, e)))
        .and_then(non_empty)
}

fn run(program: &str, args: &[&str]) -> Result<String, ProbeError> {
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| ProbeError::Failed(format!("{}: {}", program, e)))?;
    if !output.status.success() {
        return Err(ProbeError::Failed(format!("{} exited with {}", program, output.status)));
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

fn powershell(script: &str) -> Result<String, ProbeError> {
    run("powershell", &["-NoProfile", "-NonInteractive", "-Command", script])
}

fn connected_monitors() -> Vec<PeripheralEntry> {
    let Ok(entries) = std::fs::read_dir("/sys/class/drm") else {
        return Vec::new();
    };
    let mut monitors: Vec<PeripheralEntry> = entries
        .flatten()
        .filter(|entry| {
            std::fs::read_to_string(entry.path().join("status"))
                .map(|s| s.trim() == "connected")
                .unwrap_or(false)
        })
        .map(|entry| PeripheralEntry {
            kind: "monitor".to_string(),
            name: entry.file_name().to_string_lossy().to_string(),
            serial_number: None,
        })
        .collect();
    monitors.sort_by(|a, b| a.name.cmp(&b.name));
    monitors
}

/// Parse `name<TAB>version<TAB>publisher` lines, skipping blanks
pub fn parse_software_listing(listing: &str) -> Vec<SoftwareEntry> {
    listing
        .lines()
        .filter_map(|line| {
            let mut fields = line.split('\t').map(str::trim);
            let name = fields.next().filter(|n| !n.is_empty())?;
            let version = fields.next().unwrap_or_default();
            let publisher = fields.next().filter(|p| !p.is_empty() && *p != "(none)");
            Some(SoftwareEntry {
                name: name.to_string(),
                version: version.to_string(),
                publisher: publisher.map(str::to_string),
            })
        })
        .collect()
}

fn parse_lspci_gpus(output: &str) -> Vec<GpuInfo> {
    output
        .lines()
        .filter(|line| line.contains("VGA compatible controller") || line.contains("3D controller"))
        .filter_map(|line| line.splitn(2, ": ").nth(1))
        .map(|name| GpuInfo { name: name.trim().to_string() })
        .collect()
}

fn parse_lpstat_printers(output: &str) -> Vec<PeripheralEntry> {
    output
        .lines()
        .filter_map(|line| line.strip_prefix("printer "))
        .filter_map(|rest| rest.split_whitespace().next())
        .map(|name| PeripheralEntry {
            kind: "printer".to_string(),
            name: name.to_string(),
            serial_number: None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_software_listing() {
        let listing = "bash\t5.2.15-2\tUbuntu Developers\n\nlibfoo\t1.0\t(none)\nbare\n";
        let entries = parse_software_listing(listing);

        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].name, "bash");
        assert_eq!(entries[0].publisher.as_deref(), Some("Ubuntu Developers"));
        assert_eq!(entries[1].publisher, None);
        assert_eq!(entries[2].version, "");
    }

    #[test]
    fn test_chassis_codes() {
        assert_eq!(Chassis::from_smbios(10), Chassis::Laptop);
        assert_eq!(Chassis::from_smbios(23), Chassis::Server);
        assert_eq!(Chassis::from_smbios(3), Chassis::Desktop);
        assert_eq!(Chassis::from_smbios(1), Chassis::Other);
    }

    #[test]
    fn test_parse_lspci_and_lpstat() {
        let lspci = "00:02.0 VGA compatible controller: Intel Corporation UHD Graphics 620\n\
                     00:1f.3 Audio device: Intel Corporation Sunrise Point-LP HD Audio\n";
        assert_eq!(
            parse_lspci_gpus(lspci),
            vec![GpuInfo { name: "Intel Corporation UHD Graphics 620".to_string() }]
        );

        let lpstat = "printer Office_Laser is idle.  enabled since Mon\nscheduler is running\n";
        let printers = parse_lpstat_printers(lpstat);
        assert_eq!(printers.len(), 1);
        assert_eq!(printers[0].name, "Office_Laser");
    }

    #[test]
    fn test_facet_helpers() {
        assert_eq!(Facet::Available(3).into_option(), Some(3));
        assert!(!Facet::<u8>::Unavailable.is_available());
        assert_eq!(Facet::<Vec<u8>>::Unavailable.or_default(), Vec::<u8>::new());
    }
}
