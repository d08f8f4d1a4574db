//! The probe table and its built-in default.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::types::{Probe, ProbeCategory};
use crate::config::ConfigError;
use crate::store::Hive;

/// Ordered set of probe categories swept on every run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProbeCatalog {
    categories: Vec<ProbeCategory>,
}

impl ProbeCatalog {
    /// Build a catalog from categories in sweep order.
    pub fn new(categories: Vec<ProbeCategory>) -> Self {
        Self { categories }
    }

    /// Identity, network, autostart, recent documents, removable media.
    pub fn builtin() -> Self {
        use Hive::{CurrentUser, LocalMachine};

        let system_info = ProbeCategory::new("system_info", "System Information")
            .with_probe(Probe::new(
                LocalMachine,
                r"SOFTWARE\Microsoft\Windows NT\CurrentVersion",
                "OS Version",
                "/system_info/os_version",
            ))
            .with_probe(Probe::new(
                LocalMachine,
                r"SYSTEM\CurrentControlSet\Control\ComputerName\ComputerName",
                "Computer Name",
                "/system_info/computer_name",
            ))
            .with_probe(Probe::new(
                LocalMachine,
                r"SYSTEM\CurrentControlSet\Control\TimeZoneInformation",
                "Time Zone Information",
                "/system_info/time_zone",
            ));

        let network_info = ProbeCategory::new("network_info", "Network Information").with_probe(
            Probe::new(
                LocalMachine,
                r"SYSTEM\CurrentControlSet\Services\Tcpip\Parameters\Interfaces",
                "Network Interfaces",
                "/network_info/interfaces",
            ),
        );

        let autostart = ProbeCategory::new("startup_programs", "Autostart Programs")
            .with_probe(Probe::new(
                CurrentUser,
                r"Software\Microsoft\Windows\CurrentVersion\Run",
                "Startup Programs",
                "/startup_programs/current_user",
            ))
            .with_probe(Probe::new(
                CurrentUser,
                r"Software\Microsoft\Windows\CurrentVersion\RunOnce",
                "RunOnce Programs",
                "/startup_programs/current_user_run_once",
            ))
            .with_probe(Probe::new(
                LocalMachine,
                r"SOFTWARE\Microsoft\Windows\CurrentVersion\RunOnce",
                "Global RunOnce Programs",
                "/startup_programs/global_run_once",
            ));

        let recent_files = ProbeCategory::new("recent_files", "Recent Documents").with_probe(
            Probe::new(
                CurrentUser,
                r"Software\Microsoft\Windows\CurrentVersion\Explorer\RecentDocs",
                "Recent Files",
                "/recent_files",
            ),
        );

        let usb_devices = ProbeCategory::new("usb_devices", "USB Device Information")
            .with_probe(Probe::new(
                LocalMachine,
                r"SYSTEM\CurrentControlSet\Enum\USBSTOR",
                "Connected USB Devices",
                "/usb_devices",
            ))
            .with_probe(Probe::new(
                LocalMachine,
                r"SOFTWARE\Microsoft\Windows Portable Devices\Devices",
                "USB Device Volume Names",
                "/usb_device_volume_names",
            ));

        Self::new(vec![
            system_info,
            network_info,
            autostart,
            recent_files,
            usb_devices,
        ])
    }

    /// Categories in sweep order.
    pub fn categories(&self) -> &[ProbeCategory] {
        &self.categories
    }

    /// Every probe in sweep order.
    pub fn probes(&self) -> impl Iterator<Item = &Probe> {
        self.categories.iter().flat_map(|c| c.probes.iter())
    }

    /// Total number of probes across all categories.
    pub fn probe_count(&self) -> usize {
        self.categories.iter().map(|c| c.probes.len()).sum()
    }

    /// Validate the table.
    ///
    /// Categories need unique names and at least one probe. Probes need a
    /// non-empty path and description and an absolute remote path. Two
    /// probes may share a remote path only inside the same category.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.categories.is_empty() {
            return Err(ConfigError::Invalid(
                "probe catalog has no categories".to_string(),
            ));
        }

        let mut seen_names = HashSet::new();
        let mut remote_owner: HashMap<&str, &str> = HashMap::new();

        for category in &self.categories {
            if category.name.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "category name cannot be empty".to_string(),
                ));
            }
            if !seen_names.insert(category.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate category name: '{}'",
                    category.name
                )));
            }
            if category.probes.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "category '{}' has no probes",
                    category.name
                )));
            }

            for probe in &category.probes {
                if probe.path.trim().is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "category '{}': probe path cannot be empty",
                        category.name
                    )));
                }
                if probe.description.trim().is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "category '{}': probe '{}' needs a description",
                        category.name, probe.path
                    )));
                }
                if !probe.remote_path.starts_with('/') {
                    return Err(ConfigError::Invalid(format!(
                        "probe '{}': remote path '{}' must start with '/'",
                        probe.description, probe.remote_path
                    )));
                }

                let owner = remote_owner
                    .entry(probe.remote_path.as_str())
                    .or_insert(category.name.as_str());
                if *owner != category.name {
                    return Err(ConfigError::Invalid(format!(
                        "remote path '{}' is used by categories '{}' and '{}'",
                        probe.remote_path, owner, category.name
                    )));
                }
            }
        }

        Ok(())
    }
}

impl Default for ProbeCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
