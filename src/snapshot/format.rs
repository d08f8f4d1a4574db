//! Local log line formats.
//!
//! Every string here is one `append` call. Leading newlines are part of the
//! format and produce the blank separator lines between sections.

use crate::store::Entry;

/// Written once when the agent has finished starting up.
pub fn agent_started() -> String {
    "=== Forensic Registry Data Collection Started ===".to_string()
}

/// Opens a sweep.
pub fn sweep_started() -> String {
    "\n\n=== Forensic Data Collection - New Run ===".to_string()
}

/// Closes a sweep that attempted every probe.
pub fn sweep_completed() -> String {
    "\n\n=== Data Collection Completed ===".to_string()
}

pub fn category_banner(banner: &str) -> String {
    format!("\n[Collecting {banner}]")
}

pub fn probe_header(description: &str) -> String {
    format!("\n[+] {description}")
}

pub fn entry_line(sub_key: &str, entry: &Entry) -> String {
    format!(
        "{} - {}: {} (Type: {})",
        sub_key, entry.name, entry.value, entry.value_type
    )
}

pub fn not_found(sub_key: &str) -> String {
    format!("[-] Registry key {sub_key} not found.")
}

pub fn access_error(reason: &str) -> String {
    format!("[-] Error accessing registry: {reason}")
}
