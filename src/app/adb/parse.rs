use std::sync::OnceLock;

use regex::Regex;

use crate::app::models::{DeviceSummary, ProcessEntry};

/// The connectivity gate: the listing must mention `device` somewhere.
pub fn listing_reports_device(output: &str) -> bool {
    output.contains("device")
}

pub fn parse_adb_devices(output: &str) -> Vec<DeviceSummary> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter(|line| !line.trim_start().starts_with('*'))
        .filter(|line| !line.to_lowercase().contains("list of devices"))
        .filter_map(|line| {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.len() < 2 {
                return None;
            }
            let mut summary = DeviceSummary {
                serial: tokens[0].to_string(),
                state: tokens[1].to_string(),
                model: None,
                product: None,
                device: None,
                transport_id: None,
            };
            for token in tokens.iter().skip(2) {
                if let Some(value) = token.strip_prefix("model:") {
                    summary.model = Some(value.to_string());
                } else if let Some(value) = token.strip_prefix("product:") {
                    summary.product = Some(value.to_string());
                } else if let Some(value) = token.strip_prefix("device:") {
                    summary.device = Some(value.to_string());
                } else if let Some(value) = token.strip_prefix("transport_id:") {
                    summary.transport_id = Some(value.to_string());
                }
            }
            Some(summary)
        })
        .collect()
}

/// Reads the `wc -l` style count. Anything that is not a plain number counts as zero.
pub fn parse_entry_count(output: &str) -> u64 {
    let trimmed = output.trim();
    if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
        trimmed.parse::<u64>().unwrap_or(0)
    } else {
        0
    }
}

fn process_row_regex() -> &'static Regex {
    static ROW_RE: OnceLock<Regex> = OnceLock::new();
    ROW_RE.get_or_init(|| Regex::new(r"^(\S+)\s+(\d+)\s+.*?(\S+)$").expect("valid ps row regex"))
}

/// Parses `ps` rows (`USER PID PPID VSZ RSS WCHAN ADDR S NAME`); the header and
/// rows without a numeric PID are skipped.
pub fn parse_process_listing(output: &str) -> Vec<ProcessEntry> {
    let row_re = process_row_regex();
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let caps = row_re.captures(line)?;
            Some(ProcessEntry {
                user: caps.get(1)?.as_str().to_string(),
                pid: caps.get(2)?.as_str().parse().ok()?,
                name: caps.get(3)?.as_str().to_string(),
            })
        })
        .collect()
}
