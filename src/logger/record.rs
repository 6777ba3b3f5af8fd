use crate::snapshot::Snapshot;
use chrono::{NaiveDate, NaiveDateTime};
use std::path::{Path, PathBuf};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const NOT_APPLICABLE: &str = "N/A";

/// Column order of every data line, after the leading `timestamp`.
pub const COLUMNS: [&str; 13] = [
    "current_host",
    "current_os",
    "logged_in",
    "network_ip",
    "subnet_mask",
    "interface_type",
    "cpu_usage",
    "cpu_temp",
    "ram_usage",
    "disk_used",
    "byte_sent",
    "byte_received",
    "battery_level",
];

pub fn header_line() -> String {
    format!("timestamp,{}\n", COLUMNS.join(","))
}

/// Daily log file of one host: `{host}_{YYYY-MM-DD}.csv`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LogFileId {
    pub host: String,
    pub date: NaiveDate,
}

impl LogFileId {
    pub fn new(host: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            host: host.into(),
            date,
        }
    }

    pub fn file_name(&self) -> String {
        let host: String = self
            .host
            .chars()
            .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
            .collect();
        format!("{}_{}.csv", host, self.date.format(DATE_FORMAT))
    }

    pub fn path_in(&self, dir: &Path) -> PathBuf {
        dir.join(self.file_name())
    }
}

/// A snapshot flattened into schema order. The first field is the timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    timestamp: NaiveDateTime,
    host: String,
    fields: Vec<String>,
}

impl LogRecord {
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let (ip, subnet, iface) = match &snapshot.network {
            Some(n) => (
                n.ip.clone(),
                n.subnet_mask.clone(),
                n.interface_type.clone(),
            ),
            None => (na(), na(), na()),
        };

        let fields = vec![
            snapshot.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            snapshot.host.clone(),
            snapshot.os.to_string(),
            snapshot
                .logged_in
                .as_ref()
                .map(|users| users.join(", "))
                .unwrap_or_else(na),
            ip,
            subnet,
            iface,
            format_percent(snapshot.cpu_usage_percent),
            snapshot
                .cpu_temp_celsius
                .map(|t| format!("{t:.1}"))
                .unwrap_or_else(na),
            format_percent(snapshot.ram_usage_percent),
            format_percent(snapshot.disk_used_percent),
            snapshot.bytes_sent.to_string(),
            snapshot.bytes_received.to_string(),
            snapshot
                .battery_percent
                .map(format_percent)
                .unwrap_or_else(na),
        ];

        Self {
            timestamp: snapshot.timestamp,
            host: snapshot.host.clone(),
            fields,
        }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// The file this record belongs to, chosen by its own timestamp.
    pub fn file_id(&self) -> LogFileId {
        LogFileId::new(self.host.clone(), self.timestamp.date())
    }

    pub fn to_line(&self) -> String {
        let mut line = self
            .fields()
            .iter()
            .map(|f| escape_field(f))
            .collect::<Vec<_>>()
            .join(",");
        line.push('\n');
        line
    }
}

fn na() -> String {
    NOT_APPLICABLE.to_string()
}

fn format_percent(value: f64) -> String {
    format!("{value:.1}")
}

fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
