use chrono::NaiveDateTime;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsPlatform {
    Posix,
    Nt,
}

impl OsPlatform {
    pub fn current() -> Self {
        if cfg!(unix) {
            OsPlatform::Posix
        } else {
            OsPlatform::Nt
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OsPlatform::Posix => "Posix",
            OsPlatform::Nt => "NT",
        }
    }
}

impl fmt::Display for OsPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInfo {
    pub ip: String,
    pub subnet_mask: String,
    pub interface_type: String,
}

/// One point-in-time reading of every tracked metric.
///
/// Optional fields are `None` when the platform has no such sensor; percent
/// fields are already clamped to `0..=100` by the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub timestamp: NaiveDateTime,
    pub host: String,
    pub os: OsPlatform,
    pub logged_in: Option<Vec<String>>,
    pub network: Option<NetworkInfo>,
    pub cpu_usage_percent: f64,
    pub cpu_temp_celsius: Option<f64>,
    pub ram_usage_percent: f64,
    pub disk_used_percent: f64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub battery_percent: Option<f64>,
}

pub fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 100.0)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use chrono::NaiveDate;

    pub fn at(date: (i32, u32, u32), time: (u32, u32, u32)) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(date.0, date.1, date.2)
            .and_then(|d| d.and_hms_opt(time.0, time.1, time.2))
            .expect("valid fixture timestamp")
    }

    pub fn snapshot(timestamp: NaiveDateTime) -> Snapshot {
        Snapshot {
            timestamp,
            host: "web-01".to_string(),
            os: OsPlatform::Posix,
            logged_in: Some(vec!["alice".to_string(), "bob".to_string()]),
            network: Some(NetworkInfo {
                ip: "192.168.1.20".to_string(),
                subnet_mask: "255.255.255.0".to_string(),
                interface_type: "ethernet".to_string(),
            }),
            cpu_usage_percent: 12.5,
            cpu_temp_celsius: Some(48.0),
            ram_usage_percent: 63.2,
            disk_used_percent: 41.0,
            bytes_sent: 1_253_656,
            bytes_received: 98_765_432,
            battery_percent: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_percent_bounds_values() {
        assert_eq!(clamp_percent(-3.0), 0.0);
        assert_eq!(clamp_percent(101.5), 100.0);
        assert_eq!(clamp_percent(f64::NAN), 0.0);
        assert_eq!(clamp_percent(42.0), 42.0);
    }

    #[test]
    fn platform_tags_match_log_format() {
        assert_eq!(OsPlatform::Posix.to_string(), "Posix");
        assert_eq!(OsPlatform::Nt.to_string(), "NT");
    }
}
