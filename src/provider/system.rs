use crate::provider::{MetricsProvider, ProviderError};
use crate::snapshot::{clamp_percent, NetworkInfo, OsPlatform, Snapshot};
use chrono::{Local, SubsecRound};
use std::fs;
use std::net::Ipv4Addr;
use std::path::Path;
use std::process::Command;
use sysinfo::{ComponentExt, CpuExt, DiskExt, NetworkExt, NetworksExt, System, SystemExt};
use tracing::debug;

const THERMAL_ROOT: &str = "/sys/class/thermal";
const POWER_SUPPLY_ROOT: &str = "/sys/class/power_supply";
const NET_CLASS_ROOT: &str = "/sys/class/net";

#[derive(Debug, Clone)]
struct TempReading {
    sensor: String,
    celsius: f64,
}

pub struct SysinfoProvider {
    system: System,
    host: String,
}

impl SysinfoProvider {
    pub fn new() -> Self {
        let mut system = System::new();
        // CPU usage is the delta between two refreshes, prime the first one here
        // and keep the first sample past the minimum update interval.
        system.refresh_cpu();
        system.refresh_disks_list();
        system.refresh_networks_list();
        system.refresh_components_list();
        std::thread::sleep(System::MINIMUM_CPU_UPDATE_INTERVAL);
        let host = resolve_host_name(system.host_name());
        Self { system, host }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Updates readings of the devices enumerated in `new`.
    fn refresh(&mut self) {
        self.system.refresh_cpu();
        self.system.refresh_memory();
        self.system.refresh_disks();
        self.system.refresh_networks();
        self.system.refresh_components();
    }
}

impl Default for SysinfoProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsProvider for SysinfoProvider {
    fn sample(&mut self) -> Result<Snapshot, ProviderError> {
        self.refresh();
        let system = &self.system;

        let cpu_usage_percent = cpu_usage(system)?;
        let ram_usage_percent = ram_usage(system)?;
        let disk_used_percent = root_disk_usage(system)?;
        let (bytes_sent, bytes_received) = network_totals(system);

        let mut temps = component_temps(system);
        if cfg!(target_os = "linux") {
            temps.extend(read_thermal_zones(Path::new(THERMAL_ROOT)));
        }
        let cpu_temp_celsius = pick_cpu_temperature(&temps);
        let battery_percent = if cfg!(target_os = "linux") {
            read_battery_percent(Path::new(POWER_SUPPLY_ROOT))
        } else {
            None
        };
        let logged_in = logged_in_users();
        let network = primary_network();

        debug!(
            temp_sensors = temps.len(),
            cpu_temp = cpu_temp_celsius.is_some(),
            battery = battery_percent.is_some(),
            users = logged_in.is_some(),
            network = network.is_some(),
            "доступность опциональных метрик"
        );

        Ok(Snapshot {
            timestamp: Local::now().naive_local().trunc_subsecs(0),
            host: self.host.clone(),
            os: OsPlatform::current(),
            logged_in,
            network,
            cpu_usage_percent,
            cpu_temp_celsius,
            ram_usage_percent,
            disk_used_percent,
            bytes_sent,
            bytes_received,
            battery_percent,
        })
    }
}

fn resolve_host_name(reported: Option<String>) -> String {
    let from_env = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
    reported
        .filter(|h| !h.trim().is_empty())
        .or_else(|| from_env("HOSTNAME"))
        .or_else(|| from_env("COMPUTERNAME"))
        .unwrap_or_else(|| "localhost".to_string())
}

fn cpu_usage(system: &System) -> Result<f64, ProviderError> {
    let cpus = system.cpus();
    if cpus.is_empty() {
        return Err(ProviderError::field("cpu_usage", "список CPU пуст"));
    }
    let sum: f32 = cpus.iter().map(|c| c.cpu_usage()).sum();
    Ok(clamp_percent((sum / cpus.len() as f32) as f64))
}

fn ram_usage(system: &System) -> Result<f64, ProviderError> {
    let total = system.total_memory();
    if total == 0 {
        return Err(ProviderError::field("ram_usage", "общий объём памяти равен нулю"));
    }
    Ok(clamp_percent(
        (system.used_memory() as f64 / total as f64) * 100.0,
    ))
}

fn root_disk_usage(system: &System) -> Result<f64, ProviderError> {
    let root = if cfg!(windows) {
        Path::new("C:\\")
    } else {
        Path::new("/")
    };
    let disks = system.disks();
    let disk = disks
        .iter()
        .find(|d| d.mount_point() == root)
        .or_else(|| disks.first())
        .ok_or_else(|| ProviderError::field("disk_used", "не найдено ни одного диска"))?;

    let total = disk.total_space();
    if total == 0 {
        return Err(ProviderError::field(
            "disk_used",
            format!("нулевой объём у {}", disk.mount_point().display()),
        ));
    }
    let used = total.saturating_sub(disk.available_space());
    Ok(clamp_percent((used as f64 / total as f64) * 100.0))
}

fn network_totals(system: &System) -> (u64, u64) {
    system
        .networks()
        .iter()
        .fold((0_u64, 0_u64), |acc, (_iface, data)| {
            (
                acc.0.saturating_add(data.total_transmitted()),
                acc.1.saturating_add(data.total_received()),
            )
        })
}

fn component_temps(system: &System) -> Vec<TempReading> {
    system
        .components()
        .iter()
        .map(|c| TempReading {
            sensor: c.label().to_string(),
            celsius: c.temperature() as f64,
        })
        .filter(|t| t.celsius > 0.0)
        .collect()
}

fn read_thermal_zones(root: &Path) -> Vec<TempReading> {
    let Ok(entries) = fs::read_dir(root) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|v| v.to_str()) else {
            continue;
        };
        if !name.starts_with("thermal_zone") {
            continue;
        }

        let typ = fs::read_to_string(path.join("type"))
            .ok()
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| name.to_string());
        let Some(raw) = fs::read_to_string(path.join("temp")).ok() else {
            continue;
        };
        let Ok(v) = raw.trim().parse::<f64>() else {
            continue;
        };
        let celsius = if v > 1000.0 { v / 1000.0 } else { v };
        if celsius > 0.0 {
            out.push(TempReading {
                sensor: typ,
                celsius,
            });
        }
    }

    out
}

fn is_gpu_sensor(label: &str) -> bool {
    ["gpu", "nvidia", "amdgpu", "radeon"]
        .iter()
        .any(|m| label.contains(m))
}

fn is_thermal_zone_sensor(label: &str) -> bool {
    label.contains("acpi") || label.contains("thermal zone") || label.contains("_tz")
}

/// Picks the CPU temperature out of every sensor the host exposes.
///
/// Sensors labelled like a CPU package win; otherwise the hottest non-GPU
/// sensor is used, and ACPI thermal zones are the last resort.
fn pick_cpu_temperature(temps: &[TempReading]) -> Option<f64> {
    let cpu_markers = ["cpu", "package", "tctl", "tdie", "coretemp", "k10temp", "x86_pkg_temp"];
    let plausible = || {
        temps
            .iter()
            .filter(|t| (0.0..=130.0).contains(&t.celsius))
            .map(|t| (t.sensor.to_lowercase(), t.celsius))
    };

    let primary = plausible()
        .filter(|(s, _)| {
            cpu_markers.iter().any(|m| s.contains(m))
                && !is_gpu_sensor(s)
                && !is_thermal_zone_sensor(s)
        })
        .map(|(_, c)| c)
        .max_by(|a, b| a.total_cmp(b));
    if primary.is_some() {
        return primary;
    }

    let fallback = plausible()
        .filter(|(s, _)| !is_gpu_sensor(s) && !is_thermal_zone_sensor(s))
        .map(|(_, c)| c)
        .max_by(|a, b| a.total_cmp(b));
    if fallback.is_some() {
        return fallback;
    }

    plausible()
        .filter(|(s, _)| is_thermal_zone_sensor(s))
        .map(|(_, c)| c)
        .max_by(|a, b| a.total_cmp(b))
}

fn read_battery_percent(root: &Path) -> Option<f64> {
    let entries = fs::read_dir(root).ok()?;

    let mut levels = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        let kind = fs::read_to_string(path.join("type")).ok();
        if kind.as_deref().map(str::trim) != Some("Battery") {
            continue;
        }
        let capacity = fs::read_to_string(path.join("capacity"))
            .ok()
            .and_then(|v| v.trim().parse::<f64>().ok());
        if let Some(capacity) = capacity {
            levels.push(capacity);
        }
    }

    if levels.is_empty() {
        return None;
    }
    let mean = levels.iter().sum::<f64>() / levels.len() as f64;
    Some(clamp_percent(mean))
}

fn logged_in_users() -> Option<Vec<String>> {
    if !cfg!(unix) {
        return None;
    }
    let output = Command::new("who").output().ok()?;
    if !output.status.success() {
        return None;
    }
    Some(parse_who(&String::from_utf8_lossy(&output.stdout)))
}

fn parse_who(text: &str) -> Vec<String> {
    let mut users: Vec<String> = Vec::new();
    for line in text.lines() {
        let Some(name) = line.split_whitespace().next() else {
            continue;
        };
        if !users.iter().any(|u| u == name) {
            users.push(name.to_string());
        }
    }
    users
}

fn primary_network() -> Option<NetworkInfo> {
    if !cfg!(target_os = "linux") {
        return None;
    }
    let output = Command::new("ip")
        .args(["-o", "-4", "addr", "show"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }

    let (iface, ip, prefix) = parse_ip_addr(&String::from_utf8_lossy(&output.stdout))?;
    let wireless = Path::new(NET_CLASS_ROOT)
        .join(&iface)
        .join("wireless")
        .exists();
    Some(NetworkInfo {
        ip: ip.to_string(),
        subnet_mask: prefix_to_netmask(prefix).to_string(),
        interface_type: classify_interface(&iface, wireless).to_string(),
    })
}

/// Parses `ip -o -4 addr show` and returns the first non-loopback address.
fn parse_ip_addr(text: &str) -> Option<(String, Ipv4Addr, u8)> {
    let mut loopback = None;
    for line in text.lines() {
        let mut tokens = line.split_whitespace();
        let (Some(_index), Some(iface)) = (tokens.next(), tokens.next()) else {
            continue;
        };
        let iface = iface.trim_end_matches(':');
        let rest: Vec<&str> = tokens.collect();
        let Some(pos) = rest.iter().position(|t| *t == "inet") else {
            continue;
        };
        let Some((addr, prefix)) = rest.get(pos + 1).and_then(|c| c.split_once('/')) else {
            continue;
        };
        let (Ok(addr), Ok(prefix)) = (addr.parse::<Ipv4Addr>(), prefix.parse::<u8>()) else {
            continue;
        };
        if prefix > 32 {
            continue;
        }

        if addr.is_loopback() {
            if loopback.is_none() {
                loopback = Some((iface.to_string(), addr, prefix));
            }
            continue;
        }
        return Some((iface.to_string(), addr, prefix));
    }
    loopback
}

fn prefix_to_netmask(prefix: u8) -> Ipv4Addr {
    let bits = if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(prefix.min(32)))
    };
    Ipv4Addr::from(bits)
}

fn classify_interface(name: &str, wireless: bool) -> &'static str {
    if wireless || name.starts_with("wl") {
        return "wireless";
    }
    if name == "lo" {
        return "loopback";
    }
    if ["en", "eth", "em"].iter().any(|p| name.starts_with(p)) {
        return "ethernet";
    }
    if ["docker", "veth", "br", "virbr", "tun", "tap", "wg"]
        .iter()
        .any(|p| name.starts_with(p))
    {
        return "virtual";
    }
    "other"
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn first_sample_is_past_minimum_cpu_interval() {
        let started = Instant::now();
        let provider = SysinfoProvider::new();
        assert!(started.elapsed() >= System::MINIMUM_CPU_UPDATE_INTERVAL);
        assert!(!provider.host().is_empty());
    }

    #[test]
    fn refresh_keeps_devices_found_at_startup() {
        let mut provider = SysinfoProvider::new();
        let disks = provider.system.disks().len();
        let interfaces = provider.system.networks().iter().count();

        provider.refresh();
        provider.refresh();
        assert_eq!(provider.system.disks().len(), disks);
        assert_eq!(provider.system.networks().iter().count(), interfaces);
    }

    fn reading(sensor: &str, celsius: f64) -> TempReading {
        TempReading {
            sensor: sensor.to_string(),
            celsius,
        }
    }

    #[test]
    fn cpu_temperature_prefers_package_sensor() {
        let temps = vec![
            reading("acpitz", 70.0),
            reading("GPU 0", 80.0),
            reading("coretemp Package id 0", 52.0),
            reading("nvme Composite", 40.0),
        ];
        assert_eq!(pick_cpu_temperature(&temps), Some(52.0));
    }

    #[test]
    fn cpu_temperature_falls_back_to_non_gpu_then_thermal_zone() {
        let temps = vec![reading("amdgpu edge", 65.0), reading("nvme Composite", 41.0)];
        assert_eq!(pick_cpu_temperature(&temps), Some(41.0));

        let temps = vec![reading("amdgpu edge", 65.0), reading("acpitz", 55.0)];
        assert_eq!(pick_cpu_temperature(&temps), Some(55.0));
    }

    #[test]
    fn cpu_temperature_absent_without_sensors() {
        assert_eq!(pick_cpu_temperature(&[]), None);
        assert_eq!(pick_cpu_temperature(&[reading("cpu", 400.0)]), None);
    }

    #[test]
    fn thermal_zones_are_read_in_millidegrees() {
        let dir = tempfile::tempdir().expect("tempdir");
        let zone = dir.path().join("thermal_zone0");
        fs::create_dir(&zone).expect("zone dir");
        fs::write(zone.join("type"), "x86_pkg_temp\n").expect("type");
        fs::write(zone.join("temp"), "47000\n").expect("temp");
        fs::create_dir(dir.path().join("cooling_device0")).expect("cooling dir");

        let temps = read_thermal_zones(dir.path());
        assert_eq!(temps.len(), 1);
        assert_eq!(temps[0].sensor, "x86_pkg_temp");
        assert_eq!(temps[0].celsius, 47.0);
    }

    #[test]
    fn battery_reads_only_battery_supplies() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ac = dir.path().join("AC");
        fs::create_dir(&ac).expect("ac dir");
        fs::write(ac.join("type"), "Mains\n").expect("type");

        assert_eq!(read_battery_percent(dir.path()), None);

        let bat = dir.path().join("BAT0");
        fs::create_dir(&bat).expect("bat dir");
        fs::write(bat.join("type"), "Battery\n").expect("type");
        fs::write(bat.join("capacity"), "87\n").expect("capacity");

        assert_eq!(read_battery_percent(dir.path()), Some(87.0));
    }

    #[test]
    fn battery_missing_root_is_unavailable() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert_eq!(read_battery_percent(&dir.path().join("absent")), None);
    }

    #[test]
    fn who_output_yields_unique_users_in_order() {
        let text = "alice    pts/0        2026-10-19 09:12 (10.0.0.5)\n\
                    bob      tty1         2026-10-19 08:00\n\
                    alice    pts/1        2026-10-19 09:40 (10.0.0.5)\n\n";
        assert_eq!(parse_who(text), vec!["alice".to_string(), "bob".to_string()]);
        assert!(parse_who("").is_empty());
    }

    #[test]
    fn ip_addr_skips_loopback() {
        let text = "1: lo    inet 127.0.0.1/8 scope host lo\\       valid_lft forever preferred_lft forever\n\
                    2: wlp3s0    inet 192.168.1.20/24 brd 192.168.1.255 scope global dynamic wlp3s0\\       valid_lft 3400sec preferred_lft 3400sec\n";
        let (iface, ip, prefix) = parse_ip_addr(text).expect("address");
        assert_eq!(iface, "wlp3s0");
        assert_eq!(ip, Ipv4Addr::new(192, 168, 1, 20));
        assert_eq!(prefix, 24);
    }

    #[test]
    fn ip_addr_falls_back_to_loopback() {
        let text = "1: lo    inet 127.0.0.1/8 scope host lo\n";
        let (iface, _, _) = parse_ip_addr(text).expect("loopback");
        assert_eq!(iface, "lo");
        assert!(parse_ip_addr("garbage line\n").is_none());
    }

    #[test]
    fn netmask_from_prefix() {
        assert_eq!(prefix_to_netmask(24), Ipv4Addr::new(255, 255, 255, 0));
        assert_eq!(prefix_to_netmask(20), Ipv4Addr::new(255, 255, 240, 0));
        assert_eq!(prefix_to_netmask(32), Ipv4Addr::new(255, 255, 255, 255));
        assert_eq!(prefix_to_netmask(0), Ipv4Addr::new(0, 0, 0, 0));
    }

    #[test]
    fn interface_classification() {
        assert_eq!(classify_interface("eth0", false), "ethernet");
        assert_eq!(classify_interface("enp0s31f6", false), "ethernet");
        assert_eq!(classify_interface("wlp3s0", false), "wireless");
        assert_eq!(classify_interface("mlan0", true), "wireless");
        assert_eq!(classify_interface("lo", false), "loopback");
        assert_eq!(classify_interface("docker0", false), "virtual");
        assert_eq!(classify_interface("ppp0", false), "other");
    }

    #[test]
    fn reported_host_name_wins() {
        assert_eq!(resolve_host_name(Some("db-02".to_string())), "db-02");
    }
}
