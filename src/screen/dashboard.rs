use crate::screen::{human_bytes, percent_or_na, Screen, CLEAR_SCREEN, NOT_AVAILABLE};
use crate::snapshot::Snapshot;
use std::io::{self, Write};

pub struct Dashboard<W: Write = io::Stdout> {
    out: W,
}

impl Dashboard {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> Dashboard<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Screen for Dashboard<W> {
    fn draw(&mut self, snapshot: &Snapshot) -> io::Result<()> {
        let text = format!("{CLEAR_SCREEN}{}", format_dashboard(snapshot));
        self.out.write_all(text.as_bytes())?;
        self.out.flush()
    }

    fn exit_notice(&mut self) -> io::Result<()> {
        writeln!(self.out, "\nОстановка: сохраняем накопленные данные...")?;
        self.out.flush()
    }
}

pub fn format_dashboard(s: &Snapshot) -> String {
    let (ip, subnet, iface) = match &s.network {
        Some(n) => (n.ip.as_str(), n.subnet_mask.as_str(), n.interface_type.as_str()),
        None => (NOT_AVAILABLE, NOT_AVAILABLE, NOT_AVAILABLE),
    };
    let users = match &s.logged_in {
        Some(users) if users.is_empty() => "нет".to_string(),
        Some(users) => users.join(", "),
        None => NOT_AVAILABLE.to_string(),
    };

    format!(
        "Хост: {}\nОС: {}\nIP: {} / {} ({})\nПользователи: {}\n\n\
         CPU: {:.1}%\nCPU temp: {}\nRAM: {:.1}%\nДиск: {:.1}%\n\n\
         Отправлено: {}\nПолучено: {}\nБатарея: {}\n\n{}\n\n\
         Ctrl+C для выхода\n",
        s.host,
        s.os,
        ip,
        subnet,
        iface,
        users,
        s.cpu_usage_percent,
        percent_or_na(s.cpu_temp_celsius, "°C"),
        s.ram_usage_percent,
        s.disk_used_percent,
        human_bytes(s.bytes_sent),
        human_bytes(s.bytes_received),
        percent_or_na(s.battery_percent, "%"),
        s.timestamp.format("%Y-%m-%d %H:%M:%S"),
    )
}
