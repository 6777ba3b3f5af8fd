pub mod chart;
pub mod dashboard;

use crate::snapshot::Snapshot;
use std::io;

pub use chart::ChartScreen;
pub use dashboard::Dashboard;

pub const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";
pub const NOT_AVAILABLE: &str = "н/д";

/// Console presentation of each snapshot.
pub trait Screen {
    fn draw(&mut self, snapshot: &Snapshot) -> io::Result<()>;

    fn exit_notice(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<S: Screen + ?Sized> Screen for Box<S> {
    fn draw(&mut self, snapshot: &Snapshot) -> io::Result<()> {
        (**self).draw(snapshot)
    }

    fn exit_notice(&mut self) -> io::Result<()> {
        (**self).exit_notice()
    }
}

/// Draws nothing. Used when the display is switched off.
#[derive(Debug, Default)]
pub struct Quiet;

impl Screen for Quiet {
    fn draw(&mut self, _snapshot: &Snapshot) -> io::Result<()> {
        Ok(())
    }
}

pub fn human_bytes(v: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = 1024.0 * 1024.0;
    const GB: f64 = 1024.0 * 1024.0 * 1024.0;
    const TB: f64 = 1024.0 * 1024.0 * 1024.0 * 1024.0;

    let vf = v as f64;
    if vf >= TB {
        format!("{:.2} TB", vf / TB)
    } else if vf >= GB {
        format!("{:.2} GB", vf / GB)
    } else if vf >= MB {
        format!("{:.2} MB", vf / MB)
    } else if vf >= KB {
        format!("{:.2} KB", vf / KB)
    } else {
        format!("{} B", v)
    }
}

pub fn percent_or_na(value: Option<f64>, suffix: &str) -> String {
    value
        .map(|v| format!("{v:.1}{suffix}"))
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_scale_by_1024() {
        assert_eq!(human_bytes(512), "512 B");
        assert_eq!(human_bytes(1_253_656), "1.20 MB");
        assert_eq!(human_bytes(3 * 1024 * 1024 * 1024), "3.00 GB");
        assert_eq!(human_bytes(2048), "2.00 KB");
    }

    #[test]
    fn missing_values_render_as_na() {
        assert_eq!(percent_or_na(None, "%"), NOT_AVAILABLE);
        assert_eq!(percent_or_na(Some(47.3), "°C"), "47.3°C");
    }
}
