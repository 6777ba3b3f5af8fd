use crate::screen::{Screen, CLEAR_SCREEN};
use crate::snapshot::Snapshot;
use std::collections::VecDeque;
use std::io::{self, Write};

const LABEL_WIDTH: usize = 7;
const GAP: &str = "    ";

/// Rolling history of one percent metric.
#[derive(Debug, Clone)]
pub struct Series {
    title: &'static str,
    capacity: usize,
    points: VecDeque<f64>,
}

impl Series {
    pub fn new(title: &'static str, capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            title,
            capacity,
            points: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, value: f64) {
        if self.points.len() == self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(value);
    }

    pub fn last(&self) -> Option<f64> {
        self.points.back().copied()
    }
}

/// Renders a line chart of `points` on a fixed `min..=max` scale.
///
/// The result has `height + 1` rows: a labelled axis on the left and one
/// column per point.
pub fn plot(points: &[f64], height: usize, min: f64, max: f64) -> Vec<String> {
    let height = height.max(1);
    let span = if max > min { max - min } else { 1.0 };
    let width = LABEL_WIDTH + 1 + points.len();
    let mut grid = vec![vec![' '; width]; height + 1];

    let row_of = |v: f64| -> usize {
        let clamped = v.clamp(min, min + span);
        (((clamped - min) / span) * height as f64).round() as usize
    };

    for (level, row) in grid.iter_mut().enumerate() {
        let value = max - (level as f64) * span / height as f64;
        let label = format!("{value:>width$.0}", width = LABEL_WIDTH - 1);
        for (i, ch) in label.chars().take(LABEL_WIDTH).enumerate() {
            row[i] = ch;
        }
        row[LABEL_WIDTH] = if level == height { '┼' } else { '┤' };
    }

    let col0 = LABEL_WIDTH + 1;
    for (x, pair) in points.windows(2).enumerate() {
        let y0 = row_of(pair[0]);
        let y1 = row_of(pair[1]);
        let col = col0 + x;
        if y0 == y1 {
            grid[height - y0][col] = '─';
            continue;
        }
        let (lo, hi) = (y0.min(y1), y0.max(y1));
        grid[height - y1][col] = if y0 > y1 { '╰' } else { '╭' };
        grid[height - y0][col] = if y0 > y1 { '╮' } else { '╯' };
        for y in lo + 1..hi {
            grid[height - y][col] = '│';
        }
    }
    if let Some(&last) = points.last() {
        let col = col0 + points.len() - 1;
        grid[height - row_of(last)][col] = '─';
    }

    grid.into_iter()
        .map(|row| row.into_iter().collect::<String>())
        .collect()
}

/// Joins blocks of lines horizontally, padding each block to its own width.
pub fn side_by_side(blocks: &[Vec<String>]) -> Vec<String> {
    let rows = blocks.iter().map(Vec::len).max().unwrap_or(0);
    let widths: Vec<usize> = blocks
        .iter()
        .map(|b| b.iter().map(|l| l.chars().count()).max().unwrap_or(0))
        .collect();

    (0..rows)
        .map(|r| {
            blocks
                .iter()
                .zip(&widths)
                .map(|(block, &w)| {
                    let line = block.get(r).map(String::as_str).unwrap_or("");
                    let pad = w.saturating_sub(line.chars().count());
                    format!("{line}{}", " ".repeat(pad))
                })
                .collect::<Vec<_>>()
                .join(GAP)
                .trim_end()
                .to_string()
        })
        .collect()
}

pub struct ChartScreen<W: Write = io::Stdout> {
    out: W,
    height: usize,
    series: [Series; 3],
}

impl ChartScreen {
    pub fn stdout(history: usize, height: usize) -> Self {
        Self::new(io::stdout(), history, height)
    }
}

impl<W: Write> ChartScreen<W> {
    pub fn new(out: W, history: usize, height: usize) -> Self {
        Self {
            out,
            height,
            series: [
                Series::new("CPU", history),
                Series::new("RAM", history),
                Series::new("Диск", history),
            ],
        }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn render(&self) -> String {
        let blocks: Vec<Vec<String>> = self
            .series
            .iter()
            .map(|s| {
                let mut block = vec![format!(
                    "{}: {}",
                    s.title,
                    s.last()
                        .map(|v| format!("{v:.1}%"))
                        .unwrap_or_else(|| "-".to_string())
                )];
                let points: Vec<f64> = s.points.iter().copied().collect();
                block.extend(plot(&points, self.height, 0.0, 100.0));
                block
            })
            .collect();

        let mut text = side_by_side(&blocks).join("\n");
        text.push('\n');
        text
    }
}

impl<W: Write> Screen for ChartScreen<W> {
    fn draw(&mut self, snapshot: &Snapshot) -> io::Result<()> {
        self.series[0].push(snapshot.cpu_usage_percent);
        self.series[1].push(snapshot.ram_usage_percent);
        self.series[2].push(snapshot.disk_used_percent);

        let text = format!(
            "{CLEAR_SCREEN}{} | {}\n\n{}\nCtrl+C для выхода\n",
            snapshot.host,
            snapshot.timestamp.format("%H:%M:%S"),
            self.render()
        );
        self.out.write_all(text.as_bytes())?;
        self.out.flush()
    }

    fn exit_notice(&mut self) -> io::Result<()> {
        writeln!(self.out, "\nОстановка: сохраняем накопленные данные...")?;
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::fixtures::{at, snapshot};

    #[test]
    fn series_keeps_only_latest_points() {
        let mut s = Series::new("CPU", 3);
        for v in [1.0, 2.0, 3.0, 4.0] {
            s.push(v);
        }
        assert_eq!(s.points.len(), 3);
        assert_eq!(s.points.front().copied(), Some(2.0));
        assert_eq!(s.last(), Some(4.0));
    }

    #[test]
    fn plot_draws_rise_and_flat() {
        let rows = plot(&[0.0, 100.0, 100.0], 2, 0.0, 100.0);
        assert_eq!(rows.len(), 3);
        let cols: Vec<Vec<char>> = rows.iter().map(|r| r.chars().collect()).collect();
        let c = LABEL_WIDTH + 1;

        assert_eq!(cols[2][c], '╯');
        assert_eq!(cols[1][c], '│');
        assert_eq!(cols[0][c], '╭');
        assert_eq!(cols[0][c + 1], '─');
        assert_eq!(cols[0][c + 2], '─');
        assert!(rows[0].trim_start().starts_with("100"));
        assert!(rows[2].trim_start().starts_with('0'));
    }

    #[test]
    fn plot_of_single_point_is_a_dot_on_its_row() {
        let rows = plot(&[50.0], 4, 0.0, 100.0);
        let mid: Vec<char> = rows[2].chars().collect();
        assert_eq!(mid[LABEL_WIDTH + 1], '─');
    }

    #[test]
    fn blocks_are_aligned_horizontally() {
        let a = vec!["ab".to_string(), "a".to_string()];
        let b = vec!["x".to_string(), "yz".to_string(), "w".to_string()];
        let rows = side_by_side(&[a, b]);
        assert_eq!(rows, vec!["ab    x", "a     yz", "      w"]);
    }

    #[test]
    fn chart_screen_renders_three_charts() {
        let mut screen = ChartScreen::new(Vec::new(), 10, 4);
        screen
            .draw(&snapshot(at((2026, 10, 19), (10, 0, 0))))
            .expect("draw");
        let text = String::from_utf8(screen.into_inner()).expect("utf8");
        let title = text
            .lines()
            .find(|l| l.contains("CPU:"))
            .expect("title row");
        assert!(title.contains("RAM: 63.2%"));
        assert!(title.contains("Диск: 41.0%"));
    }
}
