use std::io::Write;
use std::time::{Duration, Instant};

use crossterm::{cursor::*, execute, terminal::*};
use owo_colors::OwoColorize;
use saturn_downloader::{DownloadEvent, TaskState};

use crate::utils::*;

#[derive(Debug, Clone)]
struct Row {
    label: String,
    started_at: Option<Instant>,
    downloaded: u64,
    total: Option<u64>,
    status: RowStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum RowStatus {
    Waiting,
    Downloading,
    Done,
    Failed,
    Cancelled,
}

/// live view of several downloads, one line per episode.
pub struct DownloadProgressRenderer {
    enabled: bool,
    drawn_lines: u16,
    spinner_step: usize,
    rows: Vec<Row>,
}

impl DownloadProgressRenderer {
    pub fn new(enabled: bool, labels: impl IntoIterator<Item = String>) -> Self {
        let rows = labels
            .into_iter()
            .map(|label| Row {
                label,
                started_at: None,
                downloaded: 0,
                total: None,
                status: RowStatus::Waiting,
            })
            .collect();

        Self {
            enabled,
            drawn_lines: 0,
            spinner_step: 0,
            rows,
        }
    }

    pub fn handle(&mut self, idx: usize, event: DownloadEvent) {
        let Some(row) = self.rows.get_mut(idx) else {
            return;
        };

        match event {
            DownloadEvent::Started { total_bytes } => {
                row.total = total_bytes;
                row.downloaded = 0;
                row.started_at = Some(Instant::now());
                row.status = RowStatus::Downloading;
            }
            DownloadEvent::Progress {
                downloaded_bytes,
                total_bytes,
                elapsed,
            } => {
                row.total = total_bytes;
                row.downloaded = downloaded_bytes;
                row.started_at = Instant::now().checked_sub(elapsed);
                row.status = RowStatus::Downloading;
            }
            DownloadEvent::Finished {
                downloaded_bytes,
                elapsed,
            } => {
                row.downloaded = downloaded_bytes;
                row.total = Some(downloaded_bytes);
                row.started_at = Instant::now().checked_sub(elapsed);
                row.status = RowStatus::Done;
            }
        }
    }

    /// records the terminal state of a task once it settles.
    pub fn settle(&mut self, idx: usize, state: &TaskState) {
        if let Some(row) = self.rows.get_mut(idx) {
            row.status = match state {
                TaskState::Succeeded => RowStatus::Done,
                TaskState::Cancelled => RowStatus::Cancelled,
                TaskState::Failed(_) => RowStatus::Failed,
                TaskState::Pending | TaskState::Running => return,
            };
        }
    }

    pub fn tick(&mut self) {
        if !self.enabled || self.rows.is_empty() {
            return;
        }

        self.spinner_step = self.spinner_step.wrapping_add(1);
        let lines: Vec<String> = self.rows.iter().map(|row| self.render_row(row)).collect();

        let mut stdout = std::io::stdout();
        if self.drawn_lines > 0 {
            let _ = execute!(stdout, MoveUp(self.drawn_lines), Clear(ClearType::FromCursorDown));
        }
        for line in &lines {
            let _ = writeln!(stdout, "{line}");
        }
        let _ = stdout.flush();
        self.drawn_lines = lines.len().min(u16::MAX as usize) as u16;
    }

    fn render_row(&self, row: &Row) -> String {
        const FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

        let icon = match row.status {
            RowStatus::Waiting => "·".dimmed().to_string(),
            RowStatus::Downloading => FRAMES[self.spinner_step % FRAMES.len()].cyan().to_string(),
            RowStatus::Done => "✓".green().to_string(),
            RowStatus::Failed => "✗".red().to_string(),
            RowStatus::Cancelled => "-".yellow().to_string(),
        };

        let elapsed = row
            .started_at
            .map(|started| started.elapsed())
            .unwrap_or(Duration::ZERO);

        let ratio = match row.total {
            Some(0) => 1.0,
            Some(total) => row.downloaded as f64 / total as f64,
            None => 0.0,
        }
        .clamp(0.0, 1.0);

        let bar_width = 24.0;
        let filled = (ratio * bar_width).round();
        let bar = format!(
            "[{}{}]",
            "█".repeat(filled as usize),
            " ".repeat((bar_width - filled) as usize)
        );

        let speed = if elapsed.as_secs_f64() > 0.0 {
            (row.downloaded as f64 / elapsed.as_secs_f64()) as u64
        } else {
            0
        };

        let eta = row
            .total
            .and_then(|total| estimate_eta(row.downloaded, total, elapsed))
            .map(format_duration)
            .unwrap_or_else(|| "--:--".to_string());

        let total = row
            .total
            .map(format_bytes)
            .unwrap_or_else(|| "unknown".to_string());

        format!(
            "{icon} {} {} {} / {} {} eta {}",
            fit_cell(&row.label, 14, false).bold(),
            bar.green(),
            fit_cell(&format_bytes(row.downloaded), 10, true).yellow(),
            fit_cell(&total, 10, false).dimmed(),
            fit_cell(&format!("{}/s", format_bytes(speed)), 12, true).cyan(),
            eta.magenta()
        )
    }
}

fn fit_cell(text: &str, width: usize, align_right: bool) -> String {
    let clipped: String = text.chars().take(width).collect();

    if align_right {
        format!("{clipped:>width$}")
    } else {
        format!("{clipped:<width$}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_cell_clips_and_pads() {
        assert_eq!(fit_cell("episode", 4, false), "epis");
        assert_eq!(fit_cell("ab", 4, true), "  ab");
        assert_eq!(fit_cell("ab", 4, false), "ab  ");
    }

    #[test]
    fn events_update_matching_row() {
        let mut renderer =
            DownloadProgressRenderer::new(false, ["Episode 1".to_string(), "Episode 2".to_string()]);

        renderer.handle(1, DownloadEvent::Started { total_bytes: Some(100) });
        renderer.handle(
            1,
            DownloadEvent::Progress {
                downloaded_bytes: 40,
                total_bytes: Some(100),
                elapsed: Duration::from_secs(1),
            },
        );
        renderer.handle(7, DownloadEvent::Started { total_bytes: None });

        assert_eq!(renderer.rows[0].status, RowStatus::Waiting);
        assert_eq!(renderer.rows[1].status, RowStatus::Downloading);
        assert_eq!(renderer.rows[1].downloaded, 40);

        renderer.settle(1, &TaskState::Failed("boom".into()));
        assert_eq!(renderer.rows[1].status, RowStatus::Failed);
        renderer.settle(0, &TaskState::Running);
        assert_eq!(renderer.rows[0].status, RowStatus::Waiting);
    }
}
