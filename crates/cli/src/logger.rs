use crossterm::terminal::{Clear, ClearType};
use crossterm::{cursor, execute};
use owo_colors::OwoColorize;
use std::io::Write;
use std::{
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    sync::{Arc, Once},
    time::Duration,
};
use tracing::{Event, Subscriber};
use tracing_subscriber::field::Visit;
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::Registry;

use saturn::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
}

impl LogLevel {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "error" => Some(Self::Error),
            "warn" | "warning" => Some(Self::Warn),
            "info" => Some(Self::Info),
            "debug" => Some(Self::Debug),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct CliLogger {
    pub level: LogLevel,
    spinner_step: AtomicUsize,
    loading_active: AtomicBool,
}

#[derive(Debug, Clone, Copy)]
enum LogState {
    Success,
    Warn,
    Failed,
    Debug,
}

impl CliLogger {
    pub fn new(level: &str) -> Result<Self> {
        let level = LogLevel::parse(level).ok_or(SaturnError::Validation(format!(
            "invalid log level: {level}. expected one of: error, warn, info, debug"
        )))?;

        Ok(Self::with_level(level))
    }

    pub fn with_level(level: LogLevel) -> Self {
        Self {
            level,
            spinner_step: AtomicUsize::new(0),
            loading_active: AtomicBool::new(false),
        }
    }

    fn log(&self, level: LogLevel, state: LogState, message: impl AsRef<str>) {
        if level > self.level {
            return;
        }

        self.clear_loading_line();
        let icon = self.icon(state);
        println!("{} {}", icon, message.as_ref());
    }

    pub fn success(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Info, LogState::Success, message);
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Warn, LogState::Warn, message);
    }

    pub fn failed(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Error, LogState::Failed, message);
    }

    pub fn debug(&self, context: impl AsRef<str>, message: impl AsRef<str>) {
        self.log(
            LogLevel::Debug,
            LogState::Debug,
            format!(
                "{:>10} {}",
                context.as_ref().bold().bright_purple(),
                message.as_ref()
            ),
        );
    }

    /// plain line on stdout, unaffected by the log level.
    pub fn line(&self, message: impl AsRef<str>) {
        self.clear_loading_line();
        println!("{}", message.as_ref());
    }

    fn icon(&self, state: LogState) -> Box<dyn std::fmt::Display> {
        match state {
            LogState::Success => Box::new("✓".green()),
            LogState::Warn => Box::new("!".yellow()),
            LogState::Failed => Box::new("✗".red()),
            LogState::Debug => Box::new("λ".cyan()),
        }
    }

    pub async fn while_loading<F, T>(&self, message: impl Into<String>, future: F) -> T
    where
        F: Future<Output = T>,
    {
        if LogLevel::Info > self.level {
            return future.await;
        }

        let message = message.into();
        let mut ticker = tokio::time::interval(Duration::from_millis(120));
        let mut future = Box::pin(future);

        loop {
            tokio::select! {
                result = &mut future => {
                    self.clear_loading_line();
                    return result;
                }
                _ = ticker.tick() => {
                    self.draw_loading_frame(&message);
                }
            }
        }
    }

    fn draw_loading_frame(&self, message: &str) {
        const FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
        let idx = self.spinner_step.fetch_add(1, Ordering::Relaxed);
        let frame = FRAMES[idx % FRAMES.len()].yellow();

        let mut stdout = std::io::stdout();
        self.loading_active.store(true, Ordering::Relaxed);
        let _ = execute!(
            stdout,
            cursor::MoveToColumn(0),
            Clear(ClearType::CurrentLine)
        );
        let _ = write!(stdout, "{frame} {message}");
        let _ = stdout.flush();
    }

    fn clear_loading_line(&self) {
        if self.loading_active.swap(false, Ordering::Relaxed) {
            let mut stdout = std::io::stdout();
            let _ = execute!(
                stdout,
                cursor::MoveToColumn(0),
                Clear(ClearType::CurrentLine)
            );
            let _ = stdout.flush();
        }
    }
}

/// message and key-value fields of one library event, flattened into a line.
#[derive(Default)]
struct TraceLine {
    message: Option<String>,
    fields: Vec<String>,
}

impl Visit for TraceLine {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.fields.push(format!("{}={value}", field.name()));
        }
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{value:?}"));
        } else {
            self.fields.push(format!("{}={value:?}", field.name()));
        }
    }
}

impl std::fmt::Display for TraceLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message.as_deref().unwrap_or("event"))?;
        for field in &self.fields {
            write!(f, " {}", field.dimmed())?;
        }
        Ok(())
    }
}

/// last path segment of a `saturn*` target, `None` for foreign crates.
fn saturn_module(target: &str) -> Option<&str> {
    if !target.starts_with("saturn") {
        return None;
    }
    target.rsplit("::").next()
}

/// forwards `saturn*` tracing events to the cli logger as debug lines.
struct CliTracingLayer {
    logger: Arc<CliLogger>,
}

impl<S> Layer<S> for CliTracingLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let Some(module) = saturn_module(event.metadata().target()) else {
            return;
        };

        let mut line = TraceLine::default();
        event.record(&mut line);
        self.logger.debug(module, line.to_string());
    }
}

/// installs the forwarding layer once; a no-op below debug level.
pub fn init_tracing(logger: Arc<CliLogger>) {
    static INIT: Once = Once::new();

    if logger.level < LogLevel::Debug {
        return;
    }

    INIT.call_once(|| {
        let subscriber = Registry::default().with(CliTracingLayer {
            logger: Arc::clone(&logger),
        });

        if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
            logger.warn(format!("tracing already initialized: {err}"));
        }
    });
}
