use colored::*;
use log::{Level, LevelFilter, Log, Metadata, Record};
use promptd_core::paths;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::sync::{Mutex, PoisonError};

// Colors that stay readable when dimmed
const TARGET_COLORS: &[Color] = &[
    Color::Green,
    Color::Yellow,
    Color::Blue,
    Color::Magenta,
    Color::Cyan,
];

pub struct PromptdLogger {
    level: LevelFilter,
    log_file: Mutex<Option<File>>,
    target_colors: Mutex<HashMap<String, Color>>,
}

impl PromptdLogger {
    pub fn new(level: LevelFilter) -> Self {
        Self {
            level,
            log_file: Mutex::new(open_log_file()),
            target_colors: Mutex::new(HashMap::new()),
        }
    }

    fn color_for_target(&self, target: &str) -> Color {
        let mut colors = self
            .target_colors
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let next = colors.len() % TARGET_COLORS.len();
        *colors
            .entry(target.to_string())
            .or_insert(TARGET_COLORS[next])
    }

    fn format_colored(&self, record: &Record) -> String {
        let level = level_tag(record.level());
        let target = short_target(record.target());
        let message = record.args().to_string();

        let line = match record.level() {
            Level::Error => return format!("{level} [{target}] {message}").red().bold().to_string(),
            Level::Warn => {
                return format!("{level} [{target}] {message}")
                    .yellow()
                    .bold()
                    .to_string()
            }
            Level::Info => level.green().bold(),
            Level::Debug => level.blue().bold(),
            Level::Trace => level.white().bold(),
        };

        let target = target.color(self.color_for_target(target)).dimmed();
        format!("{line} [{target}] {message}")
    }
}

fn open_log_file() -> Option<File> {
    paths::ensure_data_dir()?;
    let path = paths::log_file_path()?;
    match OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&path)
    {
        Ok(file) => Some(file),
        Err(e) => {
            eprintln!("Warning: Failed to open log file at {}: {e}", path.display());
            None
        }
    }
}

fn level_tag(level: Level) -> &'static str {
    match level {
        Level::Error => "[E]",
        Level::Warn => "[W]",
        Level::Info => "[I]",
        Level::Debug => "[D]",
        Level::Trace => "[T]",
    }
}

fn short_target(target: &str) -> &str {
    target.rsplit("::").next().unwrap_or(target)
}

fn format_plain(record: &Record) -> String {
    format!(
        "{} [{}] {}",
        level_tag(record.level()),
        short_target(record.target()),
        record.args()
    )
}

/// Quiet keeps info and above, the default adds debug, verbose adds trace.
pub fn level_filter(quiet: bool, verbose: bool) -> LevelFilter {
    if quiet {
        LevelFilter::Info
    } else if verbose {
        LevelFilter::Trace
    } else {
        LevelFilter::Debug
    }
}

impl Log for PromptdLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        // Stdout carries requester notices
        eprintln!("{}", self.format_colored(record));

        let mut file = self.log_file.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(file) = file.as_mut() {
            let _ = writeln!(file, "{}", format_plain(record));
        }
    }

    fn flush(&self) {
        let mut file = self.log_file.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(file) = file.as_mut() {
            let _ = file.flush();
        }
    }
}

pub fn init_logger(quiet: bool, verbose: bool) -> Result<(), log::SetLoggerError> {
    let level = level_filter(quiet, verbose);
    log::set_boxed_logger(Box::new(PromptdLogger::new(level)))?;
    log::set_max_level(level);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_filter() {
        assert_eq!(level_filter(true, false), LevelFilter::Info);
        assert_eq!(level_filter(false, true), LevelFilter::Trace);
        assert_eq!(level_filter(false, false), LevelFilter::Debug);
    }

    #[test]
    fn test_short_target() {
        assert_eq!(short_target("promptd_core::coordinator"), "coordinator");
        assert_eq!(short_target("promptd"), "promptd");
    }

    #[test]
    fn test_format_plain() {
        let line = format_plain(
            &Record::builder()
                .args(format_args!("Dismissed uid:7@3, 0 remaining"))
                .level(Level::Info)
                .target("promptd_core::coordinator")
                .build(),
        );
        assert_eq!(line, "[I] [coordinator] Dismissed uid:7@3, 0 remaining");
    }
}
