use crate::error::{ExtractError, Result, UserFriendlyError};
use crate::extractor::ShardFailure;
use crate::runner::RunReport;
use crate::scanner::{format_bytes, ShardArchive};
use crate::ui::progress::format_duration;
use console::{style, Emoji, Term};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputMode {
    Human,
    Json,
    Plain,
}

static CHECKMARK: Emoji = Emoji("✅ ", "✓ ");
static CROSS: Emoji = Emoji("❌ ", "✗ ");
static INFO: Emoji = Emoji("ℹ️  ", "i ");
static WARNING: Emoji = Emoji("⚠️  ", "! ");
static PACKAGE: Emoji = Emoji("📦 ", "> ");

pub struct OutputFormatter {
    mode: OutputMode,
    use_colors: bool,
    verbose_level: u8,
    quiet: bool,
}

impl OutputFormatter {
    pub fn new(mode: OutputMode, verbose: u8, quiet: bool) -> Self {
        let use_colors = match mode {
            OutputMode::Human => Term::stdout().features().colors_supported() && !quiet,
            _ => false,
        };

        Self {
            mode,
            use_colors,
            verbose_level: if quiet { 0 } else { verbose },
            quiet,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Human => self.print_human_message(MessageType::Success, message),
            OutputMode::Json => self.print_json_message("success", message),
            OutputMode::Plain => println!("SUCCESS: {}", message),
        }
    }

    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Human => self.print_human_message(MessageType::Error, message),
            OutputMode::Json => self.print_json_message("error", message),
            OutputMode::Plain => eprintln!("ERROR: {}", message),
        }
    }

    pub fn warning(&self, message: &str) {
        if self.should_show_message(0) {
            match self.mode {
                OutputMode::Human => self.print_human_message(MessageType::Warning, message),
                OutputMode::Json => self.print_json_message("warning", message),
                OutputMode::Plain => eprintln!("WARNING: {}", message),
            }
        }
    }

    pub fn info(&self, message: &str) {
        if self.should_show_message(1) {
            match self.mode {
                OutputMode::Human => self.print_human_message(MessageType::Info, message),
                OutputMode::Json => self.print_json_message("info", message),
                OutputMode::Plain => println!("INFO: {}", message),
            }
        }
    }

    /// `Extracting snapshot [src] -> [dst]`
    pub fn print_banner(&self, source_dir: &Path, dest_dir: &Path) {
        if self.quiet {
            return;
        }

        match self.mode {
            OutputMode::Human => {
                let line = banner_line(source_dir, dest_dir);
                if self.use_colors {
                    println!("{}{}", PACKAGE, style(line).bold());
                } else {
                    println!("{}", line);
                }
            }
            OutputMode::Json => self.print_json_object(&serde_json::json!({
                "type": "banner",
                "source": source_dir,
                "dest": dest_dir,
            })),
            OutputMode::Plain => println!("{}", banner_line(source_dir, dest_dir)),
        }
    }

    pub fn print_user_friendly_error(&self, error: &ExtractError) {
        self.error(&error.user_message());

        if let Some(suggestion) = error.suggestion() {
            match self.mode {
                OutputMode::Human => {
                    eprintln!();
                    if self.use_colors {
                        eprintln!(
                            "{}{}",
                            INFO,
                            style(format!("Suggestion: {}", suggestion)).cyan()
                        );
                    } else {
                        eprintln!("Suggestion: {}", suggestion);
                    }
                }
                OutputMode::Json => self.print_json_object(&serde_json::json!({
                    "type": "suggestion",
                    "message": suggestion
                })),
                OutputMode::Plain => eprintln!("SUGGESTION: {}", suggestion),
            }
        }
    }

    /// One line per failed shard, in arrival order. Printed even when quiet.
    pub fn print_failures(&self, failures: &[ShardFailure]) {
        for failure in failures {
            match self.mode {
                OutputMode::Json => self.print_json_object(&serde_json::json!({
                    "type": "shard_failure",
                    "shard": failure.shard,
                    "error": failure.error,
                })),
                _ => eprintln!("{}", self.failure_line(failure)),
            }
        }
    }

    pub fn print_run_report(&self, report: &RunReport) {
        match self.mode {
            OutputMode::Json => {
                let mut value = serde_json::to_value(report).unwrap_or_default();
                if let Some(object) = value.as_object_mut() {
                    object.insert("type".to_string(), serde_json::json!("report"));
                    object.insert("success".to_string(), serde_json::json!(report.is_success()));
                }
                self.print_json_object(&value);
            }
            OutputMode::Human | OutputMode::Plain => {
                self.print_failures(&report.failures);
                if let Some(problem) = &report.presentation_error {
                    self.warning(problem);
                }
                if report.cancelled {
                    self.warning("Extraction interrupted; the output directory may be incomplete");
                } else if report.failures.is_empty() {
                    self.info(&summary_line(report));
                } else {
                    self.error(&format!(
                        "{} of {} shard(s) failed",
                        report.failures.len(),
                        report.shards.len()
                    ));
                }
            }
        }
    }

    /// Lists what an extraction would read, one entry per shard.
    pub fn print_dry_run(&self, plan: &[(u32, Result<ShardArchive>)]) {
        match self.mode {
            OutputMode::Json => {
                for (shard, scanned) in plan {
                    let value = match scanned {
                        Ok(archive) => serde_json::json!({
                            "type": "dry_run",
                            "shard": shard,
                            "directory": archive.directory,
                            "chunks": archive.chunks.len(),
                            "bytes": archive.total_bytes(),
                        }),
                        Err(e) => serde_json::json!({
                            "type": "dry_run",
                            "shard": shard,
                            "error": e.to_string(),
                        }),
                    };
                    self.print_json_object(&value);
                }
            }
            OutputMode::Human | OutputMode::Plain => {
                self.print_separator();
                for (shard, scanned) in plan {
                    match scanned {
                        Ok(archive) => println!("  {}", archive.display_summary()),
                        Err(e) => {
                            let line = format!("  shard {}: {}", shard, e);
                            if self.use_colors {
                                println!("{}", style(line).red());
                            } else {
                                println!("{}", line);
                            }
                        }
                    }
                }
                self.print_separator();
            }
        }
    }

    pub fn print_separator(&self) {
        if self.quiet {
            return;
        }

        match self.mode {
            OutputMode::Human if self.use_colors => println!("{}", style("─".repeat(60)).dim()),
            OutputMode::Human | OutputMode::Plain => println!("{}", "-".repeat(60)),
            OutputMode::Json => {}
        }
    }

    fn failure_line(&self, failure: &ShardFailure) -> String {
        match self.mode {
            OutputMode::Human if self.use_colors => {
                format!("{}{}", CROSS, style(failure.to_string()).red())
            }
            OutputMode::Plain => format!("FAILED: {}", failure),
            _ => failure.to_string(),
        }
    }

    fn should_show_message(&self, min_verbose_level: u8) -> bool {
        !self.quiet && self.verbose_level >= min_verbose_level
    }

    fn print_human_message(&self, msg_type: MessageType, message: &str) {
        if self.use_colors {
            let (emoji, styled) = match msg_type {
                MessageType::Success => (CHECKMARK, style(message).green().bold()),
                MessageType::Error => (CROSS, style(message).red().bold()),
                MessageType::Warning => (WARNING, style(message).yellow().bold()),
                MessageType::Info => (INFO, style(message).cyan()),
            };
            match msg_type {
                MessageType::Success | MessageType::Info => println!("{}{}", emoji, styled),
                _ => eprintln!("{}{}", emoji, styled),
            }
        } else {
            let prefix = match msg_type {
                MessageType::Success => "✓",
                MessageType::Error => "✗",
                MessageType::Warning => "!",
                MessageType::Info => "i",
            };
            match msg_type {
                MessageType::Success | MessageType::Info => println!("{} {}", prefix, message),
                _ => eprintln!("{} {}", prefix, message),
            }
        }
    }

    fn print_json_message(&self, level: &str, message: &str) {
        self.print_json_object(&serde_json::json!({
            "type": "message",
            "level": level,
            "message": message,
            "timestamp": chrono::Utc::now().to_rfc3339()
        }));
    }

    fn print_json_object(&self, obj: &serde_json::Value) {
        println!(
            "{}",
            serde_json::to_string(obj).unwrap_or_else(|_| "{}".to_string())
        );
    }
}

#[derive(Debug, Clone, Copy)]
enum MessageType {
    Success,
    Error,
    Warning,
    Info,
}

fn banner_line(source_dir: &Path, dest_dir: &Path) -> String {
    format!(
        "Extracting snapshot [{}] -> [{}]",
        source_dir.display(),
        dest_dir.display()
    )
}

fn summary_line(report: &RunReport) -> String {
    format!(
        "Extracted {} shard(s) in {}",
        report.shards.len(),
        format_duration(report.duration)
    )
}

/// Human-readable total of a dry-run plan.
pub fn plan_total(plan: &[(u32, Result<ShardArchive>)]) -> String {
    let bytes: u64 = plan
        .iter()
        .filter_map(|(_, scanned)| scanned.as_ref().ok())
        .map(ShardArchive::total_bytes)
        .sum();
    format_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::ChunkFile;
    use chrono::Utc;
    use std::path::PathBuf;
    use std::time::Duration;

    fn report(failures: Vec<ShardFailure>) -> RunReport {
        RunReport {
            source_dir: PathBuf::from("/snapshot"),
            dest_dir: PathBuf::from("/rocks"),
            shards: vec![0, 1, 2],
            failures,
            cancelled: false,
            presentation_error: None,
            started_at: Utc::now(),
            duration: Duration::from_secs(90),
        }
    }

    #[test]
    fn test_quiet_mode() {
        let formatter = OutputFormatter::new(OutputMode::Human, 2, true);
        assert_eq!(formatter.verbose_level, 0);
        assert!(!formatter.should_show_message(0));
        assert!(!formatter.use_colors);
    }

    #[test]
    fn test_should_show_message() {
        let formatter = OutputFormatter::new(OutputMode::Plain, 1, false);
        assert!(formatter.should_show_message(0));
        assert!(formatter.should_show_message(1));
        assert!(!formatter.should_show_message(2));
    }

    #[test]
    fn test_banner_line() {
        assert_eq!(
            banner_line(Path::new("/snapshot"), Path::new("/rocks")),
            "Extracting snapshot [/snapshot] -> [/rocks]"
        );
    }

    #[test]
    fn test_failure_lines() {
        let failure = ShardFailure::new(1, "archive missing: /snapshot/shard-1");

        let plain = OutputFormatter::new(OutputMode::Plain, 0, false);
        assert_eq!(
            plain.failure_line(&failure),
            "FAILED: shard 1: archive missing: /snapshot/shard-1"
        );

        let json = OutputFormatter::new(OutputMode::Json, 0, false);
        assert_eq!(json.failure_line(&failure), "shard 1: archive missing: /snapshot/shard-1");
    }

    #[test]
    fn test_summary_line() {
        assert_eq!(summary_line(&report(Vec::new())), "Extracted 3 shard(s) in 1m 30s");
    }

    #[test]
    fn test_plan_total_skips_missing_shards() {
        let archive = ShardArchive {
            shard: 0,
            directory: PathBuf::from("/snapshot/shard-0"),
            chunks: vec![ChunkFile {
                path: PathBuf::from("/snapshot/shard-0/chunk_0.bin"),
                filename: "chunk_0.bin".to_string(),
                index: 0,
                size: 2048,
            }],
        };
        let plan = vec![
            (0, Ok(archive)),
            (
                1,
                Err(ExtractError::ArchiveMissing {
                    shard: 1,
                    path: PathBuf::from("/snapshot/shard-1"),
                }),
            ),
        ];

        assert_eq!(plan_total(&plan), "2.0 KB");
    }
}
