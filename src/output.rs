//! Console reporting for index builds

use crate::build::{BatchReport, BuildJob, BuildObserver, JobOutcome, JobReport};
use crate::utils::progress::{ProgressBar, ProgressStyle};
use std::io::{self, IsTerminal, Write};
use std::path::Path;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Prints build progress and coloured outcome lines to stdout
pub struct ConsoleReporter {
    stdout: StandardStream,
    show_progress: bool,
    bar: Option<ProgressBar>,
}

impl ConsoleReporter {
    /// With `show_progress` off, or when the bar cannot be drawn, progress
    /// is printed as plain `[Building]` lines instead
    pub fn new(color: bool, show_progress: bool) -> Self {
        let choice = if color {
            ColorChoice::Auto
        } else {
            ColorChoice::Never
        };
        Self {
            stdout: StandardStream::stdout(choice),
            show_progress,
            bar: None,
        }
    }

    fn print_tagged(&mut self, tag: &str, color: Color, message: &str) -> io::Result<()> {
        self.stdout
            .set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true))?;
        write!(self.stdout, "{}", tag)?;
        self.stdout.reset()?;
        writeln!(self.stdout, " {}", message)
    }

    fn print_plain(&mut self, message: &str) -> io::Result<()> {
        writeln!(self.stdout, "{}", message)
    }

    fn clear_bar(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

fn report_io(result: io::Result<()>) {
    if let Err(e) = result {
        log::warn!("failed to write to stdout: {}", e);
    }
}

impl BuildObserver for ConsoleReporter {
    fn job_started(&mut self, job: &BuildJob, total: usize) {
        if !self.show_progress {
            return;
        }
        let pb = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::default_bar().template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
        ) {
            pb.set_style(style.progress_chars("█▓▒░  "));
        }
        pb.set_message(format!("Building {}", job.name()));
        // A hidden bar (no terminal) falls back to `[Building]` lines
        if !pb.is_hidden() {
            self.bar = Some(pb);
        }
    }

    fn progress(&mut self, _job: &BuildJob, inserted: usize, total: usize) {
        match &self.bar {
            Some(bar) => bar.set_position(inserted as u64),
            None => report_io(self.print_plain(&format!("[Building] - {}/{}", inserted, total))),
        }
    }

    fn job_finished(&mut self, report: &JobReport) {
        self.clear_bar();
        let name = report
            .destination
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let result = match &report.outcome {
            JobOutcome::Skipped => self.print_tagged(
                "[Skip]",
                Color::Yellow,
                "Output exists and overwrite not enabled, skip building index.",
            ),
            JobOutcome::Succeeded { count } => self.print_tagged(
                "[Done]",
                Color::Green,
                &format!("{} index with {} records build complete.", name, count),
            ),
            JobOutcome::Failed { error } => {
                self.print_tagged("[Error]", Color::Red, &error.to_string())
            }
        };
        report_io(result);
    }

    fn batch_file_started(&mut self, position: usize, total: usize, source: &Path) {
        report_io(self.print_plain(&format!(
            "[{}/{}] Building index for file {}",
            position,
            total,
            source.display()
        )));
    }

    fn batch_file_finished(&mut self, position: usize, total: usize, source: &Path) {
        report_io(self.print_plain(&format!(
            "[{}/{}] Built index for file {}",
            position,
            total,
            source.display()
        )));
    }

    fn batch_finished(&mut self, report: &BatchReport) {
        report_io(self.print_plain(&format!(
            "Building index completed. {} built, {} skipped, {} failed.",
            report.succeeded(),
            report.skipped(),
            report.failed()
        )));
    }
}

/// Print a single `[Error]` line outside of any job
pub fn print_error(message: &str) {
    let mut reporter = ConsoleReporter::new(io::stdout().is_terminal(), false);
    report_io(reporter.print_tagged("[Error]", Color::Red, message));
}
