use std::io::{self, Write};

use serde::Serialize;

use crate::app::{ProgressEvent, ProgressSink, ValidationReport};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Text,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_report(report: &ValidationReport) -> io::Result<()> {
        Self::print_json(report)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Plain progress lines on stderr, keeping stdout free for the report.
pub struct StderrProgress;

impl ProgressSink for StderrProgress {
    fn event(&self, event: ProgressEvent) {
        eprintln!("{}", event.message);
    }
}

pub fn print_report_text(report: &ValidationReport) {
    for failure in &report.failures {
        match &failure.expected {
            Some(expected) => println!(
                "{} failed: expected {expected}, got {}",
                failure.file, failure.actual
            ),
            None => println!(
                "{} failed: no published checksum for {} file {}",
                failure.file, failure.run, failure.file_index
            ),
        }
    }
    println!(
        "{}: {} files checked, md5 failed count: {}",
        report.project,
        report.files_checked,
        report.failure_count()
    );
    if report.passed() {
        println!("{}: project download success!", report.project);
    }
}
