use std::path::PathBuf;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::Parser;
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use ena_fastq_validator::app::{App, ValidateOptions};
use ena_fastq_validator::catalog::default_cache_path;
use ena_fastq_validator::domain::ProjectAccession;
use ena_fastq_validator::ena::EnaHttpClient;
use ena_fastq_validator::error::ValidatorError;
use ena_fastq_validator::eutils::EutilsHttpClient;
use ena_fastq_validator::output::{JsonOutput, OutputMode, StderrProgress, print_report_text};

#[derive(Parser)]
#[command(name = "ena-validate")]
#[command(about = "Validate downloaded FASTQ files against ENA-published MD5 checksums")]
#[command(version, author)]
struct Cli {
    /// BioProject accessions, one per directory
    #[arg(short = 'i', long = "accession", required = true, num_args = 1..)]
    accessions: Vec<String>,

    /// FASTQ directories, one per accession
    #[arg(short = 'd', long = "dir", required = true, num_args = 1..)]
    dirs: Vec<PathBuf>,

    /// Query ENA for every run instead of consulting the local cache
    #[arg(long)]
    no_cache: bool,

    /// Override the checksum cache location (default: ~/.ena_fastq_validator)
    #[arg(long)]
    cache_path: Option<Utf8PathBuf>,

    /// Emit reports as JSON on stdout
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(report) => {
            eprintln!("{report:?}");
            ExitCode::from(1)
        }
    }
}

fn map_exit_code(error: &ValidatorError) -> u8 {
    match error {
        ValidatorError::RemoteUnavailable { .. }
        | ValidatorError::MalformedResponse(_)
        | ValidatorError::RemoteError(_)
        | ValidatorError::EutilsHttp(_)
        | ValidatorError::EnaHttp(_) => 3,
        ValidatorError::NamingConventionViolation(_) => 2,
        _ => 1,
    }
}

fn run() -> miette::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if cli.accessions.len() != cli.dirs.len() {
        return Err(miette::Report::msg(format!(
            "{} accessions given for {} directories; counts must match",
            cli.accessions.len(),
            cli.dirs.len()
        )));
    }

    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };

    let cache_path = match cli.cache_path {
        Some(path) => path,
        None => default_cache_path().into_diagnostic()?,
    };
    let options = ValidateOptions {
        use_cache: !cli.no_cache,
    };

    let resolver = EutilsHttpClient::new().into_diagnostic()?;
    let ena = EnaHttpClient::new().into_diagnostic()?;
    let app = App::new(resolver, ena, cache_path);

    // Each (accession, directory) pair validates independently: a remote or
    // naming failure aborts its own pair, never its siblings.
    let mut exit = 0u8;
    for (accession, dir) in cli.accessions.iter().zip(&cli.dirs) {
        let project: ProjectAccession = match accession.parse() {
            Ok(project) => project,
            Err(err) => {
                eprintln!("{accession}: {err}");
                exit = exit.max(map_exit_code(&err));
                continue;
            }
        };
        let result = match output_mode {
            OutputMode::Json => app.validate(&project, dir, options, &JsonOutput),
            OutputMode::Text => app.validate(&project, dir, options, &StderrProgress),
        };
        match result {
            Ok(report) => {
                match output_mode {
                    OutputMode::Json => JsonOutput::print_report(&report).into_diagnostic()?,
                    OutputMode::Text => print_report_text(&report),
                }
                if !report.passed() {
                    exit = exit.max(1);
                }
            }
            Err(err) => {
                eprintln!("{project}: {err}");
                exit = exit.max(map_exit_code(&err));
            }
        }
    }

    Ok(ExitCode::from(exit))
}
