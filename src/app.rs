use std::fs;
use std::path::{Path, PathBuf};

use camino::Utf8PathBuf;
use serde::Serialize;
use tracing::info;

use crate::catalog::ChecksumCatalog;
use crate::checksum::md5_of_file;
use crate::domain::ProjectAccession;
use crate::ena::FileReportClient;
use crate::error::ValidatorError;
use crate::eutils::RunResolver;

#[derive(Debug, Clone, Copy)]
pub struct ValidateOptions {
    pub use_cache: bool,
}

impl Default for ValidateOptions {
    fn default() -> Self {
        Self { use_cache: true }
    }
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// A directory entry decomposed by the `<run>_<index>.<ext>` convention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    pub name: String,
    pub path: PathBuf,
    pub run: String,
    pub file_index: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileOutcome {
    pub file: String,
    pub run: String,
    pub file_index: usize,
    pub expected: Option<String>,
    pub actual: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub project: String,
    pub directory: String,
    pub files_checked: usize,
    pub failures: Vec<FileOutcome>,
}

impl ValidationReport {
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Clone)]
pub struct App<R: RunResolver, C: FileReportClient> {
    resolver: R,
    ena: C,
    cache_path: Utf8PathBuf,
}

impl<R: RunResolver, C: FileReportClient> App<R, C> {
    pub fn new(resolver: R, ena: C, cache_path: Utf8PathBuf) -> Self {
        Self {
            resolver,
            ena,
            cache_path,
        }
    }

    /// Validate every file in `directory` against the checksums ENA publishes
    /// for `project`. Naming violations fail the whole directory before any
    /// remote call is made; per-file mismatches are tallied, not raised.
    pub fn validate(
        &self,
        project: &ProjectAccession,
        directory: &Path,
        options: ValidateOptions,
        sink: &dyn ProgressSink,
    ) -> Result<ValidationReport, ValidatorError> {
        let files = list_local_files(directory)?;
        info!("{} files to validate in {}", files.len(), directory.display());

        let runs = self.resolver.resolve_runs(project)?;
        let catalog = ChecksumCatalog::build(
            &self.ena,
            &runs,
            options.use_cache,
            &self.cache_path,
            sink,
        )?;

        let total = files.len();
        let mut failures = Vec::new();
        for (index, file) in files.iter().enumerate() {
            sink.event(ProgressEvent {
                message: format!("hashing {} ({}/{total})", file.name, index + 1),
            });
            let actual = md5_of_file(&file.path)?;
            let expected = catalog.lookup(&file.run, file.file_index);
            if expected != Some(actual.as_str()) {
                failures.push(FileOutcome {
                    file: file.name.clone(),
                    run: file.run.clone(),
                    file_index: file.file_index,
                    expected: expected.map(|value| value.to_string()),
                    actual,
                });
            }
        }

        Ok(ValidationReport {
            project: project.as_str().to_string(),
            directory: directory.display().to_string(),
            files_checked: total,
            failures,
        })
    }
}

/// List one directory level and map each file through the naming
/// convention. Any file name that does not fit is a hard error: silently
/// skipping it would mask missing validation coverage.
pub fn list_local_files(directory: &Path) -> Result<Vec<LocalFile>, ValidatorError> {
    let entries = fs::read_dir(directory).map_err(|err| {
        ValidatorError::Filesystem(format!("read directory {}: {err}", directory.display()))
    })?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| {
            ValidatorError::Filesystem(format!("read directory {}: {err}", directory.display()))
        })?;
        let path = entry.path();
        // The naming convention covers files; subdirectories are not
        // validation targets and must not trip it.
        if !path.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let (run, file_index) = parse_local_file_name(&name)?;
        files.push(LocalFile {
            path,
            name,
            run,
            file_index,
        });
    }
    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(files)
}

/// Split `<run>_<index>.<ext...>` into its run accession and 1-based file
/// index. The run is everything before the first underscore; the index sits
/// between that underscore and the first period.
pub fn parse_local_file_name(name: &str) -> Result<(String, usize), ValidatorError> {
    let (run, rest) = name
        .split_once('_')
        .ok_or_else(|| ValidatorError::NamingConventionViolation(name.to_string()))?;
    if run.is_empty() {
        return Err(ValidatorError::NamingConventionViolation(name.to_string()));
    }
    let index_part = rest.split('.').next().unwrap_or(rest);
    let file_index: usize = index_part
        .parse()
        .map_err(|_| ValidatorError::NamingConventionViolation(name.to_string()))?;
    if file_index == 0 {
        return Err(ValidatorError::NamingConventionViolation(name.to_string()));
    }
    Ok((run.to_string(), file_index))
}
