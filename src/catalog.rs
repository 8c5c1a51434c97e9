use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;
use tracing::{info, warn};

use crate::app::{ProgressEvent, ProgressSink};
use crate::domain::{ChecksumEntry, RunIdentifier};
use crate::ena::FileReportClient;
use crate::error::ValidatorError;

/// Well-known location of the append-only checksum cache.
pub fn default_cache_path() -> Result<Utf8PathBuf, ValidatorError> {
    BaseDirs::new()
        .and_then(|dirs| {
            Utf8PathBuf::from_path_buf(dirs.home_dir().join(".ena_fastq_validator")).ok()
        })
        .ok_or_else(|| ValidatorError::Filesystem("unable to resolve home directory".to_string()))
}

/// Authoritative run-to-checksums mapping for one validation pass. Built from
/// the local cache first, then topped up from ENA; sole writer to the cache.
#[derive(Debug, Clone, Default)]
pub struct ChecksumCatalog {
    entries: HashMap<String, ChecksumEntry>,
}

impl ChecksumCatalog {
    pub fn build<C: FileReportClient>(
        client: &C,
        runs: &[RunIdentifier],
        use_cache: bool,
        cache_path: &Utf8Path,
        sink: &dyn ProgressSink,
    ) -> Result<Self, ValidatorError> {
        let mut entries = if use_cache {
            load_cache(cache_path)?
        } else {
            HashMap::new()
        };

        let mut missing = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for run in runs {
            if !entries.contains_key(run.as_str()) && seen.insert(run.as_str()) {
                missing.push(run.clone());
            }
        }

        if missing.is_empty() {
            info!("all {} runs satisfied from cache", runs.len());
            return Ok(Self { entries });
        }

        let total = missing.len();
        let mut fetched_lines = Vec::with_capacity(total);
        for (index, run) in missing.iter().enumerate() {
            sink.event(ProgressEvent {
                message: format!("fetching md5 for {run} ({}/{total})", index + 1),
            });
            let report = client.fetch_checksums(run.base_accession())?;
            if report.run != run.base_accession() {
                warn!(
                    "filereport for {} came back keyed as {}",
                    run.base_accession(),
                    report.run
                );
            }
            fetched_lines.push(format_cache_line(run.as_str(), &report.checksums));
            // Entries already present stay untouched for the session; a
            // published checksum set is immutable.
            entries
                .entry(run.as_str().to_string())
                .or_insert_with(|| ChecksumEntry::new(report.checksums));
        }

        append_cache_lines(cache_path, &fetched_lines)?;

        Ok(Self { entries })
    }

    pub fn from_entries(entries: HashMap<String, ChecksumEntry>) -> Self {
        Self { entries }
    }

    pub fn contains_run(&self, run: &str) -> bool {
        self.entries.contains_key(run)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The positional lookup the whole validator hinges on: `file_index` is
    /// 1-based, matching the `_1`/`_2` suffix in on-disk file names.
    pub fn lookup(&self, run: &str, file_index: usize) -> Option<&str> {
        self.entries
            .get(run)
            .and_then(|entry| entry.checksum_for_index(file_index))
    }
}

/// Load the cache as key to ordered checksum list. Later duplicate keys
/// override earlier ones, so re-appended runs resolve to their latest line.
pub fn load_cache(path: &Utf8Path) -> Result<HashMap<String, ChecksumEntry>, ValidatorError> {
    let mut entries = HashMap::new();
    if !path.as_std_path().exists() {
        return Ok(entries);
    }
    let content = fs::read_to_string(path.as_std_path())
        .map_err(|err| ValidatorError::Filesystem(format!("read cache {path}: {err}")))?;
    for line in content.lines() {
        match parse_cache_line(line) {
            Some((run, entry)) => {
                entries.insert(run, entry);
            }
            None => {
                if !line.trim().is_empty() {
                    warn!("skipping malformed cache line: {line}");
                }
            }
        }
    }
    Ok(entries)
}

pub fn format_cache_line(run: &str, checksums: &[String]) -> String {
    format!("{run}\t{}", checksums.join(";"))
}

pub fn parse_cache_line(line: &str) -> Option<(String, ChecksumEntry)> {
    let (run, md5s) = line.split_once('\t')?;
    if run.is_empty() {
        return None;
    }
    let checksums = md5s
        .trim_end()
        .split(';')
        .map(|value| value.to_string())
        .collect();
    Some((run.to_string(), ChecksumEntry::new(checksums)))
}

fn append_cache_lines(path: &Utf8Path, lines: &[String]) -> Result<(), ValidatorError> {
    if lines.is_empty() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| ValidatorError::Filesystem(format!("create {parent}: {err}")))?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path.as_std_path())
        .map_err(|err| ValidatorError::Filesystem(format!("open cache {path}: {err}")))?;
    for line in lines {
        writeln!(file, "{line}")
            .map_err(|err| ValidatorError::Filesystem(format!("append cache {path}: {err}")))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_line_round_trip() {
        let checksums = vec!["abc".to_string(), "def".to_string()];
        let line = format_cache_line("SRR000001", &checksums);
        assert_eq!(line, "SRR000001\tabc;def");
        let (run, entry) = parse_cache_line(&line).unwrap();
        assert_eq!(run, "SRR000001");
        assert_eq!(entry.checksums(), checksums.as_slice());
    }

    #[test]
    fn parse_cache_line_rejects_missing_tab() {
        assert!(parse_cache_line("SRR000001 abc;def").is_none());
        assert!(parse_cache_line("").is_none());
    }

    #[test]
    fn later_duplicate_key_wins_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("cache")).unwrap();
        fs::write(&path, "SRR000001\told\nSRR000001\tnew1;new2\n").unwrap();
        let entries = load_cache(&path).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(
            entries["SRR000001"].checksums(),
            &["new1".to_string(), "new2".to_string()]
        );
    }

    #[test]
    fn lookup_is_positional_and_bounds_checked() {
        let mut entries = HashMap::new();
        entries.insert(
            "SRR000001".to_string(),
            ChecksumEntry::new(vec!["abc".to_string(), "def".to_string()]),
        );
        let catalog = ChecksumCatalog::from_entries(entries);
        assert_eq!(catalog.lookup("SRR000001", 1), Some("abc"));
        assert_eq!(catalog.lookup("SRR000001", 2), Some("def"));
        assert_eq!(catalog.lookup("SRR000001", 3), None);
        assert_eq!(catalog.lookup("SRR000001", 0), None);
        assert_eq!(catalog.lookup("SRR999999", 1), None);
    }
}
