use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidatorError;

/// Study-level accession grouping many sequencing runs (e.g. PRJNA498125).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectAccession(String);

impl ProjectAccession {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectAccession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProjectAccession {
    type Err = ValidatorError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_string();
        let is_valid = !normalized.is_empty()
            && normalized.chars().all(|ch| ch.is_ascii_alphanumeric());
        if !is_valid {
            return Err(ValidatorError::InvalidProjectAccession(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

/// Identifier for one sequencing run (e.g. SRR10489833). A run identifier may
/// carry a `_<suffix>` segment separating it from sibling files of the same
/// run; `base_accession` strips it before remote queries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunIdentifier(String);

impl RunIdentifier {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn base_accession(&self) -> &str {
        match self.0.split_once('_') {
            Some((base, _)) => base,
            None => &self.0,
        }
    }
}

impl fmt::Display for RunIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RunIdentifier {
    type Err = ValidatorError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_string();
        let is_valid = !normalized.is_empty()
            && normalized
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
            && !normalized.starts_with('_');
        if !is_valid {
            return Err(ValidatorError::InvalidRunIdentifier(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

/// Ordered MD5 list for one run's files. Index `i` corresponds to file suffix
/// `i + 1` in the on-disk naming convention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumEntry {
    checksums: Vec<String>,
}

impl ChecksumEntry {
    pub fn new(checksums: Vec<String>) -> Self {
        Self { checksums }
    }

    /// Look up the expected checksum for a 1-based file index, trimmed of any
    /// trailing newline noise carried over from cached lines.
    pub fn checksum_for_index(&self, file_index: usize) -> Option<&str> {
        if file_index == 0 {
            return None;
        }
        self.checksums
            .get(file_index - 1)
            .map(|value| value.trim_end())
    }

    pub fn checksums(&self) -> &[String] {
        &self.checksums
    }

    pub fn len(&self) -> usize {
        self.checksums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checksums.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_project_accession_valid() {
        let acc: ProjectAccession = " PRJNA498125 ".parse().unwrap();
        assert_eq!(acc.as_str(), "PRJNA498125");
    }

    #[test]
    fn parse_project_accession_invalid() {
        let err = "PRJ NA".parse::<ProjectAccession>().unwrap_err();
        assert_matches!(err, ValidatorError::InvalidProjectAccession(_));
    }

    #[test]
    fn parse_run_identifier_valid() {
        let run: RunIdentifier = "SRR000001".parse().unwrap();
        assert_eq!(run.as_str(), "SRR000001");
        assert_eq!(run.base_accession(), "SRR000001");
    }

    #[test]
    fn run_identifier_strips_file_suffix() {
        let run: RunIdentifier = "SRR000001_2".parse().unwrap();
        assert_eq!(run.base_accession(), "SRR000001");
    }

    #[test]
    fn parse_run_identifier_invalid() {
        let err = "".parse::<RunIdentifier>().unwrap_err();
        assert_matches!(err, ValidatorError::InvalidRunIdentifier(_));
    }

    #[test]
    fn checksum_entry_is_one_based() {
        let entry = ChecksumEntry::new(vec!["abc".to_string(), "def\n".to_string()]);
        assert_eq!(entry.checksum_for_index(1), Some("abc"));
        assert_eq!(entry.checksum_for_index(2), Some("def"));
        assert_eq!(entry.checksum_for_index(0), None);
        assert_eq!(entry.checksum_for_index(3), None);
    }
}
