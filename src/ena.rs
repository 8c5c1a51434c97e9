use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::error::ValidatorError;
use crate::retry::RetryExecutor;

/// One run's checksum list as published by the ENA filereport endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub run: String,
    pub checksums: Vec<String>,
}

pub trait FileReportClient: Send + Sync {
    fn fetch_checksums(&self, accession: &str) -> Result<FileReport, ValidatorError>;
}

#[derive(Clone)]
pub struct EnaHttpClient {
    client: Client,
    base_url: String,
    retry: RetryExecutor,
}

impl EnaHttpClient {
    pub fn new() -> Result<Self, ValidatorError> {
        Self::with_base_url("https://www.ebi.ac.uk/ena/portal/api".to_string())
    }

    pub fn with_base_url(base_url: String) -> Result<Self, ValidatorError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("ena-validate/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| ValidatorError::EnaHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| ValidatorError::EnaHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url,
            retry: RetryExecutor::new(),
        })
    }
}

impl FileReportClient for EnaHttpClient {
    fn fetch_checksums(&self, accession: &str) -> Result<FileReport, ValidatorError> {
        let url = format!("{}/filereport", self.base_url);
        let description = format!("fetching filereport for {accession}");
        let body = self.retry.execute(&description, || {
            let response = self
                .client
                .get(&url)
                .query(&[
                    ("accession", accession),
                    ("result", "read_run"),
                    ("fields", "fastq_md5"),
                ])
                .send()
                .map_err(|err| err.to_string())?;
            let status = response.status();
            let text = response.text().map_err(|err| err.to_string())?;
            if !status.is_success() {
                return Err(format!("status {status}: {text}"));
            }
            Ok(text)
        })?;
        parse_file_report(&body, accession)
    }
}

/// Parse the two-line TSV filereport body: a header line, then one data line
/// whose checksum field is semicolon-separated when a run has several files.
pub fn parse_file_report(body: &str, accession: &str) -> Result<FileReport, ValidatorError> {
    let mut lines = body.lines();
    let _header = lines
        .next()
        .ok_or_else(|| ValidatorError::UnknownAccession(accession.to_string()))?;
    let data = match lines.next() {
        Some(line) if !line.trim().is_empty() => line,
        _ => return Err(ValidatorError::UnknownAccession(accession.to_string())),
    };
    let mut fields = data.split('\t');
    let run = fields
        .next()
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            ValidatorError::MalformedResponse(format!("filereport line without run field: {data}"))
        })?;
    let md5_field = fields.next().ok_or_else(|| {
        ValidatorError::MalformedResponse(format!("filereport line without md5 field: {data}"))
    })?;
    let checksums = md5_field
        .split(';')
        .map(|value| value.trim().to_string())
        .collect();
    Ok(FileReport {
        run: run.to_string(),
        checksums,
    })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_paired_end_report() {
        let body = "run_accession\tfastq_md5\nSRR000001\tabc;def\n";
        let report = parse_file_report(body, "SRR000001").unwrap();
        assert_eq!(report.run, "SRR000001");
        assert_eq!(report.checksums, vec!["abc", "def"]);
    }

    #[test]
    fn parse_single_file_report() {
        let body = "run_accession\tfastq_md5\nSRR000002\tfeedbeef\n";
        let report = parse_file_report(body, "SRR000002").unwrap();
        assert_eq!(report.checksums, vec!["feedbeef"]);
    }

    #[test]
    fn header_only_is_unknown_accession() {
        let body = "run_accession\tfastq_md5\n";
        let err = parse_file_report(body, "SRR999999").unwrap_err();
        assert_matches!(err, ValidatorError::UnknownAccession(_));
    }

    #[test]
    fn missing_md5_field_is_malformed() {
        let body = "run_accession\tfastq_md5\nSRR000001\n";
        let err = parse_file_report(body, "SRR000001").unwrap_err();
        assert_matches!(err, ValidatorError::MalformedResponse(_));
    }
}
