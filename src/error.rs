use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ValidatorError {
    #[error("invalid project accession: {0}")]
    InvalidProjectAccession(String),

    #[error("invalid run identifier: {0}")]
    InvalidRunIdentifier(String),

    #[error("failed to {description} after {attempts} attempts")]
    RemoteUnavailable { description: String, attempts: usize },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("remote service reported an error: {0}")]
    RemoteError(String),

    #[error("no filereport data returned for accession: {0}")]
    UnknownAccession(String),

    #[error("file name does not follow <run>_<index>.<ext> convention: {0}")]
    NamingConventionViolation(String),

    #[error("NCBI request failed: {0}")]
    EutilsHttp(String),

    #[error("ENA request failed: {0}")]
    EnaHttp(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
