use std::collections::HashSet;
use std::time::Duration;

use quick_xml::Reader;
use quick_xml::events::Event;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use tracing::{info, warn};

use crate::domain::{ProjectAccession, RunIdentifier};
use crate::error::ValidatorError;
use crate::retry::RetryExecutor;

/// Hard cap on esearch results. Hitting it exactly means the project very
/// likely has more runs than one page can carry.
pub const SEARCH_RETMAX: usize = 10_000;

const TOOL_NAME: &str = "ena-validate";

pub trait RunResolver: Send + Sync {
    fn resolve_runs(
        &self,
        project: &ProjectAccession,
    ) -> Result<Vec<RunIdentifier>, ValidatorError>;
}

/// Search half of the esearch/efetch handshake: the opaque SRA ids plus the
/// WebEnv token referencing the server-side result set.
#[derive(Debug, Clone)]
pub struct SearchSession {
    pub ids: Vec<String>,
    pub webenv: String,
}

#[derive(Debug, Deserialize)]
struct EsearchEnvelope {
    esearchresult: Option<EsearchResult>,
}

#[derive(Debug, Deserialize)]
struct EsearchResult {
    idlist: Option<Vec<String>>,
    webenv: Option<String>,
}

#[derive(Clone)]
pub struct EutilsHttpClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    retry: RetryExecutor,
}

impl EutilsHttpClient {
    pub fn new() -> Result<Self, ValidatorError> {
        Self::with_base_url("https://eutils.ncbi.nlm.nih.gov/entrez/eutils".to_string())
    }

    pub fn with_base_url(base_url: String) -> Result<Self, ValidatorError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("{TOOL_NAME}/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| ValidatorError::EutilsHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| ValidatorError::EutilsHttp(err.to_string()))?;

        // Optional credential: raises NCBI rate limits when present, its
        // absence must not be an error.
        let api_key = std::env::var("NCBI_API_KEY")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        Ok(Self {
            client,
            base_url,
            api_key,
            retry: RetryExecutor::new(),
        })
    }

    fn get_text(&self, url: &str, params: &[(&str, &str)], description: &str) -> Result<String, ValidatorError> {
        self.retry.execute(description, || {
            let mut request = self.client.get(url).query(params);
            if let Some(api_key) = &self.api_key {
                request = request.query(&[("api_key", api_key.as_str())]);
            }
            let response = request.send().map_err(|err| err.to_string())?;
            let status = response.status();
            let text = response.text().map_err(|err| err.to_string())?;
            if !status.is_success() {
                return Err(format!("status {status}: {text}"));
            }
            Ok(text)
        })
    }

    /// Step one of run resolution: term-search the SRA database for the
    /// project and open a history session.
    pub fn search_project(
        &self,
        project: &ProjectAccession,
    ) -> Result<SearchSession, ValidatorError> {
        let url = format!("{}/esearch.fcgi", self.base_url);
        let term = format!("{}[BioProject]", project.as_str());
        let retmax = SEARCH_RETMAX.to_string();
        let params = [
            ("db", "sra"),
            ("term", term.as_str()),
            ("tool", TOOL_NAME),
            ("retmax", retmax.as_str()),
            ("usehistory", "y"),
            ("retmode", "json"),
        ];
        let description = format!("searching SRA for {project}");
        let body = self.get_text(&url, &params, &description)?;
        let session = parse_search_response(&body)?;
        info!("found {} SRA ids for {project}", session.ids.len());
        Ok(session)
    }

    /// Step two: fetch the full records for everything in the session and
    /// pull out the run accessions. The remote resolves ids via the WebEnv
    /// token, not the raw id list.
    pub fn fetch_run_accessions(
        &self,
        session: &SearchSession,
        filter: Option<&HashSet<String>>,
    ) -> Result<Vec<RunIdentifier>, ValidatorError> {
        let url = format!("{}/efetch.fcgi", self.base_url);
        let params = [
            ("db", "sra"),
            ("tool", TOOL_NAME),
            ("webenv", session.webenv.as_str()),
            ("query_key", "1"),
        ];
        let body = self.get_text(&url, &params, "fetching SRA records from session")?;
        parse_run_accessions(&body, filter)
    }
}

impl RunResolver for EutilsHttpClient {
    fn resolve_runs(
        &self,
        project: &ProjectAccession,
    ) -> Result<Vec<RunIdentifier>, ValidatorError> {
        let session = self.search_project(project)?;
        self.fetch_run_accessions(&session, None)
    }
}

/// Parse the esearch JSON body. Both the id list and the WebEnv token are
/// required for the follow-up fetch.
pub fn parse_search_response(body: &str) -> Result<SearchSession, ValidatorError> {
    let envelope: EsearchEnvelope = serde_json::from_str(body)
        .map_err(|err| ValidatorError::MalformedResponse(format!("esearch JSON: {err}")))?;
    let result = envelope.esearchresult.ok_or_else(|| {
        ValidatorError::MalformedResponse("esearch response without esearchresult".to_string())
    })?;
    let ids = result.idlist.ok_or_else(|| {
        ValidatorError::MalformedResponse("esearch response without idlist".to_string())
    })?;
    let webenv = result.webenv.ok_or_else(|| {
        ValidatorError::MalformedResponse("esearch response without webenv".to_string())
    })?;
    if ids.len() == SEARCH_RETMAX {
        warn!(
            "esearch returned exactly retmax={SEARCH_RETMAX} ids, results may be truncated"
        );
    }
    Ok(SearchSession { ids, webenv })
}

/// Walk the efetch XML and collect the `accession` attribute of every
/// `RUN_SET/RUN` element. A biological sample may be linked to several runs,
/// so one EXPERIMENT_PACKAGE can yield more than one accession. An explicit
/// `ERROR` element fails the whole resolution.
pub fn parse_run_accessions(
    xml: &str,
    filter: Option<&HashSet<String>>,
) -> Result<Vec<RunIdentifier>, ValidatorError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut runs = Vec::new();
    let mut in_error = false;
    loop {
        let event = reader
            .read_event()
            .map_err(|err| ValidatorError::MalformedResponse(format!("efetch XML: {err}")))?;
        match event {
            Event::Start(element) => match element.name().as_ref() {
                b"ERROR" => in_error = true,
                b"RUN" => collect_run_accessions(&element, filter, &mut runs)?,
                _ => {}
            },
            Event::Empty(element) => match element.name().as_ref() {
                // A self-closing <ERROR/> carries no text and no end event.
                b"ERROR" => {
                    return Err(ValidatorError::RemoteError("unspecified error".to_string()));
                }
                b"RUN" => collect_run_accessions(&element, filter, &mut runs)?,
                _ => {}
            },
            Event::Text(text) if in_error => {
                let message = text
                    .unescape()
                    .map_err(|err| ValidatorError::MalformedResponse(format!("efetch XML: {err}")))?
                    .into_owned();
                return Err(ValidatorError::RemoteError(message));
            }
            Event::End(element) if element.name().as_ref() == b"ERROR" => {
                return Err(ValidatorError::RemoteError("unspecified error".to_string()));
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(runs)
}

fn collect_run_accessions(
    element: &quick_xml::events::BytesStart<'_>,
    filter: Option<&HashSet<String>>,
    runs: &mut Vec<RunIdentifier>,
) -> Result<(), ValidatorError> {
    for attribute in element.attributes() {
        let attribute = attribute
            .map_err(|err| ValidatorError::MalformedResponse(format!("efetch XML: {err}")))?;
        if attribute.key.as_ref() != b"accession" {
            continue;
        }
        let value = attribute
            .unescape_value()
            .map_err(|err| ValidatorError::MalformedResponse(format!("efetch XML: {err}")))?;
        let keep = filter
            .map(|set| set.contains(value.as_ref()))
            .unwrap_or(true);
        if keep {
            runs.push(value.as_ref().parse::<RunIdentifier>()?);
        }
    }
    Ok(())
}
