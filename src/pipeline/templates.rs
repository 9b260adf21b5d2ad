//! Report template name → id resolution
//!
//! Entries come from two places: a JSON cache file read at startup
//! (`local`) and whatever the API returns when templates are listed (`api`).

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{TemplateError, TransportError};
use crate::models::{ApiResponse, Credentials, HttpMethod, RequestSpec};
use crate::network::client::RequestExecutor;
use crate::pipeline::extract::{extractor, ExtractorId};
use crate::pipeline::grid::Row;
use crate::pipeline::xml;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    Api,
    Local,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Api => "api",
            Provenance::Local => "local",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateEntry {
    pub name: String,
    pub id: String,
    pub provenance: Provenance,
}

/// One endpoint shape to try when listing templates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeCandidate {
    pub method: HttpMethod,
    pub endpoint: String,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl ProbeCandidate {
    fn new(method: HttpMethod, endpoint: &str, params: &[(&str, &str)]) -> Self {
        ProbeCandidate {
            method,
            endpoint: endpoint.to_string(),
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    fn to_spec(&self) -> RequestSpec {
        RequestSpec::new(self.method, self.endpoint.clone()).with_params(
            self.params
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}

/// Built-in probe order, used when the config file names none
pub fn default_probes() -> Vec<ProbeCandidate> {
    vec![
        ProbeCandidate::new(
            HttpMethod::POST,
            "/api/2.0/fo/report/",
            &[("action", "list"), ("type", "template")],
        ),
        ProbeCandidate::new(HttpMethod::GET, "/msp/report_template_list.php", &[]),
        ProbeCandidate::new(
            HttpMethod::GET,
            "/api/2.0/fo/report/template/",
            &[("action", "list")],
        ),
    ]
}

/// Result of probing the candidate endpoints
#[derive(Debug)]
pub enum RefreshOutcome {
    /// A candidate returned template records; `rows` use the template columns
    Fetched { response: ApiResponse, rows: Vec<Row> },
    /// A candidate answered with something that looks like templates but did
    /// not parse
    Unparsed { response: ApiResponse, reason: String },
    /// Nothing usable came back; existing entries were kept
    Unresolved {
        last_response: Option<ApiResponse>,
        transport: Option<TransportError>,
    },
}

#[derive(Debug, Deserialize)]
struct CachedTemplate {
    name: String,
    id: serde_json::Value,
}

#[derive(Debug, Clone, Default)]
pub struct TemplateResolver {
    entries: BTreeMap<String, TemplateEntry>,
}

impl TemplateResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `(display name, id)` pairs; a later pair replaces an earlier one
    /// with the same name.
    pub fn populate<I>(&mut self, entries: I, provenance: Provenance)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, id) in entries {
            self.entries.insert(
                name.clone(),
                TemplateEntry { name, id, provenance },
            );
        }
    }

    /// Drop every entry of `provenance`, then merge `entries`
    pub fn replace_provenance<I>(&mut self, entries: I, provenance: Provenance)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.entries.retain(|_, entry| entry.provenance != provenance);
        self.populate(entries, provenance);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn lookup(&self, name: &str) -> Result<&str, TemplateError> {
        self.entries
            .get(name)
            .map(|entry| entry.id.as_str())
            .ok_or_else(|| TemplateError::NotFound(name.to_string()))
    }

    pub fn get(&self, name: &str) -> Option<&TemplateEntry> {
        self.entries.get(name)
    }

    /// Display names in sorted order
    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Seed from a cache file of `{ "<category>": [{"name", "id"}, ...] }`.
    ///
    /// A missing file loads nothing and is not an error.
    pub fn load_local(&mut self, path: &Path) -> Result<usize> {
        if !path.exists() {
            return Ok(0);
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading template cache {:?}", path))?;
        let categories: BTreeMap<String, Vec<CachedTemplate>> = serde_json::from_str(&content)
            .with_context(|| format!("parsing template cache {:?}", path))?;

        let entries: Vec<(String, String)> = categories
            .into_values()
            .flatten()
            .map(|template| {
                let id = match template.id {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                (format!("{} ({})", template.name, id), id)
            })
            .collect();

        let count = entries.len();
        self.populate(entries, Provenance::Local);
        Ok(count)
    }

    /// Try each candidate in order until one yields template records.
    ///
    /// Stops early on a success whose body mentions templates but cannot be
    /// parsed, and on timeouts or connection failures, which every candidate
    /// would share.
    pub async fn refresh(
        &mut self,
        executor: &RequestExecutor,
        credentials: &Credentials,
        probes: &[ProbeCandidate],
    ) -> RefreshOutcome {
        let templates = extractor(ExtractorId::ReportTemplates);
        let mut last_response = None;
        let mut transport = None;

        for probe in probes {
            tracing::debug!(method = probe.method.as_str(), endpoint = %probe.endpoint, "Probing template endpoint");
            let response = match executor.execute(credentials, &probe.to_spec()).await {
                Ok(response) => response,
                Err(err @ (TransportError::Timeout | TransportError::Connection(_))) => {
                    transport = Some(err);
                    break;
                }
                Err(err) => {
                    transport = Some(err);
                    continue;
                }
            };

            if !response.is_success() {
                last_response = Some(response);
                continue;
            }

            let text = response.text().into_owned();
            match xml::parse(&text) {
                Ok(root) => {
                    let rows = templates.extract(&root);
                    if rows.is_empty() {
                        last_response = Some(response);
                        continue;
                    }
                    self.replace_provenance(templates.harvest_pairs(&rows), Provenance::Api);
                    tracing::info!(count = rows.len(), endpoint = %probe.endpoint, "Fetched report templates");
                    return RefreshOutcome::Fetched { response, rows };
                }
                Err(err) if mentions_templates(&text) => {
                    return RefreshOutcome::Unparsed {
                        response,
                        reason: err.to_string(),
                    };
                }
                Err(_) => {
                    last_response = Some(response);
                }
            }
        }

        tracing::warn!(available = self.len(), "Could not resolve report templates remotely");
        RefreshOutcome::Unresolved {
            last_response,
            transport,
        }
    }
}

fn mentions_templates(text: &str) -> bool {
    static HINT: OnceLock<Regex> = OnceLock::new();
    HINT.get_or_init(|| Regex::new(r"(?i)report[_ ]?template|template_?id|<template").unwrap())
        .is_match(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use std::io::Write;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items.iter().map(|(a, b)| (a.to_string(), b.to_string())).collect()
    }

    #[test]
    fn later_duplicate_wins() {
        let mut resolver = TemplateResolver::new();
        resolver.populate(pairs(&[("Scan Report", "1"), ("Scan Report", "2")]), Provenance::Api);
        assert_eq!(resolver.len(), 1);
        assert_eq!(resolver.lookup("Scan Report"), Ok("2"));
    }

    #[test]
    fn unknown_name_is_not_found() {
        let resolver = TemplateResolver::new();
        assert_eq!(
            resolver.lookup("Nope"),
            Err(TemplateError::NotFound("Nope".to_string()))
        );
    }

    #[test]
    fn replacing_api_entries_keeps_local_ones() {
        let mut resolver = TemplateResolver::new();
        resolver.populate(pairs(&[("Cached (9)", "9")]), Provenance::Local);
        resolver.populate(pairs(&[("Old", "1")]), Provenance::Api);
        resolver.replace_provenance(pairs(&[("New", "2")]), Provenance::Api);

        assert_eq!(resolver.names(), vec!["Cached (9)", "New"]);
        assert_eq!(resolver.get("Cached (9)").unwrap().provenance, Provenance::Local);
    }

    #[test]
    fn api_entry_overwrites_local_with_same_name() {
        let mut resolver = TemplateResolver::new();
        resolver.populate(pairs(&[("Shared", "1")]), Provenance::Local);
        resolver.populate(pairs(&[("Shared", "2")]), Provenance::Api);
        let entry = resolver.get("Shared").unwrap();
        assert_eq!((entry.id.as_str(), entry.provenance), ("2", Provenance::Api));
    }

    #[test]
    fn loads_local_cache_across_categories() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"Scan": [{{"name": "Technical Report", "id": 91}}], "Host": [{{"name": "Executive", "id": "92"}}]}}"#
        )
        .unwrap();

        let mut resolver = TemplateResolver::new();
        assert_eq!(resolver.load_local(file.path()).unwrap(), 2);
        assert_eq!(resolver.lookup("Technical Report (91)"), Ok("91"));
        assert_eq!(resolver.lookup("Executive (92)"), Ok("92"));
        assert_eq!(resolver.get("Executive (92)").unwrap().provenance, Provenance::Local);
    }

    #[test]
    fn missing_cache_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut resolver = TemplateResolver::new();
        assert_eq!(resolver.load_local(&dir.path().join("absent.json")).unwrap(), 0);
    }

    #[test]
    fn malformed_cache_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[not, an, object").unwrap();
        let mut resolver = TemplateResolver::new();
        assert!(resolver.load_local(file.path()).is_err());
        assert!(resolver.is_empty());
    }

    fn probe(endpoint: &str) -> ProbeCandidate {
        ProbeCandidate::new(HttpMethod::GET, endpoint, &[])
    }

    #[tokio::test]
    async fn first_successful_probe_with_records_wins() {
        let server = MockServer::start_async().await;
        let failing = server
            .mock_async(|when, then| {
                when.path("/first");
                then.status(404);
            })
            .await;
        let working = server
            .mock_async(|when, then| {
                when.path("/second");
                then.status(200).body(
                    "<REPORT_TEMPLATE_LIST><REPORT_TEMPLATE><ID>12</ID><TYPE>Auto</TYPE>\
                     <TITLE>Technical Report</TITLE></REPORT_TEMPLATE></REPORT_TEMPLATE_LIST>",
                );
            })
            .await;
        let never = server
            .mock_async(|when, then| {
                when.path("/third");
                then.status(200);
            })
            .await;

        let mut resolver = TemplateResolver::new();
        resolver.populate(pairs(&[("Cached (1)", "1")]), Provenance::Local);
        let creds = Credentials::new(server.base_url(), "u", "p");
        let outcome = resolver
            .refresh(&RequestExecutor::new(None), &creds, &[probe("/first"), probe("/second"), probe("/third")])
            .await;

        failing.assert_async().await;
        working.assert_async().await;
        assert_eq!(never.hits_async().await, 0);
        match outcome {
            RefreshOutcome::Fetched { rows, .. } => {
                assert_eq!(rows, vec![vec!["12", "Technical Report", "Auto"]]);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(resolver.lookup("Technical Report"), Ok("12"));
        assert_eq!(resolver.lookup("Cached (1)"), Ok("1"));
    }

    #[tokio::test]
    async fn empty_success_moves_to_next_probe() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.path("/empty");
                then.status(200).body("<REPORT_TEMPLATE_LIST/>");
            })
            .await;
        server
            .mock_async(|when, then| {
                when.path("/full");
                then.status(200)
                    .body("<X><REPORT_TEMPLATE><ID>3</ID><TITLE>Map</TITLE></REPORT_TEMPLATE></X>");
            })
            .await;

        let mut resolver = TemplateResolver::new();
        let creds = Credentials::new(server.base_url(), "u", "p");
        let outcome = resolver
            .refresh(&RequestExecutor::new(None), &creds, &[probe("/empty"), probe("/full")])
            .await;

        assert!(matches!(outcome, RefreshOutcome::Fetched { .. }));
        assert_eq!(resolver.lookup("Map"), Ok("3"));
    }

    #[tokio::test]
    async fn unparseable_template_body_is_surfaced() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.path("/broken");
                then.status(200).body("<REPORT_TEMPLATE_LIST><REPORT_TEMPLATE><ID>1</ID>");
            })
            .await;
        let next = server
            .mock_async(|when, then| {
                when.path("/next");
                then.status(200);
            })
            .await;

        let mut resolver = TemplateResolver::new();
        let creds = Credentials::new(server.base_url(), "u", "p");
        let outcome = resolver
            .refresh(&RequestExecutor::new(None), &creds, &[probe("/broken"), probe("/next")])
            .await;

        assert!(matches!(outcome, RefreshOutcome::Unparsed { .. }));
        assert_eq!(next.hits_async().await, 0);
        assert!(resolver.is_empty());
    }

    #[tokio::test]
    async fn exhausted_probes_keep_existing_entries() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.any_request();
                then.status(500).body("boom");
            })
            .await;

        let mut resolver = TemplateResolver::new();
        resolver.populate(pairs(&[("Cached (4)", "4")]), Provenance::Local);
        let creds = Credentials::new(server.base_url(), "u", "p");
        let outcome = resolver
            .refresh(&RequestExecutor::new(None), &creds, &[probe("/a"), probe("/b")])
            .await;

        match outcome {
            RefreshOutcome::Unresolved { last_response, transport } => {
                assert_eq!(last_response.map(|r| r.status), Some(500));
                assert!(transport.is_none());
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(resolver.names(), vec!["Cached (4)"]);
    }

    #[tokio::test]
    async fn unreachable_host_stops_probing() {
        let mut resolver = TemplateResolver::new();
        let creds = Credentials::new("http://127.0.0.1:1", "u", "p");
        let outcome = resolver
            .refresh(&RequestExecutor::new(None), &creds, &default_probes())
            .await;

        assert!(matches!(
            outcome,
            RefreshOutcome::Unresolved { transport: Some(TransportError::Connection(_)), .. }
        ));
    }
}
