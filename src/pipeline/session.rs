//! Operation pipeline: validate, send, render, extract, harvest
//!
//! A [`Session`] owns the state that outlives a single operation (template
//! mapping and scan reference cache). Everything the UI needs to show is
//! returned as an [`OperationOutcome`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::constants::BODY_EXCERPT_CHARS;
use crate::error::OperationError;
use crate::models::{ApiResponse, Credentials};
use crate::network::client::RequestExecutor;
use crate::pipeline::extract::{extractor, ExtractorId, Harvest};
use crate::pipeline::format;
use crate::pipeline::grid::Row;
use crate::pipeline::operations::{
    build_request, descriptor, Invocation, OperationDescriptor, OperationKind, Output,
};
use crate::pipeline::templates::{ProbeCandidate, RefreshOutcome, TemplateResolver};
use crate::pipeline::xml;

/// Columns and rows for the grid
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    None,
    Info { title: String, message: String },
    Warning { title: String, message: String },
    Failed(OperationError),
}

impl Notice {
    fn info(title: &str, message: impl Into<String>) -> Self {
        Notice::Info {
            title: title.to_string(),
            message: message.into(),
        }
    }
}

/// What the app state should apply after an operation
#[derive(Debug, Clone, PartialEq)]
pub struct OperationOutcome {
    pub kind: OperationKind,
    /// Replaces the raw pane when present
    pub rendering: Option<String>,
    /// Replaces the grid when present
    pub table: Option<Table>,
    pub notice: Notice,
    /// Extra status bar line
    pub status: Option<String>,
    /// HTTP status of the exchange, when one happened
    pub http_status: Option<u16>,
}

impl OperationOutcome {
    fn new(kind: OperationKind) -> Self {
        OperationOutcome {
            kind,
            rendering: None,
            table: None,
            notice: Notice::None,
            status: None,
            http_status: None,
        }
    }

    fn rendered(kind: OperationKind, response: Option<&ApiResponse>) -> Self {
        OperationOutcome {
            rendering: Some(format::render(response)),
            http_status: response.map(|r| r.status),
            ..Self::new(kind)
        }
    }

    fn notice(mut self, notice: Notice) -> Self {
        self.notice = notice;
        self
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.notice, Notice::Failed(_))
    }
}

pub struct Session {
    executor: RequestExecutor,
    templates: TemplateResolver,
    scan_refs: BTreeMap<String, String>,
    probes: Vec<ProbeCandidate>,
    download_dir: PathBuf,
}

impl Session {
    pub fn new(executor: RequestExecutor, probes: Vec<ProbeCandidate>, download_dir: PathBuf) -> Self {
        Session {
            executor,
            templates: TemplateResolver::new(),
            scan_refs: BTreeMap::new(),
            probes,
            download_dir,
        }
    }

    /// Seed the resolver from the local cache. A malformed file is logged and
    /// otherwise ignored.
    pub fn load_local_templates(&mut self, path: &Path) -> usize {
        match self.templates.load_local(path) {
            Ok(count) => {
                tracing::info!(count, path = ?path, "Loaded local report templates");
                count
            }
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring local template cache");
                0
            }
        }
    }

    pub fn templates(&self) -> &TemplateResolver {
        &self.templates
    }

    pub fn scan_refs(&self) -> &BTreeMap<String, String> {
        &self.scan_refs
    }

    pub async fn run(&mut self, credentials: &Credentials, invocation: &Invocation) -> OperationOutcome {
        let descriptor = descriptor(invocation.kind);
        tracing::info!(operation = descriptor.label, "Running operation");

        if descriptor.output == Output::Templates {
            return self.refresh_templates(credentials).await;
        }

        let spec = match build_request(descriptor, invocation, &self.templates, &self.scan_refs) {
            Ok(spec) => spec,
            Err(e) => {
                tracing::debug!(error = %e, "Rejected invocation");
                return OperationOutcome::new(descriptor.kind).notice(Notice::Failed(e));
            }
        };

        let response = match self.executor.execute(credentials, &spec).await {
            Ok(response) => response,
            Err(e) => {
                return OperationOutcome::rendered(descriptor.kind, None)
                    .notice(Notice::Failed(e.into()));
            }
        };

        match descriptor.output {
            Output::Grid(id) => self.grid_outcome(descriptor, id, &response),
            Output::Download => self.save_report(descriptor, invocation, &response).await,
            Output::Raw | Output::Templates => raw_outcome(descriptor, &response),
        }
    }

    fn grid_outcome(
        &mut self,
        descriptor: &OperationDescriptor,
        id: ExtractorId,
        response: &ApiResponse,
    ) -> OperationOutcome {
        let outcome = OperationOutcome::rendered(descriptor.kind, Some(response));
        if !response.is_success() {
            return outcome.notice(Notice::Failed(status_error(response)));
        }

        let root = match xml::parse(&response.text()) {
            Ok(root) => root,
            Err(e) => return outcome.notice(Notice::Failed(OperationError::Parse(e.to_string()))),
        };

        let extractor = extractor(id);
        let rows = extractor.extract(&root);
        self.harvest(id, &rows);
        tracing::info!(rows = rows.len(), operation = descriptor.label, "Extracted rows");

        OperationOutcome {
            table: Some(Table {
                columns: extractor.columns(),
                rows,
            }),
            ..outcome
        }
    }

    /// Template ids are harvested by `TemplateResolver::refresh` only.
    fn harvest(&mut self, id: ExtractorId, rows: &[Row]) {
        let extractor = extractor(id);
        if let Some(Harvest::ScanRefs { .. }) = extractor.harvest {
            self.scan_refs.extend(extractor.harvest_pairs(rows));
        }
    }

    async fn refresh_templates(&mut self, credentials: &Credentials) -> OperationOutcome {
        let kind = OperationKind::ListReportTemplates;
        match self.templates.refresh(&self.executor, credentials, &self.probes).await {
            RefreshOutcome::Fetched { response, rows } => {
                let count = rows.len();
                OperationOutcome {
                    table: Some(Table {
                        columns: extractor(ExtractorId::ReportTemplates).columns(),
                        rows,
                    }),
                    ..OperationOutcome::rendered(kind, Some(&response))
                }
                .notice(Notice::info(
                    "Success",
                    format!("Fetched {} report templates.", count),
                ))
            }
            RefreshOutcome::Unparsed { response, reason } => {
                OperationOutcome::rendered(kind, Some(&response))
                    .notice(Notice::Failed(OperationError::Parse(reason)))
            }
            RefreshOutcome::Unresolved {
                last_response: Some(response),
                ..
            } => {
                let notice = if response.is_success() {
                    Notice::Warning {
                        title: "No Templates".to_string(),
                        message: "No report templates found in response.".to_string(),
                    }
                } else {
                    Notice::Failed(status_error(&response))
                };
                OperationOutcome::rendered(kind, Some(&response)).notice(notice)
            }
            RefreshOutcome::Unresolved {
                last_response: None,
                transport,
            } => {
                let notice = match transport {
                    Some(e) => Notice::Failed(e.into()),
                    None => Notice::Warning {
                        title: "No Templates".to_string(),
                        message: "No template endpoints are configured.".to_string(),
                    },
                };
                OperationOutcome::rendered(kind, None).notice(notice)
            }
        }
    }

    async fn save_report(
        &self,
        descriptor: &OperationDescriptor,
        invocation: &Invocation,
        response: &ApiResponse,
    ) -> OperationOutcome {
        if !response.is_success() {
            return OperationOutcome::rendered(descriptor.kind, Some(response))
                .notice(Notice::Failed(status_error(response)));
        }

        let content_type = response.content_type().to_ascii_lowercase();
        let path = match invocation.value("save_path") {
            "" => self
                .download_dir
                .join(format!("report_{}.{}", invocation.value("id"), extension_for(&content_type))),
            given => PathBuf::from(given),
        };

        let written = if is_binary(&content_type) {
            tokio::fs::write(&path, &response.body).await
        } else {
            tokio::fs::write(&path, response.text().as_bytes()).await
        };

        match written {
            Ok(()) => {
                tracing::info!(path = ?path, bytes = response.body.len(), "Saved report");
                OperationOutcome {
                    status: Some(format!("Report saved to {}", path.display())),
                    http_status: Some(response.status),
                    ..OperationOutcome::new(descriptor.kind)
                }
                .notice(Notice::info(
                    "Success",
                    format!("Report saved successfully to:\n{}", path.display()),
                ))
            }
            Err(e) => {
                tracing::warn!(error = %e, path = ?path, "Could not save report");
                OperationOutcome::new(descriptor.kind).notice(Notice::Failed(OperationError::Io(
                    format!("{}: {}", path.display(), e),
                )))
            }
        }
    }
}

fn raw_outcome(descriptor: &OperationDescriptor, response: &ApiResponse) -> OperationOutcome {
    let outcome = OperationOutcome::rendered(descriptor.kind, Some(response));
    if response.is_success() {
        if let Some(message) = descriptor.success_message {
            return outcome.notice(Notice::info("Success", message));
        }
    } else if response.status == 404 {
        if let Some(hint) = descriptor.not_found_hint {
            return outcome.notice(Notice::info("Alternative Endpoint", hint));
        }
    }
    outcome
}

fn status_error(response: &ApiResponse) -> OperationError {
    OperationError::Status {
        status: response.status,
        reason: response.reason.clone(),
        excerpt: response.text().chars().take(BODY_EXCERPT_CHARS).collect(),
    }
}

/// File extension for a download, from its content type
pub fn extension_for(content_type: &str) -> &'static str {
    ["csv", "pdf", "xml", "html"]
        .into_iter()
        .find(|ext| content_type.contains(ext))
        .unwrap_or("txt")
}

fn is_binary(content_type: &str) -> bool {
    ["pdf", "zip", "octet-stream", "image/"]
        .iter()
        .any(|marker| content_type.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::NO_RESPONSE_MESSAGE;
    use crate::error::TransportError;
    use crate::models::HttpMethod;
    use crate::pipeline::templates::Provenance;
    use httpmock::prelude::*;
    use std::fs;
    use std::time::Duration;

    const SCAN_LIST: &str = "<SCAN_LIST_OUTPUT><RESPONSE><SCAN_LIST>\
        <SCAN><REF>scan/1</REF><TITLE>Nightly</TITLE><STATUS><STATE>Finished</STATE></STATUS>\
        <TARGET>10.0.0.0/24</TARGET><LAUNCH_DATETIME>2024-05-01T02:00:00Z</LAUNCH_DATETIME></SCAN>\
        <SCAN><REF>scan/2</REF><TITLE>Weekly</TITLE><STATUS><STATE>Running</STATE></STATUS>\
        <TARGET>10.0.1.5</TARGET><LAUNCH_DATETIME>2024-05-02T02:00:00Z</LAUNCH_DATETIME></SCAN>\
        </SCAN_LIST></RESPONSE></SCAN_LIST_OUTPUT>";

    fn session(download_dir: PathBuf) -> Session {
        Session::new(RequestExecutor::new(None), Vec::new(), download_dir)
    }

    fn creds(server: &MockServer) -> Credentials {
        Credentials::new(server.base_url(), "user", "pass")
    }

    #[tokio::test]
    async fn scan_list_fills_grid_and_scan_refs() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/2.0/fo/scan/").query_param("action", "list");
                then.status(200).header("content-type", "text/xml").body(SCAN_LIST);
            })
            .await;

        let mut session = session(std::env::temp_dir());
        let outcome = session
            .run(&creds(&server), &Invocation::new(OperationKind::ListScans))
            .await;

        let table = outcome.table.expect("table");
        assert_eq!(table.columns, vec!["Reference", "Title", "Status", "Target", "Launch Time"]);
        assert_eq!(
            table.rows,
            vec![
                vec!["scan/1", "Nightly", "Finished", "10.0.0.0/24", "2024-05-01T02:00:00Z"],
                vec!["scan/2", "Weekly", "Running", "10.0.1.5", "2024-05-02T02:00:00Z"],
            ]
        );
        assert_eq!(outcome.notice, Notice::None);
        assert!(outcome.rendering.unwrap().starts_with("Status Code: 200 OK\n"));
        assert_eq!(session.scan_refs().get("Weekly").map(String::as_str), Some("scan/2"));
    }

    #[tokio::test]
    async fn timeout_leaves_session_state_alone() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.path("/api/2.0/fo/scan/");
                then.status(200).body(SCAN_LIST).delay(Duration::from_millis(800));
            })
            .await;

        let mut session = Session::new(
            RequestExecutor::with_timeout(Duration::from_millis(100), None),
            Vec::new(),
            std::env::temp_dir(),
        );
        let outcome = session
            .run(&creds(&server), &Invocation::new(OperationKind::ListScans))
            .await;

        assert!(outcome.table.is_none());
        assert_eq!(outcome.rendering.as_deref(), Some(NO_RESPONSE_MESSAGE));
        assert_eq!(
            outcome.notice,
            Notice::Failed(OperationError::Transport(TransportError::Timeout))
        );
        assert!(session.scan_refs().is_empty());
    }

    #[tokio::test]
    async fn template_refresh_timeout_keeps_known_templates() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.path("/api/2.0/fo/report/template/");
                then.status(200)
                    .body("<REPORT_TEMPLATE_LIST/>")
                    .delay(Duration::from_millis(600));
            })
            .await;

        let probes = vec![ProbeCandidate {
            method: HttpMethod::GET,
            endpoint: "/api/2.0/fo/report/template/".to_string(),
            params: BTreeMap::new(),
        }];
        let mut session = Session::new(
            RequestExecutor::with_timeout(Duration::from_millis(100), None),
            probes,
            std::env::temp_dir(),
        );
        session
            .templates
            .populate(vec![("Old".to_string(), "1".to_string())], Provenance::Api);
        session
            .templates
            .populate(vec![("Cached (9)".to_string(), "9".to_string())], Provenance::Local);
        let before = session.templates().names();

        let outcome = session
            .run(&creds(&server), &Invocation::new(OperationKind::ListReportTemplates))
            .await;

        assert!(outcome.table.is_none());
        assert_eq!(
            outcome.notice,
            Notice::Failed(OperationError::Transport(TransportError::Timeout))
        );
        assert_eq!(session.templates().names(), before);
        assert_eq!(session.templates().lookup("Old"), Ok("1"));
        assert_eq!(session.templates().lookup("Cached (9)"), Ok("9"));
    }

    #[tokio::test]
    async fn error_status_keeps_grid_and_quotes_body() {
        let server = MockServer::start_async().await;
        let body = "x".repeat(800);
        server
            .mock_async(move |when, then| {
                when.path("/api/2.0/fo/report/");
                then.status(401).body(body.clone());
            })
            .await;

        let mut session = session(std::env::temp_dir());
        let outcome = session
            .run(&creds(&server), &Invocation::new(OperationKind::ListReports))
            .await;

        assert!(outcome.table.is_none());
        assert!(outcome.rendering.is_some());
        match outcome.notice {
            Notice::Failed(OperationError::Status { status, excerpt, .. }) => {
                assert_eq!(status, 401);
                assert_eq!(excerpt.len(), BODY_EXCERPT_CHARS);
            }
            other => panic!("unexpected notice {other:?}"),
        }
    }

    #[tokio::test]
    async fn unparseable_grid_body_keeps_raw_rendering() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.path("/api/2.0/fo/report/");
                then.status(200).body("{\"reports\": []}");
            })
            .await;

        let mut session = session(std::env::temp_dir());
        let outcome = session
            .run(&creds(&server), &Invocation::new(OperationKind::ListReports))
            .await;

        assert!(outcome.table.is_none());
        assert!(outcome.rendering.unwrap().ends_with("{\n  \"reports\": []\n}"));
        assert!(matches!(outcome.notice, Notice::Failed(OperationError::Parse(_))));
    }

    #[tokio::test]
    async fn validation_failure_sends_nothing() {
        let server = MockServer::start_async().await;
        let any = server
            .mock_async(|when, then| {
                when.any_request();
                then.status(200);
            })
            .await;

        let mut session = session(std::env::temp_dir());
        let outcome = session
            .run(&creds(&server), &Invocation::new(OperationKind::DeleteReport))
            .await;

        assert_eq!(any.hits_async().await, 0);
        assert!(outcome.rendering.is_none());
        assert!(matches!(outcome.notice, Notice::Failed(OperationError::Validation(_))));
    }

    #[tokio::test]
    async fn not_found_shows_hint() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.path("/qps/rest/2.0/get/am/key");
                then.status(404);
            })
            .await;

        let mut session = session(std::env::temp_dir());
        let outcome = session
            .run(&creds(&server), &Invocation::new(OperationKind::ListActivationKeys))
            .await;

        assert!(matches!(outcome.notice, Notice::Info { ref title, .. } if title == "Alternative Endpoint"));
    }

    #[tokio::test]
    async fn launch_report_uses_fetched_template() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.path("/templates");
                then.status(200).body(
                    "<REPORT_TEMPLATE_LIST><REPORT_TEMPLATE><ID>91</ID><TITLE>Technical</TITLE>\
                     <TYPE>Auto</TYPE></REPORT_TEMPLATE></REPORT_TEMPLATE_LIST>",
                );
            })
            .await;
        let launch = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/2.0/fo/report/")
                    .x_www_form_urlencoded_tuple("template_id", "91");
                then.status(200).body("<SIMPLE_RETURN><RESPONSE><TEXT>New report launched</TEXT></RESPONSE></SIMPLE_RETURN>");
            })
            .await;

        let probes = vec![ProbeCandidate {
            method: crate::models::HttpMethod::GET,
            endpoint: "/templates".to_string(),
            params: BTreeMap::new(),
        }];
        let mut session = Session::new(RequestExecutor::new(None), probes, std::env::temp_dir());
        let creds = creds(&server);

        let listed = session
            .run(&creds, &Invocation::new(OperationKind::ListReportTemplates))
            .await;
        assert_eq!(listed.table.map(|t| t.rows.len()), Some(1));

        let launched = session
            .run(
                &creds,
                &Invocation::new(OperationKind::LaunchReport)
                    .with("template", "Technical")
                    .with("report_type", "Scan")
                    .with("output_format", "pdf"),
            )
            .await;

        launch.assert_async().await;
        assert_eq!(launched.notice, Notice::info("Success", "Report launched successfully!"));
    }

    #[tokio::test]
    async fn fetched_pdf_is_written_byte_for_byte() {
        let server = MockServer::start_async().await;
        let payload: Vec<u8> = vec![0x25, 0x50, 0x44, 0x46, 0xff, 0x00, 0x9c];
        let body = payload.clone();
        server
            .mock_async(move |when, then| {
                when.path("/api/2.0/fo/report/").query_param("action", "fetch").query_param("id", "77");
                then.status(200).header("Content-Type", "application/pdf").body(body.clone());
            })
            .await;

        let dir = tempfile::tempdir().unwrap();
        let mut session = session(dir.path().to_path_buf());
        let outcome = session
            .run(&creds(&server), &Invocation::new(OperationKind::FetchReport).with("id", "77"))
            .await;

        let expected = dir.path().join("report_77.pdf");
        assert_eq!(fs::read(&expected).unwrap(), payload);
        assert!(outcome.rendering.is_none());
        assert_eq!(outcome.status, Some(format!("Report saved to {}", expected.display())));
    }

    #[tokio::test]
    async fn fetched_csv_goes_to_chosen_path() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.path("/api/2.0/fo/report/");
                then.status(200).header("content-type", "text/csv").body("IP,QID\n10.0.0.1,38170\n");
            })
            .await;

        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.csv");
        let mut session = session(dir.path().to_path_buf());
        session
            .run(
                &creds(&server),
                &Invocation::new(OperationKind::FetchReport)
                    .with("id", "5")
                    .with("save_path", target.to_str().unwrap()),
            )
            .await;

        assert_eq!(fs::read_to_string(&target).unwrap(), "IP,QID\n10.0.0.1,38170\n");
    }

    #[tokio::test]
    async fn unwritable_path_is_a_save_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.path("/api/2.0/fo/report/");
                then.status(200).body("data");
            })
            .await;

        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("missing").join("out.txt");
        let mut session = session(dir.path().to_path_buf());
        let outcome = session
            .run(
                &creds(&server),
                &Invocation::new(OperationKind::FetchReport)
                    .with("id", "5")
                    .with("save_path", target.to_str().unwrap()),
            )
            .await;

        assert!(matches!(outcome.notice, Notice::Failed(OperationError::Io(_))));
    }

    #[test]
    fn extensions_follow_content_type() {
        assert_eq!(extension_for("text/csv; charset=utf-8"), "csv");
        assert_eq!(extension_for("application/pdf"), "pdf");
        assert_eq!(extension_for("text/xml"), "xml");
        assert_eq!(extension_for("text/html"), "html");
        assert_eq!(extension_for("application/zip"), "txt");
    }
}
