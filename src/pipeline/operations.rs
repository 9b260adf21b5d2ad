//! Operation registry
//!
//! Each operation is a static descriptor: endpoint, method, fixed parameters,
//! the inputs it asks for and how the result is presented. One generic
//! pipeline in [`crate::pipeline::session`] runs all of them.

use std::collections::BTreeMap;

use chrono::Local;

use crate::error::OperationError;
use crate::models::{HttpMethod, RequestBody, RequestSpec};
use crate::pipeline::extract::ExtractorId;
use crate::pipeline::templates::TemplateResolver;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    ListReports,
    ListScans,
    ListCloudAgents,
    ListActivationKeys,
    ListReportTemplates,
    ListScanTargets,
    SearchAssets,
    HostDetails,
    LaunchReport,
    FetchReport,
    DeleteReport,
    LaunchScan,
    ScanResults,
    SearchVulnerabilities,
    QidDetails,
    UserInfo,
    CustomRequest,
}

/// How a completed exchange is presented
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    /// Raw rendering plus rows from the extractor
    Grid(ExtractorId),
    /// Raw rendering only
    Raw,
    /// Body saved to disk
    Download,
    /// Probe the template candidates instead of a single request
    Templates,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    /// Fixed set of values, first one is the default
    Choice(&'static [&'static str]),
    /// One of the names currently known to the template resolver
    Template,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldDefault {
    Empty,
    Value(&'static str),
    /// Prefix followed by the current local time, `%Y%m%d_%H%M%S`
    Timestamped(&'static str),
}

/// Where an input value ends up in the request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// Sent under this parameter name when non-empty
    Param(&'static str),
    /// Like `Param`, also adding the extra pairs when non-empty
    ParamWith(&'static str, &'static [(&'static str, &'static str)]),
    /// Parameter name is the value of another input
    KeyedBy(&'static str),
    /// Display name resolved to a template id
    Template(&'static str),
    /// Scan title resolved to a scan reference when known
    ScanRef(&'static str),
    /// Consumed by the pipeline, never sent as-is
    Local,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputField {
    pub key: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub default: FieldDefault,
    pub required: bool,
    pub binding: Binding,
}

impl InputField {
    const fn text(key: &'static str, label: &'static str, binding: Binding) -> Self {
        InputField {
            key,
            label,
            kind: FieldKind::Text,
            default: FieldDefault::Empty,
            required: false,
            binding,
        }
    }

    const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    const fn choice(mut self, values: &'static [&'static str]) -> Self {
        self.kind = FieldKind::Choice(values);
        self
    }

    const fn default(mut self, default: FieldDefault) -> Self {
        self.default = default;
        self
    }

    /// Value a fresh form starts with
    pub fn initial_value(&self) -> String {
        match (self.kind, self.default) {
            (_, FieldDefault::Value(value)) => value.to_string(),
            (_, FieldDefault::Timestamped(prefix)) => {
                format!("{}{}", prefix, Local::now().format("%Y%m%d_%H%M%S"))
            }
            (FieldKind::Choice(values), FieldDefault::Empty) => {
                values.first().map(|v| v.to_string()).unwrap_or_default()
            }
            _ => String::new(),
        }
    }
}

#[derive(Debug)]
pub struct OperationDescriptor {
    pub kind: OperationKind,
    pub category: &'static str,
    pub label: &'static str,
    pub method: HttpMethod,
    pub endpoint: &'static str,
    pub params: &'static [(&'static str, &'static str)],
    pub fields: &'static [InputField],
    pub output: Output,
    pub success_message: Option<&'static str>,
    pub not_found_hint: Option<&'static str>,
    /// Prompt shown before sending; `{id}` is replaced with the `id` input
    pub confirm: Option<&'static str>,
    pub stream: bool,
}

impl OperationDescriptor {
    pub fn confirmation_prompt(&self, invocation: &Invocation) -> Option<String> {
        self.confirm
            .map(|prompt| prompt.replace("{id}", invocation.value("id")))
    }
}

/// A filled-in operation ready to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub kind: OperationKind,
    pub inputs: BTreeMap<String, String>,
}

impl Invocation {
    pub fn new(kind: OperationKind) -> Self {
        Invocation {
            kind,
            inputs: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.inputs.insert(key.to_string(), value.to_string());
        self
    }

    /// Trimmed value, empty when absent
    pub fn value(&self, key: &str) -> &str {
        self.inputs.get(key).map(|v| v.trim()).unwrap_or("")
    }
}

const REPORT: &str = "/api/2.0/fo/report/";
const SCAN: &str = "/api/2.0/fo/scan/";
const HOST: &str = "/api/2.0/fo/asset/host/";
const KB: &str = "/api/2.0/fo/knowledge_base/vuln/";

const fn simple(
    kind: OperationKind,
    category: &'static str,
    label: &'static str,
    method: HttpMethod,
    endpoint: &'static str,
    params: &'static [(&'static str, &'static str)],
    output: Output,
) -> OperationDescriptor {
    OperationDescriptor {
        kind,
        category,
        label,
        method,
        endpoint,
        params,
        fields: &[],
        output,
        success_message: None,
        not_found_hint: None,
        confirm: None,
        stream: false,
    }
}

static OPERATIONS: &[OperationDescriptor] = &[
    simple(
        OperationKind::ListReports,
        "Reports",
        "List Reports",
        HttpMethod::GET,
        REPORT,
        &[("action", "list")],
        Output::Grid(ExtractorId::Reports),
    ),
    simple(
        OperationKind::ListReportTemplates,
        "Reports",
        "List Report Templates",
        HttpMethod::POST,
        REPORT,
        &[],
        Output::Templates,
    ),
    OperationDescriptor {
        fields: &[
            InputField::text("title", "Report Title", Binding::Param("report_title"))
                .default(FieldDefault::Timestamped("Report_")),
            InputField {
                kind: FieldKind::Template,
                ..InputField::text("template", "Template", Binding::Template("template_id"))
            }
            .required(),
            InputField::text("report_type", "Report Type", Binding::Param("report_type"))
                .choice(&["Scan", "Host"]),
            InputField::text("output_format", "Output Format", Binding::Param("output_format"))
                .choice(&["csv", "pdf", "xml", "html"]),
            InputField::text("tag_set_include", "Include Tags", Binding::Param("tag_set_include")),
            InputField::text("tag_set_exclude", "Exclude Tags", Binding::Param("tag_set_exclude")),
        ],
        success_message: Some("Report launched successfully!"),
        ..simple(
            OperationKind::LaunchReport,
            "Reports",
            "Launch Report",
            HttpMethod::POST,
            REPORT,
            &[("action", "launch")],
            Output::Raw,
        )
    },
    OperationDescriptor {
        fields: &[
            InputField::text("id", "Report ID", Binding::Param("id")).required(),
            InputField::text("save_path", "Save As", Binding::Local),
        ],
        stream: true,
        ..simple(
            OperationKind::FetchReport,
            "Reports",
            "Fetch Report",
            HttpMethod::GET,
            REPORT,
            &[("action", "fetch")],
            Output::Download,
        )
    },
    OperationDescriptor {
        fields: &[InputField::text("id", "Report ID", Binding::Param("id")).required()],
        success_message: Some("Report deleted successfully!"),
        confirm: Some("Are you sure you want to delete report ID {id}?"),
        ..simple(
            OperationKind::DeleteReport,
            "Reports",
            "Delete Report",
            HttpMethod::POST,
            REPORT,
            &[("action", "delete")],
            Output::Raw,
        )
    },
    simple(
        OperationKind::ListScans,
        "Scans",
        "List Scans",
        HttpMethod::GET,
        SCAN,
        &[("action", "list")],
        Output::Grid(ExtractorId::Scans),
    ),
    OperationDescriptor {
        fields: &[
            InputField::text("scan_title", "Scan Title", Binding::Param("scan_title"))
                .default(FieldDefault::Timestamped("Scan_"))
                .required(),
            InputField::text("profile_kind", "Profile By", Binding::Local)
                .choice(&["option_title", "option_id"]),
            InputField::text("profile", "Option Profile", Binding::KeyedBy("profile_kind"))
                .default(FieldDefault::Value("Initial Options")),
            InputField::text("ip", "Target IPs", Binding::Param("ip")).required(),
        ],
        success_message: Some("Scan launched successfully!"),
        ..simple(
            OperationKind::LaunchScan,
            "Scans",
            "Launch Scan",
            HttpMethod::POST,
            SCAN,
            &[("action", "launch")],
            Output::Raw,
        )
    },
    OperationDescriptor {
        fields: &[InputField::text("scan_ref", "Scan Reference", Binding::ScanRef("scan_ref")).required()],
        ..simple(
            OperationKind::ScanResults,
            "Scans",
            "Scan Results",
            HttpMethod::GET,
            SCAN,
            &[("action", "fetch"), ("mode", "extended")],
            Output::Raw,
        )
    },
    simple(
        OperationKind::ListScanTargets,
        "Scans",
        "List Scan Targets",
        HttpMethod::GET,
        "/api/2.0/fo/asset/ip/",
        &[("action", "list")],
        Output::Raw,
    ),
    OperationDescriptor {
        fields: &[
            InputField::text("search_by", "Search By", Binding::Local).choice(&["ips", "dns", "netbios"]),
            InputField::text("term", "Search Term", Binding::KeyedBy("search_by")).required(),
        ],
        ..simple(
            OperationKind::SearchAssets,
            "Assets",
            "Search Assets",
            HttpMethod::GET,
            HOST,
            &[("action", "list")],
            Output::Grid(ExtractorId::HostAssets),
        )
    },
    OperationDescriptor {
        fields: &[InputField::text("ips", "IP Address", Binding::Param("ips")).required()],
        ..simple(
            OperationKind::HostDetails,
            "Assets",
            "Host Details",
            HttpMethod::GET,
            HOST,
            &[("action", "list"), ("details", "All")],
            Output::Grid(ExtractorId::HostDetails),
        )
    },
    OperationDescriptor {
        not_found_hint: Some(
            "Cloud agents endpoint may vary by platform.\nTry: Assets > Search Assets\nOr use Custom Request to test:\n/qps/rest/2.0/count/am/hostasset",
        ),
        ..simple(
            OperationKind::ListCloudAgents,
            "Assets",
            "List Cloud Agents",
            HttpMethod::GET,
            HOST,
            &[("action", "list"), ("details", "Basic"), ("truncation_limit", "100")],
            Output::Raw,
        )
    },
    OperationDescriptor {
        not_found_hint: Some(
            "Try using Custom Request with:\nGET /qps/rest/2.0/get/am/key\nOr check your API permissions.",
        ),
        ..simple(
            OperationKind::ListActivationKeys,
            "Assets",
            "List Activation Keys",
            HttpMethod::GET,
            "/qps/rest/2.0/get/am/key",
            &[("details", "All")],
            Output::Raw,
        )
    },
    OperationDescriptor {
        fields: &[
            InputField::text("ids", "QIDs", Binding::ParamWith("ids", &[("details", "All")])),
            InputField::text("severities", "Severity", Binding::Param("severities"))
                .choice(&["", "1", "2", "3", "4", "5"]),
            InputField::text(
                "last_modified_after",
                "Modified After",
                Binding::Param("last_modified_after"),
            ),
        ],
        ..simple(
            OperationKind::SearchVulnerabilities,
            "Knowledge Base",
            "Search Vulnerabilities",
            HttpMethod::GET,
            KB,
            &[("action", "list")],
            Output::Grid(ExtractorId::Vulnerabilities),
        )
    },
    OperationDescriptor {
        fields: &[InputField::text("ids", "QID", Binding::Param("ids")).required()],
        ..simple(
            OperationKind::QidDetails,
            "Knowledge Base",
            "QID Details",
            HttpMethod::GET,
            KB,
            &[("action", "list"), ("details", "All")],
            Output::Raw,
        )
    },
    simple(
        OperationKind::UserInfo,
        "Users",
        "User Info",
        HttpMethod::GET,
        "/api/2.0/fo/user/",
        &[("action", "list")],
        Output::Raw,
    ),
    OperationDescriptor {
        fields: &[
            InputField::text("method", "Method", Binding::Local).choice(&["GET", "POST", "PUT", "DELETE"]),
            InputField::text("endpoint", "Endpoint", Binding::Local)
                .default(FieldDefault::Value("/api/2.0/fo/user/"))
                .required(),
            InputField::text("params", "Params (k=v, & or newline)", Binding::Local)
                .default(FieldDefault::Value("action=list")),
            InputField::text("body", "Raw Body", Binding::Local),
        ],
        ..simple(
            OperationKind::CustomRequest,
            "Advanced",
            "Custom Request",
            HttpMethod::GET,
            "",
            &[],
            Output::Raw,
        )
    },
];

/// All descriptors in menu order
pub fn operations() -> &'static [OperationDescriptor] {
    OPERATIONS
}

pub fn descriptor(kind: OperationKind) -> &'static OperationDescriptor {
    OPERATIONS
        .iter()
        .find(|d| d.kind == kind)
        .unwrap_or_else(|| unreachable!("every OperationKind has a descriptor"))
}

/// Turn an invocation into a request. All validation happens here, before
/// anything touches the network.
pub fn build_request(
    descriptor: &OperationDescriptor,
    invocation: &Invocation,
    templates: &TemplateResolver,
    scan_refs: &BTreeMap<String, String>,
) -> Result<RequestSpec, OperationError> {
    for field in descriptor.fields.iter().filter(|f| f.required) {
        if invocation.value(field.key).is_empty() {
            return Err(OperationError::Validation(format!(
                "Please provide {}.",
                field.label
            )));
        }
    }

    if descriptor.kind == OperationKind::CustomRequest {
        return build_custom(invocation);
    }

    let mut params: Vec<(String, String)> = descriptor
        .params
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    for field in descriptor.fields {
        let value = invocation.value(field.key);
        if value.is_empty() {
            continue;
        }
        match field.binding {
            Binding::Param(name) => params.push((name.to_string(), value.to_string())),
            Binding::ParamWith(name, extra) => {
                params.extend(extra.iter().map(|(k, v)| (k.to_string(), v.to_string())));
                params.push((name.to_string(), value.to_string()));
            }
            Binding::KeyedBy(selector) => {
                let name = invocation.value(selector);
                if name.is_empty() {
                    return Err(OperationError::Validation(format!(
                        "Please choose how {} is interpreted.",
                        field.label
                    )));
                }
                params.push((name.to_string(), value.to_string()));
            }
            Binding::Template(name) => {
                let id = templates.lookup(value)?;
                params.push((name.to_string(), id.to_string()));
            }
            Binding::ScanRef(name) => {
                let reference = scan_refs.get(value).map(String::as_str).unwrap_or(value);
                params.push((name.to_string(), reference.to_string()));
            }
            Binding::Local => {}
        }
    }

    let spec = RequestSpec::new(descriptor.method, descriptor.endpoint).with_params(params);
    Ok(if descriptor.stream { spec.streamed() } else { spec })
}

fn build_custom(invocation: &Invocation) -> Result<RequestSpec, OperationError> {
    let method_name = invocation.value("method");
    let method = if method_name.is_empty() {
        HttpMethod::GET
    } else {
        HttpMethod::parse(method_name).ok_or_else(|| {
            OperationError::Validation(format!("Unsupported method '{}'.", method_name))
        })?
    };

    let params = parse_params(invocation.value("params"));
    let body = invocation.value("body");

    let spec = RequestSpec::new(method, invocation.value("endpoint"));
    if body.is_empty() {
        return Ok(spec.with_params(params));
    }
    Ok(RequestSpec {
        query: params,
        body: Some(RequestBody::Raw(body.to_string())),
        ..spec
    })
}

/// `key=value` pairs separated by newlines or `&`. Blank entries, entries
/// starting with `#` and entries without `=` are skipped.
pub fn parse_params(raw: &str) -> Vec<(String, String)> {
    raw.split(&['\n', '&'][..])
        .map(str::trim)
        .filter(|entry| !entry.is_empty() && !entry.starts_with('#'))
        .filter_map(|entry| entry.split_once('='))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .filter(|(key, _)| !key.is_empty())
        .collect()
}
