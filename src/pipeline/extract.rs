//! Declarative extractors that flatten XML records into table rows

use crate::constants::PLACEHOLDER;
use crate::pipeline::xml::Element;

/// One table cell: column heading, child path relative to the record element
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub column: &'static str,
    pub path: &'static str,
    /// Records whose required fields are all placeholders are dropped
    pub required: bool,
}

const fn field(column: &'static str, path: &'static str) -> FieldSpec {
    FieldSpec { column, path, required: true }
}

const fn optional(column: &'static str, path: &'static str) -> FieldSpec {
    FieldSpec { column, path, required: false }
}

/// Name → value cache filled as records are extracted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Harvest {
    /// Scan title → scan reference
    ScanRefs { key: &'static str, value: &'static str },
    /// Template title → template id
    Templates { key: &'static str, value: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtractorId {
    Reports,
    Scans,
    ReportTemplates,
    HostAssets,
    HostDetails,
    Vulnerabilities,
}

/// Repeating element name plus the column mapping for its records
#[derive(Debug)]
pub struct Extractor {
    pub id: ExtractorId,
    pub element: &'static str,
    pub fields: &'static [FieldSpec],
    pub harvest: Option<Harvest>,
}

impl Extractor {
    pub fn columns(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.column.to_string()).collect()
    }

    /// Index of a column by heading
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.column == column)
    }

    /// Rows in document order, one per matching element with data
    pub fn extract(&self, root: &Element) -> Vec<Vec<String>> {
        root.descendants(self.element)
            .into_iter()
            .filter_map(|record| self.extract_record(record))
            .collect()
    }

    fn extract_record(&self, record: &Element) -> Option<Vec<String>> {
        let row: Vec<String> = self
            .fields
            .iter()
            .map(|f| record.text_at(f.path).unwrap_or(PLACEHOLDER).to_string())
            .collect();

        let has_data = self
            .fields
            .iter()
            .zip(&row)
            .any(|(f, cell)| f.required && cell != PLACEHOLDER);

        has_data.then_some(row)
    }

    /// `(key, value)` pairs named by this extractor's harvest
    pub fn harvest_pairs(&self, rows: &[Vec<String>]) -> Vec<(String, String)> {
        let Some(harvest) = self.harvest else {
            return Vec::new();
        };
        let (key, value) = match harvest {
            Harvest::ScanRefs { key, value } | Harvest::Templates { key, value } => (key, value),
        };
        let (Some(key_idx), Some(value_idx)) = (self.column_index(key), self.column_index(value)) else {
            return Vec::new();
        };
        rows.iter()
            .filter(|row| row[key_idx] != PLACEHOLDER && row[value_idx] != PLACEHOLDER)
            .map(|row| (row[key_idx].clone(), row[value_idx].clone()))
            .collect()
    }
}

static REGISTRY: &[Extractor] = &[
    Extractor {
        id: ExtractorId::Reports,
        element: "REPORT",
        fields: &[
            field("ID", "ID"),
            field("Title", "TITLE"),
            field("Status", "STATUS/STATE"),
            field("Format", "OUTPUT_FORMAT"),
            field("Launch Time", "LAUNCH_DATETIME"),
        ],
        harvest: None,
    },
    Extractor {
        id: ExtractorId::Scans,
        element: "SCAN",
        fields: &[
            field("Reference", "REF"),
            field("Title", "TITLE"),
            field("Status", "STATUS/STATE"),
            field("Target", "TARGET"),
            field("Launch Time", "LAUNCH_DATETIME"),
        ],
        harvest: Some(Harvest::ScanRefs { key: "Title", value: "Reference" }),
    },
    Extractor {
        id: ExtractorId::ReportTemplates,
        element: "REPORT_TEMPLATE",
        fields: &[
            field("ID", "ID"),
            field("Title", "TITLE"),
            field("Type", "TYPE"),
        ],
        harvest: Some(Harvest::Templates { key: "Title", value: "ID" }),
    },
    Extractor {
        id: ExtractorId::HostAssets,
        element: "HOST",
        fields: &[
            field("IP", "IP"),
            field("DNS", "DNS"),
            field("NetBIOS", "NETBIOS"),
            optional("OS", "OS"),
            optional("Tracking Method", "TRACKING_METHOD"),
        ],
        harvest: None,
    },
    Extractor {
        id: ExtractorId::HostDetails,
        element: "HOST",
        fields: &[
            field("IP", "IP"),
            field("DNS", "DNS"),
            field("NetBIOS", "NETBIOS"),
            field("OS", "OS"),
            field("Tracking", "TRACKING_METHOD"),
            field("Last Scan", "LAST_SCAN_DATETIME"),
        ],
        harvest: None,
    },
    Extractor {
        id: ExtractorId::Vulnerabilities,
        element: "VULN",
        fields: &[
            field("QID", "QID"),
            field("Title", "TITLE"),
            field("Severity", "SEVERITY_LEVEL"),
            field("Type", "VULN_TYPE"),
            field("Published", "PUBLISHED_DATETIME"),
        ],
        harvest: None,
    },
];

pub fn extractor(id: ExtractorId) -> &'static Extractor {
    REGISTRY
        .iter()
        .find(|e| e.id == id)
        .unwrap_or_else(|| unreachable!("every ExtractorId is registered"))
}
