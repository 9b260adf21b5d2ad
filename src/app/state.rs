//! App state - pure data structure with no I/O logic

use crate::messages::render::{FormFieldView, FormView, NoticeView, OperationItem};
use crate::messages::ui_events::{ConnectionField, InputMode, Panel, Popup};
use crate::messages::RenderState;
use crate::models::Credentials;
use crate::pipeline::operations::{descriptor, operations, FieldKind, Invocation, OperationKind};
use crate::pipeline::{GridModel, SortDirection};
use crate::storage::Settings;

/// One editable input of an open operation form
#[derive(Clone, Debug)]
pub struct FormField {
    pub key: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub value: String,
}

/// Operation form popup
#[derive(Clone, Debug)]
pub struct FormState {
    pub kind: OperationKind,
    pub fields: Vec<FormField>,
    pub selected: usize,
}

impl FormState {
    pub fn open(kind: OperationKind) -> Self {
        FormState {
            kind,
            fields: descriptor(kind)
                .fields
                .iter()
                .map(|field| FormField {
                    key: field.key,
                    label: field.label,
                    kind: field.kind,
                    required: field.required,
                    value: field.initial_value(),
                })
                .collect(),
            selected: 0,
        }
    }

    pub fn to_invocation(&self) -> Invocation {
        Invocation {
            kind: self.kind,
            inputs: self
                .fields
                .iter()
                .map(|f| (f.key.to_string(), f.value.clone()))
                .collect(),
        }
    }
}

/// Main application state - pure data, no I/O
pub struct AppState {
    // Connection
    pub credentials: Credentials,
    pub connection_field: ConnectionField,
    pub cursor_position: usize,

    // UI state
    pub active_panel: Panel,
    pub input_mode: InputMode,

    // Operations
    pub selected_operation: usize,

    // Output
    pub grid: GridModel,
    pub selected_row: usize,
    pub selected_column: usize,
    pub last_sort: Option<(String, SortDirection)>,
    pub raw_output: String,
    pub raw_scroll: u16,
    pub last_status: Option<u16>,

    // Request tracking
    pub status: String,
    pub is_loading: bool,
    pub next_request_id: u64,
    pub pending_request_id: Option<u64>,

    // Report templates known to the session
    pub template_names: Vec<String>,

    // Popups
    pub form: Option<FormState>,
    pub pending_confirm: Option<(Invocation, String)>,
    pub notice: Option<NoticeView>,
    pub show_help: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(&Settings::default())
    }
}

impl AppState {
    pub fn new(settings: &Settings) -> Self {
        let credentials = Credentials::new(settings.base_url.clone(), settings.username.clone(), "");
        AppState {
            cursor_position: credentials.base_url.len(),
            credentials,
            connection_field: ConnectionField::Url,
            active_panel: Panel::Operations,
            input_mode: InputMode::Normal,
            selected_operation: 0,
            grid: GridModel::new(),
            selected_row: 0,
            selected_column: 0,
            last_sort: None,
            raw_output: String::new(),
            raw_scroll: 0,
            last_status: None,
            status: String::from("Ready"),
            is_loading: false,
            next_request_id: 1,
            pending_request_id: None,
            template_names: Vec::new(),
            form: None,
            pending_confirm: None,
            notice: None,
            show_help: false,
        }
    }

    /// Generate a unique request ID
    pub fn next_id(&mut self) -> u64 {
        let id = self.next_request_id;
        self.next_request_id += 1;
        id
    }

    /// Popup that currently owns the keyboard. Notices sit above forms.
    pub fn popup(&self) -> Popup {
        if self.show_help {
            Popup::Help
        } else if self.notice.is_some() {
            Popup::Notice
        } else if self.pending_confirm.is_some() {
            Popup::Confirm
        } else if self.form.is_some() {
            Popup::Form
        } else {
            Popup::None
        }
    }

    /// Get the current input field content
    pub fn current_input(&self) -> &str {
        match self.input_mode {
            InputMode::Filter => self.grid.filter_term(),
            _ => match self.connection_field {
                ConnectionField::Url => &self.credentials.base_url,
                ConnectionField::Username => &self.credentials.username,
                ConnectionField::Password => &self.credentials.password,
            },
        }
    }

    /// Get mutable reference to current connection field
    pub fn connection_input_mut(&mut self) -> &mut String {
        match self.connection_field {
            ConnectionField::Url => &mut self.credentials.base_url,
            ConnectionField::Username => &mut self.credentials.username,
            ConnectionField::Password => &mut self.credentials.password,
        }
    }

    /// Convert state to RenderState for UI
    pub fn to_render_state(&self) -> RenderState {
        RenderState {
            base_url: self.credentials.base_url.clone(),
            username: self.credentials.username.clone(),
            password_len: self.credentials.password.chars().count(),
            connection_field: self.connection_field,
            active_panel: self.active_panel,
            input_mode: self.input_mode,
            cursor_position: self.cursor_position,
            popup: self.popup(),
            operations: operations()
                .iter()
                .map(|d| OperationItem {
                    category: d.category,
                    label: d.label,
                    method: d.method.as_str(),
                })
                .collect(),
            selected_operation: self.selected_operation,
            columns: self.grid.columns().to_vec(),
            rows: self.grid.visible_rows().into_iter().cloned().collect(),
            total_rows: self.grid.all_rows().len(),
            selected_row: self.selected_row,
            selected_column: self.selected_column,
            last_sort: self.last_sort.clone(),
            filter: self.grid.filter_term().to_string(),
            raw_output: self.raw_output.clone(),
            raw_scroll: self.raw_scroll,
            last_status: self.last_status,
            status: self.status.clone(),
            is_loading: self.is_loading,
            form: self.form.as_ref().map(|form| FormView {
                title: descriptor(form.kind).label,
                fields: form
                    .fields
                    .iter()
                    .map(|f| FormFieldView {
                        label: f.label,
                        value: f.value.clone(),
                        kind: f.kind,
                        required: f.required,
                    })
                    .collect(),
                selected: form.selected,
            }),
            confirm_prompt: self.pending_confirm.as_ref().map(|(_, prompt)| prompt.clone()),
            notice: self.notice.clone(),
        }
    }
}
