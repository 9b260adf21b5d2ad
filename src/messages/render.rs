//! Render state - data structure sent from App layer to UI for rendering

use crate::constants::DEFAULT_BASE_URL;
use crate::messages::ui_events::{ConnectionField, InputMode, Panel, Popup};
use crate::pipeline::operations::FieldKind;
use crate::pipeline::SortDirection;

/// One entry in the operations list
#[derive(Debug, Clone, PartialEq)]
pub struct OperationItem {
    pub category: &'static str,
    pub label: &'static str,
    pub method: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormFieldView {
    pub label: &'static str,
    pub value: String,
    pub kind: FieldKind,
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormView {
    pub title: &'static str,
    pub fields: Vec<FormFieldView>,
    pub selected: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NoticeView {
    pub title: String,
    pub message: String,
    pub is_error: bool,
}

/// Complete state needed by the UI to render
#[derive(Debug, Clone)]
pub struct RenderState {
    // Connection bar
    pub base_url: String,
    pub username: String,
    pub password_len: usize,
    pub connection_field: ConnectionField,

    // UI state
    pub active_panel: Panel,
    pub input_mode: InputMode,
    pub cursor_position: usize,
    pub popup: Popup,

    // Operations
    pub operations: Vec<OperationItem>,
    pub selected_operation: usize,

    // Table
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub total_rows: usize,
    pub selected_row: usize,
    pub selected_column: usize,
    pub last_sort: Option<(String, SortDirection)>,
    pub filter: String,

    // Raw output
    pub raw_output: String,
    pub raw_scroll: u16,
    pub last_status: Option<u16>,

    // Status bar
    pub status: String,
    pub is_loading: bool,

    // Popups
    pub form: Option<FormView>,
    pub confirm_prompt: Option<String>,
    pub notice: Option<NoticeView>,
}

impl Default for RenderState {
    fn default() -> Self {
        RenderState {
            base_url: String::from(DEFAULT_BASE_URL),
            username: String::new(),
            password_len: 0,
            connection_field: ConnectionField::Url,
            active_panel: Panel::Operations,
            input_mode: InputMode::Normal,
            cursor_position: 0,
            popup: Popup::None,
            operations: Vec::new(),
            selected_operation: 0,
            columns: Vec::new(),
            rows: Vec::new(),
            total_rows: 0,
            selected_row: 0,
            selected_column: 0,
            last_sort: None,
            filter: String::new(),
            raw_output: String::new(),
            raw_scroll: 0,
            last_status: None,
            status: String::from("Ready"),
            is_loading: false,
            form: None,
            confirm_prompt: None,
            notice: None,
        }
    }
}
