//! Command handlers - business logic for processing UI events

use crate::app::AppState;
use crate::app::state::FormState;
use crate::messages::render::NoticeView;
use crate::messages::ui_events::{InputMode, Panel};
use crate::messages::{NetworkCommand, NetworkResponse};
use crate::pipeline::operations::{descriptor, operations, FieldKind, Invocation};
use crate::pipeline::{Notice, OperationOutcome};

const PAGE: usize = 10;

impl AppState {
    // ========================
    // Navigation
    // ========================

    pub fn next_panel(&mut self) {
        self.active_panel = self.active_panel.next();
    }

    pub fn prev_panel(&mut self) {
        self.active_panel = self.active_panel.prev();
    }

    pub fn move_up(&mut self, step: usize) {
        match self.active_panel {
            Panel::Operations => {
                self.selected_operation = self.selected_operation.saturating_sub(step);
            }
            Panel::Table => self.selected_row = self.selected_row.saturating_sub(step),
            Panel::Raw => self.raw_scroll = self.raw_scroll.saturating_sub(step as u16),
            Panel::Connection => {}
        }
    }

    pub fn move_down(&mut self, step: usize) {
        match self.active_panel {
            Panel::Operations => {
                let last = operations().len().saturating_sub(1);
                self.selected_operation = (self.selected_operation + step).min(last);
            }
            Panel::Table => {
                let last = self.grid.visible_rows().len().saturating_sub(1);
                self.selected_row = (self.selected_row + step).min(last);
            }
            Panel::Raw => self.raw_scroll = self.raw_scroll.saturating_add(step as u16),
            Panel::Connection => {}
        }
    }

    pub fn page_up(&mut self) {
        self.move_up(PAGE);
    }

    pub fn page_down(&mut self) {
        self.move_down(PAGE);
    }

    pub fn prev_column(&mut self) {
        self.selected_column = self.selected_column.saturating_sub(1);
    }

    pub fn next_column(&mut self) {
        let last = self.grid.columns().len().saturating_sub(1);
        self.selected_column = (self.selected_column + 1).min(last);
    }

    // ========================
    // Connection bar editing
    // ========================

    pub fn start_editing(&mut self) {
        self.input_mode = InputMode::Editing;
        self.cursor_position = self.current_input().len();
    }

    pub fn stop_editing(&mut self) {
        self.input_mode = InputMode::Normal;
    }

    pub fn next_connection_field(&mut self) {
        self.connection_field = self.connection_field.next();
        self.cursor_position = self.current_input().len();
    }

    pub fn move_cursor_left(&mut self) {
        let input = self.current_input();
        if self.cursor_position > 0 {
            let new_pos = input[..self.cursor_position]
                .char_indices()
                .last()
                .map(|(i, _)| i)
                .unwrap_or(0);
            self.cursor_position = new_pos;
        }
    }

    pub fn move_cursor_right(&mut self) {
        let input = self.current_input();
        if self.cursor_position < input.len() {
            let new_pos = input[self.cursor_position..]
                .char_indices()
                .nth(1)
                .map(|(i, _)| self.cursor_position + i)
                .unwrap_or(input.len());
            self.cursor_position = new_pos;
        }
    }

    pub fn enter_char(&mut self, c: char) {
        if self.input_mode == InputMode::Filter {
            let mut term = self.grid.filter_term().to_string();
            term.push(c);
            self.apply_filter(&term);
            return;
        }
        let cursor_pos = self.cursor_position;
        let input = self.connection_input_mut();
        if cursor_pos <= input.len() {
            input.insert(cursor_pos, c);
            self.cursor_position = cursor_pos + c.len_utf8();
        }
    }

    pub fn delete_char(&mut self) {
        if self.input_mode == InputMode::Filter {
            let mut term = self.grid.filter_term().to_string();
            term.pop();
            self.apply_filter(&term);
            return;
        }
        if self.cursor_position > 0 {
            let cursor_pos = self.cursor_position;
            let input = self.connection_input_mut();
            let prev_pos = input[..cursor_pos]
                .char_indices()
                .last()
                .map(|(i, _)| i)
                .unwrap_or(0);
            input.remove(prev_pos);
            self.cursor_position = prev_pos;
        }
    }

    // ========================
    // Table filter and sort
    // ========================

    pub fn start_filter(&mut self) {
        self.active_panel = Panel::Table;
        self.input_mode = InputMode::Filter;
    }

    pub fn clear_filter(&mut self) {
        self.apply_filter("");
    }

    fn apply_filter(&mut self, term: &str) {
        self.grid.filter(term);
        self.selected_row = 0;
        self.last_sort = None;
    }

    pub fn sort_selected_column(&mut self) {
        let Some(column) = self.grid.columns().get(self.selected_column).cloned() else {
            return;
        };
        match self.grid.sort_by_column(&column) {
            Ok(direction) => {
                self.status = format!("Sorted by {} ({:?})", column, direction);
                self.last_sort = Some((column, direction));
            }
            Err(e) => tracing::warn!(error = %e, "Sort failed"),
        }
    }

    /// Empty the grid, the filter and the raw pane
    pub fn clear_output(&mut self) {
        self.grid.clear();
        self.raw_output.clear();
        self.raw_scroll = 0;
        self.selected_row = 0;
        self.selected_column = 0;
        self.last_sort = None;
        self.last_status = None;
        if self.input_mode == InputMode::Filter {
            self.input_mode = InputMode::Normal;
        }
        self.status = String::from("Output cleared");
    }

    // ========================
    // Operations
    // ========================

    /// Open the form for the selected operation, or run it directly when it
    /// takes no input
    pub fn activate_operation(&mut self) -> Option<NetworkCommand> {
        let descriptor = operations().get(self.selected_operation)?;
        if descriptor.fields.is_empty() {
            return self.submit(Invocation::new(descriptor.kind));
        }
        let mut form = FormState::open(descriptor.kind);
        for field in form.fields.iter_mut() {
            if field.kind == FieldKind::Template {
                field.value = self.template_names.first().cloned().unwrap_or_default();
            }
        }
        self.form = Some(form);
        None
    }

    pub fn form_char(&mut self, c: char) {
        if let Some(field) = self.form.as_mut().and_then(|f| f.fields.get_mut(f.selected)) {
            if field.kind == FieldKind::Text {
                field.value.push(c);
            }
        }
    }

    pub fn form_backspace(&mut self) {
        if let Some(field) = self.form.as_mut().and_then(|f| f.fields.get_mut(f.selected)) {
            if field.kind == FieldKind::Text {
                field.value.pop();
            }
        }
    }

    pub fn form_next_field(&mut self) {
        if let Some(form) = self.form.as_mut() {
            if !form.fields.is_empty() {
                form.selected = (form.selected + 1) % form.fields.len();
            }
        }
    }

    pub fn form_prev_field(&mut self) {
        if let Some(form) = self.form.as_mut() {
            if !form.fields.is_empty() {
                form.selected = form
                    .selected
                    .checked_sub(1)
                    .unwrap_or(form.fields.len() - 1);
            }
        }
    }

    /// Step a choice or template field through its values
    pub fn form_cycle_choice(&mut self, forward: bool) {
        let templates = self.template_names.clone();
        let Some(field) = self.form.as_mut().and_then(|f| f.fields.get_mut(f.selected)) else {
            return;
        };
        let values: Vec<String> = match field.kind {
            FieldKind::Choice(values) => values.iter().map(|v| v.to_string()).collect(),
            FieldKind::Template => templates,
            FieldKind::Text => return,
        };
        if values.is_empty() {
            return;
        }
        let current = values.iter().position(|v| *v == field.value);
        let next = match (current, forward) {
            (None, _) => 0,
            (Some(i), true) => (i + 1) % values.len(),
            (Some(i), false) => i.checked_sub(1).unwrap_or(values.len() - 1),
        };
        field.value = values[next].clone();
    }

    pub fn form_cancel(&mut self) {
        self.form = None;
    }

    /// Submit the open form. A form that needs confirmation waits for it.
    pub fn form_submit(&mut self) -> Option<NetworkCommand> {
        let invocation = self.form.as_ref()?.to_invocation();
        if let Some(prompt) = descriptor(invocation.kind).confirmation_prompt(&invocation) {
            if !invocation.value("id").is_empty() {
                self.pending_confirm = Some((invocation, prompt));
                return None;
            }
        }
        self.submit(invocation)
    }

    pub fn confirm(&mut self) -> Option<NetworkCommand> {
        let (invocation, _) = self.pending_confirm.take()?;
        self.submit(invocation)
    }

    pub fn reject(&mut self) {
        self.pending_confirm = None;
        self.status = String::from("Cancelled");
    }

    // ========================
    // Request sending
    // ========================

    /// Queue an operation unless one is already in flight
    pub fn submit(&mut self, invocation: Invocation) -> Option<NetworkCommand> {
        if self.is_loading {
            self.status = String::from("Busy: wait for the current request to finish");
            return None;
        }

        self.form = None;
        self.is_loading = true;
        let id = self.next_id();
        self.pending_request_id = Some(id);

        Some(NetworkCommand::Execute {
            id,
            credentials: self.credentials.clone(),
            invocation,
        })
    }

    // ========================
    // Response handling
    // ========================

    pub fn handle_response(&mut self, response: NetworkResponse) {
        match response {
            NetworkResponse::Status(line) => self.status = line,
            NetworkResponse::Templates(names) => self.template_names = names,
            NetworkResponse::Completed { id, outcome } => {
                if self.pending_request_id == Some(id) {
                    self.apply_outcome(outcome);
                    self.is_loading = false;
                    self.pending_request_id = None;
                }
            }
        }
    }

    /// Apply an operation result. Grid and raw pane only change when the
    /// outcome carries replacements for them.
    pub fn apply_outcome(&mut self, outcome: OperationOutcome) {
        if let Some(rendering) = outcome.rendering {
            self.raw_output = rendering;
            self.raw_scroll = 0;
            self.last_status = outcome.http_status;
            self.active_panel = Panel::Raw;
        }

        if let Some(table) = outcome.table {
            match self.grid.populate(table.columns, table.rows) {
                Ok(()) => {
                    self.selected_row = 0;
                    self.selected_column = 0;
                    self.last_sort = None;
                    self.active_panel = Panel::Table;
                }
                Err(e) => tracing::warn!(error = %e, "Discarding malformed table"),
            }
        }

        if let Some(status) = outcome.status {
            self.status = status;
        }

        self.notice = match outcome.notice {
            Notice::None => None,
            Notice::Info { title, message } => Some(NoticeView {
                title,
                message,
                is_error: false,
            }),
            Notice::Warning { title, message } => Some(NoticeView {
                title,
                message,
                is_error: true,
            }),
            Notice::Failed(e) => Some(NoticeView {
                title: e.title().to_string(),
                message: e.to_string(),
                is_error: true,
            }),
        };
    }

    // ========================
    // Popups
    // ========================

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    pub fn close_help(&mut self) {
        self.show_help = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{OperationError, TransportError};
    use crate::pipeline::operations::OperationKind;
    use crate::pipeline::Table;
    use crate::storage::Settings;

    fn state() -> AppState {
        AppState::new(&Settings::default())
    }

    fn select(state: &mut AppState, kind: OperationKind) {
        state.selected_operation = operations().iter().position(|d| d.kind == kind).unwrap();
    }

    fn table(rows: &[&[&str]]) -> Table {
        Table {
            columns: vec!["Reference".into(), "Title".into()],
            rows: rows.iter().map(|r| r.iter().map(|c| c.to_string()).collect()).collect(),
        }
    }

    fn outcome(kind: OperationKind) -> OperationOutcome {
        OperationOutcome {
            kind,
            rendering: None,
            table: None,
            notice: Notice::None,
            status: None,
            http_status: None,
        }
    }

    #[test]
    fn operation_without_inputs_runs_immediately() {
        let mut state = state();
        select(&mut state, OperationKind::ListScans);
        let cmd = state.activate_operation();
        assert!(matches!(cmd, Some(NetworkCommand::Execute { id: 1, .. })));
        assert!(state.is_loading);
    }

    #[test]
    fn second_operation_is_refused_while_loading() {
        let mut state = state();
        select(&mut state, OperationKind::ListScans);
        assert!(state.activate_operation().is_some());
        assert!(state.activate_operation().is_none());
        assert!(state.status.starts_with("Busy"));
    }

    #[test]
    fn delete_waits_for_confirmation() {
        let mut state = state();
        select(&mut state, OperationKind::DeleteReport);
        assert!(state.activate_operation().is_none());
        "42".chars().for_each(|c| state.form_char(c));

        assert!(state.form_submit().is_none());
        assert_eq!(
            state.to_render_state().confirm_prompt.as_deref(),
            Some("Are you sure you want to delete report ID 42?")
        );

        state.reject();
        assert!(state.pending_confirm.is_none());
        assert!(!state.is_loading);

        assert!(state.form_submit().is_none());
        match state.confirm() {
            Some(NetworkCommand::Execute { invocation, .. }) => {
                assert_eq!(invocation.value("id"), "42");
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert!(state.form.is_none());
    }

    #[test]
    fn choice_fields_cycle_both_ways() {
        let mut state = state();
        select(&mut state, OperationKind::SearchAssets);
        state.activate_operation();
        state.form_cycle_choice(true);
        assert_eq!(state.form.as_ref().unwrap().fields[0].value, "dns");
        state.form_cycle_choice(false);
        state.form_cycle_choice(false);
        assert_eq!(state.form.as_ref().unwrap().fields[0].value, "netbios");
    }

    #[test]
    fn template_field_offers_known_names() {
        let mut state = state();
        state.handle_response(NetworkResponse::Templates(vec!["A".into(), "B".into()]));
        select(&mut state, OperationKind::LaunchReport);
        state.activate_operation();
        state.form_next_field();
        assert_eq!(state.form.as_ref().unwrap().fields[1].value, "A");
        state.form_cycle_choice(true);
        assert_eq!(state.form.as_ref().unwrap().fields[1].value, "B");
    }

    #[test]
    fn completed_outcome_fills_grid_and_raw_pane() {
        let mut state = state();
        select(&mut state, OperationKind::ListScans);
        let Some(NetworkCommand::Execute { id, .. }) = state.activate_operation() else {
            panic!("expected a command");
        };

        let mut done = outcome(OperationKind::ListScans);
        done.rendering = Some("Status Code: 200 OK\n".into());
        done.table = Some(table(&[&["scan/1", "Nightly"], &["scan/2", "Weekly"]]));
        done.http_status = Some(200);
        state.handle_response(NetworkResponse::Completed { id, outcome: done });

        assert!(!state.is_loading);
        assert_eq!(state.active_panel, Panel::Table);
        let render = state.to_render_state();
        assert_eq!(render.rows.len(), 2);
        assert_eq!(render.last_status, Some(200));
        assert!(render.notice.is_none());
    }

    #[test]
    fn failed_outcome_keeps_previous_grid() {
        let mut state = state();
        let mut first = outcome(OperationKind::ListScans);
        first.table = Some(table(&[&["scan/1", "Nightly"]]));
        state.apply_outcome(first);

        let mut failed = outcome(OperationKind::ListScans);
        failed.rendering = Some("No response received.\n".into());
        failed.notice = Notice::Failed(OperationError::Transport(TransportError::Timeout));
        state.apply_outcome(failed);

        assert_eq!(state.grid.all_rows().len(), 1);
        let notice = state.notice.clone().unwrap();
        assert_eq!(notice.title, "Timeout Error");
        assert!(notice.is_error);
    }

    #[test]
    fn stale_completion_is_ignored() {
        let mut state = state();
        let mut done = outcome(OperationKind::ListScans);
        done.rendering = Some("late".into());
        state.handle_response(NetworkResponse::Completed { id: 99, outcome: done });
        assert!(state.raw_output.is_empty());
    }

    #[test]
    fn filter_typing_narrows_rows() {
        let mut state = state();
        let mut first = outcome(OperationKind::ListScans);
        first.table = Some(table(&[&["scan/1", "Nightly"], &["scan/2", "Weekly"]]));
        state.apply_outcome(first);

        state.start_filter();
        "week".chars().for_each(|c| state.enter_char(c));
        assert_eq!(state.to_render_state().rows, vec![vec!["scan/2", "Weekly"]]);

        state.delete_char();
        state.delete_char();
        state.delete_char();
        state.delete_char();
        assert_eq!(state.to_render_state().rows.len(), 2);
    }

    #[test]
    fn sort_toggles_on_selected_column() {
        let mut state = state();
        let mut first = outcome(OperationKind::ListScans);
        first.table = Some(table(&[&["scan/1", "b"], &["scan/2", "a"]]));
        state.apply_outcome(first);
        state.next_column();

        state.sort_selected_column();
        assert_eq!(state.to_render_state().rows[0][1], "a");
        state.sort_selected_column();
        assert_eq!(state.to_render_state().rows[0][1], "b");
    }

    #[test]
    fn clear_output_empties_everything() {
        let mut state = state();
        let mut first = outcome(OperationKind::ListScans);
        first.table = Some(table(&[&["scan/1", "Nightly"]]));
        first.rendering = Some("raw".into());
        state.apply_outcome(first);

        state.clear_output();
        let render = state.to_render_state();
        assert!(render.columns.is_empty());
        assert!(render.raw_output.is_empty());
    }

    #[test]
    fn password_is_only_rendered_as_length() {
        let mut state = state();
        state.active_panel = Panel::Connection;
        state.start_editing();
        state.next_connection_field();
        state.next_connection_field();
        "s3cret".chars().for_each(|c| state.enter_char(c));
        let render = state.to_render_state();
        assert_eq!(render.password_len, 6);
        assert_eq!(state.credentials.password, "s3cret");
    }
}
