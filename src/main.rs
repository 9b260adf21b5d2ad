//! QuAPI TUI - Actor-based client for vulnerability-management APIs
//!
//! Architecture:
//! - UI Layer (Ratatui) - synchronous terminal rendering
//! - App Layer - central state machine processing events
//! - Network Layer (Tokio) - operations run one at a time

use std::io;
use std::time::Duration;
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    widgets::*,
};
use tokio::sync::mpsc;

use qapi_tui::app::AppActor;
use qapi_tui::constants::{APP_NAME, APP_VERSION};
use qapi_tui::messages::render::{FormView, NoticeView};
use qapi_tui::messages::ui_events::{key_to_ui_event, ConnectionField, InputMode, Panel, Popup};
use qapi_tui::messages::{NetworkCommand, NetworkResponse, RenderState, UiEvent};
use qapi_tui::network::NetworkActor;
use qapi_tui::pipeline::operations::FieldKind;
use qapi_tui::storage::Settings;
use qapi_tui::ui::{self, column_title, highlight_output, method_color, status_color};

/// Terminal cleanup guard
struct TerminalGuard;

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging to file
    let file_appender = tracing_appender::rolling::never(".", "qapi.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_ansi(false)
        .init();

    let settings = Settings::load().unwrap_or_else(|e| {
        tracing::warn!("Failed to load settings, using defaults: {}", e);
        Settings::default()
    });
    tracing::info!(config_dir = ?settings.config_dir(), "Starting {} {}", APP_NAME, APP_VERSION);

    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let _terminal_guard = TerminalGuard;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Create channels
    let (ui_tx, ui_rx) = mpsc::unbounded_channel::<UiEvent>();
    let (net_cmd_tx, net_cmd_rx) = mpsc::unbounded_channel::<NetworkCommand>();
    let (net_resp_tx, net_resp_rx) = mpsc::unbounded_channel::<NetworkResponse>();
    let (render_tx, mut render_rx) = mpsc::unbounded_channel::<RenderState>();

    // Spawn network actor
    let network_actor = NetworkActor::new(&settings, net_resp_tx);
    tokio::spawn(network_actor.run(net_cmd_rx));

    // Spawn app actor
    let app_actor = AppActor::new(&settings, net_cmd_tx, render_tx);
    tokio::spawn(app_actor.run(ui_rx, net_resp_rx));

    // Run UI loop (synchronous with async polling)
    run_ui_loop(&mut terminal, ui_tx, &mut render_rx).await?;

    Ok(())
}

/// Run the synchronous UI rendering loop
async fn run_ui_loop(
    terminal: &mut Terminal<impl Backend>,
    ui_tx: mpsc::UnboundedSender<UiEvent>,
    render_rx: &mut mpsc::UnboundedReceiver<RenderState>,
) -> anyhow::Result<()> {
    let mut current_state = RenderState::default();

    loop {
        terminal.draw(|f| draw_ui(f, &current_state))?;

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if let Some(event) = key_to_ui_event(
                    key,
                    current_state.active_panel,
                    current_state.input_mode,
                    current_state.popup,
                ) {
                    let quit = matches!(event, UiEvent::Quit);
                    let _ = ui_tx.send(event);
                    if quit {
                        break;
                    }
                }
            }
        }

        // Check for state updates (non-blocking)
        while let Ok(state) = render_rx.try_recv() {
            current_state = state;
        }
    }

    Ok(())
}

// ============================================================================
// UI Drawing Functions
// ============================================================================

fn draw_ui(f: &mut Frame, state: &RenderState) {
    let area = f.area();

    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Connection bar
            Constraint::Min(0),    // Operations + output
            Constraint::Length(1), // Status bar
        ])
        .split(area);

    draw_connection_bar(f, state, main_chunks[0]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(34), Constraint::Min(20)])
        .split(main_chunks[1]);

    draw_operations(f, state, body[0]);
    draw_output(f, state, body[1]);
    draw_status_bar(f, state, main_chunks[2]);

    match state.popup {
        Popup::Form => {
            if let Some(form) = &state.form {
                draw_form_popup(f, form, area);
            }
        }
        Popup::Confirm => {
            if let Some(prompt) = &state.confirm_prompt {
                draw_confirm_popup(f, prompt, area);
            }
        }
        Popup::Notice => {
            if let Some(notice) = &state.notice {
                draw_notice_popup(f, notice, area);
            }
        }
        Popup::Help => draw_help_popup(f, area),
        Popup::None => {}
    }
}

fn border_style(focused: bool, editing: bool) -> Style {
    if focused && editing {
        Style::default().fg(Color::Yellow)
    } else if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    }
}

fn draw_connection_bar(f: &mut Frame, state: &RenderState, area: Rect) {
    let is_focused = state.active_panel == Panel::Connection;
    let editing = is_focused && state.input_mode == InputMode::Editing;

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(50),
            Constraint::Percentage(25),
            Constraint::Percentage(25),
        ])
        .split(area);

    let masked = "*".repeat(state.password_len);
    let fields = [
        (ConnectionField::Url, " API URL ", state.base_url.as_str()),
        (ConnectionField::Username, " Username ", state.username.as_str()),
        (ConnectionField::Password, " Password ", masked.as_str()),
    ];

    for (i, (field, title, value)) in fields.iter().enumerate() {
        let active = is_focused && state.connection_field == *field;
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(border_style(active, editing))
            .title(*title);
        f.render_widget(Paragraph::new(*value).block(block), chunks[i]);

        if active && editing {
            let shown = if *field == ConnectionField::Password {
                state.password_len
            } else {
                value
                    .get(..state.cursor_position)
                    .map_or_else(|| value.chars().count(), |s| s.chars().count())
            };
            let area = chunks[i];
            let max_x = area.x + area.width.saturating_sub(2);
            let cursor_x = (area.x + shown as u16 + 1).min(max_x);
            f.set_cursor_position(Position::new(cursor_x, area.y + 1));
        }
    }
}

fn draw_operations(f: &mut Frame, state: &RenderState, area: Rect) {
    let is_focused = state.active_panel == Panel::Operations;

    let mut items: Vec<ListItem> = Vec::new();
    let mut selected_index = 0;
    let mut last_category = "";
    for (i, op) in state.operations.iter().enumerate() {
        if op.category != last_category {
            items.push(ListItem::new(Line::from(Span::styled(
                op.category,
                Style::default().fg(Color::DarkGray).bold(),
            ))));
            last_category = op.category;
        }
        if i == state.selected_operation {
            selected_index = items.len();
        }
        items.push(ListItem::new(Line::from(vec![
            Span::styled(format!(" {:6} ", op.method), Style::default().fg(method_color(op.method))),
            Span::raw(op.label),
        ])));
    }

    let title = if state.is_loading { " Operations [...] " } else { " Operations " };
    let list = List::new(items)
        .block(Block::default()
            .borders(Borders::ALL)
            .border_style(border_style(is_focused, false))
            .title(title))
        .highlight_style(if is_focused {
            Style::default().fg(Color::Yellow).bold()
        } else {
            Style::default().bold()
        });

    let mut list_state = ListState::default();
    list_state.select(Some(selected_index));
    f.render_stateful_widget(list, area, &mut list_state);
}

fn draw_output(f: &mut Frame, state: &RenderState, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(3), Constraint::Length(1)])
        .split(area);

    let selected_tab = if state.active_panel == Panel::Raw { 1 } else { 0 };
    f.render_widget(ui::render_tabs(&["Table", "Raw"], selected_tab), chunks[0]);

    if selected_tab == 1 {
        draw_raw(f, state, chunks[1]);
    } else {
        draw_table(f, state, chunks[1]);
    }

    draw_filter_line(f, state, chunks[2]);
}

fn draw_table(f: &mut Frame, state: &RenderState, area: Rect) {
    let is_focused = state.active_panel == Panel::Table;
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(is_focused, false))
        .title(format!(" Results ({}/{}) ", state.rows.len(), state.total_rows));

    if state.columns.is_empty() {
        let empty = Paragraph::new("No results yet. Pick an operation and press Enter.")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        f.render_widget(empty, area);
        return;
    }

    let header = Row::new(state.columns.iter().enumerate().map(|(i, c)| {
        let style = if is_focused && i == state.selected_column {
            Style::default().fg(Color::Black).bg(Color::Cyan).bold()
        } else {
            Style::default().fg(Color::Cyan).bold()
        };
        Cell::from(column_title(c, state.last_sort.as_ref())).style(style)
    }));

    let rows = state.rows.iter().map(|r| Row::new(r.iter().map(|c| Cell::from(c.as_str()))));
    let widths = vec![Constraint::Fill(1); state.columns.len()];

    let table = Table::new(rows, widths)
        .header(header)
        .block(block)
        .row_highlight_style(Style::default().fg(Color::Yellow));

    let mut table_state = TableState::default();
    if !state.rows.is_empty() {
        table_state.select(Some(state.selected_row));
    }
    f.render_stateful_widget(table, area, &mut table_state);
}

fn draw_raw(f: &mut Frame, state: &RenderState, area: Rect) {
    let is_focused = state.active_panel == Panel::Raw;

    let status_text = match state.last_status {
        Some(code) => Span::styled(format!(" {} ", code), Style::default().fg(status_color(code)).bold()),
        None => Span::raw(" Raw Output "),
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(is_focused, false))
        .title(status_text);

    let raw = Paragraph::new(highlight_output(&state.raw_output))
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((state.raw_scroll, 0));
    f.render_widget(raw, area);
}

fn draw_filter_line(f: &mut Frame, state: &RenderState, area: Rect) {
    let filtering = state.input_mode == InputMode::Filter;
    let style = if filtering {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let line = Line::from(vec![
        Span::styled(" Filter: ", style),
        Span::raw(state.filter.as_str()),
    ]);
    f.render_widget(Paragraph::new(line), area);

    if filtering {
        let cursor_x = (area.x + 9 + state.filter.chars().count() as u16).min(area.x + area.width.saturating_sub(1));
        f.set_cursor_position(Position::new(cursor_x, area.y));
    }
}

fn draw_status_bar(f: &mut Frame, state: &RenderState, area: Rect) {
    let hints = match state.input_mode {
        InputMode::Editing => "ESC:done | Tab:next field",
        InputMode::Filter => "type to filter | ESC:done",
        InputMode::Normal => "Tab:panel | Enter:run | /:filter | s:sort | x:clear | ?:help | q:quit",
    };

    let status_style = if state.is_loading {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::White)
    };

    let bar = Paragraph::new(Line::from(vec![
        Span::styled(format!(" {} ", state.status), status_style),
        Span::styled(format!("| {}", hints), Style::default().fg(Color::DarkGray)),
    ]));
    f.render_widget(bar, area);
}

fn draw_form_popup(f: &mut Frame, form: &FormView, area: Rect) {
    let popup_area = centered_rect(60, 50, area);

    let mut lines: Vec<Line> = Vec::new();
    for (i, field) in form.fields.iter().enumerate() {
        let selected = i == form.selected;
        let marker = if field.required { "*" } else { " " };
        let label_style = if selected {
            Style::default().fg(Color::Yellow).bold()
        } else {
            Style::default().fg(Color::Gray)
        };
        let value = match field.kind {
            FieldKind::Text => field.value.clone(),
            FieldKind::Choice(_) | FieldKind::Template if field.value.is_empty() => String::from("< none >"),
            FieldKind::Choice(_) | FieldKind::Template => format!("< {} >", field.value),
        };
        lines.push(Line::from(vec![
            Span::styled(format!("{}{:<28}", marker, field.label), label_style),
            Span::raw(value),
        ]));
    }
    lines.push(Line::raw(""));
    lines.push(Line::styled(
        "Tab/↑↓ field | ←/→ choose | Enter submit | Esc cancel",
        Style::default().fg(Color::DarkGray),
    ));

    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" {} ", form.title))
        .style(Style::default().bg(Color::Black));

    f.render_widget(Clear, popup_area);
    f.render_widget(Paragraph::new(lines).block(block).wrap(Wrap { trim: false }), popup_area);
}

fn draw_confirm_popup(f: &mut Frame, prompt: &str, area: Rect) {
    let popup_area = centered_rect(50, 20, area);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red))
        .title(" Confirm Deletion (y/n) ")
        .style(Style::default().bg(Color::Black));

    f.render_widget(Clear, popup_area);
    f.render_widget(Paragraph::new(prompt).block(block).wrap(Wrap { trim: false }), popup_area);
}

fn draw_notice_popup(f: &mut Frame, notice: &NoticeView, area: Rect) {
    let popup_area = centered_rect(60, 40, area);
    let color = if notice.is_error { Color::Red } else { Color::Green };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color))
        .title(format!(" {} ", notice.title))
        .title_bottom(Line::from(" any key to close ").right_aligned())
        .style(Style::default().bg(Color::Black));

    f.render_widget(Clear, popup_area);
    f.render_widget(
        Paragraph::new(notice.message.as_str()).block(block).wrap(Wrap { trim: false }),
        popup_area,
    );
}

fn draw_help_popup(f: &mut Frame, area: Rect) {
    let popup_area = centered_rect(60, 70, area);

    let help_text = r#"
 QUAPI TUI - Keyboard Shortcuts

 NAVIGATION
   Tab / Shift+Tab    Switch panels
   ↑ / ↓ (j / k)      Move selection / scroll raw output
   PgUp / PgDn        Move by page

 CONNECTION
   e / Enter          Edit URL, username, password
   Tab                Next field while editing

 OPERATIONS
   Enter              Run operation or open its form

 TABLE
   ← / →              Select column
   s / Enter          Sort by column (again to reverse)
   /                  Filter rows
   Esc                Clear filter

 GENERAL
   x                  Clear output
   ?                  Toggle this help
   q / Ctrl+C         Quit

 Press any key to close...
"#;

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Help ")
        .style(Style::default().bg(Color::Black));

    let help = Paragraph::new(help_text)
        .block(block)
        .wrap(Wrap { trim: false });

    f.render_widget(Clear, popup_area);
    f.render_widget(help, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
