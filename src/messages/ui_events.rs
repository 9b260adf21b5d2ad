//! UI events - messages from UI layer to App layer

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Events generated from user input in the UI layer
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    // Panel navigation
    NextPanel,
    PrevPanel,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    PageUp,
    PageDown,

    // Connection bar editing
    StartEditing,
    StopEditing,
    CharInput(char),
    Backspace,
    CursorLeft,
    CursorRight,
    NextConnectionField,

    // Operations
    Activate,

    // Output
    StartFilter,
    SortColumn,
    ClearFilter,
    ClearOutput,

    // Operation form
    FormChar(char),
    FormBackspace,
    FormNextField,
    FormPrevField,
    FormCycleChoice(bool),
    FormSubmit,
    FormCancel,

    // Confirmation
    Confirm,
    Reject,

    // Popups
    DismissNotice,
    ToggleHelp,
    CloseHelp,

    // System
    Quit,
}

/// Active panel in the UI (needed for context-aware event mapping)
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Panel {
    Connection,
    #[default]
    Operations,
    Table,
    Raw,
}

impl Panel {
    pub fn next(&self) -> Panel {
        match self {
            Panel::Connection => Panel::Operations,
            Panel::Operations => Panel::Table,
            Panel::Table => Panel::Raw,
            Panel::Raw => Panel::Connection,
        }
    }

    pub fn prev(&self) -> Panel {
        match self {
            Panel::Connection => Panel::Raw,
            Panel::Operations => Panel::Connection,
            Panel::Table => Panel::Operations,
            Panel::Raw => Panel::Table,
        }
    }
}

/// Input mode
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum InputMode {
    #[default]
    Normal,
    /// Typing into the connection bar
    Editing,
    /// Typing into the table filter line
    Filter,
}

/// Connection bar field
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum ConnectionField {
    #[default]
    Url,
    Username,
    Password,
}

impl ConnectionField {
    pub fn next(&self) -> ConnectionField {
        match self {
            ConnectionField::Url => ConnectionField::Username,
            ConnectionField::Username => ConnectionField::Password,
            ConnectionField::Password => ConnectionField::Url,
        }
    }
}

/// Which popup, if any, has the keyboard
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Popup {
    #[default]
    None,
    Form,
    Confirm,
    Notice,
    Help,
}

/// Convert a key event to a UiEvent based on current UI context
pub fn key_to_ui_event(
    key: KeyEvent,
    active_panel: Panel,
    input_mode: InputMode,
    popup: Popup,
) -> Option<UiEvent> {
    use crossterm::event::KeyEventKind;

    if key.kind != KeyEventKind::Press {
        return None;
    }

    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Some(UiEvent::Quit);
    }

    match popup {
        Popup::Help => return Some(UiEvent::CloseHelp),
        Popup::Notice => return Some(UiEvent::DismissNotice),
        Popup::Confirm => {
            return match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => Some(UiEvent::Confirm),
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => Some(UiEvent::Reject),
                _ => None,
            };
        }
        Popup::Form => return handle_form_keys(key),
        Popup::None => {}
    }

    match input_mode {
        InputMode::Editing => match key.code {
            KeyCode::Esc | KeyCode::Enter => Some(UiEvent::StopEditing),
            KeyCode::Tab => Some(UiEvent::NextConnectionField),
            KeyCode::Left => Some(UiEvent::CursorLeft),
            KeyCode::Right => Some(UiEvent::CursorRight),
            KeyCode::Backspace => Some(UiEvent::Backspace),
            KeyCode::Char(c) => Some(UiEvent::CharInput(c)),
            _ => None,
        },
        InputMode::Filter => match key.code {
            KeyCode::Esc | KeyCode::Enter => Some(UiEvent::StopEditing),
            KeyCode::Backspace => Some(UiEvent::Backspace),
            KeyCode::Char(c) => Some(UiEvent::CharInput(c)),
            _ => None,
        },
        InputMode::Normal => handle_normal_keys(key, active_panel),
    }
}

fn handle_normal_keys(key: KeyEvent, active_panel: Panel) -> Option<UiEvent> {
    match key.code {
        KeyCode::Char('q') => Some(UiEvent::Quit),
        KeyCode::Char('?') => Some(UiEvent::ToggleHelp),
        KeyCode::Tab => Some(UiEvent::NextPanel),
        KeyCode::BackTab => Some(UiEvent::PrevPanel),
        KeyCode::Char('x') => Some(UiEvent::ClearOutput),
        KeyCode::Up | KeyCode::Char('k') => Some(UiEvent::MoveUp),
        KeyCode::Down | KeyCode::Char('j') => Some(UiEvent::MoveDown),
        KeyCode::PageUp => Some(UiEvent::PageUp),
        KeyCode::PageDown => Some(UiEvent::PageDown),
        KeyCode::Char('/') => Some(UiEvent::StartFilter),
        KeyCode::Char('e') | KeyCode::Enter if active_panel == Panel::Connection => {
            Some(UiEvent::StartEditing)
        }
        KeyCode::Enter if active_panel == Panel::Operations => Some(UiEvent::Activate),
        KeyCode::Left | KeyCode::Char('h') if active_panel == Panel::Table => Some(UiEvent::MoveLeft),
        KeyCode::Right | KeyCode::Char('l') if active_panel == Panel::Table => Some(UiEvent::MoveRight),
        KeyCode::Char('s') | KeyCode::Enter if active_panel == Panel::Table => Some(UiEvent::SortColumn),
        KeyCode::Esc if active_panel == Panel::Table => Some(UiEvent::ClearFilter),
        _ => None,
    }
}

fn handle_form_keys(key: KeyEvent) -> Option<UiEvent> {
    match key.code {
        KeyCode::Esc => Some(UiEvent::FormCancel),
        KeyCode::Enter => Some(UiEvent::FormSubmit),
        KeyCode::Tab | KeyCode::Down => Some(UiEvent::FormNextField),
        KeyCode::BackTab | KeyCode::Up => Some(UiEvent::FormPrevField),
        KeyCode::Left => Some(UiEvent::FormCycleChoice(false)),
        KeyCode::Right => Some(UiEvent::FormCycleChoice(true)),
        KeyCode::Backspace => Some(UiEvent::FormBackspace),
        KeyCode::Char(c) => Some(UiEvent::FormChar(c)),
        _ => None,
    }
}
