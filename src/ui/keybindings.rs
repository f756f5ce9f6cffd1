// src/ui/keybindings.rs
//! Keyboard input handling and key mappings.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// Contrast change per key press, on the `[0, 1]` preference scale.
pub const CONTRAST_STEP: f64 = 0.05;

/// Actions derived from key events.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    Quit,
    CycleColourMap,
    ContrastUp,
    ContrastDown,
    ExportVisible,
    PlayVisible,
    None,
}

/// Convert a key event to an action.
pub fn key_to_action(key: &KeyEvent) -> Action {
    if key.kind == KeyEventKind::Release {
        return Action::None;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Action::Quit;
    }

    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
        KeyCode::Char('c') => Action::CycleColourMap,
        KeyCode::Char('+') | KeyCode::Char('=') | KeyCode::Up => Action::ContrastUp,
        KeyCode::Char('-') | KeyCode::Down => Action::ContrastDown,
        KeyCode::Char('e') => Action::ExportVisible,
        KeyCode::Char('p') => Action::PlayVisible,
        _ => Action::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_bindings() {
        assert_eq!(key_to_action(&key(KeyCode::Char('q'))), Action::Quit);
        assert_eq!(key_to_action(&key(KeyCode::Char('c'))), Action::CycleColourMap);
        assert_eq!(key_to_action(&key(KeyCode::Char('+'))), Action::ContrastUp);
        assert_eq!(key_to_action(&key(KeyCode::Char('-'))), Action::ContrastDown);
        assert_eq!(key_to_action(&key(KeyCode::Char('e'))), Action::ExportVisible);
        assert_eq!(key_to_action(&key(KeyCode::Char('p'))), Action::PlayVisible);
        assert_eq!(key_to_action(&key(KeyCode::Char('x'))), Action::None);
    }

    #[test]
    fn test_ctrl_c_quits_instead_of_cycling() {
        let event = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(key_to_action(&event), Action::Quit);
    }
}
