use crate::tui::action::Action;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::collections::{HashMap, HashSet};

/// Maps KeyEvents to Actions
#[derive(Debug, Clone)]
pub struct KeyBindings {
    bindings_list: Vec<KeyBinding>,
    bindings_map: HashMap<KeyPattern, Action>,
}

/// Single keybinding entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBinding {
    pub key: String,
    pub action: Action,
}

/// Pattern for matching key events
///
/// Character keys match on the character produced, so Shift is folded into
/// the character (`G`, `?`) rather than kept as a modifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyPattern {
    pub code: KeyCode,
    pub modifiers: KeyModifiers,
}

impl Default for KeyBindings {
    fn default() -> Self {
        let bindings_list = vec![
            // Navigation - Arrow keys
            KeyBinding::new("Up", Action::MoveUp),
            KeyBinding::new("Down", Action::MoveDown),
            KeyBinding::new("Left", Action::MoveLeft),
            KeyBinding::new("Right", Action::MoveRight),
            // Navigation - Vim-style
            KeyBinding::new("k", Action::MoveUp),
            KeyBinding::new("j", Action::MoveDown),
            KeyBinding::new("h", Action::MoveLeft),
            KeyBinding::new("l", Action::MoveRight),
            // Page navigation
            KeyBinding::new("PageUp", Action::PageUp),
            KeyBinding::new("PageDown", Action::PageDown),
            KeyBinding::new("Ctrl+u", Action::PageUp),
            KeyBinding::new("Ctrl+d", Action::PageDown),
            // Home/End
            KeyBinding::new("Home", Action::Home),
            KeyBinding::new("End", Action::End),
            KeyBinding::new("0", Action::Home),
            KeyBinding::new("$", Action::End),
            // Top/Bottom
            KeyBinding::new("g", Action::GoToTop),
            KeyBinding::new("G", Action::GoToBottom),
            // Filter / Sort
            KeyBinding::new("/", Action::FocusFilter),
            KeyBinding::new("f", Action::FocusFilter),
            KeyBinding::new("x", Action::ClearFilter),
            KeyBinding::new("s", Action::SortColumn),
            // View
            KeyBinding::new("Tab", Action::ToggleView),
            KeyBinding::new("v", Action::ToggleView),
            KeyBinding::new("?", Action::ToggleHelp),
            KeyBinding::new("F1", Action::ToggleHelp),
            // Pivot
            KeyBinding::new("r", Action::NextRowAttribute),
            KeyBinding::new("c", Action::NextColAttribute),
            KeyBinding::new("R", Action::StackRowAttribute),
            KeyBinding::new("C", Action::StackColAttribute),
            KeyBinding::new("a", Action::NextAggregator),
            KeyBinding::new("n", Action::NextValueField),
            KeyBinding::new("p", Action::NextRenderer),
            KeyBinding::new("z", Action::ResetPivot),
            // Application
            KeyBinding::new("q", Action::Quit),
            KeyBinding::new("Ctrl+c", Action::Quit),
            KeyBinding::new("Esc", Action::Cancel),
            KeyBinding::new("Enter", Action::Confirm),
        ];

        let bindings_map = Self::build_map(&bindings_list);

        Self {
            bindings_list,
            bindings_map,
        }
    }
}

impl KeyBindings {
    /// Build hashmap from bindings list
    fn build_map(bindings: &[KeyBinding]) -> HashMap<KeyPattern, Action> {
        bindings
            .iter()
            .filter_map(|b| {
                KeyPattern::from_string(&b.key)
                    .ok()
                    .map(|pattern| (pattern, b.action))
            })
            .collect()
    }

    /// Get action for key event
    pub fn get_action(&self, key: &KeyEvent) -> Option<Action> {
        let pattern = KeyPattern::from_event(key);
        self.bindings_map.get(&pattern).copied()
    }

    /// Rebind keys; an override replaces any existing binding for the same key
    pub fn with_overrides<'a>(
        mut self,
        overrides: impl IntoIterator<Item = (&'a String, &'a Action)>,
    ) -> Self {
        for (key, action) in overrides {
            match KeyPattern::from_string(key) {
                Ok(pattern) => {
                    self.bindings_list.retain(|b| {
                        KeyPattern::from_string(&b.key).map_or(true, |p| p != pattern)
                    });
                    self.bindings_list.push(KeyBinding::new(key, *action));
                }
                Err(e) => tracing::warn!("Ignoring key binding '{}': {}", key, e),
            }
        }
        self.bindings_map = Self::build_map(&self.bindings_list);
        self
    }

    /// Get all bindings for an action (for help display)
    pub fn get_keys_for_action(&self, action: Action) -> Vec<String> {
        self.bindings_list
            .iter()
            .filter(|b| b.action == action)
            .map(|b| b.key.clone())
            .collect()
    }

    /// Check for actions that don't have any keybindings
    pub fn get_unbound_actions(&self) -> Vec<(Action, &'static str)> {
        let bound_actions: HashSet<Action> = self.bindings_list.iter().map(|b| b.action).collect();

        Action::all()
            .into_iter()
            .filter(|action| !bound_actions.contains(action))
            .map(|action| (action, action.description()))
            .collect()
    }

    /// Validate bindings and return warnings
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        let mut seen_keys: HashMap<String, Action> = HashMap::new();
        for binding in &self.bindings_list {
            if let Some(existing_action) = seen_keys.get(&binding.key) {
                warnings.push(format!(
                    "Duplicate key '{}': bound to both {:?} and {:?}",
                    binding.key, existing_action, binding.action
                ));
            } else {
                seen_keys.insert(binding.key.clone(), binding.action);
            }
        }

        let unbound = self.get_unbound_actions();
        if !unbound.is_empty() {
            warnings.push(format!(
                "{} action(s) have no keybindings: {}",
                unbound.len(),
                unbound
                    .iter()
                    .map(|(action, _)| format!("{:?}", action))
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        }

        for binding in &self.bindings_list {
            if KeyPattern::from_string(&binding.key).is_err() {
                warnings.push(format!(
                    "Invalid key pattern '{}' for action {:?}",
                    binding.key, binding.action
                ));
            }
        }

        warnings
    }
}

impl KeyBinding {
    pub fn new(key: &str, action: Action) -> Self {
        Self {
            key: key.to_string(),
            action,
        }
    }
}

impl KeyPattern {
    pub fn new(code: KeyCode, modifiers: KeyModifiers) -> Self {
        Self { code, modifiers }
    }

    pub fn from_event(event: &KeyEvent) -> Self {
        let mut modifiers = event.modifiers;
        if matches!(event.code, KeyCode::Char(_)) {
            modifiers.remove(KeyModifiers::SHIFT);
        }
        Self {
            code: event.code,
            modifiers,
        }
    }

    /// Parse from string (e.g., "Ctrl+c", "G", "?", "Shift+Tab")
    pub fn from_string(s: &str) -> Result<Self, String> {
        // A lone "+" is the plus key, not a separator
        let parts: Vec<&str> = if s == "+" {
            vec!["+"]
        } else {
            s.split('+').collect()
        };

        let mut modifiers = KeyModifiers::empty();
        for part in &parts[..parts.len() - 1] {
            match part.to_lowercase().as_str() {
                "ctrl" => modifiers |= KeyModifiers::CONTROL,
                "alt" => modifiers |= KeyModifiers::ALT,
                "shift" => modifiers |= KeyModifiers::SHIFT,
                _ => return Err(format!("Unknown modifier: {}", part)),
            }
        }
        let key_part = parts[parts.len() - 1];

        let code = match key_part.to_lowercase().as_str() {
            "up" => KeyCode::Up,
            "down" => KeyCode::Down,
            "left" => KeyCode::Left,
            "right" => KeyCode::Right,
            "pageup" | "pgup" => KeyCode::PageUp,
            "pagedown" | "pgdown" | "pgdn" => KeyCode::PageDown,
            "home" => KeyCode::Home,
            "end" => KeyCode::End,
            "tab" if modifiers.contains(KeyModifiers::SHIFT) => KeyCode::BackTab,
            "tab" => KeyCode::Tab,
            "backtab" => KeyCode::BackTab,
            "enter" | "return" => KeyCode::Enter,
            "esc" | "escape" => KeyCode::Esc,
            "backspace" => KeyCode::Backspace,
            "delete" | "del" => KeyCode::Delete,
            "space" => KeyCode::Char(' '),

            // Single characters keep their case (must come before function keys to avoid 'f')
            _ if key_part.chars().count() == 1 => {
                let ch = key_part.chars().next().unwrap_or(' ');
                if modifiers.contains(KeyModifiers::SHIFT) {
                    KeyCode::Char(ch.to_ascii_uppercase())
                } else {
                    KeyCode::Char(ch)
                }
            }

            // Function keys: F1-F12
            name if name.starts_with('f') && name.len() <= 3 => match name[1..].parse::<u8>() {
                Ok(n) if (1..=12).contains(&n) => KeyCode::F(n),
                _ => return Err(format!("Invalid function key: {}", key_part)),
            },

            _ => return Err(format!("Unknown key: {}", key_part)),
        };

        if matches!(code, KeyCode::Char(_)) {
            modifiers.remove(KeyModifiers::SHIFT);
        }

        Ok(Self { code, modifiers })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn test_key_pattern_parsing() {
        assert!(KeyPattern::from_string("Ctrl+c").is_ok());
        assert!(KeyPattern::from_string("a").is_ok());
        assert!(KeyPattern::from_string("F1").is_ok());
        assert!(KeyPattern::from_string("Up").is_ok());
        assert!(KeyPattern::from_string("+").is_ok());
        assert!(KeyPattern::from_string("Hyper+x").is_err());
        assert!(KeyPattern::from_string("F13").is_err());
    }

    #[test]
    fn test_shifted_characters_match_events() {
        let bindings = KeyBindings::default();

        // Terminals report Shift with the uppercase character
        let upper_g = key(KeyCode::Char('G'), KeyModifiers::SHIFT);
        assert_eq!(bindings.get_action(&upper_g), Some(Action::GoToBottom));

        let lower_g = key(KeyCode::Char('g'), KeyModifiers::NONE);
        assert_eq!(bindings.get_action(&lower_g), Some(Action::GoToTop));

        let question = key(KeyCode::Char('?'), KeyModifiers::SHIFT);
        assert_eq!(bindings.get_action(&question), Some(Action::ToggleHelp));
    }

    #[test]
    fn test_modifier_bindings() {
        let bindings = KeyBindings::default();
        let ctrl_d = key(KeyCode::Char('d'), KeyModifiers::CONTROL);
        assert_eq!(bindings.get_action(&ctrl_d), Some(Action::PageDown));
        assert_eq!(
            KeyPattern::from_string("Shift+Tab").unwrap().code,
            KeyCode::BackTab
        );
    }

    #[test]
    fn test_default_bindings_are_valid() {
        let bindings = KeyBindings::default();
        for warning in bindings.validate() {
            assert!(
                !warning.contains("Invalid key pattern"),
                "Found invalid pattern: {}",
                warning
            );
        }
    }

    #[test]
    fn test_every_action_is_bound() {
        let bindings = KeyBindings::default();
        assert!(bindings.get_unbound_actions().is_empty());
    }

    #[test]
    fn test_overrides_replace_existing_key() {
        let mut overrides = HashMap::new();
        overrides.insert("v".to_string(), Action::ToggleHelp);
        overrides.insert("Ctrl+p".to_string(), Action::ToggleView);
        let bindings = KeyBindings::default().with_overrides(&overrides);

        let v = key(KeyCode::Char('v'), KeyModifiers::NONE);
        assert_eq!(bindings.get_action(&v), Some(Action::ToggleHelp));
        let ctrl_p = key(KeyCode::Char('p'), KeyModifiers::CONTROL);
        assert_eq!(bindings.get_action(&ctrl_p), Some(Action::ToggleView));
        assert_eq!(bindings.get_keys_for_action(Action::ToggleView).len(), 2);
    }
}
