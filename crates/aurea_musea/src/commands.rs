//! Binding command registry.

use aurea_relief::BindingMode;
use serde::Serialize;

/// What a binding command produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CommandKind {
    Property,
    Listener,
    Iterator,
    Ref,
    Attribute,
    Style,
    Translation,
}

/// Static configuration of one binding command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CommandConfig {
    pub name: &'static str,
    pub kind: CommandKind,
    /// Binding mode, meaningful for property commands only.
    pub mode: BindingMode,
    /// Capture-phase registration, meaningful for listener commands only.
    pub capture: bool,
}

impl CommandConfig {
    const fn property(name: &'static str, mode: BindingMode) -> Self {
        Self {
            name,
            kind: CommandKind::Property,
            mode,
            capture: false,
        }
    }

    const fn listener(name: &'static str, capture: bool) -> Self {
        Self {
            name,
            kind: CommandKind::Listener,
            mode: BindingMode::Default,
            capture,
        }
    }

    const fn simple(name: &'static str, kind: CommandKind) -> Self {
        Self {
            name,
            kind,
            mode: BindingMode::Default,
            capture: false,
        }
    }
}

/// The built-in command set.
pub fn default_commands() -> Vec<CommandConfig> {
    vec![
        CommandConfig::property("bind", BindingMode::Default),
        CommandConfig::property("one-time", BindingMode::OneTime),
        CommandConfig::property("to-view", BindingMode::ToView),
        CommandConfig::property("one-way", BindingMode::ToView),
        CommandConfig::property("from-view", BindingMode::FromView),
        CommandConfig::property("two-way", BindingMode::TwoWay),
        CommandConfig::listener("trigger", false),
        CommandConfig::listener("capture", true),
        CommandConfig::listener("delegate", false),
        CommandConfig::simple("for", CommandKind::Iterator),
        CommandConfig::simple("ref", CommandKind::Ref),
        CommandConfig::simple("attr", CommandKind::Attribute),
        CommandConfig::simple("style", CommandKind::Style),
        CommandConfig::simple("class", CommandKind::Attribute),
        CommandConfig::simple("t", CommandKind::Translation),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find(name: &str) -> CommandConfig {
        default_commands()
            .into_iter()
            .find(|c| c.name == name)
            .unwrap_or_else(|| panic!("missing command {name}"))
    }

    #[test]
    fn property_commands_carry_modes() {
        assert_eq!(find("two-way").mode, BindingMode::TwoWay);
        assert_eq!(find("one-time").mode, BindingMode::OneTime);
        assert_eq!(find("bind").mode, BindingMode::Default);
    }

    #[test]
    fn capture_is_the_only_capturing_listener() {
        assert!(find("capture").capture);
        assert!(!find("trigger").capture);
        assert!(!find("delegate").capture);
    }

    #[test]
    fn for_is_the_iterator_command() {
        assert_eq!(find("for").kind, CommandKind::Iterator);
    }
}
