//! Attribute pattern matching.
//!
//! Authored attribute names are interpreted against a small pattern set:
//!
//! | pattern      | example              | interpretation                |
//! |--------------|----------------------|-------------------------------|
//! | `PART.PART`  | `value.bind`         | target + command              |
//! | `:PART`      | `:value`             | fixed command (`bind`)        |
//! | `@PART`      | `@click`             | fixed command (`trigger`)     |
//! | `@PART:PART` | `@click:stop`        | event modifier (+ `trigger`)  |
//! | `PART.ref`   | `view-model.ref`     | ref binding                   |
//! | `then`/`catch` | `then="data"`      | fixed promise-branch alias    |
//!
//! Matching is longest-symbol first and event-modifier wins over the generic
//! target-command split, so `@click:stop` never parses as target `@click`
//! with command `stop`.

use aurea_carton::TextSpan;

/// Which pattern matched an attribute name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    /// `PART.PART` — explicit target and command.
    TargetCommand,
    /// `:PART` / `@PART` — the symbol implies the command.
    FixedCommand,
    /// `@PART:PART` — event with modifiers, command injected.
    EventModifier,
    /// `PART.ref` or bare `ref`.
    Ref,
    /// Bare `then` / `catch` promise-branch alias.
    FixedBranch,
}

/// A successful pattern match over an attribute name. Ranges are relative to
/// the name string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrMatch<'a> {
    pub kind: PatternKind,
    pub target: &'a str,
    pub target_range: TextSpan,
    /// The effective command (authored or injected by the pattern).
    pub command: Option<&'a str>,
    pub command_range: Option<TextSpan>,
    pub modifiers: Vec<&'a str>,
}

/// Interpret an attribute name. Returns `None` for a plain HTML attribute
/// with no dialect syntax.
pub fn match_attr(name: &str) -> Option<AttrMatch<'_>> {
    if name.is_empty() {
        return None;
    }

    // '@' patterns: event-modifier before the generic fixed-command read.
    if let Some(rest) = name.strip_prefix('@') {
        if rest.is_empty() {
            return None;
        }
        let base = 1u32;
        if let Some(colon) = rest.find(':') {
            let event = &rest[..colon];
            if event.is_empty() {
                return None;
            }
            let modifiers: Vec<&str> = rest[colon + 1..]
                .split(':')
                .filter(|m| !m.is_empty())
                .collect();
            return Some(AttrMatch {
                kind: PatternKind::EventModifier,
                target: event,
                target_range: TextSpan::new(base, base + event.len() as u32),
                command: Some("trigger"),
                command_range: None,
                modifiers,
            });
        }
        return Some(AttrMatch {
            kind: PatternKind::FixedCommand,
            target: rest,
            target_range: TextSpan::new(base, base + rest.len() as u32),
            command: Some("trigger"),
            command_range: None,
            modifiers: Vec::new(),
        });
    }

    // ':PART' — bind shorthand.
    if let Some(rest) = name.strip_prefix(':') {
        if rest.is_empty() {
            return None;
        }
        return Some(AttrMatch {
            kind: PatternKind::FixedCommand,
            target: rest,
            target_range: TextSpan::new(1, 1 + rest.len() as u32),
            command: Some("bind"),
            command_range: None,
            modifiers: Vec::new(),
        });
    }

    // Bare `ref`.
    if name == "ref" {
        return Some(AttrMatch {
            kind: PatternKind::Ref,
            target: "element",
            target_range: TextSpan::new(0, name.len() as u32),
            command: Some("ref"),
            command_range: None,
            modifiers: Vec::new(),
        });
    }

    // Bare promise-branch aliases.
    if name == "then" || name == "catch" {
        return Some(AttrMatch {
            kind: PatternKind::FixedBranch,
            target: name,
            target_range: TextSpan::new(0, name.len() as u32),
            command: None,
            command_range: None,
            modifiers: Vec::new(),
        });
    }

    // 'PART.PART' — the command is the segment after the last dot; event
    // modifiers may trail the command after ':' (`click.trigger:stop`).
    let dot = name.rfind('.')?;
    let target = &name[..dot];
    let command_part = &name[dot + 1..];
    if target.is_empty() || command_part.is_empty() {
        return None;
    }
    let (command, modifiers) = match command_part.find(':') {
        Some(colon) => (
            &command_part[..colon],
            command_part[colon + 1..]
                .split(':')
                .filter(|m| !m.is_empty())
                .collect(),
        ),
        None => (command_part, Vec::new()),
    };
    let command_start = (dot + 1) as u32;
    let kind = if command == "ref" {
        PatternKind::Ref
    } else {
        PatternKind::TargetCommand
    };
    Some(AttrMatch {
        kind,
        target,
        target_range: TextSpan::new(0, dot as u32),
        command: Some(command),
        command_range: Some(TextSpan::new(
            command_start,
            command_start + command.len() as u32,
        )),
        modifiers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_command_splits_on_last_dot() {
        let m = match_attr("value.bind").unwrap();
        assert_eq!(m.kind, PatternKind::TargetCommand);
        assert_eq!(m.target, "value");
        assert_eq!(m.command, Some("bind"));
        assert_eq!(m.target_range, TextSpan::new(0, 5));
        assert_eq!(m.command_range, Some(TextSpan::new(6, 10)));
    }

    #[test]
    fn colon_prefix_is_bind() {
        let m = match_attr(":value").unwrap();
        assert_eq!(m.kind, PatternKind::FixedCommand);
        assert_eq!(m.target, "value");
        assert_eq!(m.command, Some("bind"));
    }

    #[test]
    fn at_prefix_is_trigger() {
        let m = match_attr("@click").unwrap();
        assert_eq!(m.kind, PatternKind::FixedCommand);
        assert_eq!(m.target, "click");
        assert_eq!(m.command, Some("trigger"));
    }

    #[test]
    fn event_modifier_wins_over_target_command() {
        let m = match_attr("@click:stop:prevent").unwrap();
        assert_eq!(m.kind, PatternKind::EventModifier);
        assert_eq!(m.target, "click");
        assert_eq!(m.modifiers, ["stop", "prevent"]);
        assert_eq!(m.command, Some("trigger"));
    }

    #[test]
    fn trigger_command_with_modifiers() {
        let m = match_attr("keydown.trigger:enter").unwrap();
        assert_eq!(m.kind, PatternKind::TargetCommand);
        assert_eq!(m.target, "keydown");
        assert_eq!(m.command, Some("trigger"));
        assert_eq!(m.modifiers, ["enter"]);
    }

    #[test]
    fn ref_patterns() {
        let bare = match_attr("ref").unwrap();
        assert_eq!(bare.kind, PatternKind::Ref);
        assert_eq!(bare.target, "element");

        let scoped = match_attr("view-model.ref").unwrap();
        assert_eq!(scoped.kind, PatternKind::Ref);
        assert_eq!(scoped.target, "view-model");
    }

    #[test]
    fn promise_branch_aliases() {
        let m = match_attr("then").unwrap();
        assert_eq!(m.kind, PatternKind::FixedBranch);
        assert!(match_attr("catch").is_some());
    }

    #[test]
    fn plain_attributes_do_not_match() {
        assert!(match_attr("class").is_none());
        assert!(match_attr("data-id").is_none());
        assert!(match_attr("").is_none());
        assert!(match_attr("@").is_none());
        assert!(match_attr(":").is_none());
    }

    #[test]
    fn multi_dot_target_keeps_prefix() {
        let m = match_attr("style.background-color.bind").unwrap();
        assert_eq!(m.target, "style.background-color");
        assert_eq!(m.command, Some("bind"));
    }
}
