//! Template controller registry.
//!
//! Each controller carries a config describing how lowering and binding must
//! treat it: what triggers it, whether its body evaluates in a new overlay
//! frame or reuses the surrounding one, how many instances may appear, and
//! which locals it injects.

use aurea_relief::BranchKind;
use serde::Serialize;

/// What kind of value drives the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ControllerTrigger {
    /// A single bound value (`if.bind`, `with.bind`, `promise.bind`).
    Value,
    /// A for-of iterator header (`repeat.for`).
    Iterator,
    /// A branch of a parent controller (`else`, `case`, `then`, ...).
    Branch,
    /// Presence alone is enough (`pending`, `portal` without a value).
    Marker,
}

/// Whether the controller body evaluates in a new scope frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ScopeBehavior {
    Reuse,
    Overlay,
}

/// How many instances of the controller a location admits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Cardinality {
    ZeroOne,
    ZeroMany,
    OneOfN,
    One,
}

/// Where the controller content renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Placement {
    InPlace,
    Teleported,
}

/// Where branch controllers may appear relative to their parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BranchPosition {
    /// `else` follows an `if` sibling.
    Sibling,
    /// `case` nests inside `switch`; `then` nests inside `promise`.
    Child,
}

/// Locals a controller introduces into its frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum InjectedVars {
    None,
    /// Fixed contextual symbols (`$index`, `$first`, ...).
    FixedContextuals(Vec<&'static str>),
    /// One alias, defaulting to `default` unless the author names one.
    UserAlias { default: &'static str },
}

/// The branch relationship of a sub-controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchOf {
    /// Canonical parent controller name.
    pub parent: &'static str,
    pub kind: BranchKind,
    pub position: BranchPosition,
}

/// Static configuration of one template controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControllerConfig {
    /// Canonical name (`repeat`, `if`, `default-case`, ...).
    pub name: &'static str,
    pub trigger: ControllerTrigger,
    pub scope: ScopeBehavior,
    pub cardinality: Cardinality,
    pub placement: Placement,
    /// Set when this controller is a branch of another.
    pub branch_of: Option<BranchOf>,
    pub injected: InjectedVars,
}

/// Contextual symbols injected by `repeat`.
pub const REPEAT_CONTEXTUALS: &[&str] = &[
    "$index", "$first", "$last", "$even", "$odd", "$length", "$middle",
];

/// The built-in controller set.
pub fn default_controllers() -> Vec<ControllerConfig> {
    use BranchKind::*;
    use Cardinality::*;
    use ControllerTrigger::*;
    use Placement::*;
    use ScopeBehavior::*;

    let branch = |parent, kind, position| {
        Some(BranchOf {
            parent,
            kind,
            position,
        })
    };

    vec![
        ControllerConfig {
            name: "repeat",
            trigger: Iterator,
            scope: Overlay,
            cardinality: ZeroMany,
            placement: InPlace,
            branch_of: None,
            injected: InjectedVars::FixedContextuals(REPEAT_CONTEXTUALS.to_vec()),
        },
        ControllerConfig {
            name: "if",
            trigger: Value,
            scope: Reuse,
            cardinality: ZeroOne,
            placement: InPlace,
            branch_of: None,
            injected: InjectedVars::None,
        },
        ControllerConfig {
            name: "else",
            trigger: Branch,
            scope: Reuse,
            cardinality: ZeroOne,
            placement: InPlace,
            branch_of: branch("if", Default, BranchPosition::Sibling),
            injected: InjectedVars::None,
        },
        ControllerConfig {
            name: "switch",
            trigger: Value,
            scope: Reuse,
            cardinality: ZeroOne,
            placement: InPlace,
            branch_of: None,
            injected: InjectedVars::None,
        },
        ControllerConfig {
            name: "case",
            trigger: Branch,
            scope: Reuse,
            cardinality: OneOfN,
            placement: InPlace,
            branch_of: branch("switch", Case, BranchPosition::Child),
            injected: InjectedVars::None,
        },
        ControllerConfig {
            name: "default-case",
            trigger: Marker,
            scope: Reuse,
            cardinality: ZeroOne,
            placement: InPlace,
            branch_of: branch("switch", Default, BranchPosition::Child),
            injected: InjectedVars::None,
        },
        ControllerConfig {
            name: "with",
            trigger: Value,
            scope: Overlay,
            cardinality: ZeroOne,
            placement: InPlace,
            branch_of: None,
            injected: InjectedVars::None,
        },
        ControllerConfig {
            name: "promise",
            trigger: Value,
            scope: Overlay,
            cardinality: ZeroOne,
            placement: InPlace,
            branch_of: None,
            injected: InjectedVars::None,
        },
        ControllerConfig {
            name: "then",
            trigger: Branch,
            scope: Overlay,
            cardinality: ZeroOne,
            placement: InPlace,
            branch_of: branch("promise", Then, BranchPosition::Child),
            injected: InjectedVars::UserAlias { default: "data" },
        },
        ControllerConfig {
            name: "catch",
            trigger: Branch,
            scope: Overlay,
            cardinality: ZeroOne,
            placement: InPlace,
            branch_of: branch("promise", Catch, BranchPosition::Child),
            injected: InjectedVars::UserAlias { default: "error" },
        },
        ControllerConfig {
            name: "pending",
            trigger: Marker,
            scope: Reuse,
            cardinality: ZeroOne,
            placement: InPlace,
            branch_of: branch("promise", Pending, BranchPosition::Child),
            injected: InjectedVars::None,
        },
        ControllerConfig {
            name: "portal",
            trigger: Value,
            scope: Reuse,
            cardinality: ZeroOne,
            placement: Teleported,
            branch_of: None,
            injected: InjectedVars::None,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find(name: &str) -> ControllerConfig {
        default_controllers()
            .into_iter()
            .find(|c| c.name == name)
            .unwrap_or_else(|| panic!("missing controller {name}"))
    }

    #[test]
    fn overlay_controllers_are_exactly_repeat_with_promise_then_catch() {
        let overlays: Vec<_> = default_controllers()
            .into_iter()
            .filter(|c| c.scope == ScopeBehavior::Overlay)
            .map(|c| c.name)
            .collect();
        assert_eq!(overlays, ["repeat", "with", "promise", "then", "catch"]);
    }

    #[test]
    fn pending_reuses_the_promise_frame() {
        let pending = find("pending");
        assert_eq!(pending.scope, ScopeBehavior::Reuse);
        assert_eq!(pending.branch_of.as_ref().unwrap().parent, "promise");
    }

    #[test]
    fn repeat_injects_the_contextuals() {
        let repeat = find("repeat");
        let InjectedVars::FixedContextuals(vars) = repeat.injected else {
            panic!("repeat must inject contextuals");
        };
        assert!(vars.contains(&"$index"));
        assert!(vars.contains(&"$middle"));
        assert_eq!(vars.len(), 7);
    }

    #[test]
    fn branch_aliases_default_to_data_and_error() {
        assert_eq!(
            find("then").injected,
            InjectedVars::UserAlias { default: "data" }
        );
        assert_eq!(
            find("catch").injected,
            InjectedVars::UserAlias { default: "error" }
        );
    }

    #[test]
    fn portal_is_teleported() {
        assert_eq!(find("portal").placement, Placement::Teleported);
    }
}
