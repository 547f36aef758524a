//! Musea - The resource gallery (catalog) for Aurea templates.
//!
//! The catalog is the immutable registry every compilation resolves against:
//! custom elements, custom attributes, template controllers, value
//! converters, binding behaviors, binding commands, and attribute patterns.
//! Lookup is case-insensitive with alias fan-out. Resource collections form
//! a scope graph (root plus nested partial overlays); materializing a scope
//! walks root → scope and produces a read-only view.

pub mod catalog;
pub mod commands;
pub mod controllers;
pub mod events;
pub mod html;
pub mod patterns;
pub mod resources;

pub use catalog::{
    default_catalog, Catalog, CatalogBuilder, CollectionOverlay, CollectionScopeId, ResourceView,
};
pub use commands::{CommandConfig, CommandKind};
pub use controllers::{
    BranchOf, BranchPosition, Cardinality, ControllerConfig, ControllerTrigger, InjectedVars,
    Placement, ScopeBehavior, REPEAT_CONTEXTUALS,
};
pub use events::{dom_event_type, is_known_event};
pub use html::{is_html_element, is_known_html_attr};
pub use patterns::{match_attr, AttrMatch, PatternKind};
pub use resources::{
    camel_case, kebab_case, AttributeRes, BehaviorRes, Bindable, ConverterRes, ElementRes,
};
