//! The catalog: resource collections, scopes, and materialized views.
//!
//! A [`Catalog`] holds the root resource collection plus nested scopes, each
//! a *partial* overlay: only the categories a scope overrides are present.
//! Materializing walks root → scope applying overlaid categories and builds
//! case-insensitive indices with alias fan-out. The catalog never mutates
//! after [`CatalogBuilder::build`]; views borrow nothing and can be shared.

use compact_str::CompactString;
use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;

use crate::commands::{default_commands, CommandConfig};
use crate::controllers::{default_controllers, ControllerConfig};
use crate::resources::{AttributeRes, BehaviorRes, ConverterRes, ElementRes};

/// Identifies one resource-collection scope within a catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct CollectionScopeId(u32);

impl CollectionScopeId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

/// The categories a scope may overlay. Absent categories inherit.
#[derive(Debug, Clone, Default)]
pub struct CollectionOverlay {
    pub elements: Option<Vec<ElementRes>>,
    pub attributes: Option<Vec<AttributeRes>>,
    pub controllers: Option<Vec<ControllerConfig>>,
    pub converters: Option<Vec<ConverterRes>>,
    pub behaviors: Option<Vec<BehaviorRes>>,
}

#[derive(Debug)]
struct ScopeEntry {
    parent: Option<CollectionScopeId>,
    overlay: CollectionOverlay,
}

/// The immutable resource catalog.
#[derive(Debug)]
pub struct Catalog {
    elements: Vec<ElementRes>,
    attributes: Vec<AttributeRes>,
    controllers: Vec<ControllerConfig>,
    converters: Vec<ConverterRes>,
    behaviors: Vec<BehaviorRes>,
    commands: Vec<CommandConfig>,
    scopes: Vec<ScopeEntry>,
}

impl Catalog {
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::default()
    }

    /// Materialize the root collection.
    pub fn materialize_root(&self) -> ResourceView {
        self.materialize(None)
    }

    /// Materialize a scope: root first, then the chain of overlays down to
    /// `scope`, each replacing only the categories it carries.
    pub fn materialize(&self, scope: Option<CollectionScopeId>) -> ResourceView {
        let mut elements = self.elements.clone();
        let mut attributes = self.attributes.clone();
        let mut controllers = self.controllers.clone();
        let mut converters = self.converters.clone();
        let mut behaviors = self.behaviors.clone();

        for id in self.scope_chain(scope) {
            let overlay = &self.scopes[id.as_u32() as usize].overlay;
            if let Some(overlaid) = &overlay.elements {
                elements = overlaid.clone();
            }
            if let Some(overlaid) = &overlay.attributes {
                attributes = overlaid.clone();
            }
            if let Some(overlaid) = &overlay.controllers {
                controllers = overlaid.clone();
            }
            if let Some(overlaid) = &overlay.converters {
                converters = overlaid.clone();
            }
            if let Some(overlaid) = &overlay.behaviors {
                behaviors = overlaid.clone();
            }
        }

        ResourceView::assemble(
            elements,
            attributes,
            controllers,
            converters,
            behaviors,
            self.commands.clone(),
        )
    }

    /// Root-to-scope chain (root excluded; it is the base).
    fn scope_chain(&self, scope: Option<CollectionScopeId>) -> Vec<CollectionScopeId> {
        let mut chain = Vec::new();
        let mut cursor = scope;
        while let Some(id) = cursor {
            chain.push(id);
            cursor = self.scopes[id.as_u32() as usize].parent;
        }
        chain.reverse();
        chain
    }
}

/// Builder for [`Catalog`].
#[derive(Debug)]
pub struct CatalogBuilder {
    elements: Vec<ElementRes>,
    attributes: Vec<AttributeRes>,
    controllers: Vec<ControllerConfig>,
    converters: Vec<ConverterRes>,
    behaviors: Vec<BehaviorRes>,
    commands: Vec<CommandConfig>,
    scopes: Vec<ScopeEntry>,
}

impl Default for CatalogBuilder {
    fn default() -> Self {
        Self {
            elements: Vec::new(),
            attributes: Vec::new(),
            controllers: default_controllers(),
            converters: Vec::new(),
            behaviors: Vec::new(),
            commands: default_commands(),
            scopes: Vec::new(),
        }
    }
}

impl CatalogBuilder {
    pub fn with_element(mut self, element: ElementRes) -> Self {
        self.elements.push(element);
        self
    }

    pub fn with_attribute(mut self, attribute: AttributeRes) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn with_converter(mut self, converter: ConverterRes) -> Self {
        self.converters.push(converter);
        self
    }

    pub fn with_behavior(mut self, behavior: BehaviorRes) -> Self {
        self.behaviors.push(behavior);
        self
    }

    pub fn with_command(mut self, command: CommandConfig) -> Self {
        self.commands.push(command);
        self
    }

    /// Register a nested scope. Returns its id for `materialize`.
    pub fn define_scope(
        &mut self,
        parent: Option<CollectionScopeId>,
        overlay: CollectionOverlay,
    ) -> CollectionScopeId {
        let id = CollectionScopeId::new(self.scopes.len() as u32);
        self.scopes.push(ScopeEntry { parent, overlay });
        id
    }

    pub fn build(self) -> Catalog {
        Catalog {
            elements: self.elements,
            attributes: self.attributes,
            controllers: self.controllers,
            converters: self.converters,
            behaviors: self.behaviors,
            commands: self.commands,
            scopes: self.scopes,
        }
    }
}

/// A materialized, read-only resource view with case-insensitive indices.
#[derive(Debug, Clone)]
pub struct ResourceView {
    elements: Vec<ElementRes>,
    attributes: Vec<AttributeRes>,
    controllers: Vec<ControllerConfig>,
    converters: Vec<ConverterRes>,
    behaviors: Vec<BehaviorRes>,
    commands: Vec<CommandConfig>,
    element_index: FxHashMap<CompactString, usize>,
    attribute_index: FxHashMap<CompactString, usize>,
    controller_index: FxHashMap<CompactString, usize>,
    converter_index: FxHashMap<CompactString, usize>,
    behavior_index: FxHashMap<CompactString, usize>,
    command_index: FxHashMap<CompactString, usize>,
}

fn lower(name: &str) -> CompactString {
    let mut out = CompactString::default();
    for c in name.chars() {
        out.push(c.to_ascii_lowercase());
    }
    out
}

impl ResourceView {
    fn assemble(
        elements: Vec<ElementRes>,
        attributes: Vec<AttributeRes>,
        controllers: Vec<ControllerConfig>,
        converters: Vec<ConverterRes>,
        behaviors: Vec<BehaviorRes>,
        commands: Vec<CommandConfig>,
    ) -> Self {
        let mut view = Self {
            element_index: FxHashMap::default(),
            attribute_index: FxHashMap::default(),
            controller_index: FxHashMap::default(),
            converter_index: FxHashMap::default(),
            behavior_index: FxHashMap::default(),
            command_index: FxHashMap::default(),
            elements,
            attributes,
            controllers,
            converters,
            behaviors,
            commands,
        };
        for (i, e) in view.elements.iter().enumerate() {
            view.element_index.insert(lower(&e.name), i);
            for alias in &e.aliases {
                view.element_index.insert(lower(alias), i);
            }
        }
        for (i, a) in view.attributes.iter().enumerate() {
            view.attribute_index.insert(lower(&a.name), i);
            for alias in &a.aliases {
                view.attribute_index.insert(lower(alias), i);
            }
        }
        for (i, c) in view.controllers.iter().enumerate() {
            view.controller_index.insert(lower(c.name), i);
        }
        for (i, c) in view.converters.iter().enumerate() {
            view.converter_index.insert(lower(&c.name), i);
            for alias in &c.aliases {
                view.converter_index.insert(lower(alias), i);
            }
        }
        for (i, b) in view.behaviors.iter().enumerate() {
            view.behavior_index.insert(lower(&b.name), i);
            for alias in &b.aliases {
                view.behavior_index.insert(lower(alias), i);
            }
        }
        for (i, c) in view.commands.iter().enumerate() {
            view.command_index.insert(lower(c.name), i);
        }
        view
    }

    pub fn element(&self, name: &str) -> Option<&ElementRes> {
        self.element_index
            .get(&lower(name))
            .map(|&i| &self.elements[i])
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeRes> {
        self.attribute_index
            .get(&lower(name))
            .map(|&i| &self.attributes[i])
    }

    pub fn controller(&self, name: &str) -> Option<&ControllerConfig> {
        self.controller_index
            .get(&lower(name))
            .map(|&i| &self.controllers[i])
    }

    pub fn converter(&self, name: &str) -> Option<&ConverterRes> {
        self.converter_index
            .get(&lower(name))
            .map(|&i| &self.converters[i])
    }

    pub fn behavior(&self, name: &str) -> Option<&BehaviorRes> {
        self.behavior_index
            .get(&lower(name))
            .map(|&i| &self.behaviors[i])
    }

    pub fn command(&self, name: &str) -> Option<&CommandConfig> {
        self.command_index
            .get(&lower(name))
            .map(|&i| &self.commands[i])
    }
}

/// The default catalog: built-in controllers and commands, no app resources.
pub fn default_catalog() -> &'static Catalog {
    static DEFAULT: Lazy<Catalog> = Lazy::new(|| Catalog::builder().build());
    &DEFAULT
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::Bindable;

    #[test]
    fn lookups_are_case_insensitive_with_aliases() {
        let catalog = Catalog::builder()
            .with_element(
                ElementRes::new("my-list")
                    .with_alias("the-list")
                    .with_bindable(Bindable::new("items").primary()),
            )
            .with_converter(ConverterRes::new("dateFormat"))
            .build();
        let view = catalog.materialize_root();
        assert!(view.element("MY-LIST").is_some());
        assert!(view.element("the-list").is_some());
        assert!(view.converter("DATEFORMAT").is_some());
        assert!(view.element("other").is_none());
    }

    #[test]
    fn default_catalog_has_controllers_and_commands() {
        let view = default_catalog().materialize_root();
        assert!(view.controller("repeat").is_some());
        assert!(view.controller("default-case").is_some());
        assert!(view.command("bind").is_some());
        assert!(view.command("two-way").is_some());
        assert!(view.element("div").is_none()); // plain HTML is not a resource
    }

    #[test]
    fn scope_overlay_replaces_only_its_categories() {
        let mut builder = Catalog::builder()
            .with_element(ElementRes::new("root-el"))
            .with_converter(ConverterRes::new("upper"));
        let scope = builder.define_scope(
            None,
            CollectionOverlay {
                converters: Some(vec![ConverterRes::new("lower")]),
                ..CollectionOverlay::default()
            },
        );
        let catalog = builder.build();

        let root = catalog.materialize_root();
        assert!(root.converter("upper").is_some());
        assert!(root.converter("lower").is_none());

        let scoped = catalog.materialize(Some(scope));
        // Converters were overlaid, elements inherited.
        assert!(scoped.converter("upper").is_none());
        assert!(scoped.converter("lower").is_some());
        assert!(scoped.element("root-el").is_some());
        assert!(scoped.controller("repeat").is_some());
    }

    #[test]
    fn nested_scopes_apply_root_to_leaf() {
        let mut builder = Catalog::builder().with_converter(ConverterRes::new("a"));
        let mid = builder.define_scope(
            None,
            CollectionOverlay {
                converters: Some(vec![ConverterRes::new("b")]),
                ..CollectionOverlay::default()
            },
        );
        let leaf = builder.define_scope(
            Some(mid),
            CollectionOverlay {
                behaviors: Some(vec![BehaviorRes::new("slow")]),
                ..CollectionOverlay::default()
            },
        );
        let catalog = builder.build();
        let view = catalog.materialize(Some(leaf));
        // Leaf inherits mid's converter overlay and adds behaviors.
        assert!(view.converter("b").is_some());
        assert!(view.converter("a").is_none());
        assert!(view.behavior("slow").is_some());
    }
}
