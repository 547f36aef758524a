//! Resource definitions.

use aurea_relief::BindingMode;
use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// A bindable property declared on an element or attribute resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bindable {
    /// View-model property name (camelCase).
    pub property: CompactString,
    /// Authored attribute name (kebab-case).
    pub attribute: CompactString,
    pub mode: BindingMode,
    /// The bindable targeted when no attribute part names one.
    pub primary: bool,
}

impl Bindable {
    pub fn new(property: impl Into<CompactString>) -> Self {
        let property = property.into();
        let attribute = kebab_case(&property);
        Self {
            property,
            attribute,
            mode: BindingMode::Default,
            primary: false,
        }
    }

    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    pub fn with_mode(mut self, mode: BindingMode) -> Self {
        self.mode = mode;
        self
    }
}

/// A custom element resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementRes {
    /// Canonical kebab-case tag name.
    pub name: CompactString,
    pub aliases: Vec<CompactString>,
    pub bindables: Vec<Bindable>,
    /// `true` for elements that project their content (`containerless`).
    pub containerless: bool,
}

impl ElementRes {
    pub fn new(name: impl Into<CompactString>) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            bindables: Vec::new(),
            containerless: false,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<CompactString>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn with_bindable(mut self, bindable: Bindable) -> Self {
        self.bindables.push(bindable);
        self
    }

    /// Find a bindable by authored attribute name, case-insensitively.
    pub fn bindable_for_attr(&self, attr: &str) -> Option<&Bindable> {
        self.bindables
            .iter()
            .find(|b| b.attribute.eq_ignore_ascii_case(attr) || b.property.eq_ignore_ascii_case(attr))
    }

    /// The primary bindable, if declared.
    pub fn primary_bindable(&self) -> Option<&Bindable> {
        self.bindables.iter().find(|b| b.primary)
    }
}

/// A custom attribute resource (non-controller).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeRes {
    pub name: CompactString,
    pub aliases: Vec<CompactString>,
    pub bindables: Vec<Bindable>,
}

impl AttributeRes {
    pub fn new(name: impl Into<CompactString>) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            bindables: Vec::new(),
        }
    }

    pub fn with_alias(mut self, alias: impl Into<CompactString>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn with_bindable(mut self, bindable: Bindable) -> Self {
        self.bindables.push(bindable);
        self
    }

    pub fn bindable_for_attr(&self, attr: &str) -> Option<&Bindable> {
        self.bindables
            .iter()
            .find(|b| b.attribute.eq_ignore_ascii_case(attr) || b.property.eq_ignore_ascii_case(attr))
    }

    pub fn primary_bindable(&self) -> Option<&Bindable> {
        self.bindables.iter().find(|b| b.primary)
    }
}

/// A value converter resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConverterRes {
    pub name: CompactString,
    pub aliases: Vec<CompactString>,
}

impl ConverterRes {
    pub fn new(name: impl Into<CompactString>) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
        }
    }
}

/// A binding behavior resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BehaviorRes {
    pub name: CompactString,
    pub aliases: Vec<CompactString>,
}

impl BehaviorRes {
    pub fn new(name: impl Into<CompactString>) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
        }
    }
}

/// Convert a kebab-case name to camelCase (`full-name` → `fullName`).
pub fn camel_case(name: &str) -> CompactString {
    let mut out = CompactString::default();
    let mut upper_next = false;
    for c in name.chars() {
        if c == '-' {
            upper_next = true;
        } else if upper_next {
            out.push(c.to_ascii_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Convert a camelCase name to kebab-case (`myProp` → `my-prop`).
pub fn kebab_case(name: &str) -> CompactString {
    let mut out = CompactString::default();
    for (i, c) in name.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('-');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kebab_case_conversion() {
        assert_eq!(kebab_case("myProp"), "my-prop");
        assert_eq!(kebab_case("value"), "value");
        assert_eq!(kebab_case("URL"), "u-r-l");
    }

    #[test]
    fn bindable_defaults_attribute_from_property() {
        let bindable = Bindable::new("itemsSource");
        assert_eq!(bindable.attribute, "items-source");
    }

    #[test]
    fn bindable_lookup_accepts_both_spellings() {
        let element = ElementRes::new("my-list").with_bindable(Bindable::new("itemsSource"));
        assert!(element.bindable_for_attr("items-source").is_some());
        assert!(element.bindable_for_attr("itemsSource").is_some());
        assert!(element.bindable_for_attr("ITEMS-SOURCE").is_some());
        assert!(element.bindable_for_attr("other").is_none());
    }
}
