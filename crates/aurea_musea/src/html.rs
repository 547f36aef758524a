//! Static HTML knowledge tables.
//!
//! Plain HTML elements and attributes are not catalog resources; resolution
//! consults these tables to tell a misspelled bindable from an ordinary DOM
//! property, and a foreign web component from a typo.

use phf::{phf_set, Set};

/// Standard HTML element names (not exhaustive; covers the common set).
static HTML_ELEMENTS: Set<&'static str> = phf_set! {
    "a", "abbr", "address", "area", "article", "aside", "audio", "b", "base",
    "bdi", "bdo", "blockquote", "body", "br", "button", "canvas", "caption",
    "cite", "code", "col", "colgroup", "data", "datalist", "dd", "del",
    "details", "dfn", "dialog", "div", "dl", "dt", "em", "embed", "fieldset",
    "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5",
    "h6", "head", "header", "hgroup", "hr", "html", "i", "iframe", "img",
    "input", "ins", "kbd", "label", "legend", "li", "link", "main", "map",
    "mark", "menu", "meta", "meter", "nav", "noscript", "object", "ol",
    "optgroup", "option", "output", "p", "picture", "pre", "progress", "q",
    "rp", "rt", "ruby", "s", "samp", "script", "section", "select", "slot",
    "small", "source", "span", "strong", "style", "sub", "summary", "sup",
    "table", "tbody", "td", "template", "textarea", "tfoot", "th", "thead",
    "time", "title", "tr", "track", "u", "ul", "var", "video", "wbr",
};

/// Global attributes valid on every element.
static GLOBAL_ATTRS: Set<&'static str> = phf_set! {
    "accesskey", "autocapitalize", "autofocus", "class", "contenteditable",
    "dir", "draggable", "enterkeyhint", "hidden", "id", "inert", "inputmode",
    "is", "itemid", "itemprop", "itemref", "itemscope", "itemtype", "lang",
    "nonce", "part", "popover", "role", "slot", "spellcheck", "style",
    "tabindex", "title", "translate",
};

/// Common per-element and DOM-property attribute names. Bindings target DOM
/// properties, so property spellings (`textContent`, `innerHTML`) count too.
static COMMON_ATTRS: Set<&'static str> = phf_set! {
    "abbr", "accept", "action", "allow", "alt", "as", "async", "autocomplete",
    "autoplay", "capture", "charset", "checked", "cite", "cols", "colspan",
    "content", "controls", "coords", "crossorigin", "data", "datetime",
    "decoding", "default", "defer", "dirname", "disabled", "download",
    "enctype", "for", "form", "formaction", "headers", "height", "high",
    "href", "hreflang", "htmlFor", "innerHTML", "innerText", "integrity",
    "kind", "label", "list", "loading", "loop", "low", "max", "maxlength",
    "media", "method", "min", "minlength", "multiple", "muted", "name",
    "novalidate", "open", "optimum", "pattern", "ping", "placeholder",
    "playsinline", "poster", "preload", "readonly", "referrerpolicy", "rel",
    "required", "reversed", "rows", "rowspan", "sandbox", "scope", "scrolling",
    "selected", "shape", "size", "sizes", "span", "src", "srcdoc", "srclang",
    "srcset", "start", "step", "target", "textContent", "type", "usemap",
    "value", "width", "wrap",
};

/// Whether `tag` is a standard HTML element.
pub fn is_html_element(tag: &str) -> bool {
    HTML_ELEMENTS.contains(tag)
}

/// Whether `name` is a plausible attribute or DOM property for a plain
/// element. `data-*` and `aria-*` always pass.
pub fn is_known_html_attr(name: &str) -> bool {
    if name.starts_with("data-") || name.starts_with("aria-") {
        return true;
    }
    GLOBAL_ATTRS.contains(name) || COMMON_ATTRS.contains(name)
}
