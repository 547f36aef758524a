//! Project scanning conventions.
//!
//! A template pairs with a sibling view-model source by base name and
//! directory, and similarly with a stylesheet. A class matches a template if
//! the kebab-case of the class name (optionally with a `CustomElement` or
//! `Element` suffix stripped) equals the file base name.

use std::path::{Path, PathBuf};

use aurea_musea::kebab_case;
use walkdir::WalkDir;

/// Directory names never descended into.
pub const DEFAULT_EXCLUDES: &[&str] = &["node_modules", "dist", "coverage", ".git"];

const SOURCE_EXTS: &[&str] = &["ts", "tsx", "js", "jsx", "mts", "mjs"];
const STYLE_EXTS: &[&str] = &["css", "scss", "sass", "less", "styl"];
const TEMPLATE_EXTS: &[&str] = &["html", "htm"];

/// One discovered template with its paired files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplatePair {
    pub template: PathBuf,
    pub view_model: Option<PathBuf>,
    pub stylesheet: Option<PathBuf>,
}

/// Scan failures.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("failed to walk project directory: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Walk `root` and pair every template with its siblings. Results are sorted
/// by template path for deterministic output.
pub fn scan_project(root: &Path) -> Result<Vec<TemplatePair>, ScanError> {
    let mut templates: Vec<PathBuf> = Vec::new();
    let mut sources: Vec<PathBuf> = Vec::new();
    let mut styles: Vec<PathBuf> = Vec::new();

    let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
        entry
            .file_name()
            .to_str()
            .map(|name| !DEFAULT_EXCLUDES.contains(&name))
            .unwrap_or(true)
    });
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.into_path();
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        let ext = ext.to_ascii_lowercase();
        if TEMPLATE_EXTS.contains(&ext.as_str()) {
            templates.push(path);
        } else if SOURCE_EXTS.contains(&ext.as_str()) {
            sources.push(path);
        } else if STYLE_EXTS.contains(&ext.as_str()) {
            styles.push(path);
        }
    }

    templates.sort();
    let mut pairs = Vec::with_capacity(templates.len());
    for template in templates {
        let view_model = sibling_with_base(&sources, &template);
        let stylesheet = sibling_with_base(&styles, &template);
        pairs.push(TemplatePair {
            template,
            view_model,
            stylesheet,
        });
    }
    Ok(pairs)
}

/// The candidate sharing the template's directory and base name, preferring
/// extension-list order.
fn sibling_with_base(candidates: &[PathBuf], template: &Path) -> Option<PathBuf> {
    let dir = template.parent()?;
    let base = template.file_stem()?;
    let mut matches: Vec<&PathBuf> = candidates
        .iter()
        .filter(|c| c.parent() == Some(dir) && c.file_stem() == Some(base))
        .collect();
    matches.sort_by_key(|c| {
        let ext = c
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        SOURCE_EXTS
            .iter()
            .chain(STYLE_EXTS.iter())
            .position(|e| *e == ext)
            .unwrap_or(usize::MAX)
    });
    matches.first().map(|c| (*c).clone())
}

/// Whether a view-model class matches a template base name: kebab-case of
/// the class name, with an optional `CustomElement`/`Element` suffix
/// stripped, equals the base name.
pub fn class_matches_template(class_name: &str, base_name: &str) -> bool {
    let stripped = class_name
        .strip_suffix("CustomElement")
        .or_else(|| class_name.strip_suffix("Element"))
        .filter(|s| !s.is_empty())
        .unwrap_or(class_name);
    kebab_case(stripped) == base_name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_name_matching() {
        assert!(class_matches_template("UserCard", "user-card"));
        assert!(class_matches_template("UserCardCustomElement", "user-card"));
        assert!(class_matches_template("UserCardElement", "user-card"));
        assert!(!class_matches_template("UserCard", "user-list"));
        // A bare suffix does not strip to nothing.
        assert!(class_matches_template("Element", "element"));
    }

    #[test]
    fn scans_and_pairs_by_base_name() {
        let dir = std::env::temp_dir().join(format!(
            "aurea-scan-test-{}",
            std::process::id()
        ));
        let app = dir.join("src");
        std::fs::create_dir_all(&app).unwrap();
        std::fs::create_dir_all(dir.join("node_modules/pkg")).unwrap();
        std::fs::write(app.join("user-card.html"), "<template></template>").unwrap();
        std::fs::write(app.join("user-card.ts"), "export class UserCard {}").unwrap();
        std::fs::write(app.join("user-card.css"), ".a{}").unwrap();
        std::fs::write(app.join("orphan.html"), "<template></template>").unwrap();
        std::fs::write(dir.join("node_modules/pkg/skip.html"), "x").unwrap();

        let pairs = scan_project(&dir).unwrap();
        assert_eq!(pairs.len(), 2);
        // Sorted by path: orphan before user-card.
        assert!(pairs[0].template.ends_with("orphan.html"));
        assert!(pairs[0].view_model.is_none());
        assert!(pairs[1].template.ends_with("user-card.html"));
        assert!(pairs[1]
            .view_model
            .as_ref()
            .unwrap()
            .ends_with("user-card.ts"));
        assert!(pairs[1]
            .stylesheet
            .as_ref()
            .unwrap()
            .ends_with("user-card.css"));

        std::fs::remove_dir_all(&dir).ok();
    }
}
