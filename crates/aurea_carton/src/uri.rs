//! Canonical document URIs.
//!
//! Every index in the pipeline is keyed by URI string equality, so all
//! inputs pass through one normalizer: backslashes become slashes, plain
//! paths gain a `file://` scheme, and drive letters are lowercased.

use compact_str::CompactString;

/// Normalize a path or URI into the canonical form used as an index key.
pub fn normalize_uri(raw: &str) -> CompactString {
    let slashed = raw.replace('\\', "/");

    let path: String = if let Some(rest) = slashed.strip_prefix("file://") {
        rest.to_string()
    } else if looks_like_scheme(&slashed) {
        return CompactString::from(slashed);
    } else if slashed.starts_with('/') {
        slashed
    } else {
        format!("/{slashed}")
    };

    let mut out = CompactString::from("file://");

    // Lowercase a windows drive letter ("/C:/..." -> "/c:/...").
    let bytes = path.as_bytes();
    if bytes.len() >= 3 && bytes[0] == b'/' && bytes[1].is_ascii_alphabetic() && bytes[2] == b':' {
        out.push('/');
        out.push(bytes[1].to_ascii_lowercase() as char);
        out.push_str(&path[2..]);
    } else {
        out.push_str(&path);
    }
    out
}

/// Whether `s` starts with a non-file URI scheme (`untitled:`, `https:`, ...).
fn looks_like_scheme(s: &str) -> bool {
    let Some(colon) = s.find(':') else {
        return false;
    };
    if colon == 0 {
        return false;
    }
    // A single letter before ':' is a drive, not a scheme.
    colon > 1 && s[..colon].bytes().all(|b| b.is_ascii_alphanumeric() || b == b'+' || b == b'-')
}

/// Derive the overlay document URI for a template URI:
/// `dir/name.html` -> `dir/name.__au.ttc.overlay.ts`.
pub fn overlay_uri_for(template_uri: &str) -> CompactString {
    let stem = template_uri
        .strip_suffix(".html")
        .or_else(|| template_uri.strip_suffix(".htm"))
        .unwrap_or(template_uri);
    let mut out = CompactString::from(stem);
    out.push_str(".__au.ttc.overlay.ts");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_path_gains_file_scheme() {
        assert_eq!(normalize_uri("/app/foo.html"), "file:///app/foo.html");
    }

    #[test]
    fn backslashes_and_drive_letters_normalize() {
        assert_eq!(
            normalize_uri("C:\\app\\foo.html"),
            "file:///c:/app/foo.html"
        );
        assert_eq!(
            normalize_uri("file:///C:/app/foo.html"),
            "file:///c:/app/foo.html"
        );
    }

    #[test]
    fn foreign_schemes_pass_through() {
        assert_eq!(normalize_uri("untitled:Untitled-1"), "untitled:Untitled-1");
    }

    #[test]
    fn normalization_is_idempotent() {
        let once = normalize_uri("src\\pages\\home.html");
        assert_eq!(normalize_uri(&once), once);
    }

    #[test]
    fn overlay_uri_replaces_extension() {
        assert_eq!(
            overlay_uri_for("file:///app/name.html"),
            "file:///app/name.__au.ttc.overlay.ts"
        );
        assert_eq!(
            overlay_uri_for("file:///app/name.htm"),
            "file:///app/name.__au.ttc.overlay.ts"
        );
    }
}
