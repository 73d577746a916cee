//! Catalog document decoding.

use hearth_core::{CatalogEntry, HearthError, HearthResult};

/// Decode a catalog document: a JSON array of `{name, version, kind, sourceRef}`.
///
/// Any other shape makes the whole response unusable.
///
/// # Errors
///
/// Returns [`HearthError::CatalogUnavailable`] naming `location` when the
/// body is not valid JSON, not an array, or contains an invalid entry.
pub fn parse_catalog(body: &[u8], location: &str) -> HearthResult<Vec<CatalogEntry>> {
    let value: serde_json::Value = serde_json::from_slice(body).map_err(|e| {
        HearthError::CatalogUnavailable(format!("{location}: response is not valid JSON: {e}"))
    })?;

    if !value.is_array() {
        return Err(HearthError::CatalogUnavailable(format!(
            "{location}: expected a JSON array of packages"
        )));
    }

    serde_json::from_value(value).map_err(|e| {
        HearthError::CatalogUnavailable(format!("{location}: invalid catalog entry: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use hearth_core::PackageKind;

    use super::*;

    #[test]
    fn parses_array() {
        let body = br#"[
            {"name":"french-skill","version":"1.2.0","kind":"ability","sourceRef":"git://x/french"},
            {"name":"clock","version":"0.3.1","kind":"app","sourceRef":"/srv/clock"}
        ]"#;
        let entries = parse_catalog(body, "test").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name.as_str(), "french-skill");
        assert_eq!(entries[1].kind, PackageKind::App);
    }

    #[test]
    fn empty_array_is_valid() {
        assert!(parse_catalog(b"[]", "test").unwrap().is_empty());
    }

    #[test]
    fn non_array_is_unavailable() {
        let err = parse_catalog(br#"{"packages":[]}"#, "test").unwrap_err();
        assert!(matches!(err, HearthError::CatalogUnavailable(ref m) if m.contains("JSON array")));
    }

    #[test]
    fn garbage_is_unavailable() {
        assert!(matches!(
            parse_catalog(b"<html>", "test"),
            Err(HearthError::CatalogUnavailable(_))
        ));
    }

    #[test]
    fn bad_entries_are_unavailable() {
        let missing_field = br#"[{"name":"a","version":"1","kind":"app"}]"#;
        let unknown_kind = br#"[{"name":"a","version":"1","kind":"widget","sourceRef":"s"}]"#;
        let traversal = br#"[{"name":"../a","version":"1","kind":"app","sourceRef":"s"}]"#;
        for body in [&missing_field[..], &unknown_kind[..], &traversal[..]] {
            assert!(matches!(
                parse_catalog(body, "test"),
                Err(HearthError::CatalogUnavailable(_))
            ));
        }
    }
}
