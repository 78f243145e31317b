//! Task id generation and resolution
//!
//! Ids use the format `{8-char-hex}-{slug}`, e.g. `3fa9c1d2-write-release-notes`.
//! The hex part comes from the random tail of a UUIDv7, so two tasks with the
//! same name created in the same millisecond still get distinct ids.

/// Longest slug kept in an id
const MAX_SLUG_LEN: usize = 40;

/// Generate a task id from its name
pub fn generate_id(name: &str) -> String {
    let uuid = uuid::Uuid::now_v7().simple().to_string();
    let hex = &uuid[uuid.len() - 8..];
    let slug = slugify(name);
    if slug.is_empty() {
        hex.to_string()
    } else {
        format!("{}-{}", hex, slug)
    }
}

/// Slugify a name for use in ids
fn slugify(name: &str) -> String {
    let slug = name
        .to_lowercase()
        .chars()
        // Strip apostrophes entirely, replace other non-alphanumeric with hyphens
        .filter_map(|c| {
            if c.is_alphanumeric() {
                Some(c)
            } else if c == '\'' || c == '\u{2019}' || c == '\u{2018}' {
                None
            } else {
                Some('-')
            }
        })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");

    if slug.chars().count() <= MAX_SLUG_LEN {
        return slug;
    }
    slug.chars()
        .take(MAX_SLUG_LEN)
        .collect::<String>()
        .trim_end_matches('-')
        .to_string()
}

/// Resolves partial references (hex prefix or slug fragment) to full ids
pub struct IdResolver<'a> {
    ids: &'a [String],
}

impl<'a> IdResolver<'a> {
    pub fn new(ids: &'a [String]) -> Self {
        Self { ids }
    }

    /// Resolve a partial reference to a full id
    ///
    /// Returns:
    /// - Ok(Some(id)) if exactly one match (an exact match always wins)
    /// - Ok(None) if no matches
    /// - Err with sorted candidates if ambiguous
    pub fn resolve(&self, reference: &str) -> Result<Option<String>, Vec<String>> {
        if let Some(exact) = self.ids.iter().find(|id| id.as_str() == reference) {
            return Ok(Some(exact.clone()));
        }

        let mut matches: Vec<String> = self
            .ids
            .iter()
            .filter(|id| Self::matches(id, reference))
            .cloned()
            .collect();

        match matches.len() {
            0 => Ok(None),
            1 => Ok(matches.pop()),
            _ => {
                matches.sort();
                Err(matches)
            }
        }
    }

    fn matches(id: &str, reference: &str) -> bool {
        if id.starts_with(reference) {
            return true;
        }

        if let Some(slug_start) = id.find('-') {
            return id[slug_start + 1..].contains(reference);
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_id() {
        let id = generate_id("Write Release Notes");
        assert_eq!(id.len(), 8 + 1 + "write-release-notes".len());
        assert!(id.ends_with("-write-release-notes"));
        assert!(id[..8].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_generate_id_unique_for_same_name() {
        let a = generate_id("Design");
        let b = generate_id("Design");
        assert_ne!(a, b);
    }

    #[test]
    fn test_generate_id_without_slug() {
        let id = generate_id("!!!");
        assert_eq!(id.len(), 8);
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("Call Bob!"), "call-bob");
        assert_eq!(slugify("Multiple   Spaces"), "multiple-spaces");
        assert_eq!(slugify("here's a test"), "heres-a-test");
    }

    #[test]
    fn test_slugify_truncates() {
        let slug = slugify(&"word ".repeat(30));
        assert!(slug.len() <= MAX_SLUG_LEN);
        assert!(!slug.ends_with('-'));
    }

    fn sample_ids() -> Vec<String> {
        vec![
            "0a1b2c3d-design-schema".to_string(),
            "9f8e7d6c-build-api".to_string(),
            "9f00aaaa-build-cli".to_string(),
        ]
    }

    #[test]
    fn test_resolver_exact_and_prefix() {
        let ids = sample_ids();
        let resolver = IdResolver::new(&ids);
        assert_eq!(
            resolver.resolve("9f8e7d6c-build-api").unwrap(),
            Some("9f8e7d6c-build-api".to_string())
        );
        assert_eq!(resolver.resolve("0a1b").unwrap(), Some("0a1b2c3d-design-schema".to_string()));
    }

    #[test]
    fn test_resolver_slug_match() {
        let ids = sample_ids();
        let resolver = IdResolver::new(&ids);
        assert_eq!(resolver.resolve("schema").unwrap(), Some("0a1b2c3d-design-schema".to_string()));
    }

    #[test]
    fn test_resolver_ambiguous_and_missing() {
        let ids = sample_ids();
        let resolver = IdResolver::new(&ids);
        let candidates = resolver.resolve("build").unwrap_err();
        assert_eq!(candidates, vec!["9f00aaaa-build-cli", "9f8e7d6c-build-api"]);
        assert_eq!(resolver.resolve("nothing").unwrap(), None);
    }
}
