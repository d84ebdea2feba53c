use once_cell::sync::Lazy;
use regex::Regex;

static NON_ALNUM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("Failed to compile slug regex"));

/// Turn a title into a URL slug: lowercase, hyphen-separated, at most 64 chars.
pub fn slugify(title: &str) -> String {
    let lowered = title.trim().to_lowercase();

    let mut slug = NON_ALNUM.replace_all(&lowered, "-").to_string();
    slug = slug.trim_matches('-').to_string();

    if slug.is_empty() {
        return "untitled".to_string();
    }

    if slug.len() > 64 {
        slug = slug
            .chars()
            .take(64)
            .collect::<String>()
            .trim_end_matches('-')
            .to_string();
    }

    slug
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_slugify_basic() {
        assert_eq!(slugify("Server Maintenance"), "server-maintenance");
        assert_eq!(slugify("Privacy Policy"), "privacy-policy");
    }

    #[test]
    fn test_slugify_punctuation_and_whitespace() {
        assert_eq!(slugify("  New TLS certificates!  "), "new-tls-certificates");
        assert_eq!(slugify("What's new?"), "what-s-new");
        assert_eq!(slugify("XEP-0363: HTTP Upload"), "xep-0363-http-upload");
    }

    #[test]
    fn test_slugify_empty_input() {
        assert_eq!(slugify(""), "untitled");
        assert_eq!(slugify("!!!"), "untitled");
    }

    #[test]
    fn test_slugify_truncates_to_64() {
        let title = "a ".repeat(80);
        let slug = slugify(&title);
        assert!(slug.len() <= 64);
        assert!(!slug.ends_with('-'));
    }
}
