use once_cell::sync::Lazy;
use regex::Regex;

static SLUG_INVALID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[^a-zA-Z0-9\-_]").unwrap()
});

static SLUG_HYPHENS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"-+").unwrap()
});

/// 从标题生成 URL 友好的 slug
pub fn generate_slug(title: &str) -> String {
    let mut slug = title.to_lowercase().replace(' ', "-");
    slug = SLUG_INVALID.replace_all(&slug, "").to_string();
    slug = SLUG_HYPHENS.replace_all(&slug, "-").to_string();
    slug = slug.trim_matches('-').to_string();

    if slug.len() > 100 {
        slug = slug.chars().take(100).collect();
        slug = slug.trim_matches('-').to_string();
    }

    if slug.is_empty() {
        slug = "untitled".to_string();
    }

    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_slug() {
        assert_eq!(generate_slug("Hello World"), "hello-world");
        assert_eq!(generate_slug("  Rust & Axum!  "), "rust-axum");
        assert_eq!(generate_slug("全中文标题"), "untitled");
        assert_eq!(generate_slug(""), "untitled");
    }
}
