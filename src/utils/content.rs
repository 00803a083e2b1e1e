use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

/// 匹配富文本中的图片标签，捕获双引号/单引号/无引号三种写法的src值
static IMG_SRC_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<img\b[^>]*?\ssrc\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#).unwrap()
});

/// 从富文本HTML中提取所有内嵌图片地址，保持首次出现的顺序。
/// 输入为空时返回空列表，从不报错。
pub fn extract_embedded_urls(html: &str) -> Vec<String> {
    if html.is_empty() {
        return Vec::new();
    }

    IMG_SRC_REGEX
        .captures_iter(html)
        .filter_map(|caps| {
            caps.get(1)
                .or_else(|| caps.get(2))
                .or_else(|| caps.get(3))
                .map(|m| m.as_str().to_string())
        })
        .filter(|url| !url.is_empty())
        .collect()
}

/// 只保留指向本系统存储端点与桶的地址，第三方/CDN地址一律丢弃。
/// `own_base` 形如 `http://localhost:9000/rainbow-cms`。
pub fn filter_own_asset_urls(urls: &[String], own_base: &str) -> Vec<String> {
    let base = match Url::parse(own_base.trim_end_matches('/')) {
        Ok(base) => base,
        Err(_) => return Vec::new(),
    };

    urls.iter()
        .filter(|url| is_own_asset_url(url, &base))
        .cloned()
        .collect()
}

fn is_own_asset_url(candidate: &str, base: &Url) -> bool {
    let parsed = match Url::parse(candidate) {
        Ok(parsed) => parsed,
        Err(_) => return false,
    };

    let base_path = format!("{}/", base.path().trim_end_matches('/'));

    parsed.scheme() == base.scheme()
        && parsed.host_str() == base.host_str()
        && parsed.port_or_known_default() == base.port_or_known_default()
        && parsed.path().starts_with(&base_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "http://localhost:9000/rainbow-cms";

    #[test]
    fn test_extract_handles_quoting_variants() {
        let html = r#"
            <p>开头</p>
            <img src="http://a.example/1.jpg" alt="one">
            <img class="wide" src='http://a.example/2.png'>
            <img src=http://a.example/3.webp>
        "#;

        let urls = extract_embedded_urls(html);
        assert_eq!(
            urls,
            vec![
                "http://a.example/1.jpg",
                "http://a.example/2.png",
                "http://a.example/3.webp",
            ]
        );
    }

    #[test]
    fn test_extract_preserves_first_seen_order() {
        let html = r#"<img src="b"><img src="a"><img src="b">"#;
        assert_eq!(extract_embedded_urls(html), vec!["b", "a", "b"]);
    }

    #[test]
    fn test_extract_empty_input() {
        assert!(extract_embedded_urls("").is_empty());
        assert!(extract_embedded_urls("<p>没有图片</p>").is_empty());
    }

    #[test]
    fn test_extract_ignores_malformed_tags() {
        let html = r#"<img><img src=""><img data-src="x.jpg">"#;
        assert!(extract_embedded_urls(html).is_empty());
    }

    #[test]
    fn test_filter_keeps_own_urls_only() {
        let urls = vec![
            format!("{}/articles/a.jpg", BASE),
            "https://cdn.example.com/b.jpg".to_string(),
            format!("{}/uncategorized/c.png", BASE),
            "not a url".to_string(),
        ];

        let own = filter_own_asset_urls(&urls, BASE);
        assert_eq!(
            own,
            vec![
                format!("{}/articles/a.jpg", BASE),
                format!("{}/uncategorized/c.png", BASE),
            ]
        );
    }

    #[test]
    fn test_own_urls_survive_extraction_and_filtering() {
        // N个本系统地址 + M个外部地址，过滤后恰好剩下N个，顺序不变
        let html = format!(
            r#"<p>开头</p>
               <img src="{base}/articles/a.jpg">
               <img src="https://cdn.example.com/x.jpg">
               <img src="{base}/articles/b.png">
               <img src="https://other.example.org/y.png">"#,
            base = BASE
        );

        let urls = extract_embedded_urls(&html);
        assert_eq!(urls.len(), 4);

        let own = filter_own_asset_urls(&urls, BASE);
        assert_eq!(
            own,
            vec![
                format!("{}/articles/a.jpg", BASE),
                format!("{}/articles/b.png", BASE),
            ]
        );
    }

    #[test]
    fn test_filter_rejects_other_port_or_bucket() {
        let urls = vec![
            "http://localhost:9001/rainbow-cms/a.jpg".to_string(),
            "http://localhost:9000/other-bucket/a.jpg".to_string(),
            "http://localhost:9000/rainbow-cms-backup/a.jpg".to_string(),
        ];
        assert!(filter_own_asset_urls(&urls, BASE).is_empty());
    }
}
