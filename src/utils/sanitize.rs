use ammonia::Builder;
use maplit::hashset;
use std::collections::HashMap;

fn get_sanitizer() -> Builder<'static> {
    // 配置 HTML 清理器
    let mut sanitizer = Builder::default();

    // 允许的标签
    sanitizer.tags(hashset![
        "h1", "h2", "h3", "h4", "h5", "h6",
        "p", "br", "hr",
        "strong", "em", "u", "s", "code",
        "pre", "blockquote",
        "ul", "ol", "li",
        "a", "img",
        "table", "thead", "tbody", "tr", "th", "td",
        "figure", "figcaption",
        "div", "span"
    ]);

    // 配置标签属性
    let mut tag_attrs = HashMap::new();
    tag_attrs.insert("a", hashset!["href", "title", "target", "rel"]);
    tag_attrs.insert("img", hashset!["src", "alt", "title", "width", "height"]);
    tag_attrs.insert("pre", hashset!["class"]);
    tag_attrs.insert("code", hashset!["class"]);
    tag_attrs.insert("div", hashset!["class"]);
    tag_attrs.insert("span", hashset!["class"]);

    sanitizer.tag_attributes(tag_attrs);
    sanitizer
}

/// 清理富文本HTML，移除脚本与危险属性，保留图片与常用排版标签
pub fn sanitize_html(html: &str) -> String {
    get_sanitizer().clean(html).to_string()
}

/// 清理纯文本字段（替代文本、说明文字等），转义全部标记
pub fn sanitize_text(text: &str) -> String {
    ammonia::clean_text(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_html_strips_scripts() {
        let dirty = r#"<p>正文</p><script>alert(1)</script><img src="http://x/a.jpg" onerror="x()">"#;
        let clean = sanitize_html(dirty);

        assert!(clean.contains("<p>正文</p>"));
        assert!(clean.contains(r#"src="http://x/a.jpg""#));
        assert!(!clean.contains("script"));
        assert!(!clean.contains("onerror"));
    }

    #[test]
    fn test_sanitize_html_keeps_img_src() {
        let html = r#"<img src="http://localhost:9000/rainbow-cms/a/b.jpg" alt="图">"#;
        let clean = sanitize_html(html);
        assert!(clean.contains("http://localhost:9000/rainbow-cms/a/b.jpg"));
    }

    #[test]
    fn test_sanitize_text_escapes_markup() {
        let clean = sanitize_text("<b>加粗</b>");
        assert!(!clean.contains('<'));
    }
}
