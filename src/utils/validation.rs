use crate::error::{AppError, Result};
use once_cell::sync::Lazy;
use regex::Regex;

/// 允许上传的MIME类型
pub const ALLOWED_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/webp",
    "image/gif",
    "application/pdf",
];

static FOLDER_INVALID_CHARS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[^a-z0-9\-_]").unwrap()
});

static CONSECUTIVE_HYPHENS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"-+").unwrap()
});

pub const DEFAULT_FOLDER: &str = "uncategorized";

/// 把自由文本目录名净化为安全的路径段。
/// 清理后为空时回退到默认目录。
pub fn sanitize_folder(folder: Option<&str>) -> String {
    let raw = match folder {
        Some(raw) => raw.trim().to_lowercase(),
        None => return DEFAULT_FOLDER.to_string(),
    };

    let mut cleaned = raw.replace(&[' ', '/', '\\', '.'][..], "-");
    cleaned = FOLDER_INVALID_CHARS.replace_all(&cleaned, "").to_string();
    cleaned = CONSECUTIVE_HYPHENS.replace_all(&cleaned, "-").to_string();
    cleaned = cleaned.trim_matches('-').to_string();

    if cleaned.len() > 64 {
        cleaned = cleaned.chars().take(64).collect();
        cleaned = cleaned.trim_matches('-').to_string();
    }

    if cleaned.is_empty() {
        DEFAULT_FOLDER.to_string()
    } else {
        cleaned
    }
}

/// 校验上传的MIME类型是否在允许列表内
pub fn validate_mime_type(content_type: &str) -> Result<()> {
    let normalized = content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
        .to_lowercase();

    if ALLOWED_MIME_TYPES.contains(&normalized.as_str()) {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "不支持的文件类型: {}",
            content_type
        )))
    }
}

/// 校验上传大小
pub fn validate_upload_size(size: usize, max_size: u64) -> Result<()> {
    if size as u64 > max_size {
        return Err(AppError::Validation(format!(
            "文件过大: {} bytes (最大: {} bytes)",
            size, max_size
        )));
    }
    if size == 0 {
        return Err(AppError::Validation("上传的文件为空".to_string()));
    }
    Ok(())
}

/// 根据MIME类型推导文件扩展名，必要时回退到原始文件名
pub fn file_extension(content_type: &str, original_filename: &str) -> String {
    match content_type {
        "image/jpeg" | "image/jpg" => "jpg".to_string(),
        "image/png" => "png".to_string(),
        "image/webp" => "webp".to_string(),
        "image/gif" => "gif".to_string(),
        "application/pdf" => "pdf".to_string(),
        _ => original_filename
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .filter(|ext| !ext.is_empty() && ext.len() <= 8 && !ext.contains('/'))
            .map(|ext| ext.to_lowercase())
            .unwrap_or_else(|| "bin".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_folder() {
        assert_eq!(sanitize_folder(None), "uncategorized");
        assert_eq!(sanitize_folder(Some("")), "uncategorized");
        assert_eq!(sanitize_folder(Some("  Blog Posts ")), "blog-posts");
        assert_eq!(sanitize_folder(Some("articles")), "articles");
        assert_eq!(sanitize_folder(Some("../../etc/passwd")), "etc-passwd");
        assert_eq!(sanitize_folder(Some("a//b")), "a-b");
        assert_eq!(sanitize_folder(Some("中文目录")), "uncategorized");
        assert_eq!(sanitize_folder(Some("---")), "uncategorized");
    }

    #[test]
    fn test_sanitize_folder_limits_length() {
        let long = "a".repeat(100);
        assert_eq!(sanitize_folder(Some(&long)).len(), 64);
    }

    #[test]
    fn test_validate_mime_type() {
        assert!(validate_mime_type("image/jpeg").is_ok());
        assert!(validate_mime_type("image/PNG").is_ok());
        assert!(validate_mime_type("image/webp; charset=binary").is_ok());
        assert!(validate_mime_type("application/pdf").is_ok());

        assert!(validate_mime_type("image/svg+xml").is_err());
        assert!(validate_mime_type("text/html").is_err());
        assert!(validate_mime_type("application/octet-stream").is_err());
    }

    #[test]
    fn test_validate_upload_size() {
        assert!(validate_upload_size(1024, 10 * 1024 * 1024).is_ok());
        assert!(validate_upload_size(0, 1024).is_err());
        assert!(validate_upload_size(2048, 1024).is_err());
    }

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("image/jpeg", "photo.JPG"), "jpg");
        assert_eq!(file_extension("image/png", "x"), "png");
        assert_eq!(file_extension("application/pdf", "doc"), "pdf");
        assert_eq!(file_extension("application/zip", "archive.ZIP"), "zip");
        assert_eq!(file_extension("application/octet-stream", "noext"), "bin");
    }
}
