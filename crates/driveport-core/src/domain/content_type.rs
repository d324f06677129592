//! ContentType - 拡張子からの content-type 判定
//!
//! ホスト環境のレジストリには依存せず、このクレートが持つ静的テーブルで判定します。
//! 中身は見ません（content sniffing はしない）。
//!
//! # 判定ルール
//! - 拡張子は大文字小文字を区別しない（`NOTES.TXT` → `text/plain`）
//! - 拡張子なし・未知の拡張子 → `application/unknown`

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Label used when the extension is missing or not in the table.
pub const UNKNOWN_CONTENT_TYPE: &str = "application/unknown";

/// Extension → MIME table, sorted by extension for binary search.
const EXTENSION_TABLE: &[(&str, &str)] = &[
    ("7z", "application/x-7z-compressed"),
    ("aac", "audio/aac"),
    ("avi", "video/x-msvideo"),
    ("bmp", "image/bmp"),
    ("bz2", "application/x-bzip2"),
    ("css", "text/css"),
    ("csv", "text/csv"),
    ("doc", "application/msword"),
    ("docx", "application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
    ("epub", "application/epub+zip"),
    ("flac", "audio/flac"),
    ("gif", "image/gif"),
    ("gz", "application/gzip"),
    ("htm", "text/html"),
    ("html", "text/html"),
    ("ico", "image/vnd.microsoft.icon"),
    ("jpeg", "image/jpeg"),
    ("jpg", "image/jpeg"),
    ("js", "text/javascript"),
    ("json", "application/json"),
    ("log", "text/plain"),
    ("md", "text/markdown"),
    ("mkv", "video/x-matroska"),
    ("mov", "video/quicktime"),
    ("mp3", "audio/mpeg"),
    ("mp4", "video/mp4"),
    ("odp", "application/vnd.oasis.opendocument.presentation"),
    ("ods", "application/vnd.oasis.opendocument.spreadsheet"),
    ("odt", "application/vnd.oasis.opendocument.text"),
    ("ogg", "audio/ogg"),
    ("pdf", "application/pdf"),
    ("png", "image/png"),
    ("ppt", "application/vnd.ms-powerpoint"),
    ("pptx", "application/vnd.openxmlformats-officedocument.presentationml.presentation"),
    ("rar", "application/vnd.rar"),
    ("rtf", "application/rtf"),
    ("svg", "image/svg+xml"),
    ("tar", "application/x-tar"),
    ("tif", "image/tiff"),
    ("tiff", "image/tiff"),
    ("toml", "application/toml"),
    ("tsv", "text/tab-separated-values"),
    ("txt", "text/plain"),
    ("wav", "audio/wav"),
    ("webm", "video/webm"),
    ("webp", "image/webp"),
    ("xls", "application/vnd.ms-excel"),
    ("xlsx", "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
    ("xml", "application/xml"),
    ("yaml", "application/yaml"),
    ("yml", "application/yaml"),
    ("zip", "application/zip"),
];

/// A content-type label attached to uploads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentType(String);

impl ContentType {
    /// リモートから受け取った値などをそのまま包む
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn unknown() -> Self {
        Self(UNKNOWN_CONTENT_TYPE.to_string())
    }

    /// ファイル名（パス）の拡張子だけで判定
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::lookup)
            .map(|mime| Self(mime.to_string()))
            .unwrap_or_else(Self::unknown)
    }

    fn lookup(extension: &str) -> Option<&'static str> {
        let extension = extension.to_ascii_lowercase();
        EXTENSION_TABLE
            .binary_search_by(|(ext, _)| (*ext).cmp(extension.as_str()))
            .ok()
            .map(|idx| EXTENSION_TABLE[idx].1)
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == UNKNOWN_CONTENT_TYPE
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn table_is_sorted_for_binary_search() {
        let is_sorted = EXTENSION_TABLE.windows(2).all(|w| w[0].0 < w[1].0);
        assert!(is_sorted);
    }

    #[rstest]
    #[case::json("data.json", "application/json")]
    #[case::text("notes.txt", "text/plain")]
    #[case::upper_case("NOTES.TXT", "text/plain")]
    #[case::nested("/tmp/reports/report.pdf", "application/pdf")]
    #[case::double_extension("backup.tar.gz", "application/gzip")]
    #[case::office("budget.xlsx", "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet")]
    fn classifies_by_extension(#[case] path: &str, #[case] expected: &str) {
        assert_eq!(ContentType::from_path(path).as_str(), expected);
    }

    #[rstest]
    #[case::no_extension("README")]
    #[case::dotfile(".bashrc")]
    #[case::unknown_extension("image.xyz")]
    #[case::trailing_dot("weird.")]
    fn falls_back_to_unknown(#[case] path: &str) {
        let ct = ContentType::from_path(path);
        assert!(ct.is_unknown());
        assert_eq!(ct.as_str(), UNKNOWN_CONTENT_TYPE);
    }

    #[test]
    fn classification_ignores_file_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(&path, [0xff_u8, 0x00, 0x13, 0x37]).unwrap();

        assert_eq!(ContentType::from_path(&path).as_str(), "application/json");
    }
}
