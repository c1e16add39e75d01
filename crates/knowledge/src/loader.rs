//! Document loaders, one per supported source format.

use crate::types::{validate_file_glob, Document, LoadType};
use globset::Glob;
use llamaserve_core::{AppError, AppResult};
use serde::Serialize;
use serde_json::ser::Formatter;
use serde_json::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Load documents from `path` according to `load_type`.
///
/// `file_glob` is only consulted for `file_directory` loads and is checked
/// before the directory is touched.
pub fn load(load_type: LoadType, path: &Path, file_glob: Option<&str>) -> AppResult<Vec<Document>> {
    tracing::debug!("Loading {} documents from {:?}", load_type, path);

    match load_type {
        LoadType::Csv => load_csv(path),
        LoadType::FileDirectory => {
            let glob = validate_file_glob(file_glob)?;
            load_directory(path, glob)
        }
        LoadType::Pdf => load_pdf(path),
        LoadType::Html => load_html(path),
        LoadType::Json => load_json(path),
        LoadType::Text => load_text(path),
    }
}

fn read_to_string(path: &Path) -> AppResult<String> {
    fs::read_to_string(path).map_err(|e| AppError::Load(format!("Failed to read {:?}: {}", path, e)))
}

/// One document per row; content is `header: value` lines.
pub fn load_csv(path: &Path) -> AppResult<Vec<Document>> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| AppError::Load(format!("Failed to open CSV {:?}: {}", path, e)))?;

    let headers = reader
        .headers()
        .map_err(|e| AppError::Load(format!("Failed to read CSV header {:?}: {}", path, e)))?
        .clone();

    let mut documents = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record
            .map_err(|e| AppError::Load(format!("Failed to read CSV row {} of {:?}: {}", row, path, e)))?;

        let content = headers
            .iter()
            .zip(record.iter())
            .map(|(header, value)| format!("{}: {}", header.trim(), value.trim()))
            .collect::<Vec<_>>()
            .join("\n");

        documents.push(Document::new(content, path).with_metadata("row", row));
    }

    Ok(documents)
}

/// One document per matching file under `root`, ordered by path.
pub fn load_directory(root: &Path, glob: &str) -> AppResult<Vec<Document>> {
    let matcher = Glob::new(glob)
        .map_err(|e| AppError::InvalidArgument(format!("Invalid glob '{}': {}", glob, e)))?
        .compile_matcher();

    if !root.is_dir() {
        return Err(AppError::Load(format!("Not a directory: {:?}", root)));
    }

    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry =
            entry.map_err(|e| AppError::Load(format!("Failed to walk {:?}: {}", root, e)))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        if matcher.is_match(relative) {
            paths.push(entry.into_path());
        }
    }
    paths.sort();

    tracing::debug!("Matched {} files under {:?} with {}", paths.len(), root, glob);

    paths
        .iter()
        .map(|path| Ok(Document::new(read_to_string(path)?, path)))
        .collect()
}

/// One document per page.
pub fn load_pdf(path: &Path) -> AppResult<Vec<Document>> {
    let pages = pdf_extract::extract_text_by_pages(path)
        .map_err(|e| AppError::Load(format!("Failed to extract text from PDF {:?}: {}", path, e)))?;

    Ok(pages
        .into_iter()
        .enumerate()
        .map(|(page, text)| Document::new(text, path).with_metadata("page", page))
        .collect())
}

/// Visible text of an HTML file, with its `<title>` as metadata.
pub fn load_html(path: &Path) -> AppResult<Vec<Document>> {
    let raw = read_to_string(path)?;
    let title = extract_title(&raw).unwrap_or_default();

    Ok(vec![Document::new(clean_html(&raw), path).with_metadata("title", title)])
}

/// Single-line JSON with a space after every `,` and `:`.
struct SpacedFormatter;

impl Formatter for SpacedFormatter {
    fn begin_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b": ")
    }
}

fn to_spaced_json(value: &Value) -> AppResult<String> {
    let mut buf = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, SpacedFormatter);
    value.serialize(&mut serializer)?;
    String::from_utf8(buf).map_err(|e| AppError::Serialization(e.to_string()))
}

/// The whole JSON value, re-serialised on one line, as a single document.
pub fn load_json(path: &Path) -> AppResult<Vec<Document>> {
    let raw = read_to_string(path)?;
    let value: Value = serde_json::from_str(&raw)
        .map_err(|e| AppError::Load(format!("Failed to parse JSON {:?}: {}", path, e)))?;

    let content = to_spaced_json(&value)?;
    Ok(vec![Document::new(content, path).with_metadata("seq_num", 1)])
}

/// The whole file as a single document.
pub fn load_text(path: &Path) -> AppResult<Vec<Document>> {
    Ok(vec![Document::new(read_to_string(path)?, path)])
}

fn starts_with_ignore_case(haystack: &str, prefix: &str) -> bool {
    haystack.len() >= prefix.len()
        && haystack.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

fn find_ignore_case(haystack: &str, needle: &str) -> Option<usize> {
    haystack
        .char_indices()
        .map(|(i, _)| i)
        .find(|&i| starts_with_ignore_case(&haystack[i..], needle))
}

/// Whether the `<` at the start of `rest` opens a tag rather than being text.
fn is_tag_start(rest: &str) -> bool {
    matches!(rest[1..].chars().next(), Some(c) if c.is_ascii_alphabetic() || c == '/' || c == '!')
}

/// Strip tags, scripts and styles, decode entities, then collapse whitespace.
///
/// Every tag counts as a word break.
fn clean_html(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut in_tag = false;
    let mut in_script = false;
    let mut in_style = false;

    for (i, ch) in text.char_indices() {
        if in_tag {
            if ch == '>' {
                in_tag = false;
                result.push(' ');
            }
            continue;
        }

        if ch == '<' && is_tag_start(&text[i..]) {
            in_tag = true;

            let rest = &text[i..];
            if starts_with_ignore_case(rest, "<script") {
                in_script = true;
            } else if starts_with_ignore_case(rest, "</script") {
                in_script = false;
            } else if starts_with_ignore_case(rest, "<style") {
                in_style = true;
            } else if starts_with_ignore_case(rest, "</style") {
                in_style = false;
            }
        } else if !in_script && !in_style {
            result.push(ch);
        }
    }

    decode_entities(&result)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Longest entity body considered, `&` to `;` inclusive.
const MAX_ENTITY_LEN: usize = 12;

/// Decode named and numeric character references. Unknown ones are kept as is.
fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];

        let decoded = tail
            .find(';')
            .filter(|&end| end < MAX_ENTITY_LEN)
            .and_then(|end| decode_entity(&tail[1..end]).map(|c| (c, end)));

        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => {
            let code = name.strip_prefix('#')?;
            let value = match code.strip_prefix(|c| c == 'x' || c == 'X') {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => code.parse().ok()?,
            };
            char::from_u32(value)
        }
    }
}

fn extract_title(html: &str) -> Option<String> {
    let open = find_ignore_case(html, "<title")?;
    let content_start = open + html[open..].find('>')? + 1;
    let content_len = find_ignore_case(&html[content_start..], "</title")?;

    let title = html[content_start..content_start + content_len]
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    Some(title)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_csv_rows() {
        let temp = TempDir::new().unwrap();
        let path = write(temp.path(), "people.csv", "name,age\nAda, 36\nAlan,41\n");

        let docs = load_csv(&path).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].page_content, "name: Ada\nage: 36");
        assert_eq!(docs[1].metadata["row"], 1);
        assert_eq!(docs[1].source(), Some(path.to_string_lossy().as_ref()));
    }

    #[test]
    fn test_load_csv_missing_file() {
        let temp = TempDir::new().unwrap();
        let err = load_csv(&temp.path().join("missing.csv")).unwrap_err();
        assert!(matches!(err, AppError::Load(_)));
    }

    #[test]
    fn test_load_directory_filters_and_sorts() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "b.md", "bee");
        write(temp.path(), "a.md", "ay");
        write(temp.path(), "nested/c.md", "sea");
        write(temp.path(), "notes.txt", "ignored");

        let docs = load_directory(temp.path(), "**/*.md").unwrap();
        let contents: Vec<&str> = docs.iter().map(|d| d.page_content.as_str()).collect();
        assert_eq!(contents, vec!["ay", "bee", "sea"]);
    }

    #[test]
    fn test_load_directory_disallowed_glob_before_traversal() {
        // The directory does not exist; the glob must be rejected first.
        let err = load(
            LoadType::FileDirectory,
            Path::new("/definitely/not/here"),
            Some("**/*.pdf"),
        )
        .unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn test_load_directory_missing_root() {
        let err = load(
            LoadType::FileDirectory,
            Path::new("/definitely/not/here"),
            Some("**/*.txt"),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Load(_)));
    }

    #[test]
    fn test_load_html() {
        let temp = TempDir::new().unwrap();
        let path = write(
            temp.path(),
            "page.html",
            "<html><head><title> My  Page </title><style>p { color: red; }</style></head>\
             <body><script>if (a < b) { x = 1; }</script><p>Hello <b>world</b></p>\
             <p>Fish &amp; Chips &lt;3</p><p>if 1 < 2 then ok</p></body></html>",
        );

        let docs = load_html(&path).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].metadata["title"], "My Page");
        assert_eq!(
            docs[0].page_content,
            "My Page Hello world Fish & Chips <3 if 1 < 2 then ok"
        );
    }

    #[test]
    fn test_clean_html_multibyte() {
        assert_eq!(clean_html("<p>Olá <i>mundo</i> 🎮</p>"), "Olá mundo 🎮");
    }

    #[test]
    fn test_clean_html_keeps_bare_angle_brackets() {
        assert_eq!(
            clean_html("<p>Fish &amp; Chips</p><p>if 1 < 2 then ok</p><p>tail</p>"),
            "Fish & Chips if 1 < 2 then ok tail"
        );
        assert_eq!(clean_html("a <= b <!-- note --> c"), "a <= b c");
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("&#65;&#x42;&quot;&apos;"), "AB\"'");
        assert_eq!(decode_entities("&bogus; R&D &"), "&bogus; R&D &");
        assert_eq!(decode_entities("&#xZZ;"), "&#xZZ;");
    }

    #[test]
    fn test_html_without_title() {
        assert_eq!(extract_title("<p>no title</p>"), None);
    }

    #[test]
    fn test_load_json_whole_value() {
        let temp = TempDir::new().unwrap();
        let path = write(temp.path(), "data.json", "{\n  \"a\": [1, 2],\n  \"b\": \"x\"\n}");

        let docs = load_json(&path).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].page_content, r#"{"a": [1, 2], "b": "x"}"#);
        assert_eq!(docs[0].metadata["seq_num"], 1);
    }

    #[test]
    fn test_spaced_json_nested() {
        let value: Value = serde_json::from_str(r#"{"k": {"x": []}, "s": "a,b:c"}"#).unwrap();
        assert_eq!(to_spaced_json(&value).unwrap(), r#"{"k": {"x": []}, "s": "a,b:c"}"#);
    }

    #[test]
    fn test_load_json_invalid() {
        let temp = TempDir::new().unwrap();
        let path = write(temp.path(), "bad.json", "{ not json");
        assert!(matches!(load_json(&path), Err(AppError::Load(_))));
    }

    #[test]
    fn test_load_text() {
        let temp = TempDir::new().unwrap();
        let path = write(temp.path(), "a.txt", "line one\nline two\n");

        let docs = load(LoadType::Text, &path, None).unwrap();
        assert_eq!(docs[0].page_content, "line one\nline two\n");
    }

    #[test]
    fn test_load_pdf_missing_file() {
        let temp = TempDir::new().unwrap();
        let result = load_pdf(&temp.path().join("missing.pdf"));
        assert!(matches!(result, Err(AppError::Load(_))));
    }
}
