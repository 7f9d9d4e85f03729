//! Meta-data header extraction and decoding.
//!
//! A document may start with a header block delimited by a run of three or
//! more identical punctuation characters, optionally tagged with the format
//! of the header:
//!
//! ```text
//! --- yaml
//! title: Hello
//! ---
//! Body text
//! ```
//!
//! The closing line must repeat the same character at least as many times
//! as the opening run. Everything after it is the body.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use tracing::warn;

use super::cson;

// =============================================================================
// Errors
// =============================================================================

#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    #[error("the meta-data parser '{parser}' is not supported (in {file_path})")]
    UnsupportedParser { parser: String, file_path: String },

    #[error("failed to parse the {parser} meta-data header of {file_path}: {source}")]
    Decode {
        parser: MetaFormat,
        file_path: String,
        source: DecodeError,
    },

    #[error("unsupported text encoding '{encoding}' for {file_path}")]
    Encoding { encoding: String, file_path: String },
}

#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("meta-data must be a mapping, found {0}")]
    NotAMapping(&'static str),
}

// =============================================================================
// Formats
// =============================================================================

/// The formats a meta-data header can be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaFormat {
    Yaml,
    Json,
    Cson,
    CoffeeScript,
    JavaScript,
}

impl MetaFormat {
    /// Resolve a header tag, including its aliases.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_ascii_lowercase().as_str() {
            "yaml" => Some(Self::Yaml),
            "json" => Some(Self::Json),
            "cson" => Some(Self::Cson),
            "coffee" | "coffeescript" | "coffee-script" => Some(Self::CoffeeScript),
            "js" | "javascript" => Some(Self::JavaScript),
            _ => None,
        }
    }

    /// The canonical name of the format.
    pub fn name(self) -> &'static str {
        match self {
            Self::Yaml => "yaml",
            Self::Json => "json",
            Self::Cson => "cson",
            Self::CoffeeScript => "coffeescript",
            Self::JavaScript => "javascript",
        }
    }

    fn decode(self, header: &str) -> Result<Map<String, Value>, DecodeError> {
        if header.trim().is_empty() {
            return Ok(Map::new());
        }

        let value: Value = match self {
            Self::Yaml => serde_yaml::from_str(&header.replace('\t', "    "))?,
            Self::Json => serde_json::from_str(header)?,
            Self::Cson | Self::CoffeeScript | Self::JavaScript => cson::decode(header)?,
        };

        match value {
            Value::Object(map) => Ok(map),
            Value::Null => Ok(Map::new()),
            Value::Bool(_) => Err(DecodeError::NotAMapping("a boolean")),
            Value::Number(_) => Err(DecodeError::NotAMapping("a number")),
            Value::String(_) => Err(DecodeError::NotAMapping("a string")),
            Value::Array(_) => Err(DecodeError::NotAMapping("a list")),
        }
    }
}

impl fmt::Display for MetaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Header extraction
// =============================================================================

/// Result of splitting a document into header and body.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedMeta {
    /// The raw header text, without delimiters.
    pub header: Option<String>,
    pub body: String,
    pub parser: Option<MetaFormat>,
    pub changes: Map<String, Value>,
    /// The full content with normalized line endings.
    pub source: String,
}

struct HeaderSplit<'a> {
    tag: Option<&'a str>,
    header: &'a str,
    body: &'a str,
}

/// Parse the header of `content`, if there is one.
pub fn parse_meta(content: &str, file_path: &str) -> Result<ParsedMeta, ParseError> {
    let source = content.replace("\r\n", "\n");

    let Some(split) = split_header(&source) else {
        return Ok(ParsedMeta {
            header: None,
            body: source.trim_start_matches('\n').to_string(),
            parser: None,
            changes: Map::new(),
            source,
        });
    };

    let tag = split.tag.unwrap_or("yaml");
    let parser = MetaFormat::from_tag(tag).ok_or_else(|| ParseError::UnsupportedParser {
        parser: tag.to_string(),
        file_path: file_path.to_string(),
    })?;

    let header = split.header.trim();
    let changes = parser
        .decode(header)
        .map_err(|source| ParseError::Decode {
            parser,
            file_path: file_path.to_string(),
            source,
        })?;

    Ok(ParsedMeta {
        header: Some(header.to_string()),
        body: split.body.trim().trim_start_matches('\n').to_string(),
        parser: Some(parser),
        changes,
        source,
    })
}

fn split_header(content: &str) -> Option<HeaderSplit<'_>> {
    let mut lines = content.split_inclusive('\n');
    let mut offset = 0;

    // Skip leading blank lines to the opening delimiter
    let opening = loop {
        let line = lines.next()?;
        offset += line.len();
        if !line.trim().is_empty() {
            break line.trim();
        }
    };

    let delimiter = opening.chars().next()?;
    if delimiter.is_alphanumeric() || delimiter == '_' || delimiter.is_whitespace() {
        return None;
    }
    let run = opening.chars().take_while(|&c| c == delimiter).count();
    if run < 3 {
        return None;
    }

    let rest = opening[run * delimiter.len_utf8()..].trim();
    // A single word names the format, several words are prose
    let tag = if rest.is_empty() {
        None
    } else if rest.contains(char::is_whitespace) {
        return None;
    } else {
        Some(rest)
    };

    let header_start = offset;
    for line in lines {
        let trimmed = line.trim();
        let closes = trimmed.chars().count() >= run && trimmed.chars().all(|c| c == delimiter);
        if closes {
            return Some(HeaderSplit {
                tag,
                header: &content[header_start..offset],
                body: &content[offset + line.len()..],
            });
        }
        offset += line.len();
    }

    None
}

// =============================================================================
// Normalization
// =============================================================================

/// Meta-data after the well-known fields have been interpreted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedMeta {
    pub meta: Map<String, Value>,
    pub date: Option<DateTime<Utc>>,
    pub url: Option<String>,
    pub urls: Vec<String>,
}

/// Interpret the well-known meta-data fields.
///
/// `date` becomes a UTC timestamp, `ignore`/`skip`/`draft`/`published` fold
/// into `ignored`, and `id` is dropped since identity is not meta-data.
pub fn normalize_meta(mut meta: Map<String, Value>, file_path: &str) -> NormalizedMeta {
    let date = match meta.get("date") {
        None | Some(Value::Null) => None,
        Some(raw) => match coerce_date(raw) {
            Some(date) => {
                meta.insert("date".into(), Value::String(date.to_rfc3339()));
                Some(date)
            }
            None => {
                warn!(file = %file_path, date = %raw, "could not understand the date of the document");
                None
            }
        },
    };

    for key in ["ignore", "skip", "draft"] {
        if let Some(value) = meta.remove(key) {
            if !value.is_null() {
                meta.insert("ignored".into(), Value::Bool(truthy(&value)));
            }
        }
    }
    if let Some(value) = meta.get("published") {
        if !value.is_null() {
            let ignored = !truthy(value);
            meta.insert("ignored".into(), Value::Bool(ignored));
        }
    }

    if meta.remove("id").is_some() {
        warn!(file = %file_path, "the `id` meta-data field is reserved and was removed");
    }

    let urls = match meta.get("urls") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Some(Value::String(url)) => vec![url.clone()],
        _ => Vec::new(),
    };
    let url = meta.get("url").and_then(Value::as_str).map(str::to_string);

    NormalizedMeta {
        meta,
        date,
        url,
        urls,
    }
}

/// Interpret a meta-data value as a timestamp.
pub fn coerce_date(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n.as_i64().and_then(DateTime::<Utc>::from_timestamp_millis),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(date) = DateTime::parse_from_rfc3339(s) {
                return Some(date.with_timezone(&Utc));
            }
            for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
                if let Ok(date) = NaiveDateTime::parse_from_str(s, format) {
                    return Some(date.and_utc());
                }
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .map(|date| date.and_utc())
        }
        _ => None,
    }
}

/// Truthiness of a meta-data value, as a template author would expect.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_yaml_header() {
        let parsed = parse_meta("---\ntitle: Hello\n---\nBody text", "doc.md").unwrap();

        assert_eq!(parsed.changes, json!({"title": "Hello"}).as_object().cloned().unwrap());
        assert_eq!(parsed.body, "Body text");
        assert_eq!(parsed.header.as_deref(), Some("title: Hello"));
        assert_eq!(parsed.parser, Some(MetaFormat::Yaml));
    }

    #[test]
    fn test_parse_without_header() {
        let parsed = parse_meta("\n\nJust a body\n", "doc.md").unwrap();

        assert!(parsed.header.is_none());
        assert!(parsed.parser.is_none());
        assert!(parsed.changes.is_empty());
        assert_eq!(parsed.body, "Just a body\n");
    }

    #[test]
    fn test_parse_normalizes_crlf() {
        let parsed = parse_meta("---\r\ntitle: Hi\r\n---\r\n\r\nLine one\r\nLine two", "doc.md").unwrap();

        assert_eq!(parsed.changes.get("title"), Some(&json!("Hi")));
        assert_eq!(parsed.body, "Line one\nLine two");
        assert!(!parsed.source.contains('\r'));
    }

    #[test]
    fn test_parse_tagged_json_header() {
        let content = "### json\n{\"title\": \"Json\", \"tags\": [1, 2]}\n###\n\nBody";
        let parsed = parse_meta(content, "doc.md").unwrap();

        assert_eq!(parsed.parser, Some(MetaFormat::Json));
        assert_eq!(parsed.changes.get("tags"), Some(&json!([1, 2])));
        assert_eq!(parsed.body, "Body");
    }

    #[test]
    fn test_parse_cson_aliases() {
        for tag in ["cson", "coffee", "coffee-script", "coffeescript", "js", "javascript"] {
            let content = format!("``` {tag}\ntitle: 'Aliased'\n```\nBody");
            let parsed = parse_meta(&content, "doc.md").unwrap();
            assert_eq!(parsed.changes.get("title"), Some(&json!("Aliased")), "tag {tag}");
        }
        let parsed = parse_meta("``` coffee\ntitle: 'x'\n```\n", "doc.md").unwrap();
        assert_eq!(parsed.parser, Some(MetaFormat::CoffeeScript));
    }

    #[test]
    fn test_parse_yaml_with_tabs() {
        let parsed = parse_meta("---\nauthor:\n\tname: Bob\n---\n", "doc.md").unwrap();
        assert_eq!(parsed.changes.get("author"), Some(&json!({"name": "Bob"})));
    }

    #[test]
    fn test_unsupported_parser() {
        let err = parse_meta("--- toml\ntitle = 1\n---\n", "doc.md").unwrap_err();

        match err {
            ParseError::UnsupportedParser { parser, file_path } => {
                assert_eq!(parser, "toml");
                assert_eq!(file_path, "doc.md");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_word_tags_are_reported() {
        for tag in ["json5", "yaml2", "x-front"] {
            let content = format!("--- {tag}\na: 1\n---\nBody");
            let err = parse_meta(&content, "doc.md").unwrap_err();
            assert!(
                matches!(&err, ParseError::UnsupportedParser { parser, .. } if parser == tag),
                "{tag}: {err}"
            );
        }
    }

    #[test]
    fn test_decode_failure_carries_context() {
        let err = parse_meta("---\ntitle: [unclosed\n---\nBody", "blog/post.md").unwrap_err();

        match err {
            ParseError::Decode { parser, file_path, .. } => {
                assert_eq!(parser, MetaFormat::Yaml);
                assert_eq!(file_path, "blog/post.md");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_header_must_be_mapping() {
        let err = parse_meta("---\n- a\n- b\n---\n", "doc.md").unwrap_err();
        assert!(matches!(
            err,
            ParseError::Decode {
                source: DecodeError::NotAMapping(_),
                ..
            }
        ));
    }

    #[test]
    fn test_empty_header() {
        let parsed = parse_meta("---\n---\nBody", "doc.md").unwrap();
        assert!(parsed.changes.is_empty());
        assert_eq!(parsed.body, "Body");
    }

    #[test]
    fn test_unclosed_header_is_body() {
        let parsed = parse_meta("---\ntitle: Hi\nno closing", "doc.md").unwrap();
        assert!(parsed.header.is_none());
        assert!(parsed.body.starts_with("---"));
    }

    #[test]
    fn test_short_or_word_delimiters_are_not_headers() {
        assert!(parse_meta("--\na: 1\n--\n", "doc.md").unwrap().header.is_none());
        assert!(parse_meta("aaa\na: 1\naaa\n", "doc.md").unwrap().header.is_none());
        assert!(parse_meta("--- not a tag!\na: 1\n---\n", "doc.md").unwrap().header.is_none());
    }

    #[test]
    fn test_closing_line_uses_same_character() {
        let parsed = parse_meta("+++\na: 1\n---\nb: 2\n+++\nBody", "doc.md");
        // The `---` line is part of the header, which then fails to decode as one document
        assert!(parsed.is_err());
    }

    #[test]
    fn test_normalize_flags() {
        let meta = json!({"draft": true, "title": "x", "id": 4});
        let normalized = normalize_meta(meta.as_object().cloned().unwrap(), "doc.md");

        assert_eq!(normalized.meta.get("ignored"), Some(&json!(true)));
        assert!(!normalized.meta.contains_key("draft"));
        assert!(!normalized.meta.contains_key("id"));

        let meta = json!({"published": false});
        let normalized = normalize_meta(meta.as_object().cloned().unwrap(), "doc.md");
        assert_eq!(normalized.meta.get("ignored"), Some(&json!(true)));

        let meta = json!({"skip": null});
        let normalized = normalize_meta(meta.as_object().cloned().unwrap(), "doc.md");
        assert!(!normalized.meta.contains_key("ignored"));
    }

    #[test]
    fn test_normalize_date() {
        let meta = json!({"date": "2024-03-05"});
        let normalized = normalize_meta(meta.as_object().cloned().unwrap(), "doc.md");

        let date = normalized.date.unwrap();
        assert_eq!(date.to_rfc3339(), "2024-03-05T00:00:00+00:00");
        assert_eq!(normalized.meta.get("date"), Some(&json!("2024-03-05T00:00:00+00:00")));

        let meta = json!({"date": "last tuesday"});
        let normalized = normalize_meta(meta.as_object().cloned().unwrap(), "doc.md");
        assert!(normalized.date.is_none());
        assert_eq!(normalized.meta.get("date"), Some(&json!("last tuesday")));
    }

    #[test]
    fn test_coerce_date_formats() {
        assert!(coerce_date(&json!("2024-03-05T10:00:00Z")).is_some());
        assert!(coerce_date(&json!("2024-03-05 10:00:00")).is_some());
        assert_eq!(
            coerce_date(&json!(0)).map(|d| d.timestamp()),
            Some(0)
        );
        assert!(coerce_date(&json!(true)).is_none());
    }

    #[test]
    fn test_normalize_urls() {
        let meta = json!({"url": "/about/", "urls": ["/a", "/b"]});
        let normalized = normalize_meta(meta.as_object().cloned().unwrap(), "doc.md");

        assert_eq!(normalized.url.as_deref(), Some("/about/"));
        assert_eq!(normalized.urls, vec!["/a", "/b"]);
    }

    #[test]
    fn test_truthy() {
        assert!(truthy(&json!("yes")));
        assert!(!truthy(&json!("")));
        assert!(!truthy(&json!(0)));
        assert!(truthy(&json!([])));
        assert!(!truthy(&Value::Null));
    }
}
