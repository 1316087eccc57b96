use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Literal used for an absent field once a record has been normalized.
pub const NULL_SENTINEL: &str = "null";

/// Field names in wire order.
pub const FIELD_NAMES: [&str; 6] = ["title", "author", "publisher", "date", "abstract", "url"];

/// Fields a record must carry under the strict submission policy.
pub const REQUIRED_FIELDS: [&str; 2] = ["title", "url"];

/// Bibliographic fields extracted from one page.
///
/// Every key defaults to an empty string so that partial payloads coming
/// from a page still decode.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanRecord {
    pub title: String,
    pub author: String,
    pub publisher: String,
    pub date: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Missing required fields: {}", .missing.join(", "))]
pub struct ValidationError {
    pub missing: Vec<String>,
}

impl ScanRecord {
    /// All-sentinel record that keeps only the page URL.
    pub fn placeholder(url: impl Into<String>) -> Self {
        let mut record = Self::default().normalized();
        record.url = url.into();
        record
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        let value = match name {
            "title" => &self.title,
            "author" => &self.author,
            "publisher" => &self.publisher,
            "date" => &self.date,
            "abstract" => &self.abstract_text,
            "url" => &self.url,
            _ => return None,
        };
        Some(value.as_str())
    }

    /// Trims every field and replaces empty values with [`NULL_SENTINEL`].
    pub fn normalized(&self) -> Self {
        Self {
            title: normalize_field(&self.title),
            author: normalize_field(&self.author),
            publisher: normalize_field(&self.publisher),
            date: normalize_field(&self.date),
            abstract_text: normalize_field(&self.abstract_text),
            url: normalize_field(&self.url),
        }
    }

    /// Names of `required` fields that are empty, blank or the sentinel.
    pub fn missing_fields(&self, required: &[&str]) -> Vec<String> {
        required
            .iter()
            .filter(|name| self.field(name).map_or(true, is_absent))
            .map(|name| (*name).to_string())
            .collect()
    }

    pub fn validate(&self, required: &[&str]) -> Result<(), ValidationError> {
        let missing = self.missing_fields(required);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { missing })
        }
    }

    /// A page only reports auto-scan data when it found a title or an author.
    pub fn is_worth_sending(&self) -> bool {
        !is_absent(&self.title) || !is_absent(&self.author)
    }
}

fn normalize_field(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        NULL_SENTINEL.to_string()
    } else {
        trimmed.to_string()
    }
}

fn is_absent(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty() || trimmed == NULL_SENTINEL
}

/// Auto-scan only targets regular web pages; `file://` and extension pages are skipped.
pub fn is_scannable_url(raw: &str) -> bool {
    match url::Url::parse(raw.trim()) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https"),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ScanRecord {
        ScanRecord {
            title: "A".into(),
            author: "".into(),
            publisher: "P".into(),
            date: "".into(),
            abstract_text: "X".into(),
            url: "http://e.com".into(),
        }
    }

    #[test]
    fn normalization_substitutes_sentinel_for_empty_fields() {
        let normalized = sample().normalized();
        assert_eq!(
            normalized,
            ScanRecord {
                title: "A".into(),
                author: "null".into(),
                publisher: "P".into(),
                date: "null".into(),
                abstract_text: "X".into(),
                url: "http://e.com".into(),
            }
        );
    }

    #[test]
    fn normalization_trims_and_treats_whitespace_as_absent() {
        let record = ScanRecord {
            title: "  Deep Learning \n".into(),
            author: " \t ".into(),
            ..ScanRecord::default()
        };
        let normalized = record.normalized();
        assert_eq!(normalized.title, "Deep Learning");
        assert_eq!(normalized.author, NULL_SENTINEL);
        for name in FIELD_NAMES {
            let value = normalized.field(name).unwrap();
            assert!(!value.is_empty(), "{name} must not be empty");
        }
    }

    #[test]
    fn missing_fields_lists_required_names_in_order() {
        let record = ScanRecord {
            title: "null".into(),
            url: " ".into(),
            ..ScanRecord::default()
        };
        assert_eq!(record.missing_fields(&REQUIRED_FIELDS), vec!["title", "url"]);

        let err = record.validate(&REQUIRED_FIELDS).unwrap_err();
        assert_eq!(err.to_string(), "Missing required fields: title, url");
        assert!(sample().validate(&REQUIRED_FIELDS).is_ok());
    }

    #[test]
    fn partial_payload_decodes_with_empty_defaults() {
        let record: ScanRecord =
            serde_json::from_str(r#"{"title":"T","abstract":"Summary"}"#).unwrap();
        assert_eq!(record.title, "T");
        assert_eq!(record.abstract_text, "Summary");
        assert_eq!(record.author, "");
        assert_eq!(record.url, "");
    }

    #[test]
    fn scannable_urls_are_http_only() {
        assert!(is_scannable_url("https://example.com/a"));
        assert!(is_scannable_url("http://localhost:8000"));
        assert!(!is_scannable_url("file:///tmp/a.html"));
        assert!(!is_scannable_url("chrome-extension://abc/popup.html"));
        assert!(!is_scannable_url("not a url"));
    }

    #[test]
    fn worth_sending_needs_title_or_author() {
        assert!(sample().is_worth_sending());
        assert!(!ScanRecord::placeholder("https://e.com").is_worth_sending());
        let author_only = ScanRecord {
            author: "Ada".into(),
            ..ScanRecord::default()
        };
        assert!(author_only.is_worth_sending());
    }
}
