use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// A source passage supporting an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitedSection {
    pub title: String,
    #[serde(default, alias = "sectionTitle")]
    pub section_title: Option<String>,
    pub preview: String,
    #[serde(default)]
    pub pages: Vec<u32>,
    #[serde(default, alias = "sourceUrl")]
    pub source_url: Option<String>,
    #[serde(default, alias = "documentId")]
    pub document_id: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
}

impl CitedSection {
    fn is_complete(&self) -> bool {
        !self.title.trim().is_empty() && !self.preview.trim().is_empty()
    }
}

/// Parse a `citations` payload, keeping only complete entries.
///
/// The backend sends entries either as objects or as JSON-encoded strings in
/// the same array. Both are accepted. Entries that do not parse, or that lack
/// a non-empty `title` or `preview`, are dropped.
pub fn parse_cited_sections(entries: &[Value]) -> Vec<CitedSection> {
    entries
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            let parsed = match entry {
                Value::String(encoded) => serde_json::from_str::<CitedSection>(encoded),
                other => serde_json::from_value::<CitedSection>(other.clone()),
            };

            match parsed {
                Ok(section) if section.is_complete() => Some(section),
                Ok(_) => {
                    warn!(index, "dropping citation without title or preview");
                    None
                }
                Err(error) => {
                    warn!(index, %error, "dropping unparseable citation");
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn accepts_objects_and_encoded_strings() {
        let entries = vec![
            json!({"title": "Manual", "preview": "...2 years...", "pages": [4]}),
            Value::String(r#"{"title":"Terms","preview":"...12 months...","pages":[1,2]}"#.to_string()),
        ];

        let parsed = parse_cited_sections(&entries);

        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].pages, vec![4]);
        assert_eq!(parsed[1].title, "Terms");
    }

    #[test]
    fn camel_case_keys_are_accepted() {
        let parsed = parse_cited_sections(&[json!({
            "title": "Manual",
            "sectionTitle": "Warranty",
            "preview": "...",
            "sourceUrl": "https://docs.acaceta.example/manual.pdf",
            "documentId": "manual-2024"
        })]);

        assert_eq!(parsed[0].section_title.as_deref(), Some("Warranty"));
        assert_eq!(
            parsed[0].source_url.as_deref(),
            Some("https://docs.acaceta.example/manual.pdf")
        );
        assert_eq!(parsed[0].document_id.as_deref(), Some("manual-2024"));
    }

    #[test]
    fn incomplete_and_malformed_entries_are_dropped() {
        let parsed = parse_cited_sections(&[
            json!({"title": "Keep", "preview": "kept"}),
            json!({"title": "No preview"}),
            json!({"preview": "no title"}),
            json!({"title": "  ", "preview": "blank title"}),
            json!({"title": null, "preview": "null title"}),
            Value::String("{not json".to_string()),
            json!(42),
        ]);

        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].title, "Keep");
    }
}
