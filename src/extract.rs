//! Recovery of a structured JSON object from raw model output.
//!
//! Language models reliably violate "output only JSON" instructions by
//! wrapping the object in prose or code fences. Extraction is an ordered
//! chain of pure strategies, each returning an optional parsed object;
//! the first success wins. Malformed JSON inside a matched span is still a
//! failure — this is not a JSON-repair engine.
//!
//! Strategies, in order:
//! 1. parse the whole text directly;
//! 2. parse the contents of a fenced ```json code block;
//! 3. parse the first balanced `{…}` span in the text.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::models::{AtsReport, Draft, Metadata};

static FENCED_JSON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("fenced-block regex is valid")
});

/// Try each strategy in order; `None` if every one fails.
pub fn extract_json(raw: &str) -> Option<Metadata> {
    const STRATEGIES: &[fn(&str) -> Option<Metadata>] =
        &[parse_direct, parse_fenced, parse_braced];
    STRATEGIES.iter().find_map(|strategy| strategy(raw))
}

fn parse_direct(raw: &str) -> Option<Metadata> {
    parse_object(raw.trim())
}

fn parse_fenced(raw: &str) -> Option<Metadata> {
    let captures = FENCED_JSON.captures(raw)?;
    parse_object(captures.get(1)?.as_str())
}

fn parse_braced(raw: &str) -> Option<Metadata> {
    parse_object(first_balanced_span(raw)?)
}

fn parse_object(candidate: &str) -> Option<Metadata> {
    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// The first `{…}` span with balanced braces, honoring JSON string
/// literals and escapes so a `}` inside a string does not close the span.
fn first_balanced_span(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in raw[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Fold recognized key synonyms into the canonical keys, then accept the
/// object as a draft only if at least one expected key is present. Missing
/// keys default to empty; unexpected extra keys are dropped.
pub fn normalize_draft(mut obj: Metadata) -> Option<Draft> {
    fold_synonym(&mut obj, "cover_letter", "cover_letter_markdown");
    fold_synonym(&mut obj, "bullets", "cv_bullets");
    fold_synonym(&mut obj, "ats", "ats_report");

    let recognized = ["cover_letter_markdown", "cv_bullets", "ats_report"]
        .iter()
        .any(|key| obj.contains_key(*key));
    if !recognized {
        return None;
    }

    let cover_letter_markdown = obj
        .get("cover_letter_markdown")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let cv_bullets = obj
        .get("cv_bullets")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let ats_report = obj
        .get("ats_report")
        .and_then(Value::as_object)
        .map(|report| AtsReport {
            covered: string_list(report.get("covered")),
            missing: string_list(report.get("missing")),
        })
        .unwrap_or_default();

    Some(Draft {
        cover_letter_markdown,
        cv_bullets,
        ats_report,
    })
}

fn fold_synonym(obj: &mut Metadata, synonym: &str, canonical: &str) {
    if !obj.contains_key(canonical) {
        if let Some(value) = obj.remove(synonym) {
            obj.insert(canonical.to_string(), value);
        }
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const STRICT: &str = r#"{"cover_letter_markdown":"x","cv_bullets":[],"ats_report":{}}"#;

    #[test]
    fn direct_json_parses_unchanged() {
        let obj = extract_json(STRICT).unwrap();
        assert_eq!(obj.get("cover_letter_markdown"), Some(&json!("x")));
        assert!(obj.contains_key("cv_bullets"));
        assert!(obj.contains_key("ats_report"));
    }

    #[test]
    fn fenced_block_with_json_tag_parses() {
        let raw = format!("Here is the draft:\n```json\n{STRICT}\n```\nGood luck!");
        let obj = extract_json(&raw).unwrap();
        assert_eq!(obj.get("cover_letter_markdown"), Some(&json!("x")));
    }

    #[test]
    fn fenced_block_without_tag_parses() {
        let raw = format!("```\n{STRICT}\n```");
        assert!(extract_json(&raw).is_some());
    }

    #[test]
    fn embedded_object_in_prose_parses() {
        let raw = format!("Sure! {STRICT} — let me know if you want edits.");
        let obj = extract_json(&raw).unwrap();
        assert_eq!(obj.get("cover_letter_markdown"), Some(&json!("x")));
    }

    #[test]
    fn brace_inside_string_does_not_close_span() {
        let raw = r#"note {"cover_letter_markdown": "uses { and } inside", "cv_bullets": []} end"#;
        let obj = extract_json(raw).unwrap();
        assert_eq!(
            obj.get("cover_letter_markdown"),
            Some(&json!("uses { and } inside"))
        );
    }

    #[test]
    fn refusal_text_yields_none() {
        assert!(extract_json("Sorry, I can't help with that.").is_none());
    }

    #[test]
    fn malformed_json_in_span_is_not_repaired() {
        assert!(extract_json(r#"{"cover_letter_markdown": "x",}"#).is_none());
    }

    #[test]
    fn top_level_array_is_rejected() {
        assert!(extract_json(r#"["not", "an", "object"]"#).is_none());
    }

    #[test]
    fn normalize_fills_missing_keys() {
        let obj = extract_json(r#"{"cv_bullets": ["Shipped X", "Cut latency 40%"]}"#).unwrap();
        let draft = normalize_draft(obj).unwrap();
        assert_eq!(draft.cover_letter_markdown, "");
        assert_eq!(draft.cv_bullets.len(), 2);
        assert!(draft.ats_report.covered.is_empty());
    }

    #[test]
    fn normalize_folds_synonyms() {
        let obj = extract_json(
            r#"{"cover_letter": "Dear Hiring Manager", "bullets": ["Led team of 4"], "ats": {"covered": ["rust"], "missing": ["k8s"]}}"#,
        )
        .unwrap();
        let draft = normalize_draft(obj).unwrap();
        assert_eq!(draft.cover_letter_markdown, "Dear Hiring Manager");
        assert_eq!(draft.cv_bullets, vec!["Led team of 4".to_string()]);
        assert_eq!(draft.ats_report.covered, vec!["rust".to_string()]);
        assert_eq!(draft.ats_report.missing, vec!["k8s".to_string()]);
    }

    #[test]
    fn canonical_key_wins_over_synonym() {
        let obj = extract_json(r#"{"cover_letter_markdown": "canonical", "cover_letter": "synonym"}"#)
            .unwrap();
        let draft = normalize_draft(obj).unwrap();
        assert_eq!(draft.cover_letter_markdown, "canonical");
    }

    #[test]
    fn unrecognized_object_yields_none() {
        let obj = extract_json(r#"{"answer": 42}"#).unwrap();
        assert!(normalize_draft(obj).is_none());
    }

    #[test]
    fn non_string_bullets_are_dropped() {
        let obj = extract_json(r#"{"cv_bullets": ["kept", 7, null, "also kept"]}"#).unwrap();
        let draft = normalize_draft(obj).unwrap();
        assert_eq!(draft.cv_bullets, vec!["kept".to_string(), "also kept".to_string()]);
    }
}
