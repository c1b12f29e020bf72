use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::EvaluationResult;

/// Matches the `"feedback": "..."` span: from the opening quote after the
/// key to the closing quote immediately preceding a comma or closing brace.
/// `(?s)` lets the span cross the very control characters being repaired.
static FEEDBACK_SPAN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)("feedback"\s*:\s*")(.*?)("\s*[,}])"#).expect("feedback span pattern")
});

/// Recover a `{ rating, feedback }` record from the raw text returned by the
/// language-model service, which approximates a single JSON object but is
/// frequently fenced, truncated, or carries unescaped control characters.
///
/// Stages are applied in order, first success wins; when every stage fails
/// the safe fallback is returned. Never panics and never returns an error -
/// the caller always gets a result it can show.
pub fn repair_evaluation(raw: &str) -> EvaluationResult {
    match recover_object(raw) {
        Some(value) => match validate(&value) {
            Some(result) => result,
            None => {
                warn!("evaluation reply parsed but carried no usable feedback");
                EvaluationResult::unparsable_fallback()
            }
        },
        None => {
            warn!(
                "evaluation reply could not be repaired ({} chars)",
                raw.len()
            );
            EvaluationResult::unparsable_fallback()
        }
    }
}

fn recover_object(raw: &str) -> Option<Value> {
    let text = strip_fences(raw);

    if let Some(value) = parse_object(text) {
        debug!("evaluation reply parsed directly");
        return Some(value);
    }

    // Greedy span between the first '{' and the last '}' drops prose the
    // service wrapped around the object.
    let inner = brace_span(text)?;
    if let Some(value) = parse_object(inner) {
        debug!("evaluation reply parsed after brace extraction");
        return Some(value);
    }

    // Last resort: the most common breakage in practice is valid JSON except
    // for raw control characters inside the feedback string. Re-escape that
    // span only and try once more.
    let repaired = escape_feedback_span(inner)?;
    let value = parse_object(&repaired)?;
    debug!("evaluation reply parsed after feedback re-escape");
    Some(value)
}

fn strip_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```") {
        text = rest.trim_start();
        if let Some(rest) = text.strip_prefix("json") {
            text = rest;
        }
        if let Some(rest) = text.strip_suffix("```") {
            text = rest;
        }
        text = text.trim();
    }
    text
}

fn parse_object(text: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(text) {
        Ok(value) if value.is_object() => Some(value),
        _ => None,
    }
}

fn brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(&text[start..=end])
}

fn escape_feedback_span(document: &str) -> Option<String> {
    let captures = FEEDBACK_SPAN.captures(document)?;
    let span = captures.get(2)?;

    // Backslash first, or the other substitutions would be double-escaped.
    let escaped = span
        .as_str()
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
        .replace('\u{000C}', "\\f")
        .replace('\u{0008}', "\\b");

    let mut repaired = String::with_capacity(document.len() + 16);
    repaired.push_str(&document[..span.start()]);
    repaired.push_str(&escaped);
    repaired.push_str(&document[span.end()..]);
    Some(repaired)
}

fn validate(value: &Value) -> Option<EvaluationResult> {
    let object = value.as_object()?;

    // Feedback is the part the candidate actually reads; no synthetic
    // replacement is acceptable, so a missing or empty value fails the
    // whole parse.
    let feedback = object.get("feedback")?.as_str()?.trim();
    if feedback.is_empty() {
        return None;
    }

    // A bad rating is not a reason to discard otherwise-usable feedback.
    let rating = match object.get("rating").and_then(Value::as_f64) {
        Some(n) if (1.0..=10.0).contains(&n) => n.round() as u8,
        _ => 5,
    };

    Some(EvaluationResult {
        rating,
        feedback: feedback.to_string(),
    })
}
