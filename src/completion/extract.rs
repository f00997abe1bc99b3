use serde_json::Value;

/// Candidate fields on a content item, most specific first.
const CONTENT_TEXT_FIELDS: [&str; 3] = ["text", "value", "content"];

const FRAGMENT_SEPARATOR: &str = "\n\n";

/// Recovers the answer text from a Responses API document of any historical shape.
///
/// The top-level `output_text` convenience field wins when it is non-blank. Otherwise every
/// `output[].content[]` item contributes at most one fragment, taken from the first non-blank
/// string among [`CONTENT_TEXT_FIELDS`]. Fragments are joined with a blank line.
///
/// Total over any JSON input: malformed or unexpected shapes yield `None`.
pub fn extract_response_text(payload: &Value) -> Option<String> {
    if let Some(text) = non_blank(payload.get("output_text")) {
        return Some(text.to_string());
    }

    let fragments: Vec<&str> = as_items(payload.get("output"))
        .iter()
        .flat_map(|output| as_items(output.get("content")))
        .filter_map(content_fragment)
        .collect();

    let joined = fragments.join(FRAGMENT_SEPARATOR);
    let joined = joined.trim();
    if joined.is_empty() {
        None
    } else {
        Some(joined.to_string())
    }
}

fn content_fragment(item: &Value) -> Option<&str> {
    CONTENT_TEXT_FIELDS
        .iter()
        .find_map(|field| non_blank(item.get(field)))
}

fn as_items(value: Option<&Value>) -> &[Value] {
    value
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn non_blank(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}
