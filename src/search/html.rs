//! Rich-text to plain-text conversion for search and export.
//!
//! Item descriptions come from a rich-text editor and may carry HTML
//! markup. Matching runs on the visible text only.

/// Tags that start a new line in the plain-text rendering.
const BLOCK_TAGS: &[&str] = &[
    "br", "p", "div", "li", "tr", "h1", "h2", "h3", "h4", "h5", "h6", "blockquote", "pre",
];

/// Tags whose content is dropped entirely.
const SKIPPED_TAGS: &[&str] = &["script", "style"];

const ENTITIES: &[(&str, &str)] = &[
    ("&nbsp;", " "),
    ("&#160;", " "),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&#39;", "'"),
    ("&apos;", "'"),
    // Last, so "&amp;lt;" decodes to "&lt;" and not "<".
    ("&amp;", "&"),
];

/// Convert rich text to plain text.
///
/// - Tags are removed; block tags become line breaks
/// - `<script>` and `<style>` blocks are removed with their content
/// - Common entities are decoded
/// - Lines are trimmed and runs of blank lines collapsed
///
/// Text without markup passes through unchanged apart from trimming.
pub fn strip_html(input: &str) -> String {
    if !input.contains('<') && !input.contains('&') {
        return input.trim().to_string();
    }

    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    let mut skipping: Option<&str> = None;

    while let Some(open) = rest.find('<') {
        if skipping.is_none() {
            out.push_str(&rest[..open]);
        }
        let after = &rest[open + 1..];
        let Some(close) = after.find('>') else {
            // Unterminated tag: keep the text as typed.
            if skipping.is_none() {
                out.push_str(&rest[open..]);
            }
            rest = "";
            break;
        };

        let tag = &after[..close];
        let (closing, name) = tag_name(tag);
        rest = &after[close + 1..];

        if let Some(skipped) = skipping {
            if closing && name == skipped {
                skipping = None;
            }
            continue;
        }
        if !closing {
            if let Some(skipped) = SKIPPED_TAGS.iter().find(|t| **t == name) {
                skipping = Some(*skipped);
                continue;
            }
        }
        if BLOCK_TAGS.contains(&name.as_str()) {
            out.push('\n');
        }
    }
    if skipping.is_none() {
        out.push_str(rest);
    }

    let decoded = decode_entities(&out);
    collapse_lines(&decoded)
}

/// `("/p", ...)` → `(true, "p")`; attributes and self-closing slashes are
/// ignored. The name is lowercased.
fn tag_name(tag: &str) -> (bool, String) {
    let tag = tag.trim();
    let (closing, body) = match tag.strip_prefix('/') {
        Some(body) => (true, body),
        None => (false, tag),
    };
    let name: String = body
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();
    (closing, name)
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut decoded = text.to_string();
    for (entity, replacement) in ENTITIES {
        decoded = decoded.replace(entity, replacement);
    }
    decoded
}

fn collapse_lines(text: &str) -> String {
    let mut cleaned = String::with_capacity(text.len());
    let mut blank_run = false;
    for line in text.lines().map(str::trim) {
        if line.is_empty() {
            if !blank_run && !cleaned.is_empty() {
                cleaned.push('\n');
            }
            blank_run = true;
        } else {
            cleaned.push_str(line);
            cleaned.push('\n');
            blank_run = false;
        }
    }
    cleaned.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_tags_are_removed() {
        assert_eq!(strip_html("<b>Grandpa's medal</b>"), "Grandpa's medal");
        assert_eq!(
            strip_html("<p>Hello <em class=\"x\">world</em></p>"),
            "Hello world"
        );
    }

    #[test]
    fn test_block_tags_break_lines() {
        let text = strip_html("<p>First</p><p>Second</p>Third<br/>Fourth");
        assert_eq!(text, "First\n\nSecond\nThird\nFourth");
    }

    #[test]
    fn test_entities_are_decoded() {
        assert_eq!(strip_html("Tom &amp; Jerry &lt;3&gt;"), "Tom & Jerry <3>");
        assert_eq!(strip_html("&amp;lt;"), "&lt;");
    }

    #[test]
    fn test_script_and_style_are_dropped() {
        assert_eq!(
            strip_html("Before<script>alert('<b>x</b>')</script>After"),
            "BeforeAfter"
        );
        assert_eq!(strip_html("<STYLE>p { color: red }</STYLE>Text"), "Text");
    }

    #[test]
    fn test_plain_text_passes_through() {
        assert_eq!(strip_html("  1 < 2 is true  "), "1 < 2 is true");
        assert_eq!(strip_html("plain"), "plain");
        assert_eq!(strip_html(""), "");
    }
}
