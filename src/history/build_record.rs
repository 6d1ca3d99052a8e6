//! Reading the start time out of a build record (`builds/<id>/build.xml`)

use regex::Regex;
use roxmltree::Document;
use std::sync::OnceLock;
use tracing::debug;

const TIMESTAMP_TAG: &str = "timestamp";

fn timestamp_line_regex() -> &'static Regex {
    static TIMESTAMP_LINE: OnceLock<Regex> = OnceLock::new();
    TIMESTAMP_LINE.get_or_init(|| {
        Regex::new(r"<timestamp>\s*([^<]*?)\s*</timestamp>").expect("Invalid timestamp regex")
    })
}

/// Returns the raw text of the build's `<timestamp>` element, if any.
///
/// The element directly under the root wins over nested ones (actions can carry
/// their own timestamps). Documents the XML parser rejects are scanned line by
/// line instead.
pub fn extract_timestamp(content: &str) -> Option<String> {
    match Document::parse(content) {
        Ok(doc) => {
            let root = doc.root_element();
            root.children()
                .find(|n| n.has_tag_name(TIMESTAMP_TAG))
                .or_else(|| root.descendants().find(|n| n.has_tag_name(TIMESTAMP_TAG)))
                .map(|n| n.text().unwrap_or("").trim().to_string())
        }
        Err(e) => {
            debug!("Build record is not well-formed XML ({}), scanning lines", e);
            content
                .lines()
                .find_map(|line| timestamp_line_regex().captures(line))
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string())
        }
    }
}
