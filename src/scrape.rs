use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::debug;

use crate::error::{Error, Result};
use crate::parse::parse_block;
use crate::types::KeyRecord;

/// Heading that opens the results section of a verbose index page.
const RESULTS_MARKER: &str = "Search results for";

/// Notices keyservers print instead of a results section.
const NO_RESULTS_MARKERS: &[&str] = &["No results found", "No keys found"];

static HIDDEN_ELEMENTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b.*?</script\s*>|<style\b.*?</style\s*>|<!--.*?-->")
        .expect("valid element pattern")
});

static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid tag pattern"));

static NUMERIC_ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&#(?:x([0-9A-Fa-f]+)|([0-9]+));").expect("valid entity pattern")
});

static ENTRY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*pub\b").expect("valid entry pattern"));

/// Parses a keyserver `op=vindex` results page into key records.
///
/// A page announcing that nothing matched yields an empty list. A page
/// without a results section is reported as
/// [`Error::UnexpectedPageLayout`], so that a changed layout is never
/// mistaken for an empty result.
pub fn scrape_index(html: &str) -> Result<Vec<KeyRecord>> {
    let text = html_to_text(html);

    let Some(start) = text.find(RESULTS_MARKER) else {
        if NO_RESULTS_MARKERS.iter().any(|m| text.contains(m)) {
            debug!("keyserver reported no matching keys");
            return Ok(Vec::new());
        }
        return Err(Error::UnexpectedPageLayout {
            marker: RESULTS_MARKER,
        });
    };

    // the first line of the section echoes the query and column headers
    let section = &text[start..];
    let section = section.find('\n').map_or("", |nl| &section[nl + 1..]);

    let starts: Vec<usize> = ENTRY.find_iter(section).map(|m| m.start()).collect();
    let mut keys = Vec::with_capacity(starts.len());

    for (i, &from) in starts.iter().enumerate() {
        let to = starts.get(i + 1).copied().unwrap_or(section.len());
        let lines: Vec<&str> = section[from..to]
            .lines()
            .filter(|line| !line.trim().is_empty())
            .collect();

        match parse_block(&lines) {
            Some(key) => keys.push(key),
            None => debug!(
                entry = lines.first().copied().unwrap_or_default(),
                "skipping unparsable keyserver entry"
            ),
        }
    }

    Ok(keys)
}

/// Reduces an HTML document to its text content, in document order.
fn html_to_text(html: &str) -> String {
    let visible = HIDDEN_ELEMENTS.replace_all(html, "");
    let text = TAG.replace_all(&visible, "");
    decode_entities(&text)
}

fn decode_entities(text: &str) -> String {
    let text = NUMERIC_ENTITY.replace_all(text, |caps: &Captures<'_>| {
        let code = match (caps.get(1), caps.get(2)) {
            (Some(hex), _) => u32::from_str_radix(hex.as_str(), 16).ok(),
            (None, Some(dec)) => dec.as_str().parse().ok(),
            (None, None) => None,
        };
        code.and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_else(|| caps[0].to_string())
    });

    // &amp; last, so "&amp;lt;" stays "&lt;"
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}
