use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::{Captures, Regex};
use tracing::{debug, warn};

use crate::types::{KeyKind, KeyRecord, Signature, Subkey, UserId};

/// The kinds of line a key block is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    Key,
    Fingerprint,
    UserId,
    Signature,
    Subkey,
}

/// Line classification rules, tried in order against each trimmed line.
///
/// Every pattern exposes a `rest` group holding the text left over after
/// the line marker; key, signature and subkey lines also expose `id`.
/// Lines matching none of these are ignored.
const LINE_RULES: &[(LineKind, &str)] = &[
    (
        LineKind::Key,
        r"^(?:pub|sec)\s+\S*?/(?P<id>[0-9A-Za-z]+)(?P<rest>.*)$",
    ),
    (
        LineKind::Fingerprint,
        r"^(?:Key fingerprint|Fingerprint)\s*=\s*(?P<rest>.*)$",
    ),
    (
        LineKind::UserId,
        r"^uid\s+(?:\[\s*(?P<trust>[^\]]*?)\s*\]\s*)?(?P<rest>.*)$",
    ),
    (
        LineKind::Signature,
        r"^sig\S*\s+(?:(?:[A-Za-z]{1,5}\d?|\d)\s+)*(?P<id>[0-9A-Za-z]{16}|[0-9A-Za-z]{8})\b(?P<rest>.*)$",
    ),
    (
        LineKind::Subkey,
        r"^(?:sub|ssb)\s+\S*?/(?P<id>[0-9A-Za-z]+)(?P<rest>.*)$",
    ),
];

static RULES: LazyLock<Vec<(LineKind, Regex)>> = LazyLock::new(|| {
    LINE_RULES
        .iter()
        .map(|(kind, pattern)| (*kind, Regex::new(pattern).expect("valid line rule")))
        .collect()
});

static DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4}-\d{2}-\d{2})").expect("valid date pattern"));

static BRACKETED_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[[^\]]*?(\d{4}-\d{2}-\d{2})[^\]]*\]").expect("valid expiry pattern")
});

/// Creation date, expiry placeholders and expiry dates preceding the
/// signer identity on a signature line.
static SIG_SEPARATORS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(?:_{2,}|\d{4}-\d{2}-\d{2}\S*)\s*)*").expect("valid separator pattern")
});

static COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(([^)]*)\)").expect("valid comment pattern"));

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([^>]*)>").expect("valid email pattern"));

const SELF_SIGNATURE_MARKER: &str = "[selfsig]";

/// Result of parsing a keyring listing.
#[derive(Debug, Clone, Default)]
pub struct ParseReport {
    /// Parsed keys, oldest first.
    pub keys: Vec<KeyRecord>,
    /// Number of non-empty blocks that did not describe a usable key.
    pub skipped: usize,
}

/// Parses `gpg --list-sigs --fingerprint` output into key records.
///
/// `secret` is the text of a secret-key listing; keys whose id appears in
/// it are marked [`KeyKind::Secret`]. Malformed blocks are dropped.
pub fn parse_keyring(public: &str, secret: &str) -> Vec<KeyRecord> {
    parse_keyring_report(public, secret).keys
}

/// Like [`parse_keyring`], but also reports how many blocks were dropped.
pub fn parse_keyring_report(public: &str, secret: &str) -> ParseReport {
    let mut report = ParseReport::default();

    for block in split_blocks(public) {
        match parse_block(&block) {
            Some(mut key) => {
                if secret.contains(&key.keyid) {
                    key.kind = KeyKind::Secret;
                }
                report.keys.push(key);
            }
            None => {
                debug!(lines = block.len(), "skipping block without a usable key");
                report.skipped += 1;
            }
        }
    }

    if report.skipped > 0 {
        warn!(skipped = report.skipped, "dropped unparsable keyring blocks");
    }

    // sort_by is stable, so keys created on the same day keep their order
    report.keys.sort_by(|a, b| a.created.cmp(&b.created));
    report
}

/// Splits text into blocks separated by blank lines.
fn split_blocks(text: &str) -> Vec<Vec<&str>> {
    let mut blocks = Vec::new();
    let mut current = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }

    blocks
}

/// Parses one key block. Returns None if the block does not name a key.
///
/// Fields that fail to parse are left empty; only a missing key id
/// discards the block.
pub(crate) fn parse_block(lines: &[&str]) -> Option<KeyRecord> {
    if lines.len() < 2 {
        return None;
    }

    let mut builder = KeyBuilder::default();

    for line in lines {
        let line = line.trim();
        let Some((kind, caps)) = classify(line) else {
            continue;
        };

        match kind {
            LineKind::Key => {
                if builder.keyid.is_some() {
                    debug!(line, "ignoring second key line in block");
                    continue;
                }
                builder.keyid = Some(caps["id"].to_string());
                builder.created = first_date(&caps["rest"]);
            }
            LineKind::Fingerprint if builder.fingerprint.is_none() => {
                builder.fingerprint = Some(caps["rest"].split_whitespace().collect());
            }
            LineKind::UserId => {
                let mut uid = parse_identity(&caps["rest"]);
                uid.trust = caps
                    .name("trust")
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default();
                builder.user_ids.push(uid);
            }
            LineKind::Signature => builder.push_signature(&caps),
            LineKind::Subkey => {
                let rest = &caps["rest"];
                builder.subkeys.push(Subkey {
                    keyid: caps["id"].to_string(),
                    created: first_date(rest),
                    expires: BRACKETED_DATE
                        .captures(rest)
                        .and_then(|c| parse_date(&c[1])),
                });
            }
            LineKind::Fingerprint => {}
        }
    }

    builder.build()
}

fn classify(line: &str) -> Option<(LineKind, Captures<'_>)> {
    RULES
        .iter()
        .find_map(|(kind, re)| re.captures(line).map(|caps| (*kind, caps)))
}

fn first_date(s: &str) -> Option<NaiveDate> {
    DATE.captures(s).and_then(|c| parse_date(&c[1]))
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// Splits `Name (comment) <email>` into its parts.
///
/// The name is everything before the first `<` or `(`.
fn parse_identity(text: &str) -> UserId {
    let text = text.trim();
    let name_end = text.find(['<', '(']).unwrap_or(text.len());

    UserId {
        name: text[..name_end].trim().to_string(),
        comment: COMMENT
            .captures(text)
            .map(|c| c[1].trim().to_string())
            .unwrap_or_default(),
        email: EMAIL
            .captures(text)
            .map(|c| c[1].trim().to_string())
            .unwrap_or_default(),
        trust: String::new(),
    }
}

#[derive(Default)]
struct KeyBuilder {
    keyid: Option<String>,
    fingerprint: Option<String>,
    created: Option<NaiveDate>,
    user_ids: Vec<UserId>,
    signatures: Vec<Signature>,
    subkeys: Vec<Subkey>,
}

impl KeyBuilder {
    fn push_signature(&mut self, caps: &Captures<'_>) {
        let signer = &caps["id"];
        let rest = caps["rest"].trim();

        if rest.contains(SELF_SIGNATURE_MARKER) || self.is_own_keyid(signer) {
            return;
        }

        let identity = parse_identity(&SIG_SEPARATORS.replace(rest, ""));
        self.signatures.push(Signature {
            signer_keyid: signer.to_string(),
            created: DATE
                .captures(rest)
                .filter(|c| c.get(0).is_some_and(|m| m.start() == 0))
                .and_then(|c| parse_date(&c[1])),
            name: identity.name,
            comment: identity.comment,
            email: identity.email,
        });
    }

    /// GnuPG does not mark self-signatures, so a signer id matching the
    /// key's own id (short or long form) counts as one too.
    fn is_own_keyid(&self, signer: &str) -> bool {
        match &self.keyid {
            Some(own) => own.ends_with(signer) || signer.ends_with(own.as_str()),
            None => false,
        }
    }

    fn build(self) -> Option<KeyRecord> {
        Some(KeyRecord {
            keyid: self.keyid?,
            fingerprint: self.fingerprint.unwrap_or_default(),
            created: self.created,
            kind: KeyKind::Public,
            user_ids: self.user_ids,
            signatures: self.signatures,
            subkeys: self.subkeys,
        })
    }
}
