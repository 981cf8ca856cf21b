use std::fmt::Write;

use chrono::NaiveDate;

use crate::types::KeyRecord;

fn date(d: Option<NaiveDate>) -> String {
    d.map(|d| d.to_string()).unwrap_or_else(|| "----------".to_string())
}

/// Renders candidates with their selection index, user ids and signatures.
pub fn render_candidates(candidates: &[&KeyRecord]) -> String {
    let mut out = String::new();

    for (index, key) in candidates.iter().enumerate() {
        let _ = writeln!(
            out,
            "[{index}] {}  {}  {}",
            key.keyid,
            date(key.created),
            key.fingerprint
        );
        for uid in &key.user_ids {
            let _ = writeln!(out, "      uid  {uid}");
        }
        for sig in &key.signatures {
            let _ = write!(out, "      sig  {} {}", sig.signer_keyid, date(sig.created));
            if !sig.name.is_empty() {
                let _ = write!(out, " {}", sig.name);
            }
            if !sig.email.is_empty() {
                let _ = write!(out, " <{}>", sig.email);
            }
            out.push('\n');
        }
    }

    out
}

/// Renders the details the operator must check before trusting a key.
pub fn render_confirmation(key: &KeyRecord) -> String {
    let mut out = format!("Fingerprint: {}\n", key.fingerprint);
    for uid in &key.user_ids {
        let _ = writeln!(out, "  {uid}");
    }
    out
}

/// Renders one line per key: id, kind, creation date and primary identity.
pub fn render_table(keys: &[KeyRecord]) -> String {
    let mut out = String::new();
    for key in keys {
        let primary = key
            .primary_user_id()
            .map(ToString::to_string)
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "{:<16} {} {} {}",
            key.keyid,
            key.kind,
            date(key.created),
            primary
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{KeyKind, Signature, UserId};

    fn sample() -> KeyRecord {
        KeyRecord {
            keyid: "AB12CD34".to_string(),
            fingerprint: "1234ABCD".to_string(),
            created: NaiveDate::from_ymd_opt(2014, 1, 1),
            kind: KeyKind::Secret,
            user_ids: vec![UserId {
                name: "John Doe".to_string(),
                email: "john@example.com".to_string(),
                ..Default::default()
            }],
            signatures: vec![Signature {
                signer_keyid: "EF567890".to_string(),
                created: NaiveDate::from_ymd_opt(2014, 2, 2),
                name: "Jane Roe".to_string(),
                email: "jane@example.com".to_string(),
                ..Default::default()
            }],
            subkeys: Vec::new(),
        }
    }

    #[test]
    fn test_render_candidates() {
        let key = sample();
        let text = render_candidates(&[&key, &key]);
        assert!(text.starts_with("[0] AB12CD34  2014-01-01  1234ABCD\n"));
        assert!(text.contains("[1] AB12CD34"));
        assert!(text.contains("uid  John Doe <john@example.com>"));
        assert!(text.contains("sig  EF567890 2014-02-02 Jane Roe <jane@example.com>"));
    }

    #[test]
    fn test_render_confirmation() {
        let text = render_confirmation(&sample());
        assert_eq!(text, "Fingerprint: 1234ABCD\n  John Doe <john@example.com>\n");
    }

    #[test]
    fn test_render_table() {
        let mut undated = sample();
        undated.created = None;
        undated.user_ids.clear();
        undated.kind = KeyKind::Public;

        let text = render_table(&[sample(), undated]);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "AB12CD34         sec 2014-01-01 John Doe <john@example.com>");
        assert_eq!(lines[1], "AB12CD34         pub ---------- ");
    }
}
