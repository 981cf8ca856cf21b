use tracing::debug;

use crate::error::{Error, Result};
use crate::prompt::Prompt;
use crate::render::render_candidates;
use crate::types::KeyRecord;
use crate::validation::Identifier;

const SELECT_QUESTION: &str = "Several keys match. Select one";

/// Returns the candidates an identifier refers to, in their original order.
///
/// Emails match any user id carrying exactly that address; key ids match
/// the key id exactly.
pub fn matching<'a>(identifier: &Identifier, candidates: &'a [KeyRecord]) -> Vec<&'a KeyRecord> {
    candidates
        .iter()
        .filter(|key| match identifier {
            Identifier::Email(email) => key.has_email(email),
            Identifier::KeyId(keyid) => key.keyid == *keyid,
        })
        .collect()
}

/// Maps an identifier to exactly one key.
///
/// Returns `Ok(None)` when nothing matches, including identifiers that are
/// neither an email address nor a key id. When several keys match, the
/// operator picks one through `prompt`; without a prompt the ambiguity is
/// reported as [`Error::AmbiguousIdentifier`] rather than guessed.
pub fn resolve<'a>(
    identifier: &str,
    candidates: &'a [KeyRecord],
    prompt: Option<&mut dyn Prompt>,
) -> Result<Option<&'a KeyRecord>> {
    let parsed = match Identifier::parse(identifier) {
        Ok(parsed) => parsed,
        Err(err) => {
            debug!(identifier, %err, "identifier cannot match any key");
            return Ok(None);
        }
    };
    let matches = matching(&parsed, candidates);
    debug!(identifier, matches = matches.len(), "resolving identifier");

    match matches.as_slice() {
        [] => Ok(None),
        [only] => Ok(Some(*only)),
        _ => {
            let Some(prompt) = prompt else {
                return Err(Error::AmbiguousIdentifier {
                    identifier: identifier.to_string(),
                    matches: matches.iter().map(|k| k.keyid.clone()).collect(),
                });
            };
            prompt.message(&render_candidates(&matches))?;
            let index = prompt.select(SELECT_QUESTION, 0)?;
            matches
                .get(index)
                .copied()
                .map(Some)
                .ok_or(Error::InvalidSelection {
                    index,
                    count: matches.len(),
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::testing::Scripted;
    use crate::types::UserId;

    fn key(keyid: &str, emails: &[&str]) -> KeyRecord {
        KeyRecord {
            keyid: keyid.to_string(),
            user_ids: emails
                .iter()
                .map(|email| UserId {
                    name: "Someone".to_string(),
                    email: email.to_string(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    fn candidates() -> Vec<KeyRecord> {
        vec![
            key("AB12CD3400", &["other@example.com"]),
            key("AB12CD34", &["user@example.com", "user@work.example"]),
            key("EF567890", &["shared@example.com"]),
            key("00112233", &["shared@example.com"]),
            key("44556677", &[]),
        ]
    }

    #[test]
    fn test_resolve_by_email() {
        let keys = candidates();
        let found = resolve("user@example.com", &keys, None).unwrap().unwrap();
        assert_eq!(found.keyid, "AB12CD34");

        let found = resolve("user@work.example", &keys, None).unwrap().unwrap();
        assert_eq!(found.keyid, "AB12CD34");
    }

    #[test]
    fn test_resolve_email_not_found() {
        let keys = candidates();
        assert!(resolve("nobody@example.com", &keys, None).unwrap().is_none());
        assert!(resolve("USER@example.com", &keys, None).unwrap().is_none());
    }

    #[test]
    fn test_resolve_keyid_is_exact() {
        let keys = candidates();
        let found = resolve("AB12CD34", &keys, None).unwrap().unwrap();
        assert_eq!(found.keyid, "AB12CD34");

        assert!(resolve("AB12CD", &keys, None).unwrap().is_none());
        assert!(resolve("ab12cd34", &keys, None).unwrap().is_none());
    }

    #[test]
    fn test_resolve_longer_keyid_not_matched_by_prefix() {
        let keys = vec![key("AB12CD3400", &[])];
        assert!(resolve("AB12CD34", &keys, None).unwrap().is_none());
    }

    #[test]
    fn test_resolve_prefixed_keyid() {
        let keys = candidates();
        let found = resolve("0xEF567890", &keys, None).unwrap().unwrap();
        assert_eq!(found.keyid, "EF567890");
    }

    #[test]
    fn test_ambiguous_without_prompt_is_error() {
        let keys = candidates();
        let err = resolve("shared@example.com", &keys, None).unwrap_err();
        match err {
            Error::AmbiguousIdentifier { identifier, matches } => {
                assert_eq!(identifier, "shared@example.com");
                assert_eq!(matches, ["EF567890", "00112233"]);
            }
            _ => panic!("expected AmbiguousIdentifier"),
        }
    }

    #[test]
    fn test_ambiguous_with_prompt_selects() {
        let keys = candidates();
        let mut prompt = Scripted::new(&[1], &[]);
        let found = resolve("shared@example.com", &keys, Some(&mut prompt))
            .unwrap()
            .unwrap();
        assert_eq!(found.keyid, "00112233");
        assert_eq!(prompt.shown.len(), 1);
        assert!(prompt.shown[0].contains("[0] EF567890"));
        assert!(prompt.shown[0].contains("[1] 00112233"));
    }

    #[test]
    fn test_ambiguous_default_selection() {
        let keys = candidates();
        let mut prompt = Scripted::new(&[], &[]);
        let found = resolve("shared@example.com", &keys, Some(&mut prompt))
            .unwrap()
            .unwrap();
        assert_eq!(found.keyid, "EF567890");
    }

    #[test]
    fn test_out_of_range_selection() {
        let keys = candidates();
        let mut prompt = Scripted::new(&[7], &[]);
        let err = resolve("shared@example.com", &keys, Some(&mut prompt)).unwrap_err();
        assert!(matches!(err, Error::InvalidSelection { index: 7, count: 2 }));
    }

    #[test]
    fn test_single_match_does_not_prompt() {
        let keys = candidates();
        let mut prompt = Scripted::new(&[], &[]);
        resolve("user@example.com", &keys, Some(&mut prompt)).unwrap();
        assert!(prompt.shown.is_empty());
    }

    #[test]
    fn test_malformed_identifier_is_not_found() {
        let keys = candidates();
        assert!(resolve("", &keys, None).unwrap().is_none());
        assert!(resolve("ab-12", &keys, None).unwrap().is_none());
        assert!(resolve("ab-12", &[], None).unwrap().is_none());
    }
}
