use crate::error::{Error, Result};

/// A user-supplied key identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    /// Matched against the email of every user id.
    Email(String),
    /// Matched against key ids by exact string equality.
    KeyId(String),
}

impl Identifier {
    /// Classifies an identifier: anything containing `@` is an email
    /// address, anything else a key id.
    ///
    /// Key ids may carry a `0x` prefix, which is removed. Case is kept, as
    /// key ids are compared exactly.
    pub fn parse(identifier: &str) -> Result<Self> {
        if identifier.contains('@') {
            validate_email(identifier).map(|e| Self::Email(e.to_string()))
        } else {
            validate_keyid(identifier).map(Self::KeyId)
        }
    }
}

/// Validates an email address before using it in a query.
///
/// Accepted formats:
/// - exactly one `@` with a non-empty local part and domain
/// - no whitespace or control characters
pub fn validate_email(email: &str) -> Result<&str> {
    let invalid = |reason: &str| Error::InvalidIdentifier {
        identifier: email.to_string(),
        reason: reason.to_string(),
    };

    if email.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(invalid("email address must not contain whitespace"));
    }

    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {
            if domain.contains('@') {
                Err(invalid("email address must contain a single '@'"))
            } else {
                Ok(email)
            }
        }
        _ => Err(invalid("email address needs a local part and a domain")),
    }
}

/// Validates a key ID before passing it to a subprocess.
///
/// Accepted formats:
/// - alphanumeric characters only
/// - any of the above with "0x" prefix
///
/// Returns the key id without prefix on success.
pub fn validate_keyid(keyid: &str) -> Result<String> {
    if keyid.is_empty() {
        return Err(Error::InvalidIdentifier {
            identifier: keyid.to_string(),
            reason: "key ID cannot be empty".to_string(),
        });
    }

    let normalized = keyid
        .strip_prefix("0x")
        .or_else(|| keyid.strip_prefix("0X"))
        .unwrap_or(keyid);

    if normalized.is_empty() || !normalized.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(Error::InvalidIdentifier {
            identifier: keyid.to_string(),
            reason: "key ID must contain only alphanumeric characters".to_string(),
        });
    }

    Ok(normalized.to_string())
}

/// Validates a keyserver given as a host name, `host:port`, or URL.
pub fn validate_server(server: &str) -> Result<&str> {
    let host = server.split_once("://").map_or(server, |(_, rest)| rest);
    let host = host.trim_end_matches('/');

    if host.is_empty() {
        return Err(Error::InvalidServer {
            server: server.to_string(),
            reason: "keyserver cannot be empty".to_string(),
        });
    }

    if !host
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | ':' | '[' | ']'))
    {
        return Err(Error::InvalidServer {
            server: server.to_string(),
            reason: "keyserver must be a host name, optionally with a port".to_string(),
        });
    }

    Ok(server)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_parse() {
        assert_eq!(
            Identifier::parse("user@example.com").unwrap(),
            Identifier::Email("user@example.com".to_string())
        );
        assert_eq!(
            Identifier::parse("AB12CD34").unwrap(),
            Identifier::KeyId("AB12CD34".to_string())
        );
        assert_eq!(
            Identifier::parse("0xab12cd34").unwrap(),
            Identifier::KeyId("ab12cd34".to_string())
        );
    }

    #[test]
    fn test_valid_emails() {
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("first.last+tag@sub.example.org").is_ok());
    }

    #[test]
    fn test_invalid_emails() {
        for email in ["@example.com", "user@", "a@b@c", "user @example.com", "us\ner@x"] {
            let err = validate_email(email).unwrap_err();
            assert!(matches!(err, Error::InvalidIdentifier { .. }), "{email}");
        }
    }

    #[test]
    fn test_valid_keyids() {
        assert_eq!(validate_keyid("DEADBEEF").unwrap(), "DEADBEEF");
        assert_eq!(validate_keyid("0XDEADBEEF").unwrap(), "DEADBEEF");
        assert_eq!(
            validate_keyid("ABAF11C65A2970B130ABE3C479BE3E4300411886").unwrap(),
            "ABAF11C65A2970B130ABE3C479BE3E4300411886"
        );
    }

    #[test]
    fn test_invalid_keyids() {
        for keyid in ["", "0x", "DEAD BEEF", "$(whoami)", "--armor", "ab;cd"] {
            let err = validate_keyid(keyid).unwrap_err();
            assert!(matches!(err, Error::InvalidIdentifier { .. }), "{keyid}");
        }
    }

    #[test]
    fn test_valid_servers() {
        assert!(validate_server("keyserver.ubuntu.com").is_ok());
        assert!(validate_server("pgp.mit.edu:11371").is_ok());
        assert!(validate_server("https://keys.example.org/").is_ok());
    }

    #[test]
    fn test_invalid_servers() {
        for server in ["", "http://", "evil.com/path?x=1", "a b", "host;rm"] {
            let err = validate_server(server).unwrap_err();
            assert!(matches!(err, Error::InvalidServer { .. }), "{server}");
        }
    }
}
