use std::path::PathBuf;

use chrono::NaiveDate;

/// Where a key record was found.
///
/// A key is [`KeyKind::Secret`] when its key id also shows up in the
/// secret-key listing. Keyserver results are always [`KeyKind::Public`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum KeyKind {
    #[default]
    Public,
    Secret,
}

impl std::fmt::Display for KeyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyKind::Public => f.write_str("pub"),
            KeyKind::Secret => f.write_str("sec"),
        }
    }
}

/// One keypair entry, as parsed from keyring text or a keyserver page.
///
/// Records are built by the parsers only and never modified afterwards.
/// Two records are equal when their key ids are equal.
#[derive(Debug, Clone, Default)]
pub struct KeyRecord {
    pub keyid: String,
    /// Empty when the fingerprint line was missing or unreadable.
    pub fingerprint: String,
    pub created: Option<NaiveDate>,
    pub kind: KeyKind,
    /// In source order; the first entry is the primary identity.
    pub user_ids: Vec<UserId>,
    /// Third-party signatures only.
    pub signatures: Vec<Signature>,
    pub subkeys: Vec<Subkey>,
}

impl PartialEq for KeyRecord {
    fn eq(&self, other: &Self) -> bool {
        self.keyid == other.keyid
    }
}

impl Eq for KeyRecord {}

impl KeyRecord {
    /// The identity shown when a key is listed on one line.
    pub fn primary_user_id(&self) -> Option<&UserId> {
        self.user_ids.first()
    }

    /// Whether any user id carries exactly this email address.
    pub fn has_email(&self, email: &str) -> bool {
        self.user_ids.iter().any(|uid| uid.email == email)
    }
}

/// A name/comment/email claim bound to a key.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UserId {
    pub name: String,
    pub comment: String,
    pub email: String,
    /// Validity marker such as `ultimate` or `unknown`, empty if absent.
    pub trust: String,
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)?;
        if !self.comment.is_empty() {
            write!(f, " ({})", self.comment)?;
        }
        if !self.email.is_empty() {
            write!(f, " <{}>", self.email)?;
        }
        Ok(())
    }
}

/// A third-party signature on a key.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Signature {
    pub signer_keyid: String,
    pub created: Option<NaiveDate>,
    pub name: String,
    pub comment: String,
    pub email: String,
}

/// A subkey bound to a primary key.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Subkey {
    pub keyid: String,
    pub created: Option<NaiveDate>,
    pub expires: Option<NaiveDate>,
}

/// Input for encrypt, decrypt, sign and verify.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Passed to gpg by path.
    File(PathBuf),
    /// Written to gpg's standard input.
    Message(String),
}

/// Options for a remote keyserver lookup.
#[derive(Debug, Clone)]
pub struct LookupOptions {
    /// Timeout for each keyserver request, in seconds.
    /// If None, no timeout is applied.
    pub timeout_secs: Option<u64>,
    /// How many times the operator may reject a candidate before the lookup
    /// gives up. If None, the lookup retries until interrupted.
    pub max_attempts: Option<usize>,
    /// Ask for confirmation even when the keyserver returns a single key.
    pub confirm_single: bool,
}

impl Default for LookupOptions {
    fn default() -> Self {
        Self {
            timeout_secs: Some(30),
            max_attempts: Some(5),
            confirm_single: true,
        }
    }
}
