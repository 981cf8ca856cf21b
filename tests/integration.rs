use std::collections::VecDeque;

use keyfront::{
    Error, Fetch, KeyKind, Keyring, LookupOptions, Prompt, lookup_remote, parse_keyring, resolve,
    scrape_index,
};
use reqwest::Url;

const PUBLIC_LISTING: &str = r#"/home/alice/.gnupg/pubring.kbx
------------------------------
pub   rsa4096/AB12CD34 2019-02-03 [SC]
      Key fingerprint = 0A0B 0C0D 0E0F 1011 1213  1415 1617 1819 AB12 CD34
uid         [ultimate] Alice Example <alice@example.org>
sig 3        AB12CD34 2019-02-03  Alice Example <alice@example.org>
sub   rsa4096/5566AA00 2019-02-03 [E]
sig          AB12CD34 2019-02-03  Alice Example <alice@example.org>

pub   ed25519/77EE88FF 2021-06-01 [SC] [expires: 2025-06-01]
      Key fingerprint = FFFF 0000 FFFF 0000 FFFF  0000 FFFF 0000 77EE 88FF
uid         [  full  ] Alice Example (new) <alice@example.org>
sig 3        77EE88FF 2021-06-01  Alice Example (new) <alice@example.org>
sig          AB12CD34 2021-06-02  Alice Example <alice@example.org>
sub   cv25519/99AA0011 2021-06-01 [E] [expires: 2025-06-01]
sig          77EE88FF 2021-06-01  Alice Example (new) <alice@example.org>

pub   rsa2048/AB12CD3400 2015-01-01 [SC]
uid         [ unknown] Mallory <mallory@example.net>
"#;

const SECRET_LISTING: &str = r#"/home/alice/.gnupg/pubring.kbx
------------------------------
sec   rsa4096/AB12CD34 2019-02-03 [SC]
uid         [ultimate] Alice Example <alice@example.org>
ssb   rsa4096/5566AA00 2019-02-03 [E]
"#;

const INDEX_PAGE: &str = r#"<html><head><title>Search results for 'alice@example.org'</title></head>
<body><h1>Search results for 'alice@example.org'</h1><pre>Type bits/keyID     cr. time   exp time   key expir
</pre><hr /><pre>
<strong>pub</strong>  4096R/<a href="/pks/lookup?op=get&amp;search=0x0A0B0C0DAB12CD34">AB12CD34</a> 2019-02-03
	 Fingerprint=0A0B 0C0D 0E0F 1011 1213  1415 1617 1819 AB12 CD34

<strong>uid</strong> <span class="uid">Alice Example &lt;alice@example.org&gt;</span>
sig  sig3  <a href="/pks/lookup?op=get&amp;search=0x0A0B0C0DAB12CD34">AB12CD34</a> 2019-02-03 __________ __________ <a href="/pks/lookup?op=vindex&amp;search=0x0A0B0C0DAB12CD34">[selfsig]</a>
</pre><hr /><pre>
<strong>pub</strong>  2048R/<a href="/pks/lookup?op=get&amp;search=0x00000000BAD0BAD0">BAD0BAD0</a> 2020-04-01
	 Fingerprint=BAD0 BAD0 BAD0 BAD0 BAD0  BAD0 BAD0 BAD0 BAD0 BAD0

<strong>uid</strong> <span class="uid">Alice Example &lt;alice@example.org&gt;</span>
</pre></body></html>
"#;

struct Script {
    selections: VecDeque<usize>,
    confirmations: VecDeque<bool>,
}

impl Prompt for Script {
    fn message(&mut self, _text: &str) -> keyfront::Result<()> {
        Ok(())
    }

    fn select(&mut self, _question: &str, default: usize) -> keyfront::Result<usize> {
        Ok(self.selections.pop_front().unwrap_or(default))
    }

    fn confirm(&mut self, _question: &str, default: bool) -> keyfront::Result<bool> {
        Ok(self.confirmations.pop_front().unwrap_or(default))
    }
}

struct StaticPage(&'static str);

impl Fetch for StaticPage {
    async fn fetch(&self, _url: &Url) -> keyfront::Result<Option<String>> {
        Ok(Some(self.0.to_string()))
    }
}

#[test]
fn test_local_listing_to_resolution() {
    let keys = parse_keyring(PUBLIC_LISTING, SECRET_LISTING);
    let ids: Vec<_> = keys.iter().map(|k| k.keyid.as_str()).collect();
    assert_eq!(ids, ["AB12CD3400", "AB12CD34", "77EE88FF"]);

    assert_eq!(keys[1].kind, KeyKind::Secret);
    assert_eq!(keys[2].kind, KeyKind::Public);
    assert_eq!(keys[2].user_ids[0].trust, "full");
    assert_eq!(keys[2].signatures.len(), 1);
    assert_eq!(keys[2].signatures[0].signer_keyid, "AB12CD34");

    let found = resolve("AB12CD34", &keys, None).unwrap().unwrap();
    assert_eq!(found.fingerprint, "0A0B0C0D0E0F10111213141516171819AB12CD34");

    let err = resolve("alice@example.org", &keys, None).unwrap_err();
    assert!(matches!(err, Error::AmbiguousIdentifier { .. }));

    let mut script = Script {
        selections: VecDeque::from([1]),
        confirmations: VecDeque::new(),
    };
    let found = resolve("alice@example.org", &keys, Some(&mut script))
        .unwrap()
        .unwrap();
    assert_eq!(found.keyid, "77EE88FF");

    assert!(resolve("bob@example.org", &keys, None).unwrap().is_none());
}

#[test]
fn test_scraped_records_match_local_shape() {
    let remote = scrape_index(INDEX_PAGE).unwrap();
    let local = parse_keyring(PUBLIC_LISTING, "");

    assert_eq!(remote.len(), 2);
    assert!(remote.iter().all(|k| k.kind == KeyKind::Public));

    let remote_alice = &remote[0];
    let local_alice = local.iter().find(|k| k.keyid == "AB12CD34").unwrap();
    assert_eq!(remote_alice, local_alice);
    assert_eq!(remote_alice.fingerprint, local_alice.fingerprint);
    assert_eq!(remote_alice.created, local_alice.created);
    assert_eq!(remote_alice.user_ids[0].email, local_alice.user_ids[0].email);
}

#[tokio::test]
async fn test_remote_lookup_confirms_choice() {
    let mut script = Script {
        selections: VecDeque::from([1, 0]),
        confirmations: VecDeque::from([false, true]),
    };

    let key = lookup_remote(
        "alice@example.org",
        "keys.example.org",
        &StaticPage(INDEX_PAGE),
        &mut script,
        &LookupOptions::default(),
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(key.keyid, "AB12CD34");
}

#[tokio::test]
async fn test_invalid_keyid_rejected() {
    let keyring = Keyring::new();

    let result = keyring.fingerprint("").await;
    assert!(matches!(result, Err(Error::InvalidIdentifier { .. })));

    let result = keyring.send_key("$(whoami)", "keyserver.ubuntu.com").await;
    assert!(matches!(result, Err(Error::InvalidIdentifier { .. })));
}

#[tokio::test]
async fn test_invalid_server_rejected() {
    let keyring = Keyring::new();
    let result = keyring.receive_key("AB12CD34", "evil;rm -rf /").await;
    assert!(matches!(result, Err(Error::InvalidServer { .. })));
}

#[tokio::test]
#[ignore]
async fn test_list_keys_real() {
    let keyring = Keyring::new();
    let keys = keyring.list_keys().await.expect("failed to list keys");

    for key in &keys {
        assert!(!key.keyid.is_empty(), "key should have a key id");
        assert!(
            key.signatures.iter().all(|s| s.signer_keyid != key.keyid),
            "self-signatures should be dropped"
        );
    }
}

#[tokio::test]
#[ignore]
async fn test_keyring_not_found() {
    let keyring = Keyring::with_homedir("/nonexistent/path");
    let result = keyring.list_keys().await;

    assert!(result.is_err(), "should fail for nonexistent keyring");
}

#[tokio::test]
#[ignore]
async fn test_remote_lookup_real() {
    let options = LookupOptions::default();
    let server = keyfront::KeyServer::new(&options).unwrap();
    let mut script = Script {
        selections: VecDeque::new(),
        confirmations: VecDeque::from([true]),
    };

    let result = lookup_remote(
        "nobody-at-all@invalid.example",
        keyfront::DEFAULT_KEYSERVER,
        &server,
        &mut script,
        &options,
    )
    .await;

    assert!(matches!(result, Ok(None)));
}
