use std::future::Future;
use std::time::Duration;

use reqwest::{StatusCode, Url};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::prompt::Prompt;
use crate::render::{render_candidates, render_confirmation};
use crate::scrape::scrape_index;
use crate::types::{KeyRecord, LookupOptions};
use crate::validation::{validate_email, validate_server};

pub const DEFAULT_KEYSERVER: &str = "keyserver.ubuntu.com";

const USER_AGENT: &str = concat!("keyfront/", env!("CARGO_PKG_VERSION"));
const HKP_PORT: u16 = 11371;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Shown before every email lookup.
pub const SECURITY_ADVISORY: &str = "\
WARNING: looking up a key by email address on a keyserver is not secure.
The results are scraped from a web page that anyone can influence, and
anyone can upload a key claiming any email address. Verify the key's
fingerprint with its owner through another channel before trusting it.";

const SELECT_QUESTION: &str = "Select the key to import";
const CONFIRM_QUESTION: &str = "Verify the fingerprint and identity above. Is this correct?";

/// Something that can fetch a keyserver page.
pub trait Fetch {
    /// Fetches `url`, returning the body, or None if the server answered
    /// that there is nothing at that address.
    fn fetch(&self, url: &Url) -> impl Future<Output = Result<Option<String>>>;
}

/// HKP keyserver client.
pub struct KeyServer {
    client: reqwest::Client,
    timeout_secs: Option<u64>,
}

impl KeyServer {
    pub fn new(options: &LookupOptions) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            timeout_secs: options.timeout_secs,
        })
    }

    async fn get(&self, url: &Url) -> Result<Option<String>> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(Error::Transport(format!("keyserver answered {status}")));
        }

        Ok(Some(response.text().await?))
    }
}

impl Fetch for KeyServer {
    async fn fetch(&self, url: &Url) -> Result<Option<String>> {
        match self.timeout_secs {
            Some(secs) => tokio::time::timeout(Duration::from_secs(secs), self.get(url))
                .await
                .map_err(|_| Error::Timeout(secs))?,
            None => self.get(url).await,
        }
    }
}

/// Builds the verbose index query for `email` on `server`.
///
/// A server without a scheme is contacted over plain HTTP. The `hkp` and
/// `hkps` schemes gpg accepts map to `http` (port 11371 unless given) and
/// `https`.
pub fn lookup_url(server: &str, email: &str) -> Result<Url> {
    validate_server(server)?;

    let (scheme, host) = match server.split_once("://") {
        Some((scheme, host)) => (scheme.to_ascii_lowercase(), host.trim_end_matches('/')),
        None => ("http".to_string(), server.trim_end_matches('/')),
    };
    let has_port = host
        .rsplit_once(':')
        .is_some_and(|(_, port)| !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()));

    let base = match scheme.as_str() {
        "hkp" if !has_port => format!("http://{host}:{HKP_PORT}"),
        "hkp" => format!("http://{host}"),
        "hkps" => format!("https://{host}"),
        "http" | "https" => format!("{scheme}://{host}"),
        other => {
            return Err(Error::InvalidServer {
                server: server.to_string(),
                reason: format!("unsupported scheme '{other}'"),
            });
        }
    };

    let mut url = Url::parse(&format!("{base}/pks/lookup")).map_err(|e| Error::InvalidServer {
        server: server.to_string(),
        reason: e.to_string(),
    })?;
    url.query_pairs_mut()
        .append_pair("search", email)
        .append_pair("op", "vindex")
        .append_pair("fingerprint", "on");

    Ok(url)
}

/// Looks up `email` on a keyserver and lets the operator pick and confirm
/// one of the keys found.
///
/// Every round shows [`SECURITY_ADVISORY`], queries the keyserver and asks
/// the operator to verify the chosen key. Rejecting it starts a new round,
/// up to [`LookupOptions::max_attempts`] rounds.
///
/// Returns `Ok(None)` if the keyserver knows no key for `email`.
pub async fn lookup_remote<F, P>(
    email: &str,
    server: &str,
    fetcher: &F,
    prompt: &mut P,
    options: &LookupOptions,
) -> Result<Option<KeyRecord>>
where
    F: Fetch,
    P: Prompt + ?Sized,
{
    validate_email(email)?;
    let url = lookup_url(server, email)?;
    let mut attempts = 0;

    loop {
        attempts += 1;
        prompt.message(SECURITY_ADVISORY)?;

        info!(%url, attempt = attempts, "querying keyserver");
        let Some(body) = fetcher.fetch(&url).await? else {
            debug!(email, "keyserver has no key for this address");
            return Ok(None);
        };

        let mut candidates = scrape_index(&body)?;
        let selected = match candidates.len() {
            0 => return Ok(None),
            1 if !options.confirm_single => return Ok(candidates.pop()),
            1 => 0,
            count => {
                let shown: Vec<&KeyRecord> = candidates.iter().collect();
                prompt.message(&render_candidates(&shown))?;
                let index = prompt.select(SELECT_QUESTION, 0)?;
                if index >= count {
                    return Err(Error::InvalidSelection { index, count });
                }
                index
            }
        };

        let candidate = candidates.swap_remove(selected);
        prompt.message(&render_confirmation(&candidate))?;
        if prompt.confirm(CONFIRM_QUESTION, true)? {
            return Ok(Some(candidate));
        }

        if let Some(max) = options.max_attempts
            && attempts >= max
        {
            return Err(Error::ConfirmationDeclined { attempts });
        }
        debug!(keyid = %candidate.keyid, "candidate rejected, starting over");
    }
}
