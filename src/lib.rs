//! Command-line front end for a GnuPG keyring and HKP keyservers.
//!
//! The crate turns gpg's human-oriented key listings and keyserver result
//! pages into [`KeyRecord`]s, and maps email addresses or key ids given by
//! an operator to exactly one key, asking the operator when several match.
//!
//! # Example
//!
//! ```no_run
//! use keyfront::{Keyring, Terminal};
//!
//! #[tokio::main]
//! async fn main() -> keyfront::Result<()> {
//!     let keyring = Keyring::new();
//!     let mut terminal = Terminal::stdio();
//!
//!     match keyring.resolve("alice@example.org", Some(&mut terminal)).await? {
//!         Some(key) => println!("{} {}", key.keyid, key.fingerprint),
//!         None => println!("no key found"),
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Requirements
//!
//! - `gpg` available on `PATH` (or passed to [`Keyring::with_program`])
//! - Network access to a keyserver for remote lookups

pub mod command;
mod error;
mod keyring;
pub mod keyserver;
mod parse;
mod prompt;
mod render;
mod resolve;
mod scrape;
mod types;
mod validation;

pub use error::{Error, Result};
pub use keyring::Keyring;
pub use keyserver::{DEFAULT_KEYSERVER, Fetch, KeyServer, lookup_remote, lookup_url};
pub use parse::{ParseReport, parse_keyring, parse_keyring_report};
pub use prompt::{Prompt, Terminal};
pub use render::{render_candidates, render_confirmation, render_table};
pub use resolve::{matching, resolve};
pub use scrape::scrape_index;
pub use types::{KeyKind, KeyRecord, LookupOptions, Payload, Signature, Subkey, UserId};
pub use validation::{Identifier, validate_email, validate_keyid, validate_server};
