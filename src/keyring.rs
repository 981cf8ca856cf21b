use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::error::{Error, Result};
use crate::parse::parse_keyring;
use crate::prompt::Prompt;
use crate::resolve::resolve;
use crate::types::{KeyRecord, Payload};
use crate::validation::{validate_keyid, validate_server};

const DEFAULT_GPG: &str = "gpg";

/// Interface to a GnuPG keyring through the `gpg` executable.
///
/// Listing methods capture gpg's output. Everything else runs gpg with
/// the terminal attached, so gpg can ask for passphrases and the edit
/// menu works as usual.
///
/// # Example
///
/// ```no_run
/// # async fn example() -> keyfront::Result<()> {
/// use keyfront::Keyring;
///
/// let keyring = Keyring::new();
/// for key in keyring.list_keys().await? {
///     println!("{} {}", key.keyid, key.fingerprint);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Keyring {
    program: String,
    homedir: Option<String>,
}

impl Default for Keyring {
    fn default() -> Self {
        Self::new()
    }
}

impl Keyring {
    /// Uses `gpg` from `PATH` with its default home directory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            program: DEFAULT_GPG.to_string(),
            homedir: None,
        }
    }

    /// Targets the keyring in another GnuPG home directory.
    #[must_use]
    pub fn with_homedir(path: impl Into<String>) -> Self {
        Self {
            program: DEFAULT_GPG.to_string(),
            homedir: Some(path.into()),
        }
    }

    /// Runs `program` instead of `gpg`.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.env("LC_ALL", "C");
        if let Some(homedir) = &self.homedir {
            cmd.arg(format!("--homedir={homedir}"));
        }
        cmd
    }

    /// Runs gpg and returns its standard output.
    async fn capture<I, S>(&self, args: I) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        let output = self.command().args(args).output().await?;

        if !output.status.success() {
            return Err(self.check_error(output.status, &output.stderr));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Runs gpg attached to the terminal, feeding `stdin` to it if given.
    async fn run(&self, argv: Vec<OsString>, stdin: Option<&str>) -> Result<()> {
        debug!(program = %self.program, ?argv, "running gpg");

        let mut cmd = self.command();
        cmd.args(&argv);
        if stdin.is_some() {
            cmd.stdin(Stdio::piped());
        }
        let mut child = cmd.spawn()?;

        if let Some(text) = stdin
            && let Some(mut pipe) = child.stdin.take()
        {
            pipe.write_all(text.as_bytes()).await?;
            // closing the pipe signals end of input
            drop(pipe);
        }

        let status = child.wait().await?;
        if !status.success() {
            return Err(Error::GpgExited {
                status: status.code().unwrap_or(-1),
            });
        }

        Ok(())
    }

    fn check_error(&self, status: std::process::ExitStatus, stderr: &[u8]) -> Error {
        check_gpg_error(self.homedir.as_deref(), status, stderr)
    }

    /// Lists all public keys, with secret keys marked as such.
    pub async fn list_keys(&self) -> Result<Vec<KeyRecord>> {
        let public = self
            .capture(["--list-sigs", "--fingerprint", "--keyid-format", "short"])
            .await?;
        let secret = self
            .capture(["--list-secret-keys", "--keyid-format", "short"])
            .await?;

        Ok(parse_keyring(&public, &secret))
    }

    /// Resolves an email address or key id against the local keyring.
    ///
    /// Returns `Ok(None)` if no key matches. With a prompt, the operator
    /// picks among several matching keys.
    pub async fn resolve(
        &self,
        identifier: &str,
        prompt: Option<&mut dyn Prompt>,
    ) -> Result<Option<KeyRecord>> {
        let keys = self.list_keys().await?;
        Ok(resolve(identifier, &keys, prompt)?.cloned())
    }

    /// Generates a new keypair interactively.
    pub async fn generate(&self) -> Result<()> {
        self.run(args(["--gen-key"]), None).await
    }

    /// Writes a revocation certificate for a key to standard output.
    pub async fn gen_revoke(&self, keyid: &str) -> Result<()> {
        let keyid = validate_keyid(keyid)?;
        self.run(args(["--gen-revoke", keyid.as_str()]), None).await
    }

    /// Prints a key's fingerprint.
    pub async fn fingerprint(&self, keyid: &str) -> Result<()> {
        let keyid = validate_keyid(keyid)?;
        self.run(args(["--fingerprint", keyid.as_str()]), None).await
    }

    /// Uploads a key to a keyserver.
    pub async fn send_key(&self, keyid: &str, server: &str) -> Result<()> {
        let keyid = validate_keyid(keyid)?;
        let server = validate_server(server)?;
        self.run(args(["--keyserver", server, "--send-keys", keyid.as_str()]), None)
            .await
    }

    /// Downloads a key from a keyserver.
    pub async fn receive_key(&self, keyid: &str, server: &str) -> Result<()> {
        let keyid = validate_keyid(keyid)?;
        let server = validate_server(server)?;
        self.run(args(["--keyserver", server, "--recv-keys", keyid.as_str()]), None)
            .await
    }

    /// Certifies a key, optionally with a specific secret key.
    pub async fn sign_key(&self, keyid: &str, signer: Option<&str>) -> Result<()> {
        let keyid = validate_keyid(keyid)?;
        let mut argv = local_user(signer)?;
        argv.extend(args(["--sign-key", keyid.as_str()]));
        self.run(argv, None).await
    }

    /// Opens gpg's key edit menu, e.g. to set owner trust.
    pub async fn edit_key(&self, keyid: &str) -> Result<()> {
        let keyid = validate_keyid(keyid)?;
        self.run(args(["--edit-key", keyid.as_str()]), None).await
    }

    /// Exports a key in ASCII armor to `output`.
    pub async fn export_key(&self, keyid: &str, output: &Path) -> Result<()> {
        let keyid = validate_keyid(keyid)?;
        let mut argv = args(["--armor", "--output"]);
        argv.push(output.into());
        argv.extend(args(["--export", keyid.as_str()]));
        self.run(argv, None).await
    }

    /// Imports keys from a file.
    pub async fn import(&self, input: &Path) -> Result<()> {
        let mut argv = args(["--import"]);
        argv.push(input.into());
        self.run(argv, None).await
    }

    /// Encrypts for `recipient`, or for the default key if None.
    pub async fn encrypt(
        &self,
        payload: &Payload,
        recipient: Option<&str>,
        output: Option<&Path>,
    ) -> Result<()> {
        let mut argv = args(["--armor"]);
        match recipient {
            Some(recipient) => {
                let recipient = validate_keyid(recipient)?;
                argv.extend(args(["--recipient", recipient.as_str()]));
            }
            None => argv.extend(args(["--default-recipient-self"])),
        }
        argv.extend(output_args(output));
        argv.extend(args(["--encrypt"]));
        self.run_payload(argv, payload).await
    }

    /// Decrypts, trying `secret_key` first if given.
    pub async fn decrypt(
        &self,
        payload: &Payload,
        secret_key: Option<&str>,
        output: Option<&Path>,
    ) -> Result<()> {
        let mut argv = Vec::new();
        if let Some(keyid) = secret_key {
            let keyid = validate_keyid(keyid)?;
            argv.extend(args(["--try-secret-key", keyid.as_str()]));
        }
        argv.extend(output_args(output));
        argv.extend(args(["--decrypt"]));
        self.run_payload(argv, payload).await
    }

    /// Signs a message (cleartext signature) or a file (armored signature).
    pub async fn sign(
        &self,
        payload: &Payload,
        signer: Option<&str>,
        output: Option<&Path>,
    ) -> Result<()> {
        let mut argv = local_user(signer)?;
        argv.extend(output_args(output));
        match payload {
            Payload::Message(_) => argv.extend(args(["--clearsign"])),
            Payload::File(_) => argv.extend(args(["--armor", "--sign"])),
        }
        self.run_payload(argv, payload).await
    }

    /// Verifies a signed message or file.
    pub async fn verify(&self, payload: &Payload) -> Result<()> {
        self.run_payload(args(["--verify"]), payload).await
    }

    async fn run_payload(&self, mut argv: Vec<OsString>, payload: &Payload) -> Result<()> {
        match payload {
            Payload::File(path) => {
                argv.push(path.into());
                self.run(argv, None).await
            }
            Payload::Message(text) => self.run(argv, Some(text)).await,
        }
    }
}

fn args<const N: usize>(words: [&str; N]) -> Vec<OsString> {
    words.into_iter().map(OsString::from).collect()
}

fn local_user(signer: Option<&str>) -> Result<Vec<OsString>> {
    match signer {
        Some(signer) => {
            let signer = validate_keyid(signer)?;
            Ok(args(["--local-user", signer.as_str()]))
        }
        None => Ok(Vec::new()),
    }
}

fn output_args(output: Option<&Path>) -> Vec<OsString> {
    match output {
        Some(path) => vec!["--output".into(), path.into()],
        None => Vec::new(),
    }
}

fn check_gpg_error(homedir: Option<&str>, status: std::process::ExitStatus, stderr: &[u8]) -> Error {
    let msg = String::from_utf8_lossy(stderr);

    if msg.contains("Permission denied") || msg.contains("permission denied") {
        return Error::PermissionDenied;
    }

    if msg.contains("No such file or directory") && homedir.is_some_and(|h| msg.contains(h)) {
        return Error::KeyringNotInitialized;
    }

    Error::Gpg {
        status: status.code().unwrap_or(-1),
        stderr: msg.to_string(),
    }
}
