use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context as _, bail};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use keyfront::command::Operands;
use keyfront::{
    DEFAULT_KEYSERVER, Identifier, KeyKind, KeyRecord, KeyServer, Keyring, LookupOptions, Payload,
    Terminal, lookup_remote, render_table,
};

/// Manage a GnuPG keyring and look up keys on keyservers.
#[derive(Parser, Debug)]
#[command(name = "keyfront", version, about)]
struct Cli {
    /// Enable verbose mode.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable developer debug mode.
    #[arg(short = '#', long, global = true)]
    debug: bool,

    /// GnuPG home directory.
    #[arg(long, env = "GNUPGHOME", global = true)]
    homedir: Option<String>,

    /// gpg executable.
    #[arg(long, env = "KEYFRONT_GPG", default_value = "gpg", global = true)]
    gpg: String,

    /// Keyserver used when a command names none.
    #[arg(long, env = "KEYFRONT_KEYSERVER", default_value = DEFAULT_KEYSERVER, global = true)]
    keyserver: String,

    /// Keyserver request timeout in seconds, 0 for none.
    #[arg(long, default_value_t = 30, global = true)]
    timeout: u64,

    /// Rejected keyserver candidates before giving up, 0 for no limit.
    #[arg(long, default_value_t = 5, global = true)]
    max_attempts: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a keypair.
    Gen,
    /// Generate a revocation certificate for an email address or key id.
    GenRevoke { id: String },
    /// List keys, public and private.
    List {
        /// Only keys with a secret part.
        #[arg(long)]
        private: bool,
        /// Only keys without a secret part.
        #[arg(long)]
        public: bool,
    },
    /// View the fingerprint of a key.
    Fingerprint { id: String },
    /// Send a key to a keyserver: send ID [to SERVER].
    Send {
        #[arg(num_args = 1.., required = true, allow_hyphen_values = true)]
        operands: Vec<String>,
    },
    /// Get a key from a keyserver: get ID [from SERVER].
    Get {
        #[arg(num_args = 1.., required = true, allow_hyphen_values = true)]
        operands: Vec<String>,
    },
    /// Sign a key or a file/message: sign [ID|FILE] [with ID] [to OUT] [MESSAGE].
    Sign {
        #[arg(num_args = 0.., allow_hyphen_values = true)]
        operands: Vec<String>,
    },
    /// Edit a public key, e.g. to set trust.
    Edit { id: String },
    /// Edit a public key, e.g. to set trust (alias of edit).
    Trust { id: String },
    /// Export a public key to a file.
    Export { id: String, file: PathBuf },
    /// Import keys from a file.
    Import { file: PathBuf },
    /// Encrypt a file/message: encrypt [FILE] [with ID] [to OUT] [MESSAGE].
    Encrypt {
        #[arg(num_args = 0.., allow_hyphen_values = true)]
        operands: Vec<String>,
    },
    /// Decrypt a file/message: decrypt [FILE] [with ID] [to OUT] [MESSAGE].
    Decrypt {
        #[arg(num_args = 0.., allow_hyphen_values = true)]
        operands: Vec<String>,
    },
    /// Verify a signed file/message: verify [FILE] [MESSAGE].
    Verify {
        #[arg(num_args = 0.., allow_hyphen_values = true)]
        operands: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<keyfront::Error>() {
                Some(e) if e.is_remote_failure() => {
                    eprintln!("Could not query the keyserver: {e}");
                }
                _ => eprintln!("Error: {err:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(cli: &Cli) {
    let level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Everything a command needs besides its own arguments.
struct Context {
    keyring: Keyring,
    terminal: Terminal<std::io::StdinLock<'static>, std::io::Stderr>,
    keyserver: String,
    options: LookupOptions,
}

impl Context {
    /// Resolves against the local keyring, telling the operator if nothing
    /// matched.
    async fn resolve(&mut self, id: &str) -> anyhow::Result<Option<KeyRecord>> {
        let key = self.keyring.resolve(id, Some(&mut self.terminal)).await?;
        if key.is_none() {
            println!("No key found for '{id}'.");
        }
        Ok(key)
    }

    /// Resolves an optional `with` operand to a key id.
    async fn keyspec(&mut self, keyspec: Option<&str>) -> anyhow::Result<Option<String>> {
        let Some(id) = keyspec else {
            return Ok(None);
        };
        match self.resolve(id).await? {
            Some(key) => Ok(Some(key.keyid)),
            None => bail!("cannot continue without the key '{id}'"),
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let keyring = match &cli.homedir {
        Some(homedir) => Keyring::with_homedir(homedir.clone()),
        None => Keyring::new(),
    }
    .with_program(cli.gpg.clone());

    let options = LookupOptions {
        timeout_secs: (cli.timeout > 0).then_some(cli.timeout),
        max_attempts: (cli.max_attempts > 0).then_some(cli.max_attempts),
        ..Default::default()
    };

    let mut ctx = Context {
        keyring,
        terminal: Terminal::stdio(),
        keyserver: cli.keyserver,
        options,
    };
    debug!(command = ?cli.command, "dispatching");

    match cli.command {
        Commands::Gen => ctx.keyring.generate().await?,
        Commands::GenRevoke { id } => {
            if let Some(key) = ctx.resolve(&id).await? {
                ctx.keyring.gen_revoke(&key.keyid).await?;
            }
        }
        Commands::List { private, public } => {
            let keys: Vec<KeyRecord> = ctx
                .keyring
                .list_keys()
                .await?
                .into_iter()
                .filter(|k| match (private, public) {
                    (true, false) => k.kind == KeyKind::Secret,
                    (false, true) => k.kind == KeyKind::Public,
                    _ => true,
                })
                .collect();
            print!("{}", render_table(&keys));
        }
        Commands::Fingerprint { id } => {
            if let Some(key) = ctx.resolve(&id).await? {
                ctx.keyring.fingerprint(&key.keyid).await?;
            }
        }
        Commands::Send { operands } => {
            let ops = Operands::parse(&operands)?;
            let id = ops.target.context("send needs a key")?;
            let server = ops.output.unwrap_or_else(|| ctx.keyserver.clone());
            if let Some(key) = ctx.resolve(&id).await? {
                ctx.keyring.send_key(&key.keyid, &server).await?;
            }
        }
        Commands::Get { operands } => {
            let ops = Operands::parse(&operands)?;
            let id = ops.target.context("get needs an email address or key id")?;
            let server = ops.source.unwrap_or_else(|| ctx.keyserver.clone());
            get(&mut ctx, &id, &server).await?;
        }
        Commands::Sign { operands } => sign(&mut ctx, Operands::parse(&operands)?).await?,
        Commands::Edit { id } | Commands::Trust { id } => {
            if let Some(key) = ctx.resolve(&id).await? {
                ctx.keyring.edit_key(&key.keyid).await?;
            }
        }
        Commands::Export { id, file } => {
            if let Some(key) = ctx.resolve(&id).await? {
                ctx.keyring.export_key(&key.keyid, &file).await?;
            }
        }
        Commands::Import { file } => {
            if !file.is_file() {
                bail!("cannot import '{}': no such file", file.display());
            }
            ctx.keyring.import(&file).await?;
        }
        Commands::Encrypt { operands } => {
            let ops = Operands::parse(&operands)?;
            let recipient = ctx.keyspec(ops.keyspec.as_deref()).await?;
            let payload = ops.payload(Path::is_file);
            ctx.keyring
                .encrypt(&payload, recipient.as_deref(), ops.output_path())
                .await?;
        }
        Commands::Decrypt { operands } => {
            let ops = Operands::parse(&operands)?;
            let secret_key = ctx.keyspec(ops.keyspec.as_deref()).await?;
            let payload = ops.payload(Path::is_file);
            ctx.keyring
                .decrypt(&payload, secret_key.as_deref(), ops.output_path())
                .await?;
        }
        Commands::Verify { operands } => {
            let ops = Operands::parse(&operands)?;
            ctx.keyring.verify(&ops.payload(Path::is_file)).await?;
        }
    }

    Ok(())
}

/// Fetches a key by id, or looks it up by email and lets the operator
/// confirm it first.
async fn get(ctx: &mut Context, id: &str, server: &str) -> anyhow::Result<()> {
    let keyid = match Identifier::parse(id)? {
        Identifier::KeyId(keyid) => keyid,
        Identifier::Email(email) => {
            let client = KeyServer::new(&ctx.options)?;
            let found =
                lookup_remote(&email, server, &client, &mut ctx.terminal, &ctx.options).await?;
            match found {
                Some(key) => key.keyid,
                None => {
                    println!("No key found for '{email}' on {server}.");
                    return Ok(());
                }
            }
        }
    };

    ctx.keyring.receive_key(&keyid, server).await?;
    Ok(())
}

/// `sign` certifies a key when its target names one, and signs a file or
/// message otherwise.
async fn sign(ctx: &mut Context, ops: Operands) -> anyhow::Result<()> {
    let signer = ctx.keyspec(ops.keyspec.as_deref()).await?;
    let payload = ops.payload(Path::is_file);

    if let (Payload::Message(_), Some(target)) = (&payload, &ops.target)
        && ops.message.is_none()
        && Identifier::parse(target).is_ok()
        && let Some(key) = ctx.keyring.resolve(target, Some(&mut ctx.terminal)).await?
    {
        ctx.keyring.sign_key(&key.keyid, signer.as_deref()).await?;
        return Ok(());
    }

    ctx.keyring
        .sign(&payload, signer.as_deref(), ops.output_path())
        .await?;
    Ok(())
}
