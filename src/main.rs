//! ALFA Media Vault - CLI
//!
//! Command-line interface for vault operations.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use zeroize::Zeroizing;

use alfa_media_vault::{ApiError, ErrorCode, MediaVaultApi, NewUpload, VaultConfig, VaultKey};

#[derive(Parser)]
#[command(name = "alfa-media")]
#[command(author = "Karen Tonoyan")]
#[command(version = alfa_media_vault::VERSION)]
#[command(about = "ALFA Media Vault - Passcode-gated encrypted media vault")]
struct Cli {
    /// Vault path
    #[arg(short, long, env = "ALFA_MEDIA_VAULT", default_value = "./vault")]
    vault: PathBuf,

    /// JSON config file (overrides --vault)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Passcode
    #[arg(short, long, global = true)]
    pin: Option<String>,

    /// Raw 32-byte key as 64 hex characters
    #[arg(long, global = true, conflicts_with = "pin")]
    key_hex: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show whether a passcode is registered
    Status,

    /// Register the vault passcode (once)
    Register,

    /// Check a passcode
    Verify,

    /// Encrypt and import a file
    Import {
        /// File path
        path: PathBuf,

        /// Title (defaults to the file name)
        #[arg(short, long)]
        title: Option<String>,

        /// Description
        #[arg(short, long, default_value = "")]
        description: String,

        /// Comma-separated tags
        #[arg(long, default_value = "")]
        tags: String,

        /// MIME type (sniffed when omitted)
        #[arg(short, long, default_value = "")]
        mime: String,
    },

    /// Decrypt a media item to a file
    Export {
        /// Media ID
        id: i64,

        /// Output path
        output: PathBuf,
    },

    /// Show metadata and tags of a media item
    Show {
        /// Media ID
        id: i64,
    },

    /// Search titles, descriptions and tags
    Search {
        /// Substring to look for (empty lists everything)
        #[arg(default_value = "")]
        query: String,

        /// Page number
        #[arg(long, default_value_t = 1)]
        page: i64,
    },

    /// Delete a media item
    Delete {
        /// Media ID
        id: i64,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => VaultConfig::load(path)?,
        None => VaultConfig::at(&cli.vault),
    };
    let api = MediaVaultApi::open(&config)
        .with_context(|| format!("cannot open vault at {}", config.root.display()))?;

    match cli.command {
        Commands::Status => {
            if api.status().is_registered {
                println!("🔐 Vault at {} is registered", config.root.display());
            } else {
                println!("📭 Vault at {} has no passcode yet", config.root.display());
            }
        }

        Commands::Register => {
            let code = code_hash(&cli.pin, &cli.key_hex)?;
            api.register_passcode(&code).map_err(describe)?;
            println!("✅ Passcode registered");
        }

        Commands::Verify => {
            let code = code_hash(&cli.pin, &cli.key_hex)?;
            api.verify_passcode(&code).map_err(describe)?;
            println!("✅ Passcode accepted");
        }

        Commands::Import {
            path,
            title,
            description,
            tags,
            mime,
        } => {
            let code = code_hash(&cli.pin, &cli.key_hex)?;
            println!("📥 Importing: {}", path.display());

            let bytes = std::fs::read(&path)
                .with_context(|| format!("cannot read {}", path.display()))?;
            let filename = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("unknown")
                .to_string();

            let upload = NewUpload {
                title: title.unwrap_or_else(|| filename.clone()),
                description,
                tags,
                mimetype: mime,
                filename,
                bytes,
            };
            let media = api.ingest_media(&code, &upload).map_err(describe)?;
            println!("✅ Imported with ID: {}", media.media_id);
        }

        Commands::Export { id, output } => {
            let code = code_hash(&cli.pin, &cli.key_hex)?;
            println!("📤 Exporting media: {}", id);

            let file = api.fetch_media(&code, id).map_err(describe)?;
            std::fs::write(&output, &file.bytes)
                .with_context(|| format!("cannot write {}", output.display()))?;
            println!(
                "✅ Exported {} ({} bytes) to: {}",
                file.mimetype,
                file.bytes.len(),
                output.display()
            );
        }

        Commands::Show { id } => {
            let code = code_hash(&cli.pin, &cli.key_hex)?;
            let details = api.describe_media(&code, id).map_err(describe)?;
            let record = &details.record;

            println!("🎞️  Media {}", record.id);
            println!("{:-<40}", "");
            println!("Title:        {}", record.title);
            println!("Description:  {}", record.description);
            println!("Type:         {}", record.mimetype);
            println!("Created:      {}", record.created_at.to_rfc3339());
            println!("Tags:         {}", details.tags.join(", "));
        }

        Commands::Search { query, page } => {
            let code = code_hash(&cli.pin, &cli.key_hex)?;
            let results = api.search_media(&code, &query, page).map_err(describe)?;

            if results.rows.is_empty() {
                println!("📭 No media found");
            } else {
                println!(
                    "🔎 Page {}/{} ({} total):",
                    results.page, results.total_pages, results.total
                );
                println!("{:-<60}", "");
                for row in &results.rows {
                    println!(
                        "{:>6}  {}  {:<24} {}",
                        row.id,
                        row.created_at.format("%Y-%m-%d %H:%M"),
                        row.mimetype,
                        row.title
                    );
                }
            }
        }

        Commands::Delete { id } => {
            let code = code_hash(&cli.pin, &cli.key_hex)?;
            println!("🗑️ Deleting media: {}", id);
            api.delete_media(&code, id).map_err(describe)?;
            println!("✅ Media deleted!");
        }
    }

    Ok(())
}

/// Hex candidate key from `--pin` (SHA-256 of the passcode) or `--key-hex`
fn code_hash(pin: &Option<String>, key_hex: &Option<String>) -> anyhow::Result<Zeroizing<String>> {
    match (pin, key_hex) {
        (Some(pin), _) => {
            let key = VaultKey::from_passcode(pin);
            Ok(Zeroizing::new(hex::encode(key.expose())))
        }
        (None, Some(key_hex)) => Ok(Zeroizing::new(key_hex.clone())),
        (None, None) => bail!("a passcode is required: pass --pin or --key-hex"),
    }
}

fn describe(e: ApiError) -> anyhow::Error {
    let message = match e.error {
        ErrorCode::InvalidKeyLength => "key must be exactly 32 bytes (64 hex characters)",
        ErrorCode::AlreadyRegistered => "a passcode is already registered",
        ErrorCode::NotRegistered => "no passcode registered yet, run `register` first",
        ErrorCode::InvalidPasscode => "invalid passcode",
        ErrorCode::MissingField => "title and a non-empty file are required",
        ErrorCode::NotFound => "media not found",
        ErrorCode::DecryptFailed => "media could not be decrypted",
        ErrorCode::StorageFailure => "storage failure (see log)",
    };
    anyhow::anyhow!(message)
}
