use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use zeroize::Zeroizing;

use keyfort::{
    default_data_dir, EntryDetails, ExportFormat, FileKind, KdfParams, Vault,
};

mod auth;

#[derive(Debug, clap::Args)]
struct Argon2Args {
    /// Argon2 memory cost in KiB (default: 65536)
    #[arg(long = "argon-mem")]
    mem_cost_kib: Option<u32>,

    /// Argon2 time cost / iterations (default: 3)
    #[arg(long = "argon-time")]
    time_cost: Option<u32>,

    /// Argon2 parallelism (default: 4)
    #[arg(long = "argon-parallelism")]
    parallelism: Option<u32>,
}

impl Argon2Args {
    fn to_kdf_params(&self) -> Result<KdfParams> {
        let default = KdfParams::default();
        Ok(KdfParams::new(
            self.mem_cost_kib.unwrap_or(default.mem_cost_kib),
            self.time_cost.unwrap_or(default.time_cost),
            self.parallelism.unwrap_or(default.parallelism),
        )?)
    }
}

#[derive(Debug, Parser)]
#[command(name = "keyfort")]
#[command(
    version,
    about = "Local encrypted credential vault with multi-format import/export."
)]
struct Cli {
    /// Directory holding the vault files
    #[arg(long, global = true, value_name = "PATH", env = "KEYFORT_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Initializes a new vault with a master password
    Init {
        #[command(flatten)]
        argon2: Argon2Args,
    },

    /// Adds or updates a credential entry
    #[command(arg_required_else_help = true)]
    Add {
        name: String,
        /// Update this entry id instead of creating a new one
        #[arg(long)]
        id: Option<i64>,
        #[arg(long, default_value = "")]
        category: String,
        #[arg(long, default_value = "")]
        username: String,
        #[arg(long, default_value = "")]
        email: String,
        /// The stored password value
        #[arg(long = "secret", default_value = "")]
        secret: String,
        #[arg(long, default_value = "")]
        url: String,
        #[arg(long, default_value = "")]
        notes: String,
        /// Base32 TOTP seed
        #[arg(long)]
        totp: Option<String>,
    },

    /// Lists entries (plaintext fields only by default)
    List {
        /// Only entries in this category
        #[arg(long)]
        category: Option<String>,
    },

    /// Shows the decrypted details of one entry
    #[command(arg_required_else_help = true)]
    Show { id: i64 },

    /// Removes an entry by id
    #[command(arg_required_else_help = true)]
    Remove { id: i64 },

    /// Exports all entries; format chosen by the file extension
    /// (.kfx encrypted, .csv plaintext, .spass Samsung Pass)
    #[command(arg_required_else_help = true)]
    Export {
        path: PathBuf,
        /// Include TOTP secrets as otpauth:// URIs in CSV output
        #[arg(long, default_value_t = false)]
        include_totp: bool,
    },

    /// Imports entries from a supported file and merges them in
    #[command(arg_required_else_help = true)]
    Import { path: PathBuf },

    /// Changes the master password, re-encrypting the whole vault
    ChangePassword,

    /// Stores an icon (base64) for a category
    #[command(arg_required_else_help = true)]
    SetIcon { category: String, icon: String },

    /// Shows information about the vault
    Info,
}

fn resolve_data_dir(cli: &Cli) -> Result<PathBuf> {
    match &cli.data_dir {
        Some(p) => Ok(p.clone()),
        None => Ok(default_data_dir()?),
    }
}

fn open_unlocked(cli: &Cli) -> Result<Vault> {
    let vault = Vault::open(&resolve_data_dir(cli)?)?;
    if !vault.is_initialized() {
        bail!("vault is not initialized; run `keyfort init` first");
    }
    let password = auth::read_password()?;
    if !vault.unlock(&password)? {
        bail!("incorrect master password");
    }
    Ok(vault)
}

fn read_setup_password() -> Result<Zeroizing<String>> {
    if std::env::var("KEYFORT_PASSWORD").map_or(false, |p| !p.is_empty()) {
        return auth::read_password();
    }
    auth::read_new_password_with_confirmation("New master password")
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match &cli.command {
        Commands::Init { argon2 } => {
            let kdf = argon2.to_kdf_params()?;
            let vault = Vault::open_with_kdf(&resolve_data_dir(&cli)?, kdf)?;
            if vault.is_initialized() {
                bail!("vault already exists");
            }
            let password = read_setup_password()?;
            vault.setup(&password)?;
            println!("vault initialized");
        }

        Commands::Add {
            name,
            id,
            category,
            username,
            email,
            secret,
            url,
            notes,
            totp,
        } => {
            let mut vault = open_unlocked(&cli)?;
            let details = EntryDetails {
                username: username.clone(),
                email: email.clone(),
                password: secret.clone(),
                url: url.clone(),
                notes: notes.clone(),
                totp_secret: totp.clone(),
                ..Default::default()
            };
            let id = vault.save_entry(*id, category, name, &details)?;
            println!("saved entry '{name}' (id {id})");
        }

        Commands::List { category } => {
            let vault = open_unlocked(&cli)?;
            let outcome = vault.entries()?;
            for failure in &outcome.failures {
                eprintln!("warning: entry {} unreadable: {}", failure.id, failure.error);
            }
            for entry in outcome.entries.iter().filter(|e| {
                category
                    .as_deref()
                    .map_or(true, |c| e.category == c)
            }) {
                println!(
                    "{:>5}  {:<16}  {}",
                    entry.id.unwrap_or_default(),
                    entry.category,
                    entry.name
                );
            }
        }

        Commands::Show { id } => {
            let vault = open_unlocked(&cli)?;
            let outcome = vault.entries()?;
            let entry = outcome
                .entries
                .iter()
                .find(|e| e.id == Some(*id))
                .with_context(|| format!("no entry with id {id}"))?;
            println!("name:     {}", entry.name);
            println!("category: {}", entry.category);
            println!("username: {}", entry.details.username);
            println!("email:    {}", entry.details.email);
            println!("password: {}", entry.details.password);
            println!("url:      {}", entry.details.url);
            println!("notes:    {}", entry.details.notes);
            if let Some(totp) = &entry.details.totp_secret {
                println!("totp:     {totp}");
            }
            if !entry.details.backup_codes.is_empty() {
                println!("backup:   {}", entry.details.backup_codes);
            }
        }

        Commands::Remove { id } => {
            let mut vault = open_unlocked(&cli)?;
            vault.delete_entry(*id)?;
            println!("removed entry {id}");
        }

        Commands::Export { path, include_totp } => {
            let vault = open_unlocked(&cli)?;
            let (format, password) = match FileKind::from_path(path)? {
                FileKind::Encrypted => (ExportFormat::Native, Some(auth::read_file_password()?)),
                FileKind::Csv => (
                    ExportFormat::Csv {
                        include_totp: *include_totp,
                    },
                    None,
                ),
                FileKind::SamsungPass => {
                    (ExportFormat::SamsungPass, Some(auth::read_file_password()?))
                }
                FileKind::Text => bail!("text files are import-only"),
            };
            let bytes = vault.export(format, password.as_deref().map(|p| &**p))?;
            std::fs::write(path, bytes)?;
            println!("exported to {}", path.display());
        }

        Commands::Import { path } => {
            let mut vault = open_unlocked(&cli)?;
            let password = if FileKind::from_path(path)?.needs_password() {
                Some(auth::read_file_password()?)
            } else {
                None
            };
            let stats = vault.import_file(path, password.as_deref().map(|p| &**p))?;
            println!(
                "import finished: {} added, {} updated, {} skipped",
                stats.added, stats.updated, stats.skipped
            );
        }

        Commands::ChangePassword => {
            let mut vault = open_unlocked(&cli)?;
            let old = auth::read_password()?;
            let new = match std::env::var("KEYFORT_NEW_PASSWORD") {
                Ok(p) if !p.is_empty() => Zeroizing::new(p),
                _ => auth::read_new_password_with_confirmation("New master password")?,
            };
            if vault.rotate_master_password(&old, &new)? {
                println!("master password changed");
            } else {
                bail!("master password change failed; vault unchanged");
            }
        }

        Commands::SetIcon { category, icon } => {
            let mut vault = open_unlocked(&cli)?;
            vault.set_category_icon(category, icon)?;
            println!("icon saved for category '{category}'");
        }

        Commands::Info => {
            let vault = open_unlocked(&cli)?;
            let outcome = vault.entries()?;
            let icons = vault.category_icons()?;
            println!("entries:    {}", outcome.entries.len());
            println!("unreadable: {}", outcome.failures.len());
            println!("icons:      {}", icons.len());
        }
    }

    Ok(())
}
