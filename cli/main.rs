use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use pngseal::{
    chunk::Chunk,
    config::Config,
    document::{self, BatchReport, Document},
    hybrid::HybridCipher,
    key_manager::KeyManager,
    metadata::ImageSummary,
    text_chunk::TextRecord,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Preview width for `list`
const PREVIEW_CHARS: usize = 50;

/// pngseal - Hide and protect text metadata inside PNG images
#[derive(Parser)]
#[command(name = "pngseal")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct SaveTarget {
    /// Write the result to this file instead of modifying the input
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage the RSA keypair
    #[command(subcommand)]
    Keys(KeyCommands),

    /// List text records of an image
    List {
        image: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show file information
    Info {
        image: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print one record, decrypting it if needed (the file is not modified)
    Show { image: PathBuf, index: usize },

    /// Add a text record
    Add {
        image: PathBuf,
        keyword: String,
        text: String,

        /// Encrypt the new record
        #[arg(short, long)]
        encrypt: bool,

        #[command(flatten)]
        target: SaveTarget,
    },

    /// Change the keyword and/or text of a record
    Edit {
        image: PathBuf,
        index: usize,

        #[arg(short, long)]
        keyword: Option<String>,

        #[arg(short, long)]
        text: Option<String>,

        #[command(flatten)]
        target: SaveTarget,
    },

    /// Remove a text record
    Remove {
        image: PathBuf,
        index: usize,

        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,

        #[command(flatten)]
        target: SaveTarget,
    },

    /// Copy a record, inserting the copy right after it
    Duplicate {
        image: PathBuf,
        index: usize,

        #[command(flatten)]
        target: SaveTarget,
    },

    /// Move a record to another position
    Move {
        image: PathBuf,
        from: usize,
        to: usize,

        #[command(flatten)]
        target: SaveTarget,
    },

    /// Remove every text record
    Clear {
        image: PathBuf,

        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,

        #[command(flatten)]
        target: SaveTarget,
    },

    /// Encrypt one record, or all plain records with --all
    Encrypt {
        image: PathBuf,

        #[arg(required_unless_present = "all", conflicts_with = "all")]
        index: Option<usize>,

        #[arg(short, long)]
        all: bool,

        #[command(flatten)]
        target: SaveTarget,
    },

    /// Decrypt one record, or all encrypted records with --all
    Decrypt {
        image: PathBuf,

        #[arg(required_unless_present = "all", conflicts_with = "all")]
        index: Option<usize>,

        #[arg(short, long)]
        all: bool,

        #[command(flatten)]
        target: SaveTarget,
    },
}

#[derive(Subcommand, Debug)]
enum KeyCommands {
    /// Load the keypair, generating one if none exists
    Init,

    /// Print key files, size and fingerprint
    Show {
        /// Also print the public key
        #[arg(short, long)]
        pem: bool,
    },

    /// Replace the keypair. Everything encrypted with the old key becomes unreadable.
    Regenerate {
        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Write the public key to a file
    Export { path: PathBuf },

    /// Encrypt with someone else's public key for the rest of this command.
    /// Persisted key files are not changed.
    Import {
        path: PathBuf,

        /// Image whose plain records should be encrypted with the imported key
        #[arg(long)]
        encrypt_all: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    // Use RUST_LOG to control log level (e.g., RUST_LOG=info,pngseal=debug)
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .with_target(true)
        .init();

    let cli = Cli::parse();
    info!(command = ?cli.command, "pngseal starting");

    let cfg = Config::resolve(cli.config.as_deref())?;

    match cli.command {
        Commands::Keys(cmd) => cmd_keys(&cfg, cmd),
        Commands::List { image, json } => cmd_list(&image, json),
        Commands::Info { image, json } => cmd_info(&image, json),
        Commands::Show { image, index } => cmd_show(&cfg, &image, index),
        Commands::Add {
            image,
            keyword,
            text,
            encrypt,
            target,
        } => edit_and_save(&cfg, &image, &target, |doc| {
            let id = doc.add_record(&keyword, &text)?;
            let index = doc.index_of(id).context("new record vanished")?;
            if encrypt {
                doc.encrypt_record(index)?;
            }
            println!("Added record {} ({})", index, keyword);
            Ok(())
        }),
        Commands::Edit {
            image,
            index,
            keyword,
            text,
            target,
        } => {
            if keyword.is_none() && text.is_none() {
                anyhow::bail!("nothing to change: pass --keyword and/or --text");
            }
            edit_and_save(&cfg, &image, &target, |doc| {
                doc.edit_record(index, keyword.as_deref(), text.as_deref())?;
                println!("Updated record {}", index);
                Ok(())
            })
        }
        Commands::Remove {
            image,
            index,
            yes,
            target,
        } => edit_and_save(&cfg, &image, &target, |doc| {
            let record = doc
                .get(index)
                .with_context(|| format!("no record at index {}", index))?;
            if !yes && !confirm(&format!("Remove record {} ({})?", index, record.keyword()))? {
                anyhow::bail!("cancelled");
            }
            let removed = doc.remove_record(index)?;
            println!("Removed record {} ({})", index, removed.keyword());
            Ok(())
        }),
        Commands::Duplicate {
            image,
            index,
            target,
        } => edit_and_save(&cfg, &image, &target, |doc| {
            doc.duplicate_record(index)?;
            println!("Duplicated record {} to {}", index, index + 1);
            Ok(())
        }),
        Commands::Move {
            image,
            from,
            to,
            target,
        } => edit_and_save(&cfg, &image, &target, |doc| {
            doc.move_record(from, to)?;
            println!("Moved record {} to {}", from, to);
            Ok(())
        }),
        Commands::Clear { image, yes, target } => edit_and_save(&cfg, &image, &target, |doc| {
            if !yes && !confirm(&format!("Clear all {} record(s)?", doc.len()))? {
                anyhow::bail!("cancelled");
            }
            doc.clear_records();
            println!("Cleared all text records");
            Ok(())
        }),
        Commands::Encrypt {
            image,
            index,
            all,
            target,
        } => edit_and_save(&cfg, &image, &target, |doc| {
            if all {
                print_report("Encrypted", &doc.encrypt_all());
            } else if let Some(index) = index {
                doc.encrypt_record(index)?;
                println!("Encrypted record {}", index);
            }
            Ok(())
        }),
        Commands::Decrypt {
            image,
            index,
            all,
            target,
        } => edit_and_save(&cfg, &image, &target, |doc| {
            if all {
                print_report("Decrypted", &doc.decrypt_all());
            } else if let Some(index) = index {
                doc.decrypt_record(index)?;
                println!("Decrypted record {}", index);
            }
            Ok(())
        }),
    }
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{} [y/N]: ", prompt);
    io::stdout().flush()?;

    let mut response = String::new();
    io::stdin().read_line(&mut response)?;
    Ok(response.trim().eq_ignore_ascii_case("y"))
}

/// Load the keypair, showing a spinner when a new one has to be generated
fn load_keys(cfg: &Config) -> Result<Arc<KeyManager>> {
    let have_keys =
        Path::new(&cfg.public_key_path).exists() && Path::new(&cfg.private_key_path).exists();
    let spinner = (!have_keys).then(|| create_spinner("Generating RSA-2048 keypair..."));

    let km = KeyManager::load_or_generate(cfg).context("loading keypair")?;

    if let Some(spinner) = spinner {
        spinner.finish_with_message("Keypair generated");
    }
    Ok(Arc::new(km))
}

/// Load the persisted keypair without ever creating one
fn load_existing_keys(cfg: &Config) -> Result<Arc<KeyManager>> {
    for path in [&cfg.public_key_path, &cfg.private_key_path] {
        if !Path::new(path).exists() {
            anyhow::bail!(
                "key file {} not found; run `pngseal keys init` to create a keypair",
                path
            );
        }
    }
    let km = KeyManager::load_or_generate(cfg).context("loading keypair")?;
    Ok(Arc::new(km))
}

/// Parse an image for read-only commands; no keys involved
fn read_records(image: &Path) -> Result<(Vec<Chunk>, Vec<TextRecord>)> {
    document::open(image).with_context(|| format!("opening {}", image.display()))
}

fn open_document(cfg: &Config, image: &Path) -> Result<Document> {
    let keys = load_keys(cfg)?;
    Document::open(image, HybridCipher::new(keys))
        .with_context(|| format!("opening {}", image.display()))
}

fn edit_and_save<F>(cfg: &Config, image: &Path, target: &SaveTarget, edit: F) -> Result<()>
where
    F: FnOnce(&mut Document) -> Result<()>,
{
    let mut doc = open_document(cfg, image)?;
    edit(&mut doc)?;
    match &target.output {
        Some(out) => {
            doc.save_as(out)
                .with_context(|| format!("saving {}", out.display()))?;
            println!("  {} -> {}", image.display(), out.display());
        }
        None => doc
            .save()
            .with_context(|| format!("saving {}", image.display()))?,
    }
    Ok(())
}

fn print_report(verb: &str, report: &BatchReport) {
    if report.processed == 0 && report.failures.is_empty() {
        println!("No records to process");
    } else {
        println!("{} {} record(s)", verb, report.processed);
    }
    for (id, err) in &report.failures {
        eprintln!("  record {} failed: {}", id, err);
    }
}

fn cmd_keys(cfg: &Config, cmd: KeyCommands) -> Result<()> {
    let keys = load_keys(cfg)?;

    match cmd {
        KeyCommands::Init => {
            println!("Public key:  {}", keys.public_key_path().display());
            println!("Private key: {}", keys.private_key_path().display());
            println!("Fingerprint: {}", keys.fingerprint()?);
            println!();
            println!("IMPORTANT: Keep your private key file secure and backed up!");
            println!("Without it, encrypted records cannot be recovered.");
        }
        KeyCommands::Show { pem } => {
            println!("Public key:  {}", keys.public_key_path().display());
            println!("Private key: {}", keys.private_key_path().display());
            println!("Key size:    {} bits", keys.key_bits());
            println!("Fingerprint: {}", keys.fingerprint()?);
            if pem {
                println!();
                print!("{}", keys.public_key_pem()?);
            }
        }
        KeyCommands::Regenerate { yes } => {
            if !yes
                && !confirm(
                    "Generate a new keypair? Records encrypted with the current key will be unreadable",
                )?
            {
                println!("Cancelled.");
                return Ok(());
            }
            let spinner = create_spinner("Generating RSA-2048 keypair...");
            keys.regenerate()?;
            spinner.finish_with_message("Keypair regenerated");
            println!("Fingerprint: {}", keys.fingerprint()?);
        }
        KeyCommands::Export { path } => {
            keys.export_public(&path)?;
            println!("Public key exported to {}", path.display());
            println!("Fingerprint: {}", keys.fingerprint()?);
        }
        KeyCommands::Import { path, encrypt_all } => {
            keys.import_public(&path)?;
            println!("Imported public key {}", path.display());
            println!("Fingerprint: {}", keys.fingerprint()?);
            if let Some(image) = encrypt_all {
                let mut doc = Document::open(&image, HybridCipher::new(keys.clone()))
                    .with_context(|| format!("opening {}", image.display()))?;
                print_report("Encrypted", &doc.encrypt_all());
                doc.save()?;
            }
        }
    }
    Ok(())
}

fn cmd_list(image: &Path, json: bool) -> Result<()> {
    let (_, records) = read_records(image)?;

    if json {
        let rows: Vec<_> = records
            .iter()
            .enumerate()
            .map(|(index, r)| {
                serde_json::json!({
                    "index": index,
                    "keyword": r.keyword(),
                    "text": r.text(),
                    "encrypted": r.is_encrypted(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No text records found");
        return Ok(());
    }

    println!("Text records ({} total):", records.len());
    println!();
    println!("{:>5}  {:<20} {:<4} TEXT", "INDEX", "KEYWORD", "ENC");
    for (index, r) in records.iter().enumerate() {
        let enc = if r.is_encrypted() { "yes" } else { "no" };
        println!(
            "{:>5}  {:<20} {:<4} {}",
            index,
            r.keyword(),
            enc,
            r.display_text(PREVIEW_CHARS).replace('\n', " ")
        );
    }
    Ok(())
}

fn cmd_info(image: &Path, json: bool) -> Result<()> {
    let (chunks, records) = read_records(image)?;
    let summary = ImageSummary::from_chunks(image, &chunks, &records)?;

    if json {
        println!("{}", summary.to_json()?);
        return Ok(());
    }

    println!("File:              {}", summary.file_name);
    println!(
        "Size:              {} bytes ({:.2} KB)",
        summary.size_bytes,
        summary.size_bytes as f64 / 1024.0
    );
    println!("Chunks:            {}", summary.chunk_count);
    println!("Chunk types:       {}", summary.chunk_types.join(" "));
    println!(
        "Text records:      {} ({} encrypted)",
        summary.text_records, summary.encrypted_records
    );
    if summary.stale_crc_chunks > 0 {
        println!();
        println!(
            "WARNING: {} chunk(s) have a wrong CRC; they will be repaired on save",
            summary.stale_crc_chunks
        );
    }
    Ok(())
}

fn cmd_show(cfg: &Config, image: &Path, index: usize) -> Result<()> {
    let (_, records) = read_records(image)?;
    let record = records
        .get(index)
        .with_context(|| format!("no record at index {}", index))?;

    let text = if record.is_encrypted() {
        HybridCipher::new(load_existing_keys(cfg)?)
            .decrypt(record.text())
            .with_context(|| format!("decrypting record {}", index))?
    } else {
        record.text().to_string()
    };

    println!("Keyword:   {}", record.keyword());
    println!(
        "Encrypted: {}",
        if record.is_encrypted() { "yes" } else { "no" }
    );
    println!();
    println!("{}", text);
    Ok(())
}
