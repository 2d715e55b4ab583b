//! Talos CLI - Command-line tool for renaming Serious Engine assets.
//!
//! This is the main entry point for the Talos command-line application.

use std::fs::{self, File};
use std::io::{BufReader, Cursor, Seek, SeekFrom};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use talos::meta::{block, MetaReader};
use talos::prelude::*;
use talos::resave::{find_referencing_files, sniff_format, PayloadFormat};
use talos::stream::{
    keys, HashMethod, SignedStreamReader, StreamSigner, WreckedStreamReader, INFO_WRAPPER_MAGIC,
    SIGNED_WRAPPER_MAGIC, WRECKED_WRAPPER_MAGIC,
};

/// Talos - Serious Engine asset renaming tool
#[derive(Parser)]
#[command(name = "talos")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rename assets and rewrite every reference to them
    Rename {
        /// Game root directory
        #[arg(short, long, env = "GAME_ROOT")]
        root: PathBuf,

        /// Target game profile (SS2, SSHD, SS3, Fusion, SS4)
        #[arg(short, long, default_value = "SS3")]
        profile: String,

        /// Rename rule, as OLD=NEW relative paths (repeatable)
        #[arg(short = 'm', long = "map", value_name = "OLD=NEW")]
        rules: Vec<String>,

        /// File with one OLD=NEW rule per line (# starts a comment)
        #[arg(long)]
        rules_file: Option<PathBuf>,

        /// Additional file to rewrite references in (repeatable)
        #[arg(short, long = "update", value_name = "PATH")]
        updates: Vec<String>,

        /// Sweep the game root for files referencing the renamed assets
        #[arg(long)]
        scan_references: bool,

        /// Delete the original files after a successful rename
        #[arg(long)]
        delete_old: bool,
    },

    /// List files that reference any of the given paths
    Scan {
        /// Game root directory
        #[arg(short, long, env = "GAME_ROOT")]
        root: PathBuf,

        /// Game-root-relative paths to look for
        targets: Vec<String>,
    },

    /// Show the wrapper chain and meta header of a file
    Inspect {
        /// File to inspect
        file: PathBuf,

        /// Check the signed header signature against the known editor keys
        #[arg(long)]
        verify: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Rename {
            root,
            profile,
            rules,
            rules_file,
            updates,
            scan_references,
            delete_old,
        } => cmd_rename(
            root,
            &profile,
            rules,
            rules_file,
            updates,
            scan_references,
            delete_old,
        ),
        Commands::Scan { root, targets } => cmd_scan(root, targets),
        Commands::Inspect { file, verify } => cmd_inspect(&file, verify),
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_rename(
    root: PathBuf,
    profile_name: &str,
    rules: Vec<String>,
    rules_file: Option<PathBuf>,
    mut references: Vec<String>,
    scan_references: bool,
    delete_old: bool,
) -> Result<()> {
    let profile = StreamProfile::from_name(profile_name)
        .with_context(|| format!("unknown profile {profile_name:?}"))?;

    let mut files = Vec::new();
    for rule in &rules {
        files.push(parse_rule(rule, delete_old)?);
    }
    if let Some(path) = rules_file {
        let text = fs::read_to_string(&path)
            .with_context(|| format!("failed to read rules file {}", path.display()))?;
        for line in text.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            if !line.is_empty() {
                files.push(parse_rule(line, delete_old)?);
            }
        }
    }
    anyhow::ensure!(!files.is_empty(), "no rename rules given");

    if scan_references {
        println!("Scanning {} for references...", root.display());
        let start = Instant::now();
        let map = RenameMap::from_files(&files);
        let found = find_referencing_files(&root, &map);
        println!(
            "Found {} referencing files in {:?}",
            found.len(),
            start.elapsed()
        );
        for path in found {
            if !references.contains(&path) {
                references.push(path);
            }
        }
    }

    println!(
        "Renaming {} assets ({} reference updates) with profile {}",
        files.len(),
        references.len(),
        profile
    );

    let pb = ProgressBar::new((files.len() + references.len()) as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );

    let driver = BatchDriver::new(&root, profile);
    let cancel = AtomicBool::new(false);
    let start = Instant::now();
    let outcome = driver.run(&files, &references, &cancel, |done, _| {
        pb.set_position(done as u64);
    });
    pb.finish_with_message("Done");

    println!(
        "Processed {} files in {:?}",
        outcome.completed,
        start.elapsed()
    );
    for (file, error) in &outcome.resave_errors {
        eprintln!("  rename failed: {}: {}", file.old_path, error);
    }
    for (path, error) in &outcome.update_errors {
        eprintln!("  update failed: {}: {}", path, error);
    }

    let errors = outcome.resave_errors.len() + outcome.update_errors.len();
    if errors > 0 {
        anyhow::bail!("{errors} files failed");
    }
    Ok(())
}

fn parse_rule(rule: &str, delete_old: bool) -> Result<ResaveFile> {
    let (old, new) = rule
        .split_once('=')
        .with_context(|| format!("rule {rule:?} is not of the form OLD=NEW"))?;
    Ok(ResaveFile::new(old.trim(), new.trim(), delete_old))
}

fn cmd_scan(root: PathBuf, targets: Vec<String>) -> Result<()> {
    anyhow::ensure!(!targets.is_empty(), "no target paths given");

    let mut map = RenameMap::new();
    for target in &targets {
        map.insert(target.clone(), target.clone());
    }

    let start = Instant::now();
    let hits = find_referencing_files(&root, &map);
    for hit in &hits {
        println!("{hit}");
    }
    println!("\n{} referencing files in {:?}", hits.len(), start.elapsed());
    Ok(())
}

fn cmd_inspect(path: &PathBuf, verify: bool) -> Result<()> {
    println!("{}", path.display());

    let file = BufReader::new(
        File::open(path).with_context(|| format!("failed to open {}", path.display()))?,
    );
    let mut reader: Box<dyn ReadSeek> = Box::new(file);

    loop {
        let head = reader.peek_at_most(8)?;
        if head.len() < 8 {
            break;
        }
        if head[..] == SIGNED_WRAPPER_MAGIC[..] {
            reader.seek(SeekFrom::Current(8))?;
            let signed = SignedStreamReader::new(reader)?;
            let header = signed.header();
            println!(
                "  signed stream: version {}, block size {:#x}, signature {} bytes, key {:?}",
                header.version, header.block_size, header.signature_size, header.key_identifier
            );
            println!("    payload: {} bytes", signed.len());
            reader = Box::new(signed);
        } else if head[..] == WRECKED_WRAPPER_MAGIC[..] {
            reader.seek(SeekFrom::Current(8))?;
            let mut wrecked = WreckedStreamReader::new(reader)?;
            println!("  wrecked stream: payload {} bytes", wrecked.len()?);
            reader = Box::new(wrecked);
        } else if head[..] == INFO_WRAPPER_MAGIC[..] {
            reader.seek(SeekFrom::Current(8))?;
            let note = ReadExt::read_len_string(&mut reader)?;
            println!("  info string: {note:?}");
        } else {
            break;
        }
    }

    let head = reader.peek_at_most(16)?;
    match sniff_format(&head, &path.to_string_lossy()) {
        PayloadFormat::BinaryMeta => {
            let mut meta = MetaReader::new(reader)?;
            println!(
                "  binary meta: version {}, {}-endian",
                meta.version(),
                if meta.big_endian() { "big" } else { "little" }
            );
            if meta.version() > 9 {
                meta.expect_block(block::MESSAGES)?;
                meta.skip_string()?;
            }
            meta.expect_block(block::INFO)?;
            meta.skip(if meta.version() > 7 { 20 } else { 16 })?;
            let entries = meta.begin_list(block::EXTERNAL_FILES)?;
            println!("  external files: {entries}");
            for _ in 0..entries {
                meta.skip(8)?;
                println!("    {}", meta.read_string()?);
            }
        }
        PayloadFormat::TextMeta => println!("  text meta payload"),
        PayloadFormat::LevelInfo => println!("  level info payload"),
        PayloadFormat::Lua => println!("  lua script"),
        PayloadFormat::Opaque => println!("  opaque payload"),
    }

    if verify {
        verify_signed_header(path)?;
    }
    Ok(())
}

fn verify_signed_header(path: &PathBuf) -> Result<()> {
    let bytes = fs::read(path)?;
    if bytes.len() < 8 || bytes[..8] != SIGNED_WRAPPER_MAGIC[..] {
        println!("  no signed wrapper to verify");
        return Ok(());
    }

    let mut cursor = Cursor::new(&bytes[8..]);
    let header = talos::stream::SignedHeader::read(&mut cursor)?;
    if header.signature_size <= 0 {
        println!("  header carries no signature");
        return Ok(());
    }

    let header_end = 8 + cursor.position() as usize;
    let signed_end = header_end - (4 + header.key_identifier.len());
    let signature = bytes
        .get(header_end..header_end + header.signature_size as usize)
        .context("header signature is truncated")?;
    let material = &bytes[8..signed_end];

    let candidates = [
        ("SSHD", keys::SSHD_EDITOR_KEY),
        ("SS3", keys::SS3_EDITOR_KEY),
        ("Fusion", keys::FUSION_EDITOR_KEY),
        ("SS4", keys::SS4_EDITOR_KEY),
    ];
    for (name, der) in candidates {
        let signer = StreamSigner::from_pkcs1_der(der, HashMethod::Sha1)?;
        if signer.verify(material, signature) {
            println!("  header signature valid under the {name} editor key");
            return Ok(());
        }
    }
    println!("  header signature does not match any known editor key");
    Ok(())
}
