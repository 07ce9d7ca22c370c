//! tagtree CLI
//!
//! Inspect and repack region archives and documents.

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use tagtree::region::{RecordStatus, REGION_DIM};
use tagtree::tree::CancellationToken;
use tagtree::{RecordStore, Session};
use tracing_subscriber::{fmt, EnvFilter};

/// tagtree CLI
#[derive(Parser, Debug)]
#[command(name = "tagtree-cli")]
#[command(about = "Inspect tagged-value documents and region archives")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the records of a region with their placement and state
    Info {
        /// Region file
        path: PathBuf,

        /// Decode every record to report corrupt ones
        #[arg(short, long)]
        load: bool,
    },

    /// Print the tree of a region or document
    Tree {
        /// Region or document file
        path: PathBuf,

        /// Maximum depth to print (roots are depth 0)
        #[arg(short, long, default_value = "3")]
        depth: usize,
    },

    /// Rewrite a region, packing every record contiguously
    Repack {
        /// Region file
        path: PathBuf,
    },
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tagtree=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let outcome = match args.command {
        Commands::Info { path, load } => info(&path, load),
        Commands::Tree { path, depth } => tree(&path, depth),
        Commands::Repack { path } => repack(&path),
    };

    if let Err(e) = outcome {
        tracing::error!("{}", e);
        process::exit(1);
    }
}

fn info(path: &Path, load: bool) -> tagtree::Result<()> {
    let store = RecordStore::open(path)?;
    let table = store.sector_table();

    println!("{}: {} records", store.display_name(), store.record_count());
    for record in store.records() {
        let (x, z) = record.coords();
        if load {
            record.load();
        }
        let placement = table
            .slot(x, z)
            .map(|e| format!("sector {:>5} x{:<3} ts {}", e.offset, e.sectors, e.timestamp))
            .unwrap_or_else(|| "not on disk".to_string());
        let state = match record.status() {
            RecordStatus::NotLoaded => "not loaded",
            RecordStatus::Loaded => "ok",
            RecordStatus::Corrupt => "CORRUPT",
            RecordStatus::External => "external",
        };
        println!("  [{:>2}, {:>2}] {}  {}", x, z, placement, state);
    }

    let free = store.available_coords(0, 0).len();
    println!("{} of {} slots free", free, REGION_DIM * REGION_DIM);
    Ok(())
}

fn tree(path: &Path, depth: usize) -> tagtree::Result<()> {
    let session = Session::default();
    let root = session.open_path(path)?;
    let cancel = CancellationToken::new();

    let mut lines = Vec::new();
    session.walker().expand_all(&root, &cancel, |node| {
        let level = node.path().len() - 1;
        if level <= depth {
            lines.push(format!(
                "{}{} {}",
                "  ".repeat(level),
                node.preview_name(),
                node.preview_value()
            ));
        }
    })?;

    for line in lines {
        println!("{}", line);
    }
    println!("({} nodes)", root.descendant_count() + 1);
    Ok(())
}

fn repack(path: &Path) -> tagtree::Result<()> {
    // records stay undecoded, so their bytes are copied through unchanged
    let store = RecordStore::open(path)?;
    let before = fs::metadata(path)?.len();
    store.save()?;
    let after = fs::metadata(path)?.len();
    tracing::info!(
        "repacked {} ({} records, {} -> {} bytes)",
        store.display_name(),
        store.record_count(),
        before,
        after
    );
    Ok(())
}
