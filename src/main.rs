use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use kiroku::config::Config;
use kiroku::export::export_site;
use kiroku::repository::{LoadMode, PostRepository};
use kiroku::serve::serve_site;
use kiroku::site::Site;

/// A Markdown blog engine with a built-in server and static export
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Project file (default: the nearest `kiroku.yaml` above the working
    /// directory)
    #[arg(short = 'C', long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serves the blog over HTTP
    Serve {
        /// Port to listen on, overriding `serve.port`
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Deletes the output directory if there is one and exports the site
    Build {
        /// Output directory, overriding `output_directory`
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Parses every post and reports the problems found
    Check,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::from_project_file(path)?,
        None => Config::from_directory(&std::env::current_dir()?)?,
    };

    match cli.command {
        Commands::Serve { port } => serve_site(Site::from_config(config)?, port),
        Commands::Build { out } => {
            let output = out.unwrap_or_else(|| config.output_directory.clone());
            let site = Site::from_config(config)?;
            let summary = export_site(&site, &output)?;
            if !summary.skipped.is_empty() {
                log::warn!("{} categories or tags were skipped", summary.skipped.len());
            }
            Ok(())
        }
        Commands::Check => check(&config),
    }
}

fn check(config: &Config) -> Result<()> {
    let repository = PostRepository::new(&config.posts_directory, LoadMode::Lenient);
    let snapshot = repository.load_all();
    for warning in snapshot.warnings() {
        println!("{}", warning);
    }
    if !snapshot.warnings().is_empty() {
        bail!(
            "{} problem(s) found in `{}`",
            snapshot.warnings().len(),
            config.posts_directory.display()
        );
    }
    println!("{} posts ok", snapshot.len());
    Ok(())
}
