//! CLI commands and argument parsing.

pub mod archive;
pub mod build;
pub mod serve;
pub mod tags;

use clap::{Parser, Subcommand};

/// monoreg - Terraform module registry serving a git monorepo
#[derive(Parser)]
#[command(name = "monoreg")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Serve the registry protocol
    Serve(serve::ServeArgs),

    /// Precompute every module archive into an asset cache
    Build(build::BuildArgs),

    /// List tags and the commits they resolve to
    Tags(tags::TagsArgs),

    /// Write one module archive to a file
    Archive(archive::ArchiveArgs),

    /// Print version information
    Version,
}
