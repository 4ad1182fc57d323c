use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "jrepack",
    version,
    about = "Merge JVM archives into one jar with relocated packages"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Build a repackaged jar from class directories, jars and loose files
    Build {
        /// Inputs in merge order; appended after the inputs from jrepack.toml
        inputs: Vec<PathBuf>,

        /// Output jar path [default: build/repack/repackaged.jar]
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Relocate a package, as `from` or `from=to` (default target: hidden.<from>)
        #[arg(short, long, value_name = "FROM[=TO]")]
        relocate: Vec<String>,

        /// Drop classes matching a class-name pattern such as com.acme.internal.**
        #[arg(short, long)]
        exclude: Vec<String>,

        /// Drop resources matching a path glob
        #[arg(long)]
        filter_exclude: Vec<String>,

        /// Keep only resources matching a path glob
        #[arg(long)]
        filter_include: Vec<String>,

        /// Remove comments from merged service files
        #[arg(long)]
        strip_service_comments: bool,

        /// Store entries without compression
        #[arg(long)]
        store: bool,

        /// Config file to use instead of ./jrepack.toml
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Log every entry as it is processed
        #[arg(short, long)]
        verbose: bool,
    },

    /// List the entries of an archive
    List {
        /// Archive to inspect
        archive: PathBuf,
    },
}
