mod cli;

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::HumanBytes;
use sha2::{Digest, Sha256};

use cli::{Cli, Command};
use jrepack::config::{self, EntryCompression, RelocationConfig, RepackConfig};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let verbose = matches!(&cli.command, Command::Build { verbose: true, .. });

    let default_level = if verbose {
        "jrepack=info"
    } else {
        "jrepack=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(default_level.parse()?),
        )
        .with_target(false)
        .without_time()
        .init();

    match cli.command {
        Command::Build {
            inputs,
            output,
            relocate,
            exclude,
            filter_exclude,
            filter_include,
            strip_service_comments,
            store,
            config: config_file,
            verbose,
        } => {
            let project_config = match config_file {
                Some(path) => Some(config::load_config_file(&path)?),
                None => {
                    let cwd = std::env::current_dir().context("cannot determine working directory")?;
                    config::load_project_config(&cwd)?
                }
            };

            // file settings first, command line appended or overriding
            let mut settings = project_config.map(RepackConfig::from).unwrap_or_default();
            settings.inputs.extend(inputs);
            if let Some(output) = output {
                settings.destination = output;
            }
            settings
                .relocations
                .extend(relocate.iter().map(String::as_str).map(RelocationConfig::from_arg));
            settings.exclude.extend(exclude);
            settings.resource_excludes.extend(filter_exclude);
            settings.resource_includes.extend(filter_include);
            settings.strip_service_comments |= strip_service_comments;
            if store {
                settings.compression = EntryCompression::Stored;
            }
            settings.verbose |= verbose;

            if settings.inputs.is_empty() {
                anyhow::bail!(
                    "no inputs given. Pass them as arguments or list them in {}",
                    config::CONFIG_FILE
                );
            }

            run_build(&settings)?;
        }
        Command::List { archive } => {
            run_list(&archive)?;
        }
    }

    Ok(())
}

fn run_build(settings: &RepackConfig) -> Result<()> {
    let mut task = settings.to_task()?;
    let written = jrepack::repackage(&mut task)
        .with_context(|| format!("could not create repackaged jar '{}'", settings.destination.display()))?;

    let size = std::fs::metadata(&written)?.len();
    eprintln!(
        "Wrote {} ({}, sha256 {})",
        written.display(),
        HumanBytes(size),
        hash_file(&written)?
    );
    Ok(())
}

fn run_list(archive: &Path) -> Result<()> {
    let file = std::fs::File::open(archive).with_context(|| format!("cannot open {}", archive.display()))?;
    let mut zip = zip::ZipArchive::new(file).with_context(|| format!("cannot read {}", archive.display()))?;

    for i in 0..zip.len() {
        let entry = zip.by_index(i)?;
        println!("{:>10}  {}", entry.size(), entry.name());
    }
    Ok(())
}

/// First 16 hex digits of the file's SHA-256.
fn hash_file(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    let hash = format!("{:x}", hasher.finalize());
    Ok(hash[..16].to_string())
}
