use std::io::{self, Read, Write};
use std::process::ExitCode;
use clap::{Parser, Subcommand};
use log::{error, LevelFilter};
use michi::{FileAccess, FileOptions, GlobOptions, MichiConfig, MichiResult};

#[derive(Parser)]
#[command(name = "michi")]
#[command(about = "Inspect and copy files on local paths, gs:// and hdfs://")]
struct Args {
    /// Path to a JSON configuration file, the MICHI_* environment variables otherwise
    #[arg(short, long)]
    config: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print whether the path exists
    Exists { path: String },
    /// Write the content of the file to stdout
    Cat { path: String },
    /// Store stdin in the file
    Put { path: String },
    /// Print whether the path is a directory
    Isdir { path: String },
    /// List the names in a directory
    Ls { path: String },
    /// Print size, modification time and metadata
    Stat { path: String },
    /// Print the size in bytes
    Size { path: String },
    /// Print the paths matching a pattern such as gs://bucket/data/*.csv
    Glob { pattern: String },
}

fn load_config(path: Option<&str>) -> MichiResult<MichiConfig> {
    match path {
        None => Ok(MichiConfig::from_env()),
        Some(path) => {
            let access = FileAccess::new(&MichiConfig::default())?;
            let json = access.with_file(path, "r", &FileOptions::new(), |handle| handle.read_text())?;
            MichiConfig::from_json(&json)
                .map_err(|e| michi::MichiError::InvalidArgumentError(format!("{}: {}", path, e)))
        }
    }
}

fn run(args: Args) -> MichiResult<()> {
    let access = FileAccess::new(&load_config(args.config.as_deref())?)?;

    match args.command {
        Command::Exists { path } => println!("{}", access.path_exists(&path)?),
        Command::Cat { path } => {
            let mut handle = access.open_file(&path, "rb", &FileOptions::new())?;
            io::copy(&mut handle, &mut io::stdout().lock())
                .map_err(|e| michi::MichiError::BackendError(format!("{}: {}", path, e)))?;
            handle.close()?;
        }
        Command::Put { path } => {
            let mut content = Vec::new();
            io::stdin()
                .read_to_end(&mut content)
                .map_err(|e| michi::MichiError::BackendError(format!("stdin: {}", e)))?;
            access.with_file(&path, "wb", &FileOptions::new(), |handle| {
                handle.write_all(&content)
                    .map_err(|e| michi::MichiError::BackendError(format!("{}: {}", path, e)))
            })?;
        }
        Command::Isdir { path } => println!("{}", access.is_directory(&path)?),
        Command::Ls { path } => {
            for entry in access.list_entries(&path)? {
                println!("{}{}", entry.name, if entry.is_dir { "/" } else { "" });
            }
        }
        Command::Stat { path } => println!("{}", access.stat(&path)?),
        Command::Size { path } => println!("{}", access.file_size(&path)?),
        Command::Glob { pattern } => {
            for path in access.glob(&pattern, GlobOptions::default())?.into_strings() {
                println!("{}", path);
            }
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    env_logger::Builder::from_default_env()
        .filter_level(if args.verbose { LevelFilter::Debug } else { LevelFilter::Warn })
        .init();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("michi: {}", e);
            ExitCode::FAILURE
        }
    }
}
