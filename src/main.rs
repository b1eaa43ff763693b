use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::info;
use tracing_subscriber::EnvFilter;

use webdavfs::{
    Anonymous, CredentialProvider, Credentials, HttpStats, OpenFlags, ScopedCredentials,
    WebDavFileSystem, WebDavSettings,
};

const COPY_CHUNK: usize = 1024 * 1024;

#[derive(Parser)]
#[command(name = "webdavfs", about = "Work with files on WebDAV servers and storage boxes")]
struct Cli {
    /// Verbose per-request logging
    #[arg(long, global = true)]
    debug: bool,

    /// Print HTTP statistics as JSON when done
    #[arg(long, global = true)]
    stats: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List every file below a directory
    Ls { directory: String },
    /// Expand a wildcard URL
    Glob { pattern: String },
    /// Upload a local file
    Put { local: PathBuf, remote: String },
    /// Download a remote file
    Get { remote: String, local: PathBuf },
    /// Create a directory
    Mkdir {
        #[arg(short, long)]
        parents: bool,
        directory: String,
    },
    /// Delete a file or directory
    Rm { path: String },
    /// Move or rename
    Mv { source: String, target: String },
    /// Show whether a path is a file or a directory
    Stat { path: String },
    /// Set a custom property on a resource
    Propset {
        path: String,
        name: String,
        value: String,
    },
}

fn credential_provider() -> Arc<dyn CredentialProvider> {
    let Some(credentials) = Credentials::from_env() else {
        return Arc::new(Anonymous);
    };
    let scopes: Vec<String> = std::env::var("WEBDAV_SCOPE")
        .unwrap_or_default()
        .split(',')
        .map(|scope| scope.trim().to_string())
        .filter(|scope| !scope.is_empty())
        .collect();
    let mut store = ScopedCredentials::new();
    store.insert(scopes, credentials);
    Arc::new(store)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut settings = WebDavSettings::from_env()?;
    settings.debug_logging |= cli.debug;

    let default_filter = if settings.debug_logging {
        "webdavfs=debug"
    } else {
        "webdavfs=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let stats = Arc::new(HttpStats::new());
    let fs = WebDavFileSystem::new(settings, credential_provider())?.with_stats(stats.clone());

    let outcome = run(&fs, cli.command).await;

    if cli.stats {
        println!("{}", serde_json::to_string_pretty(&stats.snapshot())?);
    }
    outcome
}

async fn run(fs: &WebDavFileSystem, command: Command) -> Result<()> {
    match command {
        Command::Ls { directory } => {
            let found = fs
                .list_files(&directory, |path| println!("{}", path))
                .await?;
            if !found {
                info!("No files below {}", directory);
            }
        }
        Command::Glob { pattern } => {
            for path in fs.glob(&pattern).await? {
                println!("{}", path);
            }
        }
        Command::Put { local, remote } => upload(fs, &local, &remote).await?,
        Command::Get { remote, local } => download(fs, &remote, &local).await?,
        Command::Mkdir { parents, directory } => {
            if parents {
                fs.create_directory_recursive(&directory).await?;
            } else {
                fs.create_directory(&directory).await?;
            }
        }
        Command::Rm { path } => {
            if fs.is_directory(&path).await? {
                fs.remove_directory(&path).await?;
            } else {
                fs.remove_file(&path).await?;
            }
        }
        Command::Mv { source, target } => fs.move_file(&source, &target).await?,
        Command::Stat { path } => {
            let kind = if fs.is_directory(&path).await? {
                "directory"
            } else if fs.exists(&path).await? {
                let handle = fs.open(&path, OpenFlags::READ).await?;
                println!("size: {}", handle.file_size());
                "file"
            } else {
                "missing"
            };
            println!("{}: {}", path, kind);
        }
        Command::Propset { path, name, value } => fs.set_property(&path, &name, &value).await?,
    }
    Ok(())
}

async fn upload(fs: &WebDavFileSystem, local: &Path, remote: &str) -> Result<()> {
    let mut source = tokio::fs::File::open(local)
        .await
        .with_context(|| format!("opening {}", local.display()))?;
    let mut handle = fs.open(remote, OpenFlags::WRITE).await?;
    let mut chunk = vec![0u8; COPY_CHUNK];
    let mut offset = 0u64;
    loop {
        let read = source.read(&mut chunk).await?;
        if read == 0 {
            break;
        }
        handle.write(&chunk[..read], offset).await?;
        offset += read as u64;
    }
    handle.close().await?;
    info!("Uploaded {} bytes to {}", offset, remote);
    Ok(())
}

async fn download(fs: &WebDavFileSystem, remote: &str, local: &Path) -> Result<()> {
    let mut handle = fs.open(remote, OpenFlags::READ).await?;
    let mut target = tokio::fs::File::create(local)
        .await
        .with_context(|| format!("creating {}", local.display()))?;
    let mut chunk = vec![0u8; COPY_CHUNK];
    let mut offset = 0u64;
    while offset < handle.file_size() {
        let read = handle.read(&mut chunk, offset).await?;
        if read == 0 {
            break;
        }
        target.write_all(&chunk[..read]).await?;
        offset += read as u64;
    }
    target.flush().await?;
    info!("Downloaded {} bytes from {}", offset, remote);
    Ok(())
}
