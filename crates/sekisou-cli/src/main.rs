//! sekisou CLI.
//!
//! Operates on a persisted store image. Each invocation loads the image,
//! runs one command through the tier manager, and saves the image back if
//! the command changed anything.
//!
//! Usage:
//!   sekisou --image store.db put /docs/readme.md --from README.md
//!   sekisou --image store.db glob '**/*.md' --cwd /docs
//!   sekisou --image store.db find / --type f --size +1M
//!   sekisou --config sekisou.toml demote /big.bin cold

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use sekisou_kernel::search::{FindOptions, GlobOptions, find, glob};
use sekisou_kernel::vfs::{FileType, MkdirOptions, ReadDirOptions, RmOptions, Tier, VfsOps};
use sekisou_kernel::{Config, FsDb, MemoryFs, TieredFs, parse_size};

/// Tiered virtual filesystem store.
#[derive(Parser, Debug)]
#[command(name = "sekisou")]
#[command(about = "Tiered virtual filesystem store")]
struct Args {
    /// Config file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Store image; overrides `[store] image`
    #[arg(short, long, global = true)]
    image: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a file from a host file, or stdin
    Put {
        path: String,
        /// Host file to read instead of stdin
        #[arg(short, long)]
        from: Option<PathBuf>,
    },
    /// Print a file's contents
    Cat { path: String },
    /// List a directory
    Ls {
        #[arg(default_value = "/")]
        path: String,
        #[arg(short = 'R', long)]
        recursive: bool,
    },
    /// Create a directory
    Mkdir {
        path: String,
        /// Create missing parents
        #[arg(short, long)]
        parents: bool,
        /// Permission bits, in octal
        #[arg(short, long, value_parser = parse_mode)]
        mode: Option<u32>,
    },
    /// Remove a file or directory
    Rm {
        path: String,
        #[arg(short, long)]
        recursive: bool,
        #[arg(short, long)]
        force: bool,
    },
    /// Move or rename
    Mv { from: String, to: String },
    /// Copy a file
    Cp { from: String, to: String },
    /// Shrink or zero-extend a file
    Truncate {
        path: String,
        /// New size, e.g. 0, 4K, 1.5M
        #[arg(short, long, value_parser = parse_size)]
        size: u64,
    },
    /// Create a hard or symbolic link
    Ln {
        target: String,
        link: String,
        #[arg(short, long)]
        symbolic: bool,
    },
    /// Show metadata as JSON
    Stat {
        path: String,
        /// Describe a symlink itself rather than its target
        #[arg(long)]
        no_follow: bool,
    },
    /// Match paths against glob patterns
    Glob {
        #[arg(required = true)]
        patterns: Vec<String>,
        #[arg(long, default_value = "/")]
        cwd: String,
        /// Let wildcards match dotfiles
        #[arg(long)]
        dot: bool,
        #[arg(long)]
        nocase: bool,
        /// Maximum depth below cwd
        #[arg(long)]
        deep: Option<usize>,
        /// Directories only
        #[arg(long, conflicts_with = "all")]
        dirs: bool,
        /// Files and directories
        #[arg(long)]
        all: bool,
        #[arg(long)]
        absolute: bool,
        #[arg(long)]
        ignore: Vec<String>,
        /// Append `/` to directories
        #[arg(long)]
        mark: bool,
    },
    /// Search by name, type, size and time
    Find {
        #[arg(default_value = "/")]
        start: String,
        /// Basename glob
        #[arg(long, conflicts_with = "regex")]
        name: Option<String>,
        /// Basename regex
        #[arg(long)]
        regex: Option<String>,
        /// Case-insensitive name and prune matching
        #[arg(long)]
        nocase: bool,
        /// f, d or l
        #[arg(long = "type")]
        kind: Option<FileType>,
        /// e.g. +1M, -100K, 500B
        #[arg(long, allow_hyphen_values = true)]
        size: Option<String>,
        /// e.g. -7d, +30d
        #[arg(long, allow_hyphen_values = true)]
        mtime: Option<String>,
        #[arg(long, allow_hyphen_values = true)]
        ctime: Option<String>,
        #[arg(long, allow_hyphen_values = true)]
        atime: Option<String>,
        #[arg(long)]
        empty: bool,
        #[arg(long)]
        mindepth: Option<usize>,
        #[arg(long)]
        maxdepth: Option<usize>,
        #[arg(long)]
        prune: Vec<String>,
        /// Follow symlinks
        #[arg(short = 'L', long)]
        follow: bool,
        /// One JSON object per result
        #[arg(long)]
        json: bool,
    },
    /// Show where a file's payload lives
    Tier { path: String },
    /// Move a payload to a slower tier
    Demote { path: String, tier: Tier },
    /// Move a payload to a faster tier
    Promote {
        path: String,
        #[arg(default_value = "hot")]
        tier: Tier,
    },
    /// Finish or roll back interrupted migrations
    Reconcile,
}

impl Command {
    /// Whether the store image must be saved afterwards. Reads count since
    /// they may promote.
    fn mutates(&self) -> bool {
        !matches!(
            self,
            Command::Ls { .. }
                | Command::Stat { .. }
                | Command::Glob { .. }
                | Command::Find { .. }
                | Command::Tier { .. }
        )
    }
}

fn parse_mode(text: &str) -> Result<u32, String> {
    u32::from_str_radix(text.trim_start_matches("0o"), 8)
        .ok()
        .filter(|mode| *mode <= 0o7777)
        .ok_or_else(|| format!("invalid mode: {text:?}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let mut stdout = tokio::io::stdout();
    run(args, &mut stdout).await?;
    stdout.flush().await?;
    Ok(())
}

async fn run<W: AsyncWrite + Unpin>(args: Args, out: &mut W) -> Result<()> {
    let config = match &args.config {
        Some(path) => Config::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => Config::default(),
    };

    let image = args.image.clone().or_else(|| config.store.image.clone());
    let mut db = match &image {
        Some(path) => {
            Some(FsDb::open(path).with_context(|| format!("opening image {}", path.display()))?)
        }
        None => None,
    };
    let store = match &db {
        Some(db) => Arc::new(MemoryFs::load_from(db)?),
        None => Arc::new(MemoryFs::new()),
    };

    let mutates = args.command.mutates();
    if mutates && db.is_none() {
        tracing::warn!("no store image configured, changes will be discarded");
    }

    let tiered = config.tiered(store.clone());
    execute(&tiered, args.command, out).await?;

    if mutates {
        if let Some(db) = db.as_mut() {
            store.save_to(db)?;
        }
    }
    Ok(())
}

async fn emit<W: AsyncWrite + Unpin>(out: &mut W, line: &str) -> Result<()> {
    out.write_all(line.as_bytes()).await?;
    out.write_all(b"\n").await?;
    Ok(())
}

async fn execute<W: AsyncWrite + Unpin>(
    tiered: &TieredFs,
    command: Command,
    out: &mut W,
) -> Result<()> {
    let store = tiered.store();

    match command {
        Command::Put { path, from } => {
            let data = match from {
                Some(host) => tokio::fs::read(&host)
                    .await
                    .with_context(|| format!("reading {}", host.display()))?,
                None => {
                    let mut buf = Vec::new();
                    tokio::io::stdin().read_to_end(&mut buf).await?;
                    buf
                }
            };
            let tier = tiered.write_file(&path, &data).await?;
            emit(out, &format!("{path}: {} bytes on {tier}", data.len())).await?;
        }

        Command::Cat { path } => {
            let data = tiered.read_file(&path).await?;
            out.write_all(&data).await?;
        }

        Command::Ls { path, recursive } => {
            let entries = store.readdir(&path, ReadDirOptions { recursive }).await?;
            for entry in entries {
                let suffix = match entry.kind {
                    FileType::Directory => "/",
                    FileType::Symlink => "@",
                    FileType::File => "",
                };
                emit(out, &format!("{}{suffix}", entry.name)).await?;
            }
        }

        Command::Mkdir { path, parents, mode } => {
            let mut options = if parents {
                MkdirOptions::recursive()
            } else {
                MkdirOptions::default()
            };
            if let Some(mode) = mode {
                options = options.with_mode(mode);
            }
            store.mkdir(&path, options).await?;
        }

        Command::Rm { path, recursive, force } => {
            tiered.remove(&path, RmOptions { recursive, force }).await?;
        }

        Command::Mv { from, to } => tiered.rename(&from, &to).await?,

        Command::Cp { from, to } => {
            let data = tiered.read_file(&from).await?;
            tiered.write_file(&to, &data).await?;
        }

        Command::Truncate { path, size } => {
            let tier = tiered.truncate(&path, size).await?;
            emit(out, &format!("{path}: {size} bytes on {tier}")).await?;
        }

        Command::Ln { target, link, symbolic } => {
            if symbolic {
                store.symlink(&target, &link).await?;
            } else {
                store.link(&target, &link).await?;
            }
        }

        Command::Stat { path, no_follow } => {
            let stats = if no_follow {
                store.lstat(&path).await?
            } else {
                store.stat(&path).await?
            };
            emit(out, &serde_json::to_string_pretty(&stats)?).await?;
        }

        Command::Glob {
            patterns,
            cwd,
            dot,
            nocase,
            deep,
            dirs,
            all,
            absolute,
            ignore,
            mark,
        } => {
            let mut options = GlobOptions::default()
                .cwd(cwd)
                .dot(dot)
                .nocase(nocase)
                .only_files(!all)
                .only_directories(dirs)
                .absolute(absolute)
                .mark_directories(mark);
            if let Some(deep) = deep {
                options = options.deep(deep);
            }
            for pattern in ignore {
                options = options.ignore(pattern);
            }
            for path in glob(store.as_ref(), patterns.as_slice(), &options).await? {
                emit(out, &path).await?;
            }
        }

        Command::Find {
            start,
            name,
            regex,
            nocase,
            kind,
            size,
            mtime,
            ctime,
            atime,
            empty,
            mindepth,
            maxdepth,
            prune,
            follow,
            json,
        } => {
            let mut options = FindOptions::new(start)
                .nocase(nocase)
                .empty(empty)
                .follow_symlinks(follow);
            if let Some(pattern) = name {
                options = options.name(&pattern)?;
            }
            if let Some(pattern) = regex {
                options = options.name_regex(&pattern)?;
            }
            if let Some(kind) = kind {
                options = options.kind(kind);
            }
            if let Some(spec) = size {
                options = options.size(&spec)?;
            }
            if let Some(spec) = mtime {
                options = options.mtime(&spec)?;
            }
            if let Some(spec) = ctime {
                options = options.ctime(&spec)?;
            }
            if let Some(spec) = atime {
                options = options.atime(&spec)?;
            }
            if let Some(depth) = mindepth {
                options = options.mindepth(depth);
            }
            if let Some(depth) = maxdepth {
                options = options.maxdepth(depth);
            }
            for pattern in &prune {
                options = options.prune(pattern)?;
            }

            for result in find(store.as_ref(), &options).await? {
                if json {
                    emit(out, &serde_json::to_string(&result)?).await?;
                } else {
                    emit(out, &result.path).await?;
                }
            }
        }

        Command::Tier { path } => {
            let placement = tiered.placement(&path)?;
            emit(out, &format!("{path}: {} ({} bytes)", placement.tier, placement.size)).await?;
        }

        Command::Demote { path, tier } => {
            let landed = tiered.demote(&path, tier).await?;
            emit(out, &format!("{path}: {landed}")).await?;
        }

        Command::Promote { path, tier } => {
            let landed = tiered.promote(&path, tier).await?;
            emit(out, &format!("{path}: {landed}")).await?;
        }

        Command::Reconcile => {
            let report = tiered.reconcile().await?;
            emit(
                out,
                &format!(
                    "rolled forward: {}, rolled back: {}",
                    report.rolled_forward, report.rolled_back
                ),
            )
            .await?;
        }
    }

    Ok(())
}
