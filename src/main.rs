//! CLI entry point for `mailferry`.

use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand};

use mailferry::config::Config;
use mailferry::dedup::DedupIndex;
use mailferry::fetch::{self, FetchEvent, FetchOptions, FetchStats, OnError};
use mailferry::sink::{self, MailboxFormat};
use mailferry::source::{spool, SpoolSource};
use mailferry::transcribe::{self, Transcribed};

#[derive(Parser)]
#[command(name = "mailferry", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output (-v progress and info logs, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch messages from a spool into a local mailbox
    Fetch {
        /// Spool directory with one JSON file per remote item
        spool: PathBuf,
        /// Local mailbox (mbox file or MH folder)
        mailbox: PathBuf,
        /// Fetch at most N messages
        #[arg(short, long, value_name = "N")]
        limit: Option<usize>,
        /// Fetch read messages too
        #[arg(short, long)]
        all: bool,
        /// Do not mark fetched messages as read
        #[arg(long)]
        no_mark: bool,
        /// Transcribe only; write nothing and mark nothing read
        #[arg(short, long)]
        pretend: bool,
        /// Skip messages whose Message-ID is already in the mailbox
        #[arg(short = 'd', long)]
        check_dupes: bool,
        /// Log failing messages and continue with the rest
        #[arg(short, long)]
        keep_going: bool,
        /// Mailbox format
        #[arg(short, long, value_enum)]
        format: Option<MailboxFormat>,
    },
    /// Transcribe one spool item and print the resulting message
    Show {
        /// A spool item (`<item-id>.json`)
        item: PathBuf,
    },
    /// List the Message-IDs stored in a mailbox
    Ids {
        mailbox: PathBuf,
        #[arg(short, long, value_enum)]
        format: Option<MailboxFormat>,
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Config problems are reported on stderr before the full logging setup,
    // which itself depends on the config.
    let config = tracing::subscriber::with_default(
        early_subscriber(),
        mailferry::config::load_config,
    );

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    let verbose = cli.verbose > 0;

    match cli.command {
        Commands::Fetch {
            spool,
            mailbox,
            limit,
            all,
            no_mark,
            pretend,
            check_dupes,
            keep_going,
            format,
        } => {
            let mut options = config.fetch.to_options();
            if limit.is_some() {
                options.limit = limit;
            }
            options.unread_only &= !all;
            options.mark_read &= !no_mark;
            options.pretend = pretend;
            options.check_dupes |= check_dupes;
            if keep_going {
                options.on_error = OnError::Continue;
            }
            let format = format.unwrap_or(config.mailbox.format);
            cmd_fetch(&spool, &mailbox, format, &options, verbose)
        }
        Commands::Show { item } => cmd_show(&item),
        Commands::Ids {
            mailbox,
            format,
            json,
        } => cmd_ids(&mailbox, format.unwrap_or(config.mailbox.format), json),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Stderr-only subscriber used while the config is loaded.
fn early_subscriber() -> impl tracing::Subscriber + Send + Sync + 'static {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(env_filter)
        .finish()
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_path = mailferry::config::log_file_path(config);
    let log_dir = log_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "mailferry.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Run one fetch pass and, in verbose mode, report on it.
fn cmd_fetch(
    spool: &Path,
    mailbox: &Path,
    format: MailboxFormat,
    options: &FetchOptions,
    verbose: bool,
) -> anyhow::Result<()> {
    let mut source = SpoolSource::open(spool)?;
    let mut sink = sink::open_sink(mailbox, format)?;

    let stats = fetch::run(&mut source, sink.as_mut(), options, &mut |event| {
        print_event(&event, verbose)
    })?;

    if verbose {
        print_summary(source.dir(), mailbox, options, &stats);
    }
    Ok(())
}

fn print_event(event: &FetchEvent<'_>, verbose: bool) {
    match event {
        FetchEvent::Failed { item, error } => {
            eprintln!("Failed to fetch {}: {error}", item.display_id());
        }
        _ if !verbose => {}
        FetchEvent::Fetching { index, total, item } => {
            println!("Fetching message {index} of {total}: {}", item.display_id());
        }
        FetchEvent::Duplicate { message_id, .. } => {
            println!("  already in mailbox: {message_id}");
        }
        FetchEvent::Skipped { .. } => {
            println!("  no headers, skipped");
        }
        FetchEvent::Appended { .. } => {}
    }
}

fn print_summary(spool: &Path, mailbox: &Path, options: &FetchOptions, stats: &FetchStats) {
    use humansize::{format_size, BINARY};

    println!();
    if options.pretend {
        println!("  Dry run, nothing was written:");
    } else {
        println!("  Fetch complete:");
    }
    println!("  {:<25} {}", "Messages listed", stats.listed);
    println!("  {:<25} {}", "Transcribed", stats.transcribed);
    println!("  {:<25} {}", "Appended", stats.appended);
    if options.check_dupes {
        println!("  {:<25} {}", "Duplicates skipped", stats.duplicates);
    }
    if stats.skipped > 0 {
        println!("  {:<25} {}", "Without headers", stats.skipped);
    }
    if stats.failed > 0 {
        println!("  {:<25} {}", "Failed", stats.failed);
    }
    if stats.attachments_skipped > 0 {
        println!(
            "  {:<25} {}",
            "Item attachments dropped", stats.attachments_skipped
        );
    }
    println!("  {:<25} {}", "Marked read", stats.marked_read);
    println!(
        "  {:<25} {}",
        "Bytes written",
        format_size(stats.bytes_written, BINARY)
    );
    println!("  {:<25} {}", "Spool", spool.display());
    println!("  {:<25} {}", "Mailbox", mailbox.display());
    println!();
}

/// Transcribe a single spool item and print it.
fn cmd_show(item: &Path) -> anyhow::Result<()> {
    let msg = spool::load_item(item)?;
    match transcribe::transcribe(&msg)? {
        Transcribed::Document(transcript) => {
            let bytes = mailferry::render::to_bytes(&transcript.document)?;
            std::io::Write::write_all(&mut std::io::stdout(), &bytes)?;
        }
        Transcribed::Skip => {
            anyhow::bail!("{}: item has no headers", item.display());
        }
    }
    Ok(())
}

/// Print the duplicate index of a mailbox.
fn cmd_ids(mailbox: &Path, format: MailboxFormat, json: bool) -> anyhow::Result<()> {
    if !mailbox.exists() {
        anyhow::bail!("Mailbox not found: {}", mailbox.display());
    }
    let sink = sink::open_sink(mailbox, format)?;
    let index = DedupIndex::load(sink.as_ref())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&index.sorted())?);
    } else {
        for id in index.sorted() {
            println!("{id}");
        }
    }
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mailferry", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}
