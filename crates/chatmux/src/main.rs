use std::env;
use std::fs;
use std::io::{self, Write as _};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, Context as _};
use chatmux::api::ApiClient;
use chatmux::settings::{load_config, unknown_keys};
use chatmux_core::config::{ConfigFile, Overrides, ServerCredentials};
use chatmux_core::paths::{compute_paths, ChatmuxPaths, PathInputs};
use chatmux_protocol::Chat;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use directories::BaseDirs;
use time::UtcOffset;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "chatmux",
    version,
    about = "chatmux: multi-pane terminal client for a self-hosted iMessage bridge"
)]
struct Cli {
    #[arg(long, global = true, value_name = "PATH", env = "CHATMUX_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, global = true, value_name = "DIR", env = "CHATMUX_DIR")]
    chatmux_dir: Option<PathBuf>,

    #[arg(long, global = true, value_name = "URL", env = "CHATMUX_SERVER_URL")]
    server_url: Option<String>,

    #[arg(
        long,
        global = true,
        value_name = "PASSWORD",
        env = "CHATMUX_PASSWORD",
        hide_env_values = true
    )]
    password: Option<String>,

    #[arg(long, global = true, env = "CHATMUX_LOG", value_name = "LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Multi-pane chat client (default)
    Tui,
    /// List conversations, most recent activity first
    Chats {
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Print a conversation's history, oldest first
    Messages {
        chat_guid: String,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Send one message
    Send { chat_guid: String, text: String },
    #[command(hide = true)]
    Ping,
    Version,
    Completion {
        #[command(subcommand)]
        command: CompletionCommand,
    },
}

#[derive(Subcommand, Debug)]
enum CompletionCommand {
    Bash,
    Fish,
    Powershell,
    Zsh,
}

fn main() -> ExitCode {
    // Must be read before any other thread exists.
    let utc_offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);

    let result = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("start tokio runtime")
        .and_then(|rt| rt.block_on(run(utc_offset)));

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(utc_offset: UtcOffset) -> anyhow::Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Tui);

    let paths = resolve_paths(cli.chatmux_dir.as_ref(), cli.config.as_ref())?;
    let cfg = load_config(&paths.config_file)
        .await?
        .with_overrides(Overrides {
            server_url: cli.server_url,
            password: cli.password,
            log_level: cli.log_level.clone(),
        });

    let enable_stderr_logging = !matches!(command, Command::Tui);
    init_logging(
        &paths,
        cli.log_level.as_deref(),
        cfg.log_level.as_deref(),
        enable_stderr_logging,
    )?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "chatmux starting");
    let unknown = unknown_keys(&cfg);
    if !unknown.is_empty() {
        tracing::warn!(keys = ?unknown, file = %paths.config_file.display(), "ignoring unknown config keys");
    }

    dispatch(command, &cfg, utc_offset).await
}

fn resolve_paths(
    chatmux_dir_override: Option<&PathBuf>,
    config_file_override: Option<&PathBuf>,
) -> anyhow::Result<ChatmuxPaths> {
    let base_dirs = BaseDirs::new().ok_or_else(|| anyhow!("could not determine home directory"))?;
    let home_dir = base_dirs.home_dir().to_path_buf();

    let xdg_config_home = match env::var_os("XDG_CONFIG_HOME") {
        Some(v) => Some(PathBuf::from(v)),
        None => Some(base_dirs.config_dir().to_path_buf()),
    };

    Ok(compute_paths(PathInputs {
        home_dir,
        xdg_config_home,
        chatmux_dir_override: chatmux_dir_override.cloned(),
        config_file_override: config_file_override.cloned(),
    }))
}

fn log_file_part(part: Option<&std::ffi::OsStr>, fallback: &str) -> String {
    part.and_then(|p| p.to_str())
        .unwrap_or(fallback)
        .to_owned()
}

fn init_logging(
    paths: &ChatmuxPaths,
    cli_level: Option<&str>,
    config_level: Option<&str>,
    enable_stderr_logging: bool,
) -> anyhow::Result<()> {
    let log_dir = paths.log_path.parent().unwrap_or(&paths.data_dir);
    let dir_ok = fs::create_dir_all(log_dir).is_ok();

    let level = cli_level
        .map(str::to_owned)
        .or_else(|| env::var("RUST_LOG").ok())
        .or_else(|| config_level.map(str::to_owned))
        .unwrap_or_else(|| "info".to_owned());

    let filter = EnvFilter::try_new(level).context("parse log level")?;

    let file_layer = if dir_ok {
        tracing_appender::rolling::RollingFileAppender::builder()
            .rotation(tracing_appender::rolling::Rotation::NEVER)
            .filename_prefix(log_file_part(paths.log_path.file_stem(), "chatmux"))
            .filename_suffix(log_file_part(paths.log_path.extension(), "log"))
            .build(log_dir)
            .ok()
            .map(|file_appender| {
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(file_appender)
            })
    } else {
        None
    };

    if enable_stderr_logging {
        let stderr_layer = tracing_subscriber::fmt::layer()
            .with_ansi(true)
            .with_writer(io::stderr);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .with(stderr_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .init();
    }

    Ok(())
}

async fn dispatch(command: Command, cfg: &ConfigFile, utc_offset: UtcOffset) -> anyhow::Result<()> {
    match command {
        Command::Version => version(),
        Command::Completion { command } => completion(command),
        Command::Tui => {
            let creds = credentials(cfg)?;
            chatmux::tui::run(cfg, &creds, utc_offset).await
        }
        Command::Chats { limit } => {
            let client = api_client(cfg)?;
            let limit = limit.unwrap_or_else(|| cfg.effective_chat_limit());
            chats(&client, limit, utc_offset).await
        }
        Command::Messages { chat_guid, limit } => {
            let client = api_client(cfg)?;
            let limit = limit.unwrap_or_else(|| cfg.effective_message_limit());
            messages(&client, &chat_guid, limit, utc_offset).await
        }
        Command::Send { chat_guid, text } => {
            let client = api_client(cfg)?;
            client.send_message(&chat_guid, &text).await?;
            println!("ok");
            Ok(())
        }
        Command::Ping => {
            let client = api_client(cfg)?;
            client.ping().await?;
            println!("ok");
            Ok(())
        }
    }
}

fn credentials(cfg: &ConfigFile) -> anyhow::Result<ServerCredentials> {
    Ok(cfg.server_credentials()?)
}

fn api_client(cfg: &ConfigFile) -> anyhow::Result<ApiClient> {
    let creds = credentials(cfg)?;
    ApiClient::new(&creds, cfg.effective_accept_invalid_certs())
}

async fn chats(client: &ApiClient, limit: usize, utc_offset: UtcOffset) -> anyhow::Result<()> {
    let chats = client.list_chats(limit).await?;
    if chats.is_empty() {
        println!("No chats");
        return Ok(());
    }

    let mut out = io::stdout().lock();
    for chat in chats {
        writeln!(out, "{}", format_chat_row(&chat, utc_offset)).context("write stdout")?;
    }
    Ok(())
}

fn format_chat_row(chat: &Chat, utc_offset: UtcOffset) -> String {
    match chat.last_message.as_deref() {
        Some(last) => format!(
            "{}\t{}\t{}\t{}",
            chat.guid,
            chat.label(),
            format_timestamp(last.date_created, utc_offset),
            last.body().replace('\n', " ")
        ),
        None => format!("{}\t{}", chat.guid, chat.label()),
    }
}

async fn messages(
    client: &ApiClient,
    chat_guid: &str,
    limit: usize,
    utc_offset: UtcOffset,
) -> anyhow::Result<()> {
    let messages = client.list_messages(chat_guid, limit).await?;
    if messages.is_empty() {
        println!("(No messages yet)");
        return Ok(());
    }

    let mut out = io::stdout().lock();
    for msg in messages {
        writeln!(
            out,
            "{} {}: {}",
            format_timestamp(msg.date_created, utc_offset),
            msg.sender_label(),
            msg.body()
        )
        .context("write stdout")?;
    }
    Ok(())
}

fn format_timestamp(ms: i64, utc_offset: UtcOffset) -> String {
    let format = time::macros::format_description!("[year]-[month]-[day] [hour]:[minute]");
    time::OffsetDateTime::from_unix_timestamp_nanos(i128::from(ms) * 1_000_000)
        .ok()
        .and_then(|t| t.to_offset(utc_offset).format(&format).ok())
        .unwrap_or_else(|| "-".to_owned())
}

fn version() -> anyhow::Result<()> {
    println!("{}", env!("CARGO_PKG_VERSION"));
    Ok(())
}

fn completion(command: CompletionCommand) -> anyhow::Result<()> {
    let shell = match command {
        CompletionCommand::Bash => Shell::Bash,
        CompletionCommand::Fish => Shell::Fish,
        CompletionCommand::Powershell => Shell::PowerShell,
        CompletionCommand::Zsh => Shell::Zsh,
    };

    let mut cmd = Cli::command();
    let mut buf = Vec::new();
    generate(shell, &mut cmd, "chatmux", &mut buf);
    match io::stdout().write_all(&buf) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        Err(err) => Err(err).context("write completion script to stdout"),
    }
}
