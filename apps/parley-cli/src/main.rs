//! Parley terminal client entry point.

mod commands;
mod config;
mod transcript;

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use parley_connection::{ConnectionEvent, ConnectionManager, ConnectionState};
use parley_protocol::MessageType;
use parley_protocol::events::{
    ChatMessage, Conversation, PresencePayload, ReceiptUpdate, StoppedTypingPayload,
    TypingPayload,
};

use crate::commands::Command;
use crate::transcript::Transcript;

#[derive(Parser)]
#[command(name = "parley")]
#[command(version, about = "Terminal client for the Parley chat event stream", long_about = None)]
struct Cli {
    /// Access token (default: `token` from the config file)
    #[arg(long, short, value_name = "TOKEN")]
    token: Option<String>,

    /// Chat server base URL (default: PARLEY_SERVER_URL or the config file)
    #[arg(long, short, value_name = "URL")]
    server: Option<String>,

    /// Config file path (default: ~/.config/parley/client.toml)
    #[arg(long, short, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Your user id, used to label direct conversations (default: `user_id`
    /// from the config file, else learned from your first sent message)
    #[arg(long, value_name = "ID")]
    user_id: Option<String>,

    /// Acknowledge incoming messages automatically
    #[arg(long)]
    auto_ack: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so they do not interleave with chat output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting parley");

    let path = match cli.config {
        Some(p) => p,
        None => config::default_path()?,
    };
    let mut app_config = match config::AppConfig::load(&path) {
        Ok(c) => {
            tracing::info!(path = %path.display(), "configuration loaded");
            c
        }
        Err(e) => {
            tracing::warn!(error = %format!("{e:#}"), "failed to load config, using defaults");
            config::AppConfig::default()
        }
    };
    app_config.apply_server_overrides(std::env::var(config::SERVER_URL_ENV).ok(), cli.server);

    let token = cli
        .token
        .or_else(|| app_config.token.clone())
        .context("no access token: pass --token or set `token` in the config file")?;
    let auto_ack = cli.auto_ack || app_config.auto_ack;
    let transcript = Transcript::new(cli.user_id.or(app_config.user_id));

    let manager = ConnectionManager::new(app_config.connection);
    register_printers(&manager, transcript, auto_ack);
    let mut events = manager
        .take_events()
        .context("connection events already taken")?;

    manager.connect(&token);
    println!("{}", commands::HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break;
            }
            Some(event) = events.recv() => report(&event),
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match commands::parse(&line) {
                    Ok(Some(Command::Quit)) => break,
                    Ok(Some(command)) => execute(&manager, command),
                    Ok(None) => {}
                    Err(e) => eprintln!("{e}"),
                }
            }
        }
    }

    manager.disconnect();
    Ok(())
}

fn execute(manager: &ConnectionManager, command: Command) {
    match command {
        Command::Send {
            conversation_type,
            target_id,
            text,
        } => manager.send_message(&text, &target_id, conversation_type),
        Command::Typing {
            conversation_type,
            target_id,
            is_typing,
        } => manager.send_typing(&target_id, conversation_type, is_typing),
        Command::Delivered { message_id } => manager.mark_delivered(&message_id),
        Command::Status => {
            println!(
                "state: {} (queued: {}, reconnect attempts: {})",
                describe(&manager.state()),
                manager.queued_len(),
                manager.reconnect_attempts()
            );
        }
        Command::Help => println!("{}", commands::HELP),
        Command::Quit => {}
    }
}

/// Prints server push events as they arrive.
fn register_printers(manager: &ConnectionManager, transcript: Transcript, auto_ack: bool) {
    let transcript = Arc::new(Mutex::new(transcript));

    let (log, acker) = (transcript.clone(), manager.clone());
    manager.on_typed(MessageType::NewMessage, move |msg: ChatMessage| {
        let line = log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(&msg, false);
        if let Some(line) = line {
            println!("{line}");
            if auto_ack {
                acker.mark_delivered(&msg.id);
            }
        }
    });
    manager.on_typed(MessageType::MessageSent, move |msg: ChatMessage| {
        let line = transcript
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(&msg, true);
        if let Some(line) = line {
            println!("{line} (sent {})", msg.id);
        }
    });
    manager.on_typed(MessageType::UserTyping, |p: TypingPayload| {
        let who = if p.username.is_empty() { &p.user_id } else { &p.username };
        println!("* {who} is typing in {} {}", p.conversation_type, p.target_id);
    });
    manager.on_typed(MessageType::UserStoppedTyping, |p: StoppedTypingPayload| {
        println!("* {} stopped typing in {} {}", p.user_id, p.conversation_type, p.target_id);
    });
    manager.on_typed(MessageType::ReceiptUpdate, |r: ReceiptUpdate| {
        println!("* {} {:?} by {}", r.message_id, r.status, r.user_id);
    });
    manager.on_typed(MessageType::UserOnline, |p: PresencePayload| {
        println!("* {} is online", p.user_id);
    });
    manager.on_typed(MessageType::UserOffline, |p: PresencePayload| {
        println!("* {} went offline", p.user_id);
    });
    manager.on_typed(MessageType::ConversationCreated, |c: Conversation| {
        let name = if c.target_name.is_empty() { &c.target_id } else { &c.target_name };
        println!("* new {} conversation with {name}", c.conversation_type);
    });
}

fn report(event: &ConnectionEvent) {
    match event {
        ConnectionEvent::StateChanged(state) => eprintln!("-- {}", describe(state)),
        ConnectionEvent::QueueOverflow { dropped } => {
            eprintln!("-- outbound queue full, dropped {dropped} message(s)");
        }
        ConnectionEvent::GaveUp { attempts } => {
            eprintln!("-- gave up after {attempts} reconnect attempts; restart to retry");
        }
        // Already visible through the Reconnecting state.
        ConnectionEvent::Reconnecting { .. } => {}
    }
}

fn describe(state: &ConnectionState) -> String {
    match state {
        ConnectionState::Disconnected => "disconnected".into(),
        ConnectionState::Connecting => "connecting".into(),
        ConnectionState::Connected => "connected".into(),
        ConnectionState::Reconnecting { attempt, delay } => {
            format!("reconnecting (attempt {attempt} in {} ms)", delay.as_millis())
        }
        ConnectionState::GaveUp => "gave up".into(),
    }
}
