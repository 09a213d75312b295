use anyhow::Context;
use bazaar_dm::{Message, MessagingClient, MessagingConfig, UpdateSource, ViewEvent};
use bazaar_store::{to_row, RemoteStore, SqliteStore, Table};
use clap::Parser;
use futures::StreamExt;
use std::collections::HashSet;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// SQLite database shared by every participant
    #[arg(short, long, default_value = "chat.db")]
    db: PathBuf,

    /// User id to sign in as
    #[arg(short, long)]
    user: String,

    /// User id of the other participant
    #[arg(short, long)]
    peer: String,

    /// Optional JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => MessagingConfig::from_json_file(path)?,
        None => MessagingConfig::default(),
    };

    let backend = SqliteStore::open(&args.db)
        .await
        .with_context(|| format!("Failed to open {}", args.db.display()))?;
    for user_id in [&args.user, &args.peer] {
        ensure_profile(&backend, user_id).await?;
    }

    let store = backend.client();
    store.sign_in(args.user.as_str());
    let client = MessagingClient::new(Arc::new(store), config);

    let conversation_id = client
        .get_or_create_direct_conversation(&args.peer)
        .await?;
    let (mut view, mut events) = client.open_conversation(&conversation_id).await?;

    println!("Chatting with {} as {}", args.peer, args.user);
    println!("Commands: /list, /unread, /search <name>, /quit");
    println!("Messages from other processes arrive through the poll.");

    let mut printed: HashSet<String> = HashSet::new();
    let mut stdin = BufReader::new(tokio::io::stdin());
    let mut line = String::new();

    loop {
        tokio::select! {
            event = events.next() => {
                let Some(event) = event else { break };
                match event {
                    ViewEvent::Ready { messages } => {
                        print_new(&messages, &args.user, &mut printed);
                    }
                    ViewEvent::MessagesUpdated { messages, source } => {
                        if source != UpdateSource::Local {
                            print_new(&messages, &args.user, &mut printed);
                        }
                    }
                    ViewEvent::SendFailed { draft, error } => {
                        eprintln!("\n✗ Not sent ({}): {}", error, draft);
                    }
                    ViewEvent::Closed => break,
                }
                prompt();
            }

            read = stdin.read_line(&mut line) => {
                if read? == 0 {
                    break;
                }
                let input = line.trim().to_string();
                line.clear();

                if let Some(command) = input.strip_prefix('/') {
                    if !handle_command(command, &client).await {
                        break;
                    }
                } else if !input.is_empty() {
                    match view.send_message(&input).await {
                        Ok(record) => {
                            printed.insert(record.id);
                        }
                        Err(e) => eprintln!("Send failed: {}", e),
                    }
                }
                prompt();
            }
        }
    }

    view.close().await;
    println!("Bye");
    Ok(())
}

async fn ensure_profile(store: &SqliteStore, user_id: &str) -> anyhow::Result<()> {
    let row = to_row(&serde_json::json!({"id": user_id, "username": user_id}))?;
    store.upsert(Table::Profiles, row, &["id"]).await?;
    Ok(())
}

fn print_new(messages: &[Message], me: &str, printed: &mut HashSet<String>) {
    for message in messages.iter().filter(|m| !m.is_pending()) {
        if printed.insert(message.id().to_string()) {
            let who = if message.sender_id() == me {
                "you"
            } else {
                message.sender_id()
            };
            println!(
                "\n[{}] {}: {}",
                message.created_at().format("%H:%M:%S"),
                who,
                message.content()
            );
        }
    }
}

fn prompt() {
    print!("> ");
    let _ = io::stdout().flush();
}

/// Returns false when the user asked to quit
async fn handle_command(command: &str, client: &MessagingClient) -> bool {
    let parts: Vec<&str> = command.split_whitespace().collect();

    match parts.first() {
        Some(&"quit") => return false,
        Some(&"list") => match client.list_conversations().await {
            Ok(conversations) => {
                for c in conversations {
                    let last = c
                        .last_message
                        .as_ref()
                        .map(|m| m.content.as_str())
                        .unwrap_or("(no messages)");
                    println!("{:>3} unread  {:<16} {}", c.unread_count, c.other_user.username, last);
                }
            }
            Err(e) => eprintln!("Failed to list conversations: {}", e),
        },
        Some(&"unread") => match client.total_unread().await {
            Ok(count) => println!("{} unread", count),
            Err(e) => eprintln!("Failed to count unread: {}", e),
        },
        Some(&"search") => {
            if parts.len() < 2 {
                println!("Usage: /search <name>");
                return true;
            }
            match client.search_users(&parts[1..].join(" ")).await {
                Ok(profiles) => {
                    for p in profiles {
                        println!("{} ({})", p.username, p.id);
                    }
                }
                Err(e) => eprintln!("Search failed: {}", e),
            }
        }
        _ => println!("Unknown command: /{}", command),
    }
    true
}
