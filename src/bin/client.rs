//! Chat client binary.
//!
//! Usage: client <host> <port> <username>
//!
//! Prompts for the password on stdin, authenticates (offering
//! registration when the user is unknown), then enters the chat loop.
//!
//! Commands: /quit (or /q), /clear, /help. Anything else is sent to the
//! room.

use std::env;
use std::io::Write as _;
use std::process::ExitCode;

use tokio::io::{AsyncBufReadExt, BufReader};

use srpchat::client::{ChatEvent, Connector};
use srpchat::Error;

fn parse_args(args: &[String]) -> Option<(String, u16, String)> {
    if args.len() != 4 {
        return None;
    }
    let port: u16 = args[2].parse().ok()?;
    Some((args[1].clone(), port, args[3].clone()))
}

fn prompt(label: &str) -> std::io::Result<String> {
    print!("{}", label);
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_owned())
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let args: Vec<String> = env::args().collect();
    let Some((host, port, username)) = parse_args(&args) else {
        eprintln!("usage: client <host> <port> <username>");
        return ExitCode::from(2);
    };

    match run(&host, port, &username).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(host: &str, port: u16, username: &str) -> anyhow::Result<()> {
    let password = prompt("Password: ")?;

    println!("Connecting to {}:{}...", host, port);
    let mut connector = Connector::dial(host, port).await?;

    println!("Authenticating...");
    let authenticated = match connector.authenticate(username, &password).await {
        Ok(a) => a,
        Err(Error::UserNotFound) => {
            let answer = prompt("User not found. Register? (y/n): ")?;
            if !matches!(answer.as_str(), "y" | "Y") {
                anyhow::bail!("authentication cancelled");
            }
            let confirm = prompt("Confirm password: ")?;
            if confirm != password {
                anyhow::bail!("passwords do not match");
            }
            connector.register(username, &password).await?;
            println!("Registration complete! Now authenticating...");
            connector.authenticate(username, &password).await?
        }
        Err(e) => return Err(e.into()),
    };

    let client = connector.into_client(authenticated, username);
    let (mut events, mut sender) = client.split();
    println!("Authentication successful! Joined the chat");
    let names: Vec<&str> = events.users().iter().map(|u| u.username.as_str()).collect();
    println!("Online users: {}", names.join(", "));
    for entry in events.history().snapshot() {
        print_message(username, &entry.username, &entry.text, entry.timestamp_ms);
    }
    println!("\nType /help for commands\n");

    // Receive loop in its own task so neither side blocks the other.
    let (closed_tx, mut closed_rx) = tokio::sync::watch::channel(false);
    let own_name = username.to_owned();
    let receiver = tokio::spawn(async move {
        loop {
            match events.next_event().await {
                Ok(ChatEvent::Message {
                    username: from,
                    text,
                    timestamp_ms,
                }) => print_message(&own_name, &from, &text, timestamp_ms),
                Ok(ChatEvent::UserJoined { username: who, .. }) => {
                    println!("\x1b[33m*** {} joined the chat ***\x1b[0m", who);
                }
                Ok(ChatEvent::UserLeft { username: who }) => {
                    println!("\x1b[31m*** {} left the chat ***\x1b[0m", who);
                }
                Ok(ChatEvent::ServerError { message }) => {
                    eprintln!("Error from server: {}", message);
                    break;
                }
                Ok(ChatEvent::Disconnected) => {
                    println!("Connection closed by server");
                    break;
                }
                Err(e) => {
                    eprintln!("Connection lost: {}", e);
                    break;
                }
            }
        }
        let _ = closed_tx.send(true);
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = closed_rx.changed() => break,
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match line.trim() {
                    "" => {}
                    "/quit" | "/q" => break,
                    "/clear" => {
                        print!("\x1b[2J\x1b[H");
                        std::io::stdout().flush()?;
                    }
                    "/help" => {
                        println!("\nCommands:");
                        println!("  /quit, /q  - Quit the chat");
                        println!("  /clear     - Clear the screen");
                        println!("  /help      - Show this help\n");
                    }
                    text => {
                        if let Err(e) = sender.send_message(text).await {
                            eprintln!("send failed: {}", e);
                            break;
                        }
                    }
                }
            }
        }
    }

    sender.disconnect().await.ok();
    receiver.abort();
    Ok(())
}

fn print_message(own_username: &str, from: &str, text: &str, timestamp_ms: i64) {
    let clock = chrono::DateTime::from_timestamp_millis(timestamp_ms)
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".into());

    let color = if from == own_username { "\x1b[32m" } else { "\x1b[36m" };
    println!("[{}] {}{}\x1b[0m: {}", clock, color, from, text);
}
