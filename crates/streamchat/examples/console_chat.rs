//! Interactive console chat against a streaming backend.
//!
//! Run with: cargo run -p streamchat --example console_chat [-- config.toml]
//!
//! The endpoint defaults to ws://127.0.0.1:8000/ws and can be overridden with
//! STREAMCHAT_WS_URL. Set RUST_LOG=streamchat_net=debug to watch the
//! connection manager at work.
//!
//! Commands: `/status` prints the connection status, `/quit` exits, and a
//! bare number picks one of the suggested questions.

use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Notify;
use tracing_subscriber::EnvFilter;

use streamchat::prelude::*;

fn print_suggestions(message: &ChatMessage) {
    for (i, question) in message.suggested_questions.iter().enumerate() {
        println!("  [{}] {question}", i + 1);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => ChatConfig::load(path)?,
        None => ChatConfig::default(),
    }
    .with_env_overrides();

    let manager = Arc::new(ConnectionManager::new(config.connection_config()?));
    let conversation = Arc::new(Conversation::new(manager.clone(), &config.conversation));
    println!("Connecting to {}", manager.url());

    // Print only the part of the answer not shown yet.
    let printed = Arc::new(Mutex::new(String::new()));
    {
        let weak = Arc::downgrade(&conversation);
        let printed = printed.clone();
        conversation.message_updated().connect(move |id| {
            let Some(message) = weak.upgrade().and_then(|c| c.message(id)) else {
                return;
            };
            let mut printed = printed.lock();
            match message.content.strip_prefix(printed.as_str()) {
                Some(delta) => print!("{delta}"),
                None => print!("\n{}", message.content),
            }
            let _ = std::io::stdout().flush();
            *printed = message.content;
        });
    }

    let finished = Arc::new(Notify::new());
    {
        let weak = Arc::downgrade(&conversation);
        let finished = finished.clone();
        conversation.response_finished().connect(move |id| {
            println!();
            if let Some(message) = weak.upgrade().and_then(|c| c.message(id)) {
                print_suggestions(&message);
            }
            finished.notify_one();
        });
    }

    let messages = conversation.messages();
    let greeting = &messages[0];
    println!("{}", greeting.content);
    print_suggestions(greeting);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();

        match line {
            "" => continue,
            "/quit" => break,
            "/status" => {
                println!("{:?}", manager.status().await?);
                continue;
            }
            _ => {}
        }

        // A bare number picks a suggestion from the latest message offering some.
        let picked = line.parse::<usize>().ok().and_then(|n| {
            conversation
                .messages()
                .into_iter()
                .rev()
                .find(|m| !m.suggested_questions.is_empty())
                .and_then(|m| {
                    let question = m.suggested_questions.get(n.checked_sub(1)?)?.clone();
                    Some((m.id, question))
                })
        });

        printed.lock().clear();
        let submitted = match picked {
            Some((id, question)) => {
                println!("> {question}");
                conversation.submit_suggestion(&id, question)
            }
            None => conversation.submit(line),
        };
        match submitted {
            Ok(_) => finished.notified().await,
            Err(err) => println!("! {err}"),
        }
    }

    manager.disconnect();
    Ok(())
}
