//! Stream one chat reply from a running dashboard backend.
//!
//! Run with:
//! ```bash
//! export DASHSTREAM_BASE_URL="http://localhost:3000"
//! cargo run --example chat_stream -- "What broke in last night's build?"
//! ```
//!
//! Press Ctrl-C to cancel mid-stream.

use std::io::Write;

use dashstream::{Callbacks, CancelToken, ChatRequest, HttpOptions, Outcome, StreamClient};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let message = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "Summarize my open Jira tickets.".to_string());

    let client = StreamClient::new(HttpOptions::from_env()?)?;

    let cancel = CancelToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    let callbacks = Callbacks::new()
        .on_status(|message, provider| {
            eprintln!("[{}] {}", provider.unwrap_or("-"), message);
        })
        .on_chunk(|delta, _full| {
            print!("{delta}");
            let _ = std::io::stdout().flush();
        });

    match client.chat(&ChatRequest::new(message), callbacks, &cancel).await {
        Ok(Outcome::Complete(reply)) => {
            println!("\n\n=== Complete ({}) ===", reply.provider.as_deref().unwrap_or("unknown"));
        }
        Ok(Outcome::Partial(transcript)) => {
            println!("\n\n=== Stream closed early ({} chars) ===", transcript.full_content.len());
        }
        Ok(Outcome::Cancelled) => println!("\n\n=== Cancelled ==="),
        Err(e) => {
            eprintln!("\nError in stream: {}", e);
            return Err(e.into());
        }
    }

    Ok(())
}
