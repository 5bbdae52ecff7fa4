//! Terminal viewer for a mix board
//!
//! Env:
//!   MIXBOARD_URL=http://localhost:8080/sse/connect
//!
//! Type `r` + Enter to reconnect, Ctrl+C to quit.

use mixboard_client::{ChannelStatus, PushMessage, RequestList, ResilientChannel, SseConnector};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, BufReader};

fn render(list: &RequestList) {
    println!("--- {} request(s) ---", list.len());
    for request in list.requests() {
        println!(
            "{}  {:<16} {:<10} {:<16} {:+}",
            request.timestamp.format("%H:%M:%S"),
            request.requester_name,
            request.item_type,
            request.item_name,
            request.adjustment
        );
    }
}

fn describe(status: &ChannelStatus) -> &'static str {
    if status.connected {
        "connected"
    } else if status.exhausted {
        "disconnected (type r to retry)"
    } else {
        "reconnecting"
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mixboard_client=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let url = std::env::var("MIXBOARD_URL")
        .unwrap_or_else(|_| "http://localhost:8080/sse/connect".to_string());

    let list = Arc::new(Mutex::new(RequestList::new()));
    let view = list.clone();

    let channel = ResilientChannel::builder(SseConnector::new(url)?)
        .on_message(move |message: PushMessage| {
            let Ok(mut view) = view.lock() else { return };
            view.apply(message);
            render(&view);
        })
        .spawn();

    let mut status = channel.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *status.borrow_and_update();
                eprintln!("[{}]", describe(&current));
            }
            line = lines.next_line() => match line? {
                Some(line) if line.trim() == "r" => channel.reconnect(),
                Some(_) => {}
                None => break,
            },
        }
    }

    channel.shutdown().await;
    Ok(())
}
