//! Text generation and streaming with a fallback chain.
//!
//! Set `OPENAI_API_KEY` and optionally `ANTHROPIC_API_KEY` (used as the
//! fallback) before running:
//!
//! ```sh
//! cargo run --example basic
//! ```

use anyhow::Context;
use futures::StreamExt;
use loraix::prelude::*;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let openai_key =
        std::env::var("OPENAI_API_KEY").context("OPENAI_API_KEY environment variable not set")?;

    let usage = Arc::new(UsageTracker::new());
    let mut builder = Runtime::builder(openai(openai_key)?)
        .layer(LoggingLayer::new())
        .model("gpt-4o-mini")
        .max_retries(2)
        .timeout(Duration::from_secs(30))
        .interceptor(Arc::new(TracingInterceptor::new()))
        .interceptor(usage.clone());

    if let Ok(anthropic_key) = std::env::var("ANTHROPIC_API_KEY") {
        builder = builder.fallback(anthropic(anthropic_key)?);
    }
    let runtime = builder.finish()?;

    // Example 1: single prompt
    println!("=== Example 1: Generate ===\n");
    let response = runtime
        .generate("Explain Rust ownership in two sentences.", CallOptions::new())
        .await?;
    println!("{}\n", response.text);
    println!(
        "provider={} attempts={} fallback_used={} latency={}ms tokens={:?}",
        response.provider,
        response.attempts,
        response.fallback_used,
        response.latency_ms,
        response.usage.and_then(|u| u.total_tokens)
    );

    // Example 2: conversation with per-call overrides
    println!("\n=== Example 2: Messages with overrides ===\n");
    let messages = vec![
        ChatMessage::system("You answer in exactly one word."),
        ChatMessage::user("What colour is the sky on a clear day?"),
    ];
    let response = runtime
        .generate(
            messages,
            CallOptions::new().with_temperature(0.7).with_max_tokens(8),
        )
        .await?;
    println!("{}", response.text);

    // Example 3: streaming
    println!("\n=== Example 3: Stream ===\n");
    let mut stream = runtime
        .stream("Write a haiku about the borrow checker.", CallOptions::new())
        .await?;
    while let Some(chunk) = stream.next().await {
        print!("{}", chunk?);
        std::io::stdout().flush()?;
    }
    println!();

    println!("\n=== Usage ===\n");
    println!("{}", serde_json::to_string_pretty(&usage.snapshot())?);

    Ok(())
}
