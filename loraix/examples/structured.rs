//! Structured JSON output checked against a schema derived with schemars.
//!
//! Works with any provider; this one uses DeepSeek. Set `DEEPSEEK_API_KEY`:
//!
//! ```sh
//! cargo run --example structured --features schema
//! ```

use anyhow::Context;
use loraix::prelude::*;
use loraix::schemars::JsonSchema;
use loraix::SchemaHintStrategy;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize, JsonSchema)]
struct PersonInfo {
    /// Full name of the person
    name: String,
    /// Age in years
    age: u32,
    /// Current occupation or job title
    occupation: String,
    /// List of hobbies
    hobbies: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let api_key = std::env::var("DEEPSEEK_API_KEY")
        .context("DEEPSEEK_API_KEY environment variable not set")?;

    let runtime = Runtime::builder(deepseek(api_key)?)
        .model("deepseek-chat")
        .temperature(0.1)
        .json_strategy(Arc::new(SchemaHintStrategy::new()))
        .interceptor(Arc::new(TracingInterceptor::new()))
        .finish()?;

    let request = JsonRequest::new(
        "Extract person information: Sarah Johnson is a 28-year-old data scientist \
         who enjoys rock climbing, cooking, and playing piano.",
    )
    .with_schema(schema_of::<PersonInfo>())
    .with_options(CallOptions::new().with_max_tokens(300));

    match runtime.json(request).await {
        Ok(response) => {
            let json = response.json.context("json() always sets the json field")?;
            println!("Generated JSON:\n{}", serde_json::to_string_pretty(&json)?);

            let person: PersonInfo = serde_json::from_value(json)?;
            println!("\nDeserialized struct:\n{:#?}", person);
            println!("\nAttempts: {}", response.attempts);
        }
        Err(LoraixError::JsonValidation { message, .. }) => {
            eprintln!("Model never produced valid JSON: {}", message);
        }
        Err(e) => return Err(e.into()),
    }

    Ok(())
}
