//! Ask every provider the same question concurrently, pooling usage.
//!
//! Each client gets the same shared [`UsageTracker`], so the summary at the
//! end covers all four calls.
//!
//! # Usage
//!
//! ```bash
//! COURIER_BASE_URL=http://127.0.0.1:8787 cargo run --example compare_providers
//! ```

use courier::prelude::*;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), CourierError> {
    let tracker = Arc::new(UsageTracker::new());
    let messages = vec![Message::user("In one sentence: what is a monad?")];
    let options = CallOptions::default()
        .with_max_tokens(512)
        .with_reasoning_level(ReasoningEffort::Low);

    let mut clients = Vec::new();
    for provider in Provider::ALL {
        let config = ClientConfig::from_env().with_provider(provider.as_str());
        clients.push(CourierClient::new(config)?.with_usage_tracker(tracker.clone()));
    }

    let answers = futures::future::join_all(
        clients
            .iter()
            .map(|client| client.call(&messages, &options)),
    )
    .await;

    for (client, answer) in clients.iter().zip(answers) {
        match answer {
            Ok(text) => println!("{}: {text}", client.provider()),
            Err(e) => eprintln!("{}: {e}", client.provider()),
        }
    }

    eprintln!("{}", tracker.summary());
    Ok(())
}
