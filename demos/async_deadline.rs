//! Async Deadline Example
//!
//! An RPC that never recovers, retried under a short deadline. The loop is
//! ended by the sleeper when the deadline passes; the error text names the
//! deadline while the status still reports the RPC's own code.
//!
//! ```text
//! cargo run --example async_deadline --features async
//! ```

use std::time::Duration;

use redial::prelude::*;

async fn lookup_finding(_ctx: &Context, id: &str) -> Result<String, Status> {
    Err(Status::new(
        Code::Unavailable,
        format!("finding {} is on a shard that is offline", id),
    ))
}

#[tokio::main]
async fn main() {
    let ctx = Context::background().with_timeout(Duration::from_millis(300));
    let backoff = Backoff::new(Duration::from_millis(20), Duration::from_millis(100), 2.0);

    let result = retry_async(
        &ctx,
        &backoff,
        || {
            let ctx = ctx.clone();
            async move {
                match lookup_finding(&ctx, "f-42").await {
                    Ok(finding) => Attempt::success(finding),
                    Err(status) if status.code() == Code::Unavailable => Attempt::retry(status),
                    Err(status) => Attempt::fail(status),
                }
            }
        },
        sleep_async,
    )
    .await;

    match result {
        Ok(finding) => println!("Found: {}", finding),
        Err(err) => {
            println!("Lookup failed: {}", err);
            println!("  code = {:?}", err.code());
            println!("  message = {}", err.message());
        }
    }
}
