//! Reset Settings Example
//!
//! Shows the shape of a generated call site: build a request, call one RPC
//! method on a client, and let the retry loop decide what to do with
//! failures. The client here is a stand-in that fails twice with
//! `Unavailable` before succeeding, then answers `NotFound`.
//!
//! Run with logging:
//!
//! ```text
//! cargo run --example reset_settings --features tracing
//! ```

use std::cell::Cell;
use std::time::Duration;

use redial::prelude::*;
use redial::DEFAULT_RETRYABLE;

#[derive(Debug)]
struct ResetComponentSettingsRequest {
    name: String,
}

/// Stand-in for a generated settings client.
#[derive(Debug, Default)]
struct SettingsClient {
    calls: Cell<u32>,
}

impl SettingsClient {
    fn reset_component_settings(
        &self,
        _ctx: &Context,
        req: &ResetComponentSettingsRequest,
    ) -> Result<(), Status> {
        let n = self.calls.get() + 1;
        self.calls.set(n);
        println!("  attempt {} for {}", n, req.name);
        match n {
            1 | 2 => Err(Status::new(Code::Unavailable, "backend warming up")),
            3 => Ok(()),
            _ => Err(Status::new(Code::NotFound, "component settings not found")),
        }
    }
}

fn reset(
    client: &SettingsClient,
    ctx: &Context,
    backoff: &Backoff,
    req: &ResetComponentSettingsRequest,
) -> Result<(), RetryError<Status>> {
    retry(
        ctx,
        backoff,
        || Attempt::from_rpc(client.reset_component_settings(ctx, req), DEFAULT_RETRYABLE),
        redial::sleep,
    )
}

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
        .init();

    let client = SettingsClient::default();
    let ctx = Context::background().with_timeout(Duration::from_secs(5));
    let backoff = Backoff::new(Duration::from_millis(50), Duration::from_millis(400), 2.0);
    let req = ResetComponentSettingsRequest {
        name: "organizations/123/components/container-threat-detection/settings".to_owned(),
    };

    println!("\n=== Transient failures are retried ===");
    match reset(&client, &ctx, &backoff, &req) {
        Ok(()) => println!("Reset succeeded after {} calls", client.calls.get()),
        Err(err) => println!("Reset failed: {}", err),
    }

    println!("\n=== Permanent failures are returned as-is ===");
    if let Err(err) = reset(&client, &ctx, &backoff, &req) {
        println!("Reset failed: {}", err);
        println!("  code = {:?}, message = {:?}", err.code(), err.message());
    }
}
