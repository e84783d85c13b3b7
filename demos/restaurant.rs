//! # Example: restaurant
//!
//! A kitchen serves three dishes; the customer needs 5s for each one.
//!
//! ```text
//! kitchen:   appetizer (0.25s) ── main dish (+1s) ── dessert (+0.2s)
//! customer:  eats every dish for 5s
//!
//! sequential : kitchen waits for the customer   → done at 5.25s / 11.25s / 16.45s
//! buffer     : kitchen runs ahead               → done at 5.25s / 10.25s / 15.25s
//! conflate   : customer skips to the newest     → appetizer, dessert
//! ```
//!
//! Time runs at 10x speed so the demo takes a few seconds.
//!
//! ## Run
//! ```bash
//! cargo run --example restaurant
//! ```

use std::time::Duration;

use flowvisor::{ColdFlow, Emitter, FlowError, OverflowPolicy};
use tokio::time::{Instant, sleep};
use tracing_subscriber::EnvFilter;

const SPEEDUP: u32 = 10;

fn ms(v: u64) -> Duration {
    Duration::from_millis(v) / SPEEDUP
}

fn kitchen() -> ColdFlow<&'static str> {
    ColdFlow::new("kitchen", |em: Emitter<&'static str>| async move {
        sleep(ms(250)).await;
        println!("  appetizer is delivered");
        em.emit("appetizer").await?;
        sleep(ms(1000)).await;
        println!("  main dish is delivered");
        em.emit("main dish").await?;
        sleep(ms(200)).await;
        println!("  dessert is delivered");
        em.emit("dessert").await?;
        Ok::<(), FlowError>(())
    })
}

async fn dine(label: &str, flow: ColdFlow<&'static str>) -> Result<(), FlowError> {
    println!("{label}:");
    let start = Instant::now();
    flow.collect(|dish| async move {
        println!("  now eating {dish}");
        sleep(ms(5000)).await;
        println!("  finished {dish} at {:?}", start.elapsed() * SPEEDUP);
        Ok(())
    })
    .await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    dine("sequential", kitchen()).await?;
    dine("buffer", kitchen().buffer(64, OverflowPolicy::Suspend)).await?;
    dine("conflate", kitchen().conflate()).await?;
    Ok(())
}
