//! # Example: countdown
//!
//! A cold flow that counts down from 10, collected in the three ways the
//! library offers.
//!
//! Shows how to:
//! - Define a [`ColdFlow`] with a producer procedure.
//! - Chain `filter` / `map` / `on_each` and run terminal operations.
//! - Compare sequential and latest-only collection.
//! - Run two independent collections of the same flow concurrently.
//!
//! ## Run
//! ```bash
//! RUST_LOG=debug cargo run --example countdown
//! ```

use std::time::Duration;

use flowvisor::{ColdFlow, Emitter, FlowError, Scope};
use tokio::time::{Instant, sleep};
use tracing_subscriber::EnvFilter;

fn countdown(tick: Duration) -> ColdFlow<u32> {
    ColdFlow::new("countdown", move |em: Emitter<u32>| async move {
        let mut current = 10;
        em.emit(current).await?;
        while current > 0 {
            sleep(tick).await;
            current -= 1;
            em.emit(current).await?;
        }
        Ok::<(), FlowError>(())
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let tick = Duration::from_millis(200);
    let flow = countdown(tick);

    // Terminal operations each restart the producer.
    let squares = flow
        .filter(|t| t % 2 == 0)
        .map(|t| t * t)
        .on_each(|t| println!("[tap] {t}"));
    println!("even squares: {:?}", squares.to_vec().await?);
    println!("odd ticks: {}", flow.count(|t| t % 2 == 1).await?);

    // Sequential: the producer waits for each slow callback.
    let start = Instant::now();
    flow.take(3)
        .collect(|t| async move {
            sleep(Duration::from_millis(300)).await;
            println!("[sequential] {t} at {:?}", start.elapsed());
            Ok(())
        })
        .await?;

    // Latest-only: a new value cancels the unfinished callback.
    let start = Instant::now();
    flow.collect_latest(|t| async move {
        println!("[latest] started {t}");
        sleep(Duration::from_millis(300)).await;
        println!("[latest] finished {t} at {:?}", start.elapsed());
        Ok(())
    })
    .await?;

    // Two subscriptions, started apart, each get the full countdown.
    let scope = Scope::new();
    let first = scope.launch(&flow, |t| async move {
        println!("[first] {t}");
        Ok(())
    });
    sleep(tick * 3).await;
    let second = scope.launch(&flow, |t| async move {
        println!("[second] {t}");
        Ok(())
    });

    println!("first: {:?}", first.join().await);
    println!("second: {:?}", second.join().await);
    scope.close().await?;
    Ok(())
}
