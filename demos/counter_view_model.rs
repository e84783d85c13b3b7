//! # Example: counter_view_model
//!
//! A view-model owning a counter, a one-shot message channel and a squares
//! channel, rendered by a "screen" that is only collected while visible.
//!
//! Shows how to:
//! - Own hot streams with a [`Scope`] and tear them down with `close()`.
//! - Update a [`StateCell`] atomically from button presses.
//! - Fan squares out to two subscribers of different speed through a [`Broadcast`].
//! - Collect only while a [`Lifecycle`] is at least `Started`.
//! - Attach the built-in [`LogWriter`] observer.
//!
//! ## Run
//! ```bash
//! RUST_LOG=info cargo run --example counter_view_model --features logging
//! ```

use std::sync::Arc;
use std::time::Duration;

use flowvisor::{
    Broadcast, Config, Lifecycle, LifecycleState, LogWriter, Observe, OverflowPolicy, Scope,
    StateCell,
};
use tokio::time::sleep;
use tracing_subscriber::EnvFilter;

struct CounterViewModel {
    scope: Scope,
    counter: StateCell<u32>,
    messages: Broadcast<String>,
    squares: Broadcast<u64>,
}

impl CounterViewModel {
    fn new() -> Self {
        let observers: Vec<Arc<dyn Observe>> = vec![Arc::new(LogWriter::new())];
        let scope = Scope::builder(Config::default())
            .with_observers(observers)
            .build();
        let counter = scope.state_cell("counter", 0u32);
        let messages = scope.broadcast("messages");
        let squares = scope.broadcast_with("squares", 4, OverflowPolicy::Suspend);
        Self {
            scope,
            counter,
            messages,
            squares,
        }
    }

    fn increment(&self) -> u32 {
        self.counter.update(|n| n + 1)
    }

    async fn notify(&self, text: &str) {
        if let Ok(0) = self.messages.emit(text.to_string()).await {
            println!("(nobody is listening for \"{text}\")");
        }
    }

    async fn square_numbers(&self, upto: u64) -> anyhow::Result<()> {
        for n in 1..=upto {
            self.squares.emit(n * n).await?;
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let vm = CounterViewModel::new();
    let screen = Lifecycle::new();

    // Emitted before anyone subscribed: lost by design.
    vm.notify("welcome").await;

    let _counter_view = vm.scope.collect_on_lifecycle(
        &screen,
        LifecycleState::Started,
        &vm.counter.flow(),
        |n| async move {
            println!("[screen] counter = {n}");
            Ok(())
        },
    );
    let _snackbar = vm.scope.launch(&vm.messages.flow(), |text| async move {
        println!("[screen] snackbar: {text}");
        Ok(())
    });

    screen.move_to(LifecycleState::Resumed);
    sleep(Duration::from_millis(10)).await;
    for _ in 0..3 {
        vm.increment();
        sleep(Duration::from_millis(50)).await;
    }
    vm.notify("counter incremented three times").await;

    // Hidden: writes keep happening, the screen only sees the latest on return.
    screen.move_to(LifecycleState::Created);
    for _ in 0..5 {
        vm.increment();
    }
    sleep(Duration::from_millis(50)).await;
    screen.move_to(LifecycleState::Started);
    sleep(Duration::from_millis(50)).await;

    // Two subscribers of different speed on the same squares channel.
    let fast = vm.scope.launch(&vm.squares.flow(), |sq| async move {
        sleep(Duration::from_millis(100)).await;
        println!("[fast] {sq}");
        Ok(())
    });
    let slow = vm.scope.launch(&vm.squares.flow(), |sq| async move {
        sleep(Duration::from_millis(300)).await;
        println!("[slow] {sq}");
        Ok(())
    });
    vm.square_numbers(6).await?;
    sleep(Duration::from_secs(2)).await;
    println!("fast={:?} slow={:?}", fast.state(), slow.state());

    let compute = vm
        .scope
        .offload("fib", || {
            let (mut a, mut b) = (0u64, 1u64);
            for _ in 0..50 {
                (a, b) = (b, a + b);
            }
            a
        })
        .await?;
    println!("offloaded fib(50) = {compute}");

    screen.destroy();
    vm.scope.close().await?;
    Ok(())
}
