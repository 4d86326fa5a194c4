//! Sleepy-task walkthrough: 8 simulated queries on 4 workers, with a
//! terminate halfway through.
//!
//! Run with `RUST_LOG=debug cargo run --example sleepy_tasks` to see the
//! worker lifecycle.

use rand::Rng;
use std::thread;
use std::time::{Duration, Instant};
use threadpool_executor::prelude::*;

fn query(secs: u64, started: Instant) -> String {
    println!("[{:>5.2}s] sleeping for {}s", started.elapsed().as_secs_f64(), secs);
    thread::sleep(Duration::from_secs(secs));
    println!("[{:>5.2}s] task done", started.elapsed().as_secs_f64());
    format!("{}: Rows returned", rand::thread_rng().gen_range(10..=20))
}

fn main() -> Result<()> {
    env_logger::init();

    let pool = Executor::with_threads(4)?;
    let started = Instant::now();
    let mut rng = rand::thread_rng();

    let futures = (0..8)
        .map(|_| {
            let secs: u64 = rng.gen_range(1..=5);
            pool.submit_with_args(move |secs| query(secs, started), secs)
        })
        .collect::<Result<Vec<_>>>()?;

    thread::sleep(Duration::from_millis(2300));
    let cancelled = pool.terminate();
    println!("terminate cancelled {} queued task(s)\n", cancelled);

    // Running tasks finish; shutdown waits for them.
    pool.shutdown();

    for future in futures {
        match future.result() {
            Some(Ok(rows)) => println!("{} {} {}", future.id(), future.status(), rows),
            Some(Err(failure)) => println!("{} {} {}", future.id(), future.status(), failure),
            None => println!("{} {}", future.id(), future.status()),
        }
    }

    let metrics = pool.metrics();
    println!(
        "\ncompleted={} cancelled={} mean run={:?}",
        metrics.completed(),
        metrics.tasks_cancelled,
        metrics.mean_run_time()
    );

    Ok(())
}
