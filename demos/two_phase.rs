use anyhow::Result;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use twophase::{
    CompletionOutcome, RegistryConfig, RunId, TensorBatch, TensorRegistry, WaitOptions,
    WorkerHandle,
};

/// Forward: y = x^2. Backward: dx = 2x * dy.
fn square_worker(registry: Arc<TensorRegistry>, id: RunId, x: Vec<f32>) -> Result<()> {
    let run = WorkerHandle::register(registry, id)?;

    let y: Vec<f32> = x.iter().map(|v| v * v).collect();
    thread::sleep(Duration::from_millis(10 * x.len() as u64));
    run.publish_forward(TensorBatch::from(y))?;

    let dy = run.await_backward()?.values();
    if dy.len() != x.len() {
        run.fail(format!("expected {} gradients, got {}", x.len(), dy.len()))?;
        return Ok(());
    }
    let dx: Vec<f32> = x.iter().zip(&dy).map(|(x, dy)| 2.0 * x * dy).collect();
    info!(?dx, "backward done");

    run.complete(CompletionOutcome::Success)?;
    Ok(())
}

fn main() -> Result<()> {
    // Set up logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = RegistryConfig::builder()
        .default_wait_timeout(Some(Duration::from_secs(5)))
        .build()?;
    let registry = Arc::new(TensorRegistry::new(config)?);

    let inputs = vec![vec![1.0, 2.0], vec![3.0], vec![0.5, 0.25, 4.0]];
    let workers: Vec<_> = inputs
        .into_iter()
        .enumerate()
        .map(|(i, x)| {
            let registry = Arc::clone(&registry);
            let id = RunId::new(format!("square-{}", i));
            thread::spawn(move || square_worker(registry, id, x))
        })
        .collect();

    // The driver handles runs in whatever order their forward phase finishes
    let opts = WaitOptions::timeout(Duration::from_secs(5));
    for _ in 0..workers.len() {
        let id = registry.next_ready(&opts)?;
        let y = registry.fetch_forward_outputs(&id)?;
        info!(run_id = %id, y = ?y.values(), "forward outputs received");

        // Seed gradient of ones
        let dy = vec![1.0; y.values().len()];
        registry.supply_backward(&id, TensorBatch::from(dy))?;
    }

    for worker in workers {
        worker
            .join()
            .map_err(|_| anyhow::anyhow!("worker thread panicked"))??;
    }

    for id in registry.active_runs() {
        let outcome = registry.retire_run(&id)?;
        info!(run_id = %id, %outcome, "run retired");
    }

    let metrics = registry.metrics();
    info!(
        created = metrics.runs_created,
        retired = metrics.runs_retired,
        success_rate = metrics.success_rate(),
        "done"
    );
    Ok(())
}
