use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use tracing::{error, info, warn};

use exercise_judge::config::{get_config, init_config, GraderConfig};
use exercise_judge::evaluator::{evaluate_file, Evaluator};
use exercise_judge::runtimes::{init_runtimes, registry};
use exercise_judge::worker::{
    connect_from_env, result_id, Delivery, RequestQueue, ResultRecord, WorkerLease,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("exercise_judge=info".parse()?),
        )
        .init();

    dotenvy::dotenv().ok();

    let runtimes_path = std::env::var("RUNTIMES_CONFIG").ok().map(PathBuf::from);
    init_runtimes(runtimes_path.as_deref())?;
    info!("Loaded runtimes: {}", registry().names().join(", "));

    let config = GraderConfig::from_env()?;

    // One-shot: evaluate a request file (or stdin with "-") and print the result
    if let Some(path) = std::env::args().nth(1) {
        init_config(config)?;
        let evaluator = Evaluator::new(get_config().clone(), registry().clone());
        let result = evaluate_file(&evaluator, &PathBuf::from(path)).await?;
        println!("{}", serde_json::to_string(&result)?);
        return Ok(());
    }

    info!("Starting evaluation worker...");
    let mut queue = RequestQueue::new(connect_from_env().await?);
    let lease = WorkerLease::claim(connect_from_env().await?).await?;
    init_config(config.with_worker_id(lease.id()))?;
    let config = get_config();
    info!(
        "Worker config: worker_id={}, timeout={}ms, runtime={}",
        config.worker_id, config.timeout_ms, config.default_runtime
    );

    let evaluator = Evaluator::new(config.clone(), registry().clone());

    info!("Waiting for requests...");
    loop {
        let delivery = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown requested");
                break;
            }
            delivery = queue.next() => delivery,
        };

        let record = match delivery {
            Ok(Some(Delivery::Request(request))) => {
                info!("Received request: id={}", request.id);
                let result = evaluator.evaluate(&request).await;
                ResultRecord::new(result_id(&request), result)
            }
            Ok(Some(Delivery::Malformed { id: Some(id), error })) => {
                warn!("Rejecting malformed request {}: {}", id, error);
                ResultRecord::rejected(id, &error)
            }
            Ok(Some(Delivery::Malformed { id: None, error })) => {
                warn!("Dropping malformed request without id: {}", error);
                continue;
            }
            Ok(None) => continue,
            Err(e) => {
                warn!("{:#}. Retrying in 3 seconds...", e);
                tokio::time::sleep(Duration::from_secs(3)).await;
                continue;
            }
        };

        if let Err(e) = queue.publish(&record).await {
            error!("Failed to store result {}: {:#}", record.id, e);
        }
    }

    lease.release().await
}
