use std::sync::Arc;

use marshal_core::Whitelist;

/// The body of `marshald worker` (§4.2/§9's "worker re-exec" pattern): a
/// fresh process, re-exec'd by the Governor's supervisory task, reads one
/// [`marshal_processor::WorkerRequest`] line from stdin and writes one
/// `TaskResult` line to stdout.
pub async fn run() -> eyre::Result<()> {
    marshal_telemetry::init(marshal_telemetry::TelemetryOptions::default());

    let whitelist = Whitelist::new();
    marshal_demo_models::register_all_on_whitelist(&whitelist)?;
    whitelist.lock();

    marshal_processor::run_worker(Arc::new(whitelist)).await?;
    Ok(())
}
