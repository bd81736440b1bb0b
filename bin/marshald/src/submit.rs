use clap::Args;

/// A one-shot admission client against the Admission Façade's HTTP
/// adapter (§6) — a thin wrapper, not part of the Governor's core.
#[derive(Args, Debug)]
pub struct SubmitArgs {
    /// Base URL of a running node, e.g. `http://127.0.0.1:8000`.
    #[arg(long, default_value = "http://127.0.0.1:8000")]
    url: String,

    /// The whitelisted class to run.
    #[arg(long)]
    model_class: String,

    #[arg(long, default_value = "run")]
    method: String,

    /// JSON object of method kwargs.
    #[arg(long, default_value = "{}")]
    kwargs: String,

    /// JSON object passed as the resolver context.
    #[arg(long, default_value = "{}")]
    resolver_context: String,
}

pub async fn run(args: SubmitArgs) -> eyre::Result<()> {
    marshal_telemetry::init(marshal_telemetry::TelemetryOptions::default());

    let body = serde_json::json!({
        "model_class": args.model_class,
        "method": args.method,
        "method_kwargs": serde_json::from_str::<serde_json::Value>(&args.kwargs)?,
        "resolver_context": serde_json::from_str::<serde_json::Value>(&args.resolver_context)?,
    });

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/task", args.url))
        .json(&body)
        .send()
        .await?;

    let status = response.status();
    let text = response.text().await?;
    println!("{text}");

    if !status.is_success() {
        eyre::bail!("node responded with {status}");
    }
    Ok(())
}
