use clap::Args;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Base URL of a running node, e.g. `http://127.0.0.1:8000`.
    #[arg(long, default_value = "http://127.0.0.1:8000")]
    url: String,

    /// The `task_id` returned from `submit`.
    task_id: String,
}

pub async fn run(args: StatusArgs) -> eyre::Result<()> {
    marshal_telemetry::init(marshal_telemetry::TelemetryOptions::default());

    let client = reqwest::Client::new();
    let response = client
        .get(format!("{}/task/{}", args.url, args.task_id))
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
