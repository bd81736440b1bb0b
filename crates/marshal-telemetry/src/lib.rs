//! Structured logging bootstrap shared by every `marshald` entrypoint
//! (the main node process, the worker re-exec, and the `submit`/`status`
//! CLI clients).

use tracing_subscriber::EnvFilter;

/// Selects the log formatter: `DEBUG` from spec.md §6 asks for the more
/// verbose, human-oriented pretty printer; otherwise the compact one-line
/// format matches the rest of the corpus.
#[derive(Debug, Clone, Default)]
pub struct TelemetryOptions {
    pub debug: bool,
    /// `LOG_TO_STDOUT` from spec.md §6. The worker re-exec entrypoint must
    /// never set this: its stdout carries exactly one `TaskResult` line.
    pub log_to_stdout: bool,
    /// `EXTERNAL_LOGGERS` from spec.md §6: additional sink names the
    /// original forwards log records to. No concrete sink is specified by
    /// the original beyond its name, so this node only announces them at
    /// startup rather than fabricating transports for them.
    pub external_loggers: Vec<String>,
}

/// Initializes the global `tracing` subscriber. Safe to call once per
/// process; a second call is a logic error in the caller, not something
/// this crate guards against (matching `tracing_subscriber`'s own
/// single-init contract).
pub fn init(options: TelemetryOptions) {
    let debug = options.debug;
    let log_to_stdout = options.log_to_stdout;
    let external_loggers = options.external_loggers;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let default_directive = if debug { "debug" } else { "info" };
        EnvFilter::new(format!("{default_directive},marshal=debug"))
    });

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(move || -> Box<dyn std::io::Write> {
            if log_to_stdout {
                Box::new(std::io::stdout())
            } else {
                Box::new(std::io::stderr())
            }
        });

    if debug {
        subscriber.pretty().init();
    } else {
        subscriber.compact().init();
    }

    if !external_loggers.is_empty() {
        tracing::info!(loggers = ?external_loggers, "external loggers configured but not wired to a transport");
    }
}
