//! The demo task classes behind spec.md §8's concrete scenarios —
//! reproduced from the three Python fixtures in the original
//! implementation's integration test suite, so those scenarios are
//! runnable tests rather than hypothetical prose.

mod nothing_etl;
mod partial_failure;
mod second_time_lucky;

pub use nothing_etl::NothingEtl;
pub use partial_failure::PartialFailure;
pub use second_time_lucky::SecondTimeLucky;

use std::sync::Arc;

use marshal_core::{Governor, GovernorError, Model, Whitelist};

fn models() -> Vec<(&'static str, Arc<dyn Model>)> {
    vec![
        ("NothingEtl", Arc::new(NothingEtl) as Arc<dyn Model>),
        ("PartialFailure", Arc::new(PartialFailure) as Arc<dyn Model>),
        ("SecondTimeLucky", Arc::new(SecondTimeLucky::default()) as Arc<dyn Model>),
    ]
}

/// Registers every demo class under its canonical name on a not-yet-started
/// [`Governor`]. Used by the `marshald run` subcommand so spec.md §8's
/// scenarios are reachable over the real HTTP adapter.
///
/// `accepted` is the `accepted_model_classes` config option (§6): an empty
/// list registers every demo class (the out-of-the-box default), a
/// non-empty list restricts registration to the named classes.
pub fn register_all_on_governor(governor: &Governor, accepted: &[String]) -> Result<(), GovernorError> {
    for (name, model) in models() {
        if !accepted.is_empty() && !accepted.iter().any(|class| class == name) {
            continue;
        }
        governor.register_class(name, model)?;
    }
    Ok(())
}

/// Registers every demo class directly on a [`Whitelist`] — what the
/// re-exec'd `marshald worker` entrypoint uses, since it never constructs
/// a full [`Governor`] of its own.
pub fn register_all_on_whitelist(whitelist: &Whitelist) -> Result<(), GovernorError> {
    for (name, model) in models() {
        whitelist.register(name, model)?;
    }
    Ok(())
}
