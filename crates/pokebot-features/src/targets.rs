//! `list`/`add`/`remove`/`clear`/`all` subcommands shared by the batch features.

use pokebot_core::error::{PokebotError, Result};
use pokebot_scheduler::{BatchRunner, parse_target};

use crate::router::Invocation;

/// Handle a target-management subcommand. `None` if `sub` is not one.
pub(crate) async fn manage(
    runner: &BatchRunner,
    label: &str,
    invocation: &Invocation,
) -> Option<Result<String>> {
    let store = runner.store();
    let ns = runner.namespace();
    let reply = match invocation.sub()? {
        "list" => {
            let ids = store.get(ns).await;
            if ids.is_empty() {
                Ok(format!("No {label} targets."))
            } else {
                Ok(format!("{label} targets ({}): {}", ids.len(), ids.join(", ")))
            }
        }
        "add" => match target_arg(invocation) {
            Ok(id) if store.add(ns, &id).await => Ok(format!("Added {id} to {label} targets.")),
            Ok(id) => Ok(format!("{id} is already a {label} target.")),
            Err(e) => Err(e),
        },
        "remove" => match target_arg(invocation) {
            Ok(id) if store.remove(ns, &id).await => {
                Ok(format!("Removed {id} from {label} targets."))
            }
            Ok(id) => Ok(format!("{id} is not a {label} target.")),
            Err(e) => Err(e),
        },
        "clear" => {
            if store.clear(ns).await {
                Ok(format!("Cleared {label} targets."))
            } else {
                Ok(format!("No {label} targets to clear."))
            }
        }
        "all" => {
            let report = runner.run_batch().await;
            if report.total == 0 {
                Ok(format!("No {label} targets."))
            } else {
                Ok(format!("{label}: {report} succeeded."))
            }
        }
        _ => return None,
    };
    Some(reply)
}

/// First argument as a target id (mention, `@id` or bare id).
pub(crate) fn target_arg(invocation: &Invocation) -> Result<String> {
    let raw = invocation
        .arg(0)
        .ok_or_else(|| PokebotError::Validation("missing target".into()))?;
    parse_target(raw).ok_or_else(|| PokebotError::Validation(format!("'{raw}' is not a valid id")))
}
