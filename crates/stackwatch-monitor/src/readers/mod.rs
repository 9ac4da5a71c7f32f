//! Orchestrator queries.
//!
//! Every reader issues exactly one transport call and decodes one JSON
//! record per output line. A line that does not decode aborts the whole
//! read: mismatched CLI output is not something to skip past.

mod inventory;
mod status;
mod task_error;

pub use inventory::{inventory_args, read_inventory};
pub use status::{read_statuses, status_args};
pub use task_error::{read_task_errors, task_error_args};

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use stackwatch_core::{short_id, ShortId, WatchError, WatchResult};

/// Decode a `{"<id>": value}` line into its single entry, keyed by short id.
fn decode_single_key<V: DeserializeOwned>(
    context: &'static str,
    line: &str,
) -> WatchResult<(ShortId, V)> {
    let record: HashMap<String, V> =
        serde_json::from_str(line).map_err(|source| WatchError::Decode {
            context,
            line: line.to_string(),
            source,
        })?;

    if record.len() != 1 {
        return Err(WatchError::schema(
            context,
            format!("expected exactly one key, found {} in `{line}`", record.len()),
        ));
    }

    record
        .into_iter()
        .next()
        .map(|(id, value)| (short_id(&id).to_string(), value))
        .ok_or_else(|| WatchError::schema(context, "empty record"))
}
