//! Status reader — update status of many services in one call.

use std::collections::HashMap;

use stackwatch_core::{ShortId, UpdateStatus, WatchResult};
use stackwatch_transport::CommandTransport;
use tracing::trace;

use super::decode_single_key;

const CONTEXT: &str = "update status";

/// Go template emitting `{"<short id>": <UpdateStatus or null>}` per service.
const STATUS_FORMAT: &str = r#"{"{{slice .ID 0 12}}":{{json .UpdateStatus}}}"#;

pub fn status_args(ids: &[&str]) -> Vec<String> {
    let mut args = vec![
        "service".to_string(),
        "inspect".to_string(),
        "--format".to_string(),
        STATUS_FORMAT.to_string(),
    ];
    args.extend(ids.iter().map(|id| id.to_string()));
    args
}

/// Current update status for `ids`, keyed by short id.
///
/// Services without an update in progress are left out of the map rather
/// than reported as a status.
pub async fn read_statuses<T: CommandTransport>(
    transport: &T,
    ids: &[&str],
) -> WatchResult<HashMap<ShortId, UpdateStatus>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let lines = transport.execute(&status_args(ids)).await?;

    let mut statuses = HashMap::with_capacity(lines.len());
    for line in &lines {
        let (id, status) = decode_single_key::<Option<UpdateStatus>>(CONTEXT, line)?;
        match status {
            Some(status) => {
                trace!(%id, state = %status.state, "status read");
                statuses.insert(id, status);
            }
            None => trace!(%id, "no update status"),
        }
    }

    Ok(statuses)
}
