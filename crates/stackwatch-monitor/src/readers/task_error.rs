//! Task error reader — why a task terminated.

use std::collections::HashMap;

use stackwatch_core::{ShortId, WatchResult};
use stackwatch_transport::CommandTransport;

use super::decode_single_key;

const CONTEXT: &str = "task error";

/// Go template emitting `{"<owning service short id>": <error or null>}`.
const TASK_ERROR_FORMAT: &str = r#"{"{{slice .ServiceID 0 12}}":{{json .Status.Err}}}"#;

pub fn task_error_args(task_ids: &[&str]) -> Vec<String> {
    let mut args = vec![
        "inspect".to_string(),
        "--type".to_string(),
        "task".to_string(),
        "--format".to_string(),
        TASK_ERROR_FORMAT.to_string(),
    ];
    args.extend(task_ids.iter().map(|id| id.to_string()));
    args
}

/// Failure detail of each task, keyed by the short id of its owning service.
///
/// A task with no recorded error maps to `None`.
pub async fn read_task_errors<T: CommandTransport>(
    transport: &T,
    task_ids: &[&str],
) -> WatchResult<HashMap<ShortId, Option<String>>> {
    if task_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let lines = transport.execute(&task_error_args(task_ids)).await?;

    lines
        .iter()
        .map(|line| -> WatchResult<(ShortId, Option<String>)> {
            let (service, err) = decode_single_key::<Option<String>>(CONTEXT, line)?;
            Ok((service, err.filter(|e| !e.is_empty())))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackwatch_core::TransportError;

    struct Fixed(Vec<String>);

    impl CommandTransport for Fixed {
        async fn execute(&self, args: &[String]) -> Result<Vec<String>, TransportError> {
            assert_eq!(args[..3], ["inspect", "--type", "task"]);
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn keyed_by_owning_service() {
        let transport = Fixed(vec![
            r#"{"kxq1l8k3y1m2":"task: non-zero exit (137): dockerexec: unhealthy container"}"#.to_string(),
        ]);
        let errors = read_task_errors(&transport, &["abc123def456"]).await.unwrap();
        assert_eq!(
            errors["kxq1l8k3y1m2"].as_deref(),
            Some("task: non-zero exit (137): dockerexec: unhealthy container")
        );
    }

    #[tokio::test]
    async fn null_and_empty_errors_are_absent() {
        let transport = Fixed(vec![
            r#"{"aaaaaaaaaaaa":null}"#.to_string(),
            r#"{"bbbbbbbbbbbb":""}"#.to_string(),
        ]);
        let errors = read_task_errors(&transport, &["t1", "t2"]).await.unwrap();
        assert_eq!(errors["aaaaaaaaaaaa"], None);
        assert_eq!(errors["bbbbbbbbbbbb"], None);
    }
}
