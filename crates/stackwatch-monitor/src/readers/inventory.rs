//! Inventory reader — the services of a stack.

use serde::Deserialize;
use stackwatch_core::{SchedulingMode, ServiceDescriptor, WatchError, WatchResult};
use stackwatch_transport::CommandTransport;
use tracing::debug;

const CONTEXT: &str = "service listing";

/// Label the orchestrator puts on every service deployed as part of a stack.
const STACK_LABEL: &str = "com.docker.stack.namespace";

/// One line of `service ls --format {{json .}}`.
#[derive(Debug, Deserialize)]
struct ServiceRecord {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Image")]
    image: String,
    #[serde(rename = "Mode")]
    mode: String,
    #[serde(rename = "Replicas")]
    replicas: String,
    #[serde(rename = "Ports", default)]
    ports: String,
}

/// Command arguments listing the stack's services with full identifiers.
pub fn inventory_args(stack: &str) -> Vec<String> {
    vec![
        "service".to_string(),
        "ls".to_string(),
        "--no-trunc".to_string(),
        "--filter".to_string(),
        format!("label={STACK_LABEL}={stack}"),
        "--format".to_string(),
        "{{json .}}".to_string(),
    ]
}

/// List the services currently belonging to `stack`, in listing order.
///
/// An empty stack yields an empty list; deciding what that means is up to
/// the caller.
pub async fn read_inventory<T: CommandTransport>(
    transport: &T,
    stack: &str,
) -> WatchResult<Vec<ServiceDescriptor>> {
    let lines = transport.execute(&inventory_args(stack)).await?;
    let services = lines
        .iter()
        .map(|line| decode_service(line))
        .collect::<WatchResult<Vec<_>>>()?;

    debug!(%stack, count = services.len(), "inventory read");
    Ok(services)
}

fn decode_service(line: &str) -> WatchResult<ServiceDescriptor> {
    let record: ServiceRecord =
        serde_json::from_str(line).map_err(|source| WatchError::Decode {
            context: CONTEXT,
            line: line.to_string(),
            source,
        })?;

    if record.id.trim().is_empty() {
        return Err(WatchError::schema(CONTEXT, format!("service `{}` has no ID", record.name)));
    }

    let mode = match record.mode.as_str() {
        "replicated" => SchedulingMode::Replicated,
        "global" => SchedulingMode::Global,
        other => {
            return Err(WatchError::schema(
                CONTEXT,
                format!("service `{}` has unsupported mode `{other}`", record.name),
            ));
        }
    };

    let replicas = declared_replicas(&record.replicas).ok_or_else(|| {
        WatchError::schema(
            CONTEXT,
            format!("service `{}` has unreadable replicas `{}`", record.name, record.replicas),
        )
    })?;

    Ok(ServiceDescriptor {
        id: record.id,
        name: record.name,
        image: record.image,
        mode,
        replicas,
        ports: split_ports(&record.ports),
    })
}

/// Declared count from a `running/declared` column, e.g. `0/3 (max 1 per node)`.
fn declared_replicas(column: &str) -> Option<u32> {
    let ratio = column.split_whitespace().next()?;
    let (_, declared) = ratio.split_once('/')?;
    declared.parse().ok()
}

fn split_ports(column: &str) -> Vec<String> {
    column
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}
