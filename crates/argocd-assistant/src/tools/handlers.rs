use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use super::logs::parse_log_payload;
use super::{Scope, ToolHandler, ToolName};
use crate::argocd::{ResourceEventsQuery, ResourceRef};
use crate::errors::{AgentError, AgentResult};

/// Pick the handler for a tool
pub fn handler_for(name: ToolName, scope: Scope) -> Box<dyn ToolHandler> {
    match name {
        ToolName::GetApplication => Box::new(GetApplication(scope)),
        ToolName::GetApplicationResourceTree => Box::new(GetApplicationResourceTree(scope)),
        ToolName::GetApplicationManagedResources => Box::new(GetApplicationManagedResources(scope)),
        ToolName::GetPodLogs => Box::new(GetPodLogs(scope)),
        ToolName::GetApplicationLogs => Box::new(GetApplicationLogs(scope)),
        ToolName::GetWorkloadLogs => Box::new(GetWorkloadLogs(scope)),
        ToolName::GetApplicationEvents => Box::new(GetApplicationEvents(scope)),
        ToolName::GetResourceEvents => Box::new(GetResourceEvents(scope)),
    }
}

fn parse_input<T: DeserializeOwned>(input: Value) -> AgentResult<T> {
    let input = if input.is_null() { json!({}) } else { input };
    serde_json::from_value(input).map_err(|e| AgentError::InvalidParameters(e.to_string()))
}

fn execution_error(err: anyhow::Error) -> AgentError {
    AgentError::ExecutionError(err.to_string())
}

fn log_lines(payload: String) -> Value {
    Value::from(parse_log_payload(&payload))
}

#[derive(Debug, Deserialize)]
struct NoInput {}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PodLogsInput {
    pod_name: String,
}

#[derive(Debug, Deserialize)]
struct ResourceEventsInput {
    #[serde(rename = "resourceUID")]
    resource_uid: String,
    #[serde(rename = "resourceNamespace")]
    resource_namespace: String,
    #[serde(rename = "resourceName")]
    resource_name: String,
}

impl From<ResourceEventsInput> for ResourceEventsQuery {
    fn from(input: ResourceEventsInput) -> Self {
        Self {
            uid: input.resource_uid,
            namespace: input.resource_namespace,
            name: input.resource_name,
        }
    }
}

struct GetApplication(Scope);

#[async_trait]
impl ToolHandler for GetApplication {
    async fn execute(&self, input: Value) -> AgentResult<Value> {
        let NoInput {} = parse_input(input)?;
        let mut application = self
            .0
            .client
            .application(&self.0.application)
            .await
            .map_err(execution_error)?;

        // Field ownership bookkeeping is large and tells the model nothing
        if let Some(fields) = application.pointer_mut("/metadata/managedFields") {
            *fields = json!([]);
        }
        Ok(application)
    }
}

struct GetApplicationResourceTree(Scope);

#[async_trait]
impl ToolHandler for GetApplicationResourceTree {
    async fn execute(&self, input: Value) -> AgentResult<Value> {
        let NoInput {} = parse_input(input)?;
        self.0
            .client
            .resource_tree(&self.0.application)
            .await
            .map_err(execution_error)
    }
}

struct GetApplicationManagedResources(Scope);

#[async_trait]
impl ToolHandler for GetApplicationManagedResources {
    async fn execute(&self, input: Value) -> AgentResult<Value> {
        let NoInput {} = parse_input(input)?;
        self.0
            .client
            .managed_resources(&self.0.application)
            .await
            .map_err(execution_error)
    }
}

struct GetPodLogs(Scope);

#[async_trait]
impl ToolHandler for GetPodLogs {
    async fn execute(&self, input: Value) -> AgentResult<Value> {
        let PodLogsInput { pod_name } = parse_input(input)?;
        let payload = self
            .0
            .client
            .pod_logs(&self.0.application, &pod_name)
            .await
            .map_err(execution_error)?;
        Ok(log_lines(payload))
    }
}

struct GetApplicationLogs(Scope);

#[async_trait]
impl ToolHandler for GetApplicationLogs {
    async fn execute(&self, input: Value) -> AgentResult<Value> {
        let NoInput {} = parse_input(input)?;
        let payload = self
            .0
            .client
            .application_logs(&self.0.application)
            .await
            .map_err(execution_error)?;
        Ok(log_lines(payload))
    }
}

struct GetWorkloadLogs(Scope);

#[async_trait]
impl ToolHandler for GetWorkloadLogs {
    async fn execute(&self, input: Value) -> AgentResult<Value> {
        let resource: ResourceRef = parse_input(input)?;
        let payload = self
            .0
            .client
            .workload_logs(&self.0.application, &resource)
            .await
            .map_err(execution_error)?;
        Ok(log_lines(payload))
    }
}

struct GetApplicationEvents(Scope);

#[async_trait]
impl ToolHandler for GetApplicationEvents {
    async fn execute(&self, input: Value) -> AgentResult<Value> {
        let NoInput {} = parse_input(input)?;
        self.0
            .client
            .application_events(&self.0.application)
            .await
            .map_err(execution_error)
    }
}

struct GetResourceEvents(Scope);

#[async_trait]
impl ToolHandler for GetResourceEvents {
    async fn execute(&self, input: Value) -> AgentResult<Value> {
        let input: ResourceEventsInput = parse_input(input)?;
        let query = ResourceEventsQuery::from(input);
        self.0
            .client
            .resource_events(&self.0.application, &query)
            .await
            .map_err(execution_error)
    }
}
