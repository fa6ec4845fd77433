//! The catalog of read-only inspection tools exposed to the model
//!
//! Every tool is named by a [`ToolName`] variant and executed by a [`ToolHandler`] that is
//! bound to one application when the [`ToolRegistry`] is built. Dispatch is a plain lookup
//! from the parsed name, so a model can never reach anything outside the catalog.
pub mod handlers;
pub mod logs;

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

use crate::argocd::{ApplicationRef, ResourceClient};
use crate::errors::{AgentError, AgentResult};
use crate::models::tool::{Tool, ToolCall};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(EnumIter, EnumString, AsRefStr, Display)]
#[strum(serialize_all = "camelCase")]
pub enum ToolName {
    GetApplication,
    GetApplicationResourceTree,
    GetApplicationManagedResources,
    GetPodLogs,
    GetApplicationLogs,
    GetWorkloadLogs,
    GetApplicationEvents,
    GetResourceEvents,
}

impl ToolName {
    pub fn description(&self) -> &'static str {
        match self {
            ToolName::GetApplication => {
                "Fetch the Argo CD Application object for the current app. Use for \
                status/sync/health, source (repo/path/revision), and destination \
                (cluster/namespace). Returns V1alpha1Application."
            }
            ToolName::GetApplicationResourceTree => {
                "Fetch the resource tree (DAG) for the current application. Use to locate \
                workloads/pods and ownership, and to see per-resource health/sync. Returns \
                V1alpha1ApplicationTree."
            }
            ToolName::GetApplicationManagedResources => {
                "List managed resources for the current application, including drift info. Use to \
                analyze OutOfSync/drift and enumerate kinds/names/namespaces."
            }
            ToolName::GetPodLogs => "Fetch logs for a pod. Use to debug workloads.",
            ToolName::GetApplicationLogs => {
                "Fetch application-level logs from Argo CD. Use to debug application \
                sync/reconciliation issues."
            }
            ToolName::GetWorkloadLogs => {
                "Fetch logs for a specific workload resource (Deployment, StatefulSet, etc.). Use \
                when you need logs from a specific resource identified in the resource tree."
            }
            ToolName::GetApplicationEvents => {
                "Fetch Kubernetes events for the current application. Use to investigate warnings, \
                errors, or state changes."
            }
            ToolName::GetResourceEvents => {
                "Fetch Kubernetes events for a specific resource. Use to debug issues with \
                individual resources."
            }
        }
    }

    pub fn input_schema(&self) -> Value {
        match self {
            ToolName::GetPodLogs => json!({
                "type": "object",
                "required": ["podName"],
                "properties": {
                    "podName": {
                        "type": "string",
                        "description": "The name of the pod"
                    }
                }
            }),
            ToolName::GetWorkloadLogs => json!({
                "type": "object",
                "required": ["namespace", "name", "group", "kind", "version"],
                "properties": {
                    "namespace": {
                        "type": "string",
                        "description": "The namespace of the resource"
                    },
                    "name": {
                        "type": "string",
                        "description": "The name of the resource"
                    },
                    "group": {
                        "type": "string",
                        "description": "The API group of the resource, empty for core resources"
                    },
                    "kind": {
                        "type": "string",
                        "description": "The kind of the resource"
                    },
                    "version": {
                        "type": "string",
                        "description": "The API version of the resource"
                    }
                }
            }),
            ToolName::GetResourceEvents => json!({
                "type": "object",
                "required": ["resourceUID", "resourceNamespace", "resourceName"],
                "properties": {
                    "resourceUID": {
                        "type": "string",
                        "description": "The UID of the resource"
                    },
                    "resourceNamespace": {
                        "type": "string",
                        "description": "The namespace of the resource"
                    },
                    "resourceName": {
                        "type": "string",
                        "description": "The name of the resource"
                    }
                }
            }),
            _ => json!({
                "type": "object",
                "properties": {}
            }),
        }
    }

    pub fn definition(&self) -> Tool {
        Tool::new(self.as_ref(), self.description(), self.input_schema())
    }
}

/// What every tool executes against: the Argo CD client and the one application the
/// conversation is about
#[derive(Clone)]
pub struct Scope {
    pub client: Arc<dyn ResourceClient>,
    pub application: ApplicationRef,
}

/// A single "execute(input) -> output | error" capability
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn execute(&self, input: Value) -> AgentResult<Value>;
}

struct RegisteredTool {
    definition: Tool,
    handler: Box<dyn ToolHandler>,
}

/// The fixed set of tools available to one conversation
pub struct ToolRegistry {
    application: ApplicationRef,
    tools: BTreeMap<ToolName, RegisteredTool>,
}

impl ToolRegistry {
    /// Bind every tool in the catalog to `application`
    pub fn new(client: Arc<dyn ResourceClient>, application: ApplicationRef) -> Self {
        let scope = Scope {
            client,
            application: application.clone(),
        };

        let tools = ToolName::iter()
            .map(|name| {
                let registered = RegisteredTool {
                    definition: name.definition(),
                    handler: handlers::handler_for(name, scope.clone()),
                };
                (name, registered)
            })
            .collect();

        Self { application, tools }
    }

    pub fn application(&self) -> &ApplicationRef {
        &self.application
    }

    /// Tool definitions in catalog order
    pub fn tools(&self) -> Vec<Tool> {
        self.tools
            .values()
            .map(|registered| registered.definition.clone())
            .collect()
    }

    /// Dispatch a call to the tool it names
    pub async fn call(&self, call: &ToolCall) -> AgentResult<Value> {
        let registered = ToolName::from_str(&call.name)
            .ok()
            .and_then(|name| self.tools.get(&name))
            .ok_or_else(|| AgentError::ToolNotFound(call.name.clone()))?;

        registered.handler.execute(call.arguments.clone()).await
    }
}
