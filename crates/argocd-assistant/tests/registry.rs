use anyhow::Result;
use argocd_assistant::argocd::{ApplicationRef, ArgoCdClient};
use argocd_assistant::errors::AgentError;
use argocd_assistant::models::tool::ToolCall;
use argocd_assistant::tools::ToolRegistry;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "argo-token";

async fn setup() -> Result<(MockServer, ToolRegistry)> {
    let server = MockServer::start().await;
    let client = ArgoCdClient::new(&server.uri(), TOKEN)?;
    let registry = ToolRegistry::new(
        Arc::new(client),
        ApplicationRef::new("argocd", "guestbook"),
    );
    Ok((server, registry))
}

fn argocd_get(route: &str) -> wiremock::MockBuilder {
    Mock::given(method("GET"))
        .and(path(route))
        .and(query_param("appNamespace", "argocd"))
        .and(header("authorization", "Bearer argo-token"))
}

#[tokio::test]
async fn test_get_application() -> Result<()> {
    let (server, registry) = setup().await?;
    let application = json!({
        "metadata": {
            "name": "guestbook",
            "namespace": "argocd",
            "managedFields": [{"manager": "argocd-server", "operation": "Update"}]
        },
        "status": {"sync": {"status": "OutOfSync"}, "health": {"status": "Degraded"}}
    });
    argocd_get("/api/v1/applications/guestbook")
        .respond_with(ResponseTemplate::new(200).set_body_json(application))
        .expect(1)
        .mount(&server)
        .await;

    let call = ToolCall::new("getApplication", json!({}));
    let output = registry.call(&call).await?;

    assert_eq!(output["metadata"]["managedFields"], json!([]));
    assert_eq!(output["status"]["sync"]["status"], "OutOfSync");
    Ok(())
}

#[tokio::test]
async fn test_get_pod_logs() -> Result<()> {
    let (server, registry) = setup().await?;
    let logs = "{\"result\":{\"content\":\"a\"}}\n\nnot-json\n{\"content\":\"b\"}\n";
    argocd_get("/api/v1/applications/guestbook/pods/guestbook-ui-7d9c/logs")
        .and(query_param("follow", "false"))
        .and(query_param("tailLines", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_string(logs))
        .expect(1)
        .mount(&server)
        .await;

    let call = ToolCall::new("getPodLogs", json!({"podName": "guestbook-ui-7d9c"}));
    let output = registry.call(&call).await?;

    assert_eq!(output, json!(["a", "b"]));
    Ok(())
}

#[tokio::test]
async fn test_get_workload_logs() -> Result<()> {
    let (server, registry) = setup().await?;
    let logs = "{\"result\":{\"content\":\"listening on :80\"}}\n";
    argocd_get("/api/v1/applications/guestbook/logs")
        .and(query_param("namespace", "default"))
        .and(query_param("resourceName", "guestbook-ui"))
        .and(query_param("group", "apps"))
        .and(query_param("kind", "Deployment"))
        .and(query_param("version", "v1"))
        .and(query_param("tailLines", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_string(logs))
        .expect(1)
        .mount(&server)
        .await;

    let input = json!({
        "namespace": "default",
        "name": "guestbook-ui",
        "group": "apps",
        "kind": "Deployment",
        "version": "v1"
    });
    let call = ToolCall::new("getWorkloadLogs", input);
    let output = registry.call(&call).await?;

    assert_eq!(output, json!(["listening on :80"]));
    Ok(())
}

#[tokio::test]
async fn test_get_resource_events() -> Result<()> {
    let (server, registry) = setup().await?;
    let events = json!({
        "items": [{"reason": "BackOff", "message": "Back-off restarting failed container"}]
    });
    argocd_get("/api/v1/applications/guestbook/events")
        .and(query_param("resourceUID", "5f0c"))
        .and(query_param("resourceNamespace", "default"))
        .and(query_param("resourceName", "guestbook-ui"))
        .respond_with(ResponseTemplate::new(200).set_body_json(events))
        .expect(1)
        .mount(&server)
        .await;

    let input = json!({
        "resourceUID": "5f0c",
        "resourceNamespace": "default",
        "resourceName": "guestbook-ui"
    });
    let call = ToolCall::new("getResourceEvents", input);
    let output = registry.call(&call).await?;

    assert_eq!(output["items"][0]["reason"], "BackOff");
    Ok(())
}

#[tokio::test]
async fn test_argocd_errors_are_reported() -> Result<()> {
    let (server, registry) = setup().await?;
    argocd_get("/api/v1/applications/guestbook/resource-tree")
        .respond_with(ResponseTemplate::new(403).set_body_string("permission denied"))
        .mount(&server)
        .await;

    let err = registry
        .call(&ToolCall::new("getApplicationResourceTree", json!({})))
        .await
        .unwrap_err();

    match err {
        AgentError::ExecutionError(message) => {
            assert!(message.contains("403"));
            assert!(message.contains("permission denied"));
        }
        other => panic!("Expected an execution error, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn test_repeated_calls_return_the_same_result() -> Result<()> {
    let (server, registry) = setup().await?;
    let resources = json!({
        "items": [{"kind": "Service", "name": "guestbook-ui", "namespace": "default"}]
    });
    argocd_get("/api/v1/applications/guestbook/managed-resources")
        .respond_with(ResponseTemplate::new(200).set_body_json(resources))
        .expect(2)
        .mount(&server)
        .await;

    let call = ToolCall::new("getApplicationManagedResources", json!({}));
    let first = registry.call(&call).await?;
    let second = registry.call(&call).await?;

    assert_eq!(first, second);
    Ok(())
}
