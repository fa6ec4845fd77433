use argocd_assistant::agent::AgentConfig;
use argocd_assistant::providers::configs::OpenAiProviderConfig;
use std::sync::Arc;

/// Shared application state, fixed at startup
#[derive(Clone)]
pub struct AppState {
    pub provider_config: OpenAiProviderConfig,
    pub argocd_token: String,
    pub agent_config: Arc<AgentConfig>,
}

impl AppState {
    pub fn new(
        provider_config: OpenAiProviderConfig,
        argocd_token: impl Into<String>,
        agent_config: AgentConfig,
    ) -> Self {
        Self {
            provider_config,
            argocd_token: argocd_token.into(),
            agent_config: Arc::new(agent_config),
        }
    }
}
