/// Connection settings for an OpenAI compatible chat completions API
#[derive(Clone)]
pub struct OpenAiProviderConfig {
    /// Base URL including the version prefix, e.g. `https://api.openai.com/v1`
    pub host: String,
    pub api_key: String,
    pub model: String,
}

impl OpenAiProviderConfig {
    pub fn new<H, K, M>(host: H, api_key: K, model: M) -> Self
    where
        H: Into<String>,
        K: Into<String>,
        M: Into<String>,
    {
        Self {
            host: host.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }
}

impl std::fmt::Debug for OpenAiProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProviderConfig")
            .field("host", &self.host)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .finish()
    }
}
