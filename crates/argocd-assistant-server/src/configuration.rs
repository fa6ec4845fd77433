use crate::error::{to_env_var, ConfigError};
use argocd_assistant::agent::{AgentConfig, DEFAULT_MAX_STEPS};
use argocd_assistant::prompt_template::read_prompt_file;
use argocd_assistant::providers::configs::OpenAiProviderConfig;
use config::{Config, Environment};
use serde::Deserialize;
use std::net::{SocketAddr, ToSocketAddrs};

/// Process-wide settings, read once from the environment at startup
#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_model")]
    pub model: String,
    pub openai_api_key: String,
    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,
    pub argocd_api_token: String,
    #[serde(default)]
    pub custom_prompt_file: Option<String>,
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let settings = Self::load()?;
        settings.validate()?;
        Ok(settings)
    }

    fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("host", default_host())?
            .set_default("port", default_port())?
            .set_default("model", default_model())?
            .set_default("openai_base_url", default_openai_base_url())?
            .add_source(Environment::default().try_parsing(true))
            .build()?;

        match config.try_deserialize::<Self>() {
            Ok(settings) => Ok(settings),
            Err(err) => {
                tracing::debug!("Configuration error: {:?}", &err);

                let error_str = err.to_string();
                if error_str.starts_with("missing field") {
                    // "missing field `openai_api_key`"
                    let field = error_str
                        .trim_start_matches("missing field `")
                        .trim_end_matches('`');
                    Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    })
                } else if let config::ConfigError::NotFound(field) = &err {
                    Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    })
                } else {
                    Err(ConfigError::Other(err))
                }
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("openai_api_key", &self.openai_api_key),
            ("argocd_api_token", &self.argocd_api_token),
            ("model", &self.model),
            ("openai_base_url", &self.openai_base_url),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingEnvVar {
                    env_var: to_env_var(field),
                });
            }
        }

        if self.max_steps == 0 {
            return Err(ConfigError::InvalidValue {
                env_var: to_env_var("max_steps"),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            env_var: to_env_var("host"),
            message,
        };
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| invalid(e.to_string()))?
            .next()
            .ok_or_else(|| invalid(format!("{} did not resolve to an address", self.host)))
    }

    pub fn provider_config(&self) -> OpenAiProviderConfig {
        OpenAiProviderConfig::new(
            self.openai_base_url.clone(),
            self.openai_api_key.clone(),
            self.model.clone(),
        )
    }

    /// Load the custom prompt, if any, before serving requests
    pub fn agent_config(&self) -> Result<AgentConfig, ConfigError> {
        let prompt_file = self
            .custom_prompt_file
            .as_deref()
            .map(str::trim)
            .filter(|path| !path.is_empty());

        let instructions = match prompt_file {
            Some(path) => {
                let text = read_prompt_file(path).map_err(|e| ConfigError::InvalidValue {
                    env_var: to_env_var("custom_prompt_file"),
                    message: e.to_string(),
                })?;
                tracing::info!(path, "using custom system prompt");
                Some(text)
            }
            None => None,
        };

        AgentConfig::new(self.max_steps, instructions).map_err(|e| {
            let field = if prompt_file.is_some() && self.max_steps > 0 {
                "custom_prompt_file"
            } else {
                "max_steps"
            };
            ConfigError::InvalidValue {
                env_var: to_env_var(field),
                message: e.to_string(),
            }
        })
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_model() -> String {
    "gpt-5-mini".to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_max_steps() -> usize {
    DEFAULT_MAX_STEPS
}
