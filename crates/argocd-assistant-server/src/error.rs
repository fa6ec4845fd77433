use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {env_var}")]
    MissingEnvVar { env_var: String },

    #[error("Invalid value for {env_var}: {message}")]
    InvalidValue {
        env_var: String,
        message: String,
    },

    #[error("Configuration error: {0}")]
    Other(#[from] config::ConfigError),
}

/// Name of the environment variable a settings field is read from
pub fn to_env_var(field: &str) -> String {
    field.replace('.', "__").to_uppercase()
}
