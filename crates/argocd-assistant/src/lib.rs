pub mod agent;
pub mod argocd;
pub mod errors;
pub mod models;
pub mod prompt_template;
pub mod providers;
pub mod tools;
