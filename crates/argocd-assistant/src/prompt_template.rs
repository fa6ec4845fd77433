use include_dir::{include_dir, Dir};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tera::{Context, Error as TeraError, Tera};

static PROMPTS: Dir = include_dir!("$CARGO_MANIFEST_DIR/src/prompts");

/// Name of the embedded system prompt template
pub const SYSTEM_PROMPT: &str = "system.md";

pub fn load_prompt<T: Serialize>(template: &str, context_data: &T) -> Result<String, TeraError> {
    let mut tera = Tera::default();
    tera.add_raw_template("inline_template", template)?;
    let context = Context::from_serialize(context_data)?;
    let rendered = tera.render("inline_template", &context)?;
    Ok(rendered)
}

/// Render one of the templates compiled into the binary
pub fn load_embedded_prompt<T: Serialize>(
    name: &str,
    context_data: &T,
) -> Result<String, TeraError> {
    load_prompt(embedded_prompt(name)?, context_data)
}

fn embedded_prompt(name: &str) -> Result<&'static str, TeraError> {
    PROMPTS
        .get_file(name)
        .and_then(|file| file.contents_utf8())
        .ok_or_else(|| TeraError::msg(format!("No embedded prompt named {}", name)))
}

/// Read a prompt from disk, expanding `~` and resolving relative paths against the
/// working directory
pub fn read_prompt_file(prompt_file: impl Into<PathBuf>) -> Result<String, TeraError> {
    let path = resolve_path(&prompt_file.into())?;
    fs::read_to_string(&path).map_err(|e| {
        let message = format!("Failed to read prompt file {}", path.display());
        TeraError::chain(message, e)
    })
}

fn resolve_path(path: &Path) -> Result<PathBuf, TeraError> {
    let raw = path.to_string_lossy();
    let expanded = PathBuf::from(shellexpand::tilde(raw.as_ref()).as_ref());
    if expanded.is_absolute() {
        return Ok(expanded);
    }
    let cwd = std::env::current_dir()
        .map_err(|e| TeraError::chain("Failed to resolve the working directory", e))?;
    Ok(cwd.join(expanded))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::argocd::ApplicationRef;
    use crate::models::tool::Tool;
    use serde_json::json;
    use std::collections::HashMap;
    use std::fs;

    #[derive(Serialize)]
    struct SystemContext {
        application: ApplicationRef,
        tools: Vec<Tool>,
    }

    #[test]
    fn test_load_prompt() {
        let template = "Hello, {{ name }}! You are {{ age }} years old.";
        let mut context = HashMap::new();
        context.insert("name".to_string(), "Alice".to_string());
        context.insert("age".to_string(), 30.to_string());

        let result = load_prompt(template, &context).unwrap();
        assert_eq!(result, "Hello, Alice! You are 30 years old.");
    }

    #[test]
    fn test_load_prompt_missing_variable() {
        let template = "Hello, {{ name }}! You are {{ age }} years old.";
        let mut context = HashMap::new();
        context.insert("name".to_string(), "Alice".to_string());
        let result = load_prompt(template, &context);
        assert!(result.is_err());
    }

    #[test]
    fn test_read_prompt_file_is_verbatim() {
        let content = "Helm values look like {{ .Values.image.tag }}";
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("prompt.md");
        fs::write(&file_path, content).unwrap();

        let result = read_prompt_file(&file_path).unwrap();
        assert_eq!(result, content);

        temp_dir.close().unwrap();
    }

    #[test]
    fn test_read_prompt_file_missing_file() {
        let result = read_prompt_file("non_existent_prompt.md");
        assert!(result.is_err());
    }

    #[test]
    fn test_relative_paths_resolve_against_cwd() {
        let resolved = resolve_path(Path::new("prompts/custom.md")).unwrap();
        assert_eq!(
            resolved,
            std::env::current_dir().unwrap().join("prompts/custom.md")
        );

        let absolute = resolve_path(Path::new("/etc/assistant/prompt.md")).unwrap();
        assert_eq!(absolute, PathBuf::from("/etc/assistant/prompt.md"));
    }

    #[test]
    fn test_embedded_system_prompt() {
        let context = SystemContext {
            application: ApplicationRef::new("argocd", "guestbook").with_project("default"),
            tools: vec![
                Tool::new("getApplication", "Fetch the Application.", json!({})),
                Tool::new("getPodLogs", "Fetch logs for a pod.", json!({})),
            ],
        };

        let prompt = load_embedded_prompt(SYSTEM_PROMPT, &context).unwrap();
        assert!(prompt.contains("`guestbook` in namespace `argocd` (project `default`)"));
        assert!(prompt.contains("- getApplication: Fetch the Application."));
        assert!(prompt.contains("- getPodLogs: Fetch logs for a pod."));
        assert!(prompt.contains("Never invent values."));
    }

    #[test]
    fn test_embedded_system_prompt_without_project() {
        let context = SystemContext {
            application: ApplicationRef::new("argocd", "guestbook"),
            tools: vec![],
        };

        let prompt = load_embedded_prompt(SYSTEM_PROMPT, &context).unwrap();
        assert!(prompt.contains("`guestbook` in namespace `argocd`."));
        assert!(!prompt.contains("project"));
    }

    #[test]
    fn test_unknown_embedded_prompt() {
        let context: HashMap<String, String> = HashMap::new();
        assert!(load_embedded_prompt("status.md", &context).is_err());
    }

    #[test]
    fn test_load_prompt_with_tools() {
        let template = "### Tool Descriptions\n{% for tool in tools %}\n{{tool.name}}: {{tool.description}}{% endfor %}";

        let tools = vec![
            Tool::new(
                "getPodLogs",
                "Fetch logs for a pod",
                json!({
                    "type": "object",
                    "properties": {
                        "podName": {"type": "string"}
                    }
                }),
            ),
            Tool::new(
                "getApplicationEvents",
                "Fetch Kubernetes events",
                json!({"type": "object", "properties": {}}),
            ),
        ];

        let mut context = HashMap::new();
        context.insert("tools".to_string(), tools);

        let result = load_prompt(template, &context).unwrap();
        let expected = "### Tool Descriptions\n\ngetPodLogs: Fetch logs for a pod\ngetApplicationEvents: Fetch Kubernetes events";
        assert_eq!(result, expected);
    }
}
