//! Prompt construction for the code generator: fixes the target language,
//! enumerates the tools a generated program may call out to, forbids
//! nested containerization and interactive input, and carries a unique
//! marker so two requests for the same task never collide on a cached
//! response by accident.

use uuid::Uuid;

use crate::llm::ToolDefinition;

use super::GenerateRequest;

pub fn build_prompt(request: &GenerateRequest, tools: &[ToolDefinition]) -> String {
    let marker = Uuid::now_v7();
    let mut prompt = String::new();

    prompt.push_str(&format!(
        "You write a single self-contained {} program that accomplishes a task. \
         Task marker (ignore, for cache-busting only): {marker}\n\n",
        request.language
    ));
    prompt.push_str(&format!("Task name: {}\n", request.task_name));
    prompt.push_str(&format!("Description: {}\n", request.description));

    if !request.context.is_empty() {
        prompt.push_str("Context parameters:\n");
        for (key, value) in &request.context {
            prompt.push_str(&format!("- {key}: {value}\n"));
        }
    }

    if !tools.is_empty() {
        prompt.push_str("\nTools available via HTTP POST to the registry's invocation endpoint:\n");
        for tool in tools {
            prompt.push_str(&format!("- {}: {}\n", tool.name, tool.description));
        }
    }

    prompt.push_str(
        "\nConstraints:\n\
         - Output exactly one fenced code block in the target language, nothing else.\n\
         - Do not launch nested containers or any sandboxing of your own.\n\
         - Do not block on interactive stdin; read all inputs from arguments or files.\n\
         - Do not import heavy data-science libraries unless the task explicitly requires them.\n",
    );

    if let Some(error) = &request.previous_error {
        prompt.push_str(&format!(
            "\nThe previous attempt failed with this error - fix it:\n{error}\n"
        ));
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Language;

    #[test]
    fn prompt_names_task_and_language() {
        let request = GenerateRequest::new("first_primes", "generate n primes", Language::Python);
        let prompt = build_prompt(&request, &[]);
        assert!(prompt.contains("python"));
        assert!(prompt.contains("first_primes"));
    }

    #[test]
    fn prompt_includes_previous_error_when_repairing() {
        let request = GenerateRequest::new("first_primes", "generate n primes", Language::Python)
            .with_previous_error("NameError: n is not defined");
        let prompt = build_prompt(&request, &[]);
        assert!(prompt.contains("NameError"));
    }

    #[test]
    fn prompt_lists_available_tools() {
        let request = GenerateRequest::new("scrape", "scrape a page", Language::Python);
        let tools = vec![ToolDefinition {
            name: "tool_http_get".to_string(),
            description: "fetch a URL".to_string(),
            input_schema: serde_json::json!({}),
        }];
        let prompt = build_prompt(&request, &tools);
        assert!(prompt.contains("tool_http_get"));
    }
}
