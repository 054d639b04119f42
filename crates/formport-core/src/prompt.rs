use crate::step::StepSpec;

/// A named input included verbatim in the prompt: legacy source files or
/// artifacts from earlier steps.
#[derive(Debug, Clone)]
pub struct PromptInput {
    pub label: String,
    pub text: String,
}

impl PromptInput {
    pub fn new(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            text: text.into(),
        }
    }
}

/// Assemble the full prompt for a step: the embedded template with entity
/// placeholders substituted, followed by one labelled section per input.
pub fn build_prompt(
    spec: &StepSpec,
    entity: &str,
    form_name: &str,
    sources: &[PromptInput],
    artifacts: &[PromptInput],
) -> String {
    let mut parts = vec![spec
        .template
        .replace("{entity}", entity)
        .replace("{form_name}", form_name)];

    for input in sources {
        parts.push(String::new());
        parts.push(format!("--- Legacy source: {} ---", input.label));
        parts.push(input.text.clone());
    }

    for input in artifacts {
        parts.push(String::new());
        parts.push(format!("--- Pipeline artifact: {} ---", input.label));
        parts.push(input.text.clone());
    }

    parts.join("\n")
}

/// Strip a Markdown code fence wrapping the whole response, if present.
///
/// Backends regularly wrap output in ```` ```json ```` or ```` ```csharp ````
/// fences despite instructions; the content inside is what we want. Text
/// that is not a single fenced block is returned unchanged.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body_start) = rest.find('\n') else {
        return trimmed;
    };
    let body = &rest[body_start + 1..];
    let Some(body) = body.trim_end().strip_suffix("```") else {
        return trimmed;
    };
    body.trim_end_matches(['\r', '\n']).trim_start_matches('\n')
}
