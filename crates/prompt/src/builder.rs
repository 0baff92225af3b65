//! Prompt library: built-in templates merged with workspace overrides.

use crate::defaults::builtin_prompts;
use crate::loader::{list_prompts, load_prompt};
use crate::types::{BuiltPrompt, PromptDefinition};
use handlebars::Handlebars;
use std::collections::HashMap;
use std::path::Path;
use umrah_core::{AppError, AppResult};

/// Registry of prompt definitions, keyed by id.
#[derive(Debug, Clone)]
pub struct PromptLibrary {
    prompts: HashMap<String, PromptDefinition>,
}

impl PromptLibrary {
    /// Library with only the compiled-in templates.
    pub fn builtin() -> Self {
        let prompts = builtin_prompts()
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect();
        Self { prompts }
    }

    /// Built-in templates, replaced by any `.umrah/prompts/<id>.yml` found in
    /// the workspace. Override files with unknown ids are added as-is.
    pub fn load(workspace_path: &Path) -> AppResult<Self> {
        let mut library = Self::builtin();

        for id in list_prompts(workspace_path)? {
            if let Some(definition) = load_prompt(workspace_path, &id)? {
                library.prompts.insert(id, definition);
            }
        }

        Ok(library)
    }

    pub fn get(&self, id: &str) -> Option<&PromptDefinition> {
        self.prompts.get(id)
    }

    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.prompts.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Render the template `id` with the given variables.
    ///
    /// # Errors
    /// `AppError::Prompt` if the id is unknown or the template fails to render.
    pub fn render(&self, id: &str, variables: &HashMap<String, String>) -> AppResult<BuiltPrompt> {
        let definition = self
            .prompts
            .get(id)
            .ok_or_else(|| AppError::Prompt(format!("Unknown prompt template: {}", id)))?;

        tracing::debug!("Rendering prompt: {}", definition.id);

        let user = render_template(&definition.template, variables)?;

        Ok(BuiltPrompt {
            system: definition.system.clone(),
            user,
            template_id: definition.id.clone(),
        })
    }
}

impl Default for PromptLibrary {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Render a Handlebars template with variables.
fn render_template(template: &str, variables: &HashMap<String, String>) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Plain text, never HTML
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    let rendered = handlebars
        .render("prompt", variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))?;

    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults;
    use std::fs;
    use tempfile::TempDir;

    fn vars(question: &str, context: &str) -> HashMap<String, String> {
        let mut vars = HashMap::new();
        vars.insert("question".to_string(), question.to_string());
        vars.insert("context".to_string(), context.to_string());
        vars
    }

    #[test]
    fn test_render_builtin_embeds_question_verbatim() {
        let library = PromptLibrary::builtin();
        let built = library
            .render(
                defaults::RITUAL,
                &vars("What is Tawaf & Sa'i?", "Ritual Section: tawaf"),
            )
            .unwrap();

        assert!(built.user.contains("Question: What is Tawaf & Sa'i?"));
        assert!(built.user.contains("Ritual Section: tawaf"));
        assert!(built.system.is_some());
        assert_eq!(built.template_id, defaults::RITUAL);
    }

    #[test]
    fn test_hotel_live_mentions_live_confirmation() {
        let library = PromptLibrary::builtin();
        let built = library
            .render(defaults::HOTEL_LIVE, &vars("Is it available tonight?", ""))
            .unwrap();
        assert!(built.user.contains("confirmed live"));
    }

    #[test]
    fn test_unknown_template() {
        let library = PromptLibrary::builtin();
        let result = library.render("umrah.nope", &HashMap::new());
        assert!(matches!(result, Err(AppError::Prompt(_))));
    }

    #[test]
    fn test_missing_variable_renders_empty() {
        let output = render_template("Q: {{question}}|{{context}}", &HashMap::new()).unwrap();
        assert_eq!(output, "Q: |");
    }

    #[test]
    fn test_workspace_override_replaces_builtin() {
        let temp_dir = TempDir::new().unwrap();
        let prompts_dir = temp_dir.path().join(".umrah/prompts");
        fs::create_dir_all(&prompts_dir).unwrap();
        fs::write(
            prompts_dir.join("umrah.train.yml"),
            "id: umrah.train\ntitle: Trains\ntemplate: \"TRAIN {{question}}\"\n",
        )
        .unwrap();

        let library = PromptLibrary::load(temp_dir.path()).unwrap();
        let built = library
            .render(defaults::TRAIN, &vars("Makkah to Madinah?", "ctx"))
            .unwrap();

        assert_eq!(built.user, "TRAIN Makkah to Madinah?");
        assert!(built.system.is_none());
        // untouched ids keep their defaults
        assert!(library.get(defaults::HOTEL).unwrap().system.is_some());
    }
}
