//! Prompt loader for workspace YAML overrides.

use crate::types::PromptDefinition;
use std::path::{Path, PathBuf};
use umrah_core::{AppError, AppResult};

fn prompts_dir(workspace_path: &Path) -> PathBuf {
    workspace_path.join(".umrah/prompts")
}

/// Load a prompt override by ID from the workspace.
///
/// Looks for `<id>.yml` in `.umrah/prompts/`. Returns `Ok(None)` when the
/// workspace carries no override for this id.
///
/// # Example
/// ```no_run
/// use umrah_prompt::load_prompt;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// if let Some(prompt) = load_prompt(Path::new("."), "umrah.hotel")? {
///     println!("Override: {}", prompt.title);
/// }
/// # Ok(())
/// # }
/// ```
pub fn load_prompt(workspace_path: &Path, prompt_id: &str) -> AppResult<Option<PromptDefinition>> {
    let prompt_file = prompts_dir(workspace_path).join(format!("{}.yml", prompt_id));

    if !prompt_file.exists() {
        return Ok(None);
    }

    tracing::debug!("Loading prompt override from: {:?}", prompt_file);

    let contents = std::fs::read_to_string(&prompt_file).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to read prompt file {:?}: {}",
            prompt_file, e
        ))
    })?;

    let definition: PromptDefinition = serde_yaml::from_str(&contents).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to parse prompt YAML {:?}: {}",
            prompt_file, e
        ))
    })?;

    validate_prompt(&definition)?;

    if definition.id != prompt_id {
        return Err(AppError::Prompt(format!(
            "Prompt file {:?} declares id '{}', expected '{}'",
            prompt_file, definition.id, prompt_id
        )));
    }

    tracing::info!("Loaded prompt override: {} ({})", definition.id, definition.title);

    Ok(Some(definition))
}

/// List the prompt override IDs present in the workspace.
pub fn list_prompts(workspace_path: &Path) -> AppResult<Vec<String>> {
    let dir = prompts_dir(workspace_path);

    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut prompt_ids = Vec::new();

    for entry in walkdir::WalkDir::new(&dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("yml") {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                prompt_ids.push(stem.to_string());
            }
        }
    }

    prompt_ids.sort();
    Ok(prompt_ids)
}

/// Validate a prompt definition.
pub(crate) fn validate_prompt(def: &PromptDefinition) -> AppResult<()> {
    if def.id.is_empty() {
        return Err(AppError::Prompt("Prompt ID cannot be empty".to_string()));
    }

    if def.title.is_empty() {
        return Err(AppError::Prompt("Prompt title cannot be empty".to_string()));
    }

    if def.template.trim().is_empty() {
        return Err(AppError::Prompt(
            "Prompt template cannot be empty".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_prompt(dir: &Path, id: &str, body: &str) {
        let prompts_dir = dir.join(".umrah/prompts");
        fs::create_dir_all(&prompts_dir).unwrap();
        fs::write(prompts_dir.join(format!("{}.yml", id)), body).unwrap();
    }

    #[test]
    fn test_load_valid_prompt() {
        let temp_dir = TempDir::new().unwrap();
        write_prompt(
            temp_dir.path(),
            "umrah.hotel",
            "id: umrah.hotel\ntitle: Hotels\nsystem: Be brief\ntemplate: \"{{context}} / {{question}}\"\n",
        );

        let prompt = load_prompt(temp_dir.path(), "umrah.hotel").unwrap().unwrap();
        assert_eq!(prompt.title, "Hotels");
        assert_eq!(prompt.system.as_deref(), Some("Be brief"));
    }

    #[test]
    fn test_missing_override_is_none() {
        let temp_dir = TempDir::new().unwrap();
        assert!(load_prompt(temp_dir.path(), "umrah.ritual").unwrap().is_none());
    }

    #[test]
    fn test_invalid_yaml_is_prompt_error() {
        let temp_dir = TempDir::new().unwrap();
        write_prompt(temp_dir.path(), "umrah.ritual", "id: [unclosed\n");

        let result = load_prompt(temp_dir.path(), "umrah.ritual");
        assert!(matches!(result, Err(AppError::Prompt(_))));
    }

    #[test]
    fn test_mismatched_id_rejected() {
        let temp_dir = TempDir::new().unwrap();
        write_prompt(
            temp_dir.path(),
            "umrah.train",
            "id: umrah.package\ntitle: Packages\ntemplate: \"{{question}}\"\n",
        );

        let err = load_prompt(temp_dir.path(), "umrah.train").unwrap_err();
        assert!(err.to_string().contains("expected 'umrah.train'"));
    }

    #[test]
    fn test_empty_template_rejected() {
        let def = PromptDefinition {
            id: "umrah.general".to_string(),
            title: "General".to_string(),
            system: None,
            template: "   ".to_string(),
        };
        assert!(validate_prompt(&def).is_err());
    }

    #[test]
    fn test_list_prompts_sorted() {
        let temp_dir = TempDir::new().unwrap();
        write_prompt(temp_dir.path(), "umrah.train", "id: umrah.train\ntitle: t\ntemplate: x\n");
        write_prompt(temp_dir.path(), "umrah.hotel", "id: umrah.hotel\ntitle: h\ntemplate: x\n");
        fs::write(temp_dir.path().join(".umrah/prompts/notes.txt"), "ignored").unwrap();

        let ids = list_prompts(temp_dir.path()).unwrap();
        assert_eq!(ids, vec!["umrah.hotel", "umrah.train"]);
    }

    #[test]
    fn test_list_prompts_without_directory() {
        let temp_dir = TempDir::new().unwrap();
        assert!(list_prompts(temp_dir.path()).unwrap().is_empty());
    }
}
