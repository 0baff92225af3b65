//! Prompt templates for the Umrah Guide engine.
//!
//! Every query intent has a Handlebars template compiled into the binary.
//! A workspace may replace any of them with `.umrah/prompts/<id>.yml`.
//! Templates receive two variables: `question` (verbatim) and `context`
//! (retrieved passages).

pub mod builder;
pub mod defaults;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::PromptLibrary;
pub use loader::{list_prompts, load_prompt};
pub use types::{BuiltPrompt, PromptDefinition};
