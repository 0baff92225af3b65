//! Built-in prompt templates, one per query intent.

use crate::types::PromptDefinition;

pub const RITUAL: &str = "umrah.ritual";
pub const ATTRACTION: &str = "umrah.attraction";
pub const HOTEL: &str = "umrah.hotel";
pub const HOTEL_LIVE: &str = "umrah.hotel_live";
pub const REVIEW: &str = "umrah.review";
pub const PACKAGE: &str = "umrah.package";
pub const TRAIN: &str = "umrah.train";
pub const GENERAL: &str = "umrah.general";
pub const UNGROUNDED: &str = "umrah.ungrounded";

const GROUNDED_SYSTEM: &str = "You are an Umrah travel assistant. Answer only from the provided \
context. If the context does not contain the answer, say so plainly instead of guessing.";

const GROUNDED_TAIL: &str = "\n\nContext:\n{{context}}\n\nQuestion: {{question}}\n\nAnswer:";

/// (id, title, instruction)
const GROUNDED: &[(&str, &str, &str)] = &[
    (
        RITUAL,
        "Ritual guidance",
        "Explain the Umrah ritual the question asks about, step by step, using the ritual guide \
excerpts below. Mention the required conditions and common mistakes when the context covers them.",
    ),
    (
        ATTRACTION,
        "Attractions and places to visit",
        "Describe the places to visit and services available in the city the question is about, \
using the destination guide excerpts below.",
    ),
    (
        HOTEL,
        "Hotel recommendations",
        "Recommend hotels that match the question using the hotel listings below. For each hotel \
give its name, stars, distance to the Haram, and the room types or amenities relevant to the \
question.",
    ),
    (
        HOTEL_LIVE,
        "Hotel availability and prices",
        "The question asks about live availability, booking, or current prices. Answer from the \
hotel listings below, and state clearly that these prices and availability come from a stored \
snapshot and must be confirmed live with the hotel or a booking site before travelling.",
    ),
    (
        REVIEW,
        "Pilgrim experiences",
        "Summarise what other pilgrims report about the topic of the question, using the reviews \
below. Attribute opinions to the community they come from and note where experiences disagree.",
    ),
    (
        PACKAGE,
        "Umrah packages",
        "Answer the question about Umrah packages and trip planning using the context below. \
Cover what a package typically includes, costs mentioned, and what to check before booking.",
    ),
    (
        TRAIN,
        "Transport between the holy cities",
        "Answer the question about travelling between Makkah, Madinah, and Jeddah using the \
context below. Mention the Haramain train, journey times, and station locations when available.",
    ),
    (
        GENERAL,
        "General Umrah question",
        "Based on the following context about Umrah, hotels, and destinations, please answer the \
question accurately and helpfully.",
    ),
];

/// All built-in prompt definitions.
pub fn builtin_prompts() -> Vec<PromptDefinition> {
    let mut prompts: Vec<PromptDefinition> = GROUNDED
        .iter()
        .map(|(id, title, instruction)| PromptDefinition {
            id: id.to_string(),
            title: title.to_string(),
            system: Some(GROUNDED_SYSTEM.to_string()),
            template: format!("{instruction}{GROUNDED_TAIL}"),
        })
        .collect();

    prompts.push(PromptDefinition {
        id: UNGROUNDED.to_string(),
        title: "Ungrounded fallback".to_string(),
        system: Some(
            "You are an Umrah travel assistant. No reference material is available for this \
question, so answer from general knowledge and keep the answer short."
                .to_string(),
        ),
        template: "Question: {{question}}\n\nAnswer:".to_string(),
    });

    prompts
}
