//! Prompt text sent to the language-model oracle

use crate::storage::Candidate;

pub const SELECTION_SYSTEM: &str = "\
You match a user's description of a food to rows of a nutrition database.
Pick the single row that best matches what the user ate.
Answer with one JSON object and nothing else:
{\"status\": \"SELECTED\" | \"NO_MATCH\" | \"AMBIGUOUS\", \"food_id\": <id or null>, \"confidence\": \"<short reasoning>\"}
Use SELECTED only with a food_id taken from the listed rows.
Use NO_MATCH when no row describes the food.
Use AMBIGUOUS when several rows fit equally well.";

pub const ESTIMATE_SYSTEM: &str = "\
You estimate the nutrition of a food portion.
Answer with one JSON object and nothing else:
{\"calories\": <kcal>, \"protein\": <grams>, \"carbs\": <grams>, \"fat\": <grams>}
All four values must be non-negative numbers for the whole portion.";

/// User message for a disambiguation request
pub fn selection_prompt(context: &str, candidates: &[Candidate]) -> String {
    let rows: Vec<String> = candidates
        .iter()
        .map(|c| format!("- ID {}: {}", c.id, c.name))
        .collect();
    format!("User input: {}\n\nSearch results:\n{}", context, rows.join("\n"))
}

/// User message for an estimation request
pub fn estimate_prompt(name: &str, quantity: f64, unit: &str) -> String {
    format!("Food: {}\nPortion: {} {}", name, quantity, unit)
}
