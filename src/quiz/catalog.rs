//! Built-in quiz categories offered by the category picker.
//!
//! Users may also type a free-text category; only ids listed here are
//! translated to a display name before reaching the prompt.

use serde::Serialize;

/// One entry of the category catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CategoryInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

const fn category(id: &'static str, name: &'static str, description: &'static str) -> CategoryInfo {
    CategoryInfo {
        id,
        name,
        description,
    }
}

/// The built-in categories, in picker order.
pub const CATEGORIES: &[CategoryInfo] = &[
    category("science", "Science", "Biology, Chemistry, Physics"),
    category("history", "History", "World events and civilizations"),
    category("geography", "Geography", "Countries, capitals, landmarks"),
    category("sports", "Sports", "Athletes, teams, championships"),
    category("general", "General Knowledge", "Mixed topics and trivia"),
    category("technology", "Technology", "Programming, languages, cybersecurity"),
    category("space-astronomy", "Space & Astronomy", "Astrophysics, planetary science, space tech"),
    category("arts-creativity", "Arts & Creativity", "Music theory, dance, art & artists"),
    category("logic-brain-games", "Logic & Brain Games", "Riddles, aptitude, IQ tests"),
    category("business", "Business", "Companies, entrepreneurship, economics"),
    category("health", "Health", "Medicine, wellness, human body"),
    category("literature", "Literature", "Authors, novels, poetry, plays"),
    category("philosophy", "Philosophy", "Ethics, metaphysics, great thinkers"),
    category("environment", "Environment", "Climate, ecology, conservation"),
    category("politics", "Politics", "Governments, policies, political theory"),
    category("food", "Food & Cuisine", "Cooking, ingredients, world cuisines"),
    category("cinema", "Cinema", "Movies, directors, film history"),
    category("mythology", "Mythology", "Gods, legends, ancient myths"),
    category("psychology", "Psychology", "Mind, behavior, mental processes"),
];

/// Looks up a catalog entry by id (case-insensitive).
pub fn find(id: &str) -> Option<&'static CategoryInfo> {
    CATEGORIES.iter().find(|c| c.id.eq_ignore_ascii_case(id))
}

/// Returns the display name for a catalog id, or `category` itself for free text.
pub fn display_name(category: &str) -> &str {
    match find(category) {
        Some(info) => info.name,
        None => category,
    }
}
