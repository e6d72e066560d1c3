//! Domain ID generation
//!
//! All IDs use the format: `{6-char-hex}-{type}-{slug}`
//! Example: `019635-plan-research-laptops`

/// Generate a domain ID from type and description
pub fn generate_id(domain_type: &str, description: &str) -> String {
    let uuid = uuid::Uuid::now_v7();
    let hex_prefix = &uuid.to_string()[..6];
    let slug = slugify(description);
    format!("{}-{}-{}", hex_prefix, domain_type, slug)
}

/// Slugify a description for use in IDs
fn slugify(text: &str) -> String {
    text.to_lowercase()
        .chars()
        // Strip apostrophes entirely, replace other non-alphanumeric with hyphens
        .filter_map(|c| {
            if c.is_alphanumeric() {
                Some(c)
            } else if c == '\'' || c == '\u{2019}' || c == '\u{2018}' {
                None
            } else {
                Some('-')
            }
        })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .take(6)
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_id() {
        let id = generate_id("goal", "Research the best laptops");
        assert!(id.len() > 10);
        assert!(id.contains("-goal-"));
        assert!(id.contains("research-the-best-laptops"));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("Book a flight!"), "book-a-flight");
        assert_eq!(slugify("Multiple   Spaces"), "multiple-spaces");
        assert_eq!(slugify("what's next"), "whats-next");
    }

    #[test]
    fn test_slugify_truncates_long_descriptions() {
        let slug = slugify("one two three four five six seven eight");
        assert_eq!(slug, "one-two-three-four-five-six");
    }

    #[test]
    fn test_ids_are_unique() {
        let a = generate_id("task", "same description");
        let b = generate_id("task", "same description");
        assert_ne!(a, b);
    }
}
