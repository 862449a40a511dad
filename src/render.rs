use serde::{Deserialize, Serialize};

use crate::record::{FieldValue, Record};

/// One candidate match for a render rule: a value to compare against the
/// record field (case-insensitive) and the placeholder data to splice into
/// the rule template when it matches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Matcher {
    match_value: String,
    substitutions: Vec<(String, String)>,
}

impl Matcher {
    pub fn new(match_value: &str, substitutions: &[(&str, &str)]) -> Self {
        Matcher {
            match_value: match_value.to_string(),
            substitutions: substitutions
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
        }
    }

    /// Fill the template placeholders. The match value itself is available
    /// as `@value@`; declared substitutions follow in declaration order.
    /// Every occurrence of a placeholder is replaced; placeholders without
    /// a substitution stay in the output untouched.
    fn expand(&self, template: &str) -> String {
        let mut output = template.replace("@value@", &self.match_value);
        for (name, value) in &self.substitutions {
            output = output.replace(&format!("@{name}@"), value);
        }
        output
    }
}

/// Declarative mapping from a field's raw values to display strings.
/// At most one rule per field is honored; the first wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderRule {
    pub field: String,
    pub template: String,
    /// Used when no matcher matches. Empty means fall back to the raw value.
    pub default_template: String,
    pub matchers: Vec<Matcher>,
}

pub struct Renderer {
    rules: Vec<RenderRule>,
}

impl Renderer {
    pub fn new(rules: Vec<RenderRule>) -> Self {
        Renderer { rules }
    }

    /// Produce the display string for one cell. Matching only applies to
    /// string valued fields; list and other shapes fall through to the
    /// default template, or the raw value if the rule has none.
    pub fn render(&self, field: &str, record: &Record) -> String {
        let Some(rule) = self.rules.iter().find(|rule| rule.field == field) else {
            return record.raw(field);
        };

        if let Some(FieldValue::Text(value)) = record.get(field) {
            let value = value.to_lowercase();
            for matcher in &rule.matchers {
                if matcher.match_value.to_lowercase() == value {
                    return matcher.expand(&rule.template);
                }
            }
        }

        if !rule.default_template.is_empty() {
            return rule.default_template.clone();
        }
        record.raw(field)
    }
}
