use crate::schema::record::SourceKind;

/// Prompt template for the drafting collaborator
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    pub system_prompt: String,
    pub user_prompt_template: String,
}

/// Prompts for pedigree drafting
pub struct DraftPrompts;

impl DraftPrompts {
    /// Get the pedigree drafting prompt
    pub fn pedigree_drafting() -> PromptTemplate {
        PromptTemplate {
            system_prompt: r#"You draft structured family-health-history records from interview text. Your role is to:

1. Identify every family member mentioned, including the person giving the history (the proband)
2. Record each member's sex at birth, vital status and reported conditions
3. Record parent-child and partner relationships between members
4. Leave anything not stated as unknown rather than guessing

Names in the text may already be placeholders such as Person-1; keep them exactly as written.

Answer with exactly one JSON object of this shape, and nothing before it:

{
  "schema_version": 3,
  "individuals": [
    {
      "id": 1,
      "name": "Person-1",
      "sex_at_birth": "female",
      "vital_status": "living",
      "date_of_birth": null,
      "conditions": {"breast cancer": "affected"},
      "proband": true
    }
  ],
  "relationships": [
    {"kind": "parent_of", "from": 1, "to": 2, "confidence": 0.8, "biological": true}
  ]
}

If one detail would most improve the record, append a single clarifying question on a new line after the JSON object. Otherwise append nothing."#.to_string(),

            user_prompt_template: r#"Draft a pedigree record from the following {source_kind}:

{transcript}"#.to_string(),
        }
    }
}

impl PromptTemplate {
    /// Fill the user prompt template
    pub fn render(&self, transcript: &str, source: SourceKind) -> String {
        let source_kind = match source {
            SourceKind::Conversation => "interview transcript",
            SourceKind::Document => "recognized document text",
            SourceKind::Upload => "uploaded notes",
        };
        self.user_prompt_template
            .replace("{source_kind}", source_kind)
            .replace("{transcript}", transcript)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_substitutes_both_placeholders() {
        let template = DraftPrompts::pedigree_drafting();
        let rendered = template.render("my mother had asthma", SourceKind::Conversation);
        assert!(rendered.contains("interview transcript"));
        assert!(rendered.contains("my mother had asthma"));
        assert!(!rendered.contains("{transcript}"));
    }

    #[test]
    fn test_system_prompt_pins_the_reply_shape() {
        let template = DraftPrompts::pedigree_drafting();
        assert!(template.system_prompt.contains("schema_version"));
        assert!(template.system_prompt.contains("exactly one JSON object"));
    }
}
