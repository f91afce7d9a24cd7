//! Form definitions and the step transition table
//!
//! A form is an ordered list of fields. Each field is one step of the
//! conversation with exactly one validator; after the last field the form
//! reaches the terminal `Done` step. Evaluating input is pure: the same
//! input against the same step always yields the same transition.

use std::collections::HashMap;
use std::fmt;
use regex::Regex;
use serde::{Deserialize, Serialize};
use crate::utils::errors::{FormBuddyError, Result};

/// Identifier of the built-in registration form
pub const REGISTRATION_FORM: &str = "registration";

/// A position in a form
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Waiting for the named field
    Ask(String),
    /// All fields collected
    Done,
}

impl Step {
    pub fn ask(field: impl Into<String>) -> Self {
        Step::Ask(field.into())
    }

    /// Field expected at this step, if any
    pub fn field(&self) -> Option<&str> {
        match self {
            Step::Ask(field) => Some(field),
            Step::Done => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Step::Done)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Ask(field) => write!(f, "ask_{}", field),
            Step::Done => write!(f, "done"),
        }
    }
}

/// Validator attached to a field
#[derive(Debug, Clone)]
pub enum FieldKind {
    /// Free text, trimmed before checking. Length is counted in characters.
    Text {
        min_length: usize,
        max_length: usize,
        pattern: Option<Regex>,
    },
    /// Whole number within inclusive bounds
    Integer { min: i64, max: i64 },
}

/// One field of a form
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    /// Question sent to the user when this field is next
    pub prompt: String,
    pub kind: FieldKind,
    /// Reply sent when the input is rejected
    pub error_message: String,
}

impl FieldSpec {
    pub fn text(name: &str, prompt: &str, error_message: &str) -> Self {
        Self {
            name: name.to_string(),
            prompt: prompt.to_string(),
            kind: FieldKind::Text { min_length: 1, max_length: 255, pattern: None },
            error_message: error_message.to_string(),
        }
    }

    pub fn integer(name: &str, prompt: &str, error_message: &str, min: i64, max: i64) -> Self {
        Self {
            name: name.to_string(),
            prompt: prompt.to_string(),
            kind: FieldKind::Integer { min, max },
            error_message: error_message.to_string(),
        }
    }

    /// Restrict text length and optionally its shape
    pub fn with_text_rules(mut self, min_length: usize, max_length: usize, pattern: Option<&str>) -> Result<Self> {
        let pattern = pattern
            .map(Regex::new)
            .transpose()
            .map_err(|e| FormBuddyError::Config(format!("Invalid pattern for field {}: {}", self.name, e)))?;
        self.kind = FieldKind::Text { min_length, max_length, pattern };
        Ok(self)
    }

    /// Parse and validate raw input for this field
    pub fn parse(&self, raw_input: &str) -> std::result::Result<serde_json::Value, String> {
        let input = raw_input.trim();
        match &self.kind {
            FieldKind::Text { min_length, max_length, pattern } => {
                let length = input.chars().count();
                if length < *min_length || length > *max_length {
                    return Err(self.error_message.clone());
                }
                if let Some(regex) = pattern {
                    if !regex.is_match(input) {
                        return Err(self.error_message.clone());
                    }
                }
                Ok(serde_json::Value::String(input.to_string()))
            }
            FieldKind::Integer { min, max } => match input.parse::<i64>() {
                Ok(value) if (*min..=*max).contains(&value) => Ok(serde_json::Value::from(value)),
                _ => Err(self.error_message.clone()),
            },
        }
    }
}

/// Result of evaluating input against the current step
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Input is valid; store `value` under `field` and move to `next`
    Accepted {
        field: String,
        value: serde_json::Value,
        next: Step,
    },
    /// Input is invalid; state must stay unchanged
    Rejected { reason: String },
}

/// An ordered multi-step form
#[derive(Debug, Clone)]
pub struct FormDefinition {
    pub id: String,
    pub name: String,
    fields: Vec<FieldSpec>,
    /// Sent once the record has been stored
    pub completion_message: String,
}

impl FormDefinition {
    /// Build a form; field names must be unique and there must be at least one
    pub fn new(id: &str, name: &str, fields: Vec<FieldSpec>, completion_message: &str) -> Result<Self> {
        if fields.is_empty() {
            return Err(FormBuddyError::Config(format!("Form {} has no fields", id)));
        }
        for (index, field) in fields.iter().enumerate() {
            if fields[..index].iter().any(|f| f.name == field.name) {
                return Err(FormBuddyError::Config(
                    format!("Form {} declares field {} twice", id, field.name)
                ));
            }
        }

        Ok(Self {
            id: id.to_string(),
            name: name.to_string(),
            fields,
            completion_message: completion_message.to_string(),
        })
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Step a new session starts at
    pub fn first_step(&self) -> Step {
        Step::ask(self.fields[0].name.clone())
    }

    /// Step following the given field
    pub fn step_after(&self, field: &str) -> Option<Step> {
        let index = self.fields.iter().position(|f| f.name == field)?;
        Some(match self.fields.get(index + 1) {
            Some(next) => Step::ask(next.name.clone()),
            None => Step::Done,
        })
    }

    /// Question to send for a step
    pub fn prompt_for(&self, step: &Step) -> Option<&str> {
        step.field()
            .and_then(|name| self.field(name))
            .map(|field| field.prompt.as_str())
    }

    /// Evaluate raw input against the current step
    pub fn evaluate(&self, step: &Step, raw_input: &str) -> Transition {
        let field = match step.field().and_then(|name| self.field(name)) {
            Some(field) => field,
            None => {
                return Transition::Rejected {
                    reason: format!("Step {} does not accept input", step),
                }
            }
        };

        match field.parse(raw_input) {
            Ok(value) => Transition::Accepted {
                field: field.name.clone(),
                value,
                // `field` came from this form, so a successor always exists
                next: self.step_after(&field.name).unwrap_or(Step::Done),
            },
            Err(reason) => Transition::Rejected { reason },
        }
    }

    /// Names of fields still missing from `answers`
    pub fn missing_fields(&self, answers: &HashMap<String, serde_json::Value>) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| !answers.contains_key(&f.name))
            .map(|f| f.name.as_str())
            .collect()
    }
}

/// Registry of the forms the bot can run
#[derive(Debug, Clone)]
pub struct FormRegistry {
    forms: HashMap<String, FormDefinition>,
}

impl FormRegistry {
    /// Create a registry with the built-in forms
    pub fn new() -> Result<Self> {
        let mut registry = Self { forms: HashMap::new() };
        registry.register_form(registration_form()?);
        Ok(registry)
    }

    pub fn register_form(&mut self, form: FormDefinition) {
        self.forms.insert(form.id.clone(), form);
    }

    pub fn get_form(&self, id: &str) -> Result<&FormDefinition> {
        self.forms
            .get(id)
            .ok_or_else(|| FormBuddyError::UnknownForm(id.to_string()))
    }

    pub fn form_ids(&self) -> Vec<&str> {
        self.forms.keys().map(String::as_str).collect()
    }
}

/// Letters, spaces, hyphens and apostrophes, starting with a letter
const NAME_PATTERN: &str = r"^\p{L}[\p{L}\s'\-]*$";

/// First name, last name and age
pub fn registration_form() -> Result<FormDefinition> {
    let fields = vec![
        FieldSpec::text("first_name", "What's your first name?", "Please enter a valid first name (letters only).")
            .with_text_rules(1, 50, Some(NAME_PATTERN))?,
        FieldSpec::text("last_name", "What's your last name?", "Please enter a valid last name (letters only).")
            .with_text_rules(1, 50, Some(NAME_PATTERN))?,
        FieldSpec::integer("age", "How old are you?", "Please enter a valid number for age.", 0, 150),
    ];

    FormDefinition::new(
        REGISTRATION_FORM,
        "User Registration",
        fields,
        "Thanks! Your data has been saved.",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use proptest::prelude::*;

    fn form() -> FormDefinition {
        registration_form().unwrap()
    }

    #[test]
    fn test_registration_steps_in_order() {
        let form = form();
        assert_eq!(form.first_step(), Step::ask("first_name"));
        assert_eq!(form.step_after("first_name"), Some(Step::ask("last_name")));
        assert_eq!(form.step_after("last_name"), Some(Step::ask("age")));
        assert_eq!(form.step_after("age"), Some(Step::Done));
        assert_eq!(form.step_after("nickname"), None);
    }

    #[test]
    fn test_step_display() {
        assert_eq!(Step::ask("first_name").to_string(), "ask_first_name");
        assert_eq!(Step::Done.to_string(), "done");
    }

    #[test]
    fn test_accepts_name_and_trims() {
        let transition = form().evaluate(&Step::ask("first_name"), "  Alice ");
        assert_eq!(
            transition,
            Transition::Accepted {
                field: "first_name".to_string(),
                value: serde_json::json!("Alice"),
                next: Step::ask("last_name"),
            }
        );
    }

    #[test]
    fn test_accepts_non_ascii_names() {
        let form = form();
        assert_matches!(form.evaluate(&Step::ask("last_name"), "Тестовый"), Transition::Accepted { .. });
        assert_matches!(form.evaluate(&Step::ask("last_name"), "O'Neil-Smith"), Transition::Accepted { .. });
    }

    #[test]
    fn test_rejects_number_as_name() {
        let transition = form().evaluate(&Step::ask("last_name"), "30");
        assert_eq!(
            transition,
            Transition::Rejected { reason: "Please enter a valid last name (letters only).".to_string() }
        );
    }

    #[test]
    fn test_rejects_empty_and_overlong_names() {
        let form = form();
        assert_matches!(form.evaluate(&Step::ask("first_name"), "   "), Transition::Rejected { .. });
        let long = "a".repeat(51);
        assert_matches!(form.evaluate(&Step::ask("first_name"), &long), Transition::Rejected { .. });
    }

    #[test]
    fn test_age_parses_integer_and_finishes() {
        let transition = form().evaluate(&Step::ask("age"), " 30 ");
        assert_eq!(
            transition,
            Transition::Accepted {
                field: "age".to_string(),
                value: serde_json::json!(30),
                next: Step::Done,
            }
        );
    }

    #[test]
    fn test_age_rejects_non_numeric_and_out_of_range() {
        let form = form();
        for input in ["not-a-number", "", "12.5", "-1", "151"] {
            assert_eq!(
                form.evaluate(&Step::ask("age"), input),
                Transition::Rejected { reason: "Please enter a valid number for age.".to_string() },
                "input {:?}", input
            );
        }
    }

    #[test]
    fn test_done_step_rejects_input() {
        assert_matches!(form().evaluate(&Step::Done, "anything"), Transition::Rejected { .. });
    }

    #[test]
    fn test_unknown_field_step_rejects_input() {
        assert_matches!(form().evaluate(&Step::ask("nickname"), "Bob"), Transition::Rejected { .. });
    }

    #[test]
    fn test_form_requires_unique_fields() {
        let fields = vec![
            FieldSpec::text("name", "Name?", "Bad name"),
            FieldSpec::text("name", "Name again?", "Bad name"),
        ];
        assert_matches!(FormDefinition::new("dup", "Dup", fields, "ok"), Err(FormBuddyError::Config(_)));
        assert!(FormDefinition::new("empty", "Empty", vec![], "ok").is_err());
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let result = FieldSpec::text("city", "City?", "Bad city").with_text_rules(1, 10, Some("(["));
        assert_matches!(result, Err(FormBuddyError::Config(_)));
    }

    #[test]
    fn test_missing_fields() {
        let form = form();
        let mut answers = HashMap::new();
        answers.insert("first_name".to_string(), serde_json::json!("Alice"));
        assert_eq!(form.missing_fields(&answers), vec!["last_name", "age"]);
    }

    #[test]
    fn test_registry_contains_registration() {
        let registry = FormRegistry::new().unwrap();
        assert!(registry.get_form(REGISTRATION_FORM).is_ok());
        assert_matches!(registry.get_form("survey"), Err(FormBuddyError::UnknownForm(_)));
        assert_eq!(registry.form_ids(), vec![REGISTRATION_FORM]);
    }

    #[test]
    fn test_custom_form_prompts() {
        let form = FormDefinition::new(
            "profile",
            "Profile",
            vec![
                FieldSpec::text("name", "Your name?", "Bad name"),
                FieldSpec::text("city", "Where are you from?", "Bad city"),
            ],
            "Done!",
        )
        .unwrap();

        assert_eq!(form.prompt_for(&Step::ask("city")), Some("Where are you from?"));
        assert_eq!(form.prompt_for(&Step::Done), None);
        assert_eq!(form.step_after("city"), Some(Step::Done));
    }

    proptest! {
        #[test]
        fn prop_evaluation_is_deterministic(input in ".{0,40}") {
            let form = form();
            for step in [Step::ask("first_name"), Step::ask("last_name"), Step::ask("age"), Step::Done] {
                prop_assert_eq!(form.evaluate(&step, &input), form.evaluate(&step, &input));
            }
        }

        #[test]
        fn prop_any_age_in_range_is_accepted(age in 0i64..=150) {
            let transition = form().evaluate(&Step::ask("age"), &age.to_string());
            prop_assert_eq!(
                transition,
                Transition::Accepted { field: "age".to_string(), value: serde_json::json!(age), next: Step::Done }
            );
        }
    }
}
