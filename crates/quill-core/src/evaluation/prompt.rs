//! Prompt source seam and message assembly

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{QuillError, QuillResult};
use crate::llm::ChatMessage;
use crate::session::TaskType;

/// Compiled prompt for one task type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    pub system_prompt: String,
    pub scoring_criteria: String,
    /// Example of the JSON the model must return
    pub output_format_example: String,
}

impl PromptTemplate {
    /// System and user messages for one submission
    pub fn build_messages(&self, content: &str, word_count: u32) -> Vec<ChatMessage> {
        let system = format!(
            "{}\n\n{}\n\nRespond with JSON only, strictly in this format:\n{}",
            self.system_prompt, self.scoring_criteria, self.output_format_example
        );
        let user = format!(
            "Score the following essay (word count: {}):\n\n{}",
            word_count, content
        );
        vec![ChatMessage::system(system), ChatMessage::user(user)]
    }
}

/// Supplies prompts for a task type and locale
#[async_trait]
pub trait PromptSource: Send + Sync {
    async fn prompt_for(&self, task_type: TaskType, locale: Option<&str>) -> QuillResult<PromptTemplate>;
}

pub type SharedPromptSource = Arc<dyn PromptSource>;

const OUTPUT_FORMAT_EXAMPLE: &str = r#"{
  "total_score": 6.5,
  "task_achievement": 6.0,
  "coherence_cohesion": 7.0,
  "lexical_resource": 6.5,
  "grammatical_range": 6.0,
  "sentences": [
    {
      "index": 0,
      "original": "The graph show the number of visitors.",
      "errors": [
        {
          "type": "grammar",
          "original": "show",
          "correction": "shows",
          "explanation": "Subject-verb agreement",
          "range": { "start": 10, "end": 14, "unit": "utf16" }
        }
      ]
    }
  ],
  "overall_feedback": "A clear overview with some grammatical slips."
}"#;

/// In-process prompts, one per task type
#[derive(Debug, Clone)]
pub struct StaticPromptSource {
    templates: HashMap<TaskType, PromptTemplate>,
}

impl Default for StaticPromptSource {
    fn default() -> Self {
        let task1 = PromptTemplate {
            system_prompt: "You are an experienced IELTS Writing examiner scoring Academic Task 1 \
                            reports that describe visual information."
                .to_string(),
            scoring_criteria: "Score Task Achievement, Coherence and Cohesion, Lexical Resource and \
                               Grammatical Range and Accuracy from 0 to 9 in half bands. \
                               total_score is the overall band. Annotate every sentence in order; \
                               give each flagged issue a range in UTF-16 code units within that \
                               sentence."
                .to_string(),
            output_format_example: OUTPUT_FORMAT_EXAMPLE.to_string(),
        };
        let task2 = PromptTemplate {
            system_prompt: "You are an experienced IELTS Writing examiner scoring Task 2 \
                            argumentative essays."
                .to_string(),
            scoring_criteria: "Score Task Response (reported as task_achievement), Coherence and \
                               Cohesion, Lexical Resource and Grammatical Range and Accuracy from \
                               0 to 9 in half bands. total_score is the overall band. Annotate \
                               every sentence in order; give each flagged issue a range in UTF-16 \
                               code units within that sentence."
                .to_string(),
            output_format_example: OUTPUT_FORMAT_EXAMPLE.to_string(),
        };
        Self {
            templates: HashMap::from([(TaskType::Task1, task1), (TaskType::Task2, task2)]),
        }
    }
}

impl StaticPromptSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the template for one task type
    pub fn with_template(mut self, task_type: TaskType, template: PromptTemplate) -> Self {
        self.templates.insert(task_type, template);
        self
    }
}

#[async_trait]
impl PromptSource for StaticPromptSource {
    async fn prompt_for(&self, task_type: TaskType, locale: Option<&str>) -> QuillResult<PromptTemplate> {
        let mut template = self
            .templates
            .get(&task_type)
            .cloned()
            .ok_or_else(|| QuillError::config(format!("no prompt configured for {}", task_type)))?;
        if let Some(locale) = locale.filter(|l| !l.trim().is_empty()) {
            template
                .system_prompt
                .push_str(&format!("\nWrite explanations and overall_feedback in locale {}.", locale));
        }
        Ok(template)
    }
}
