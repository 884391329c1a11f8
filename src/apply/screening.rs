use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;

use super::Session;
use crate::browser::ElementRef;
use crate::models::JobContext;
use crate::profile::Profile;
use crate::resume::title_case;

/// Produces an answer for a free-text application question.
#[async_trait]
pub trait AnswerSource: Send + Sync {
    async fn answer(&self, question: &str, profile: &Profile, job: &JobContext) -> Result<String>;
}

const QUESTION_FIELDS: &str = "textarea, input[type=text]";

/// Questions about contact details are the filler's job.
const STANDARD_FIELD_WORDS: &[&str] = &["name", "email", "phone", "location", "city", "address"];

/// "years_of-experience" -> "Years Of Experience"
pub fn humanize_field_name(name: &str) -> String {
    title_case(&name.replace(['_', '-'], " "))
}

/// The question a field asks: its `<label for>`, then its humanised name,
/// then its placeholder.
pub fn derive_question(el: &ElementRef, labels: &HashMap<String, String>) -> Option<String> {
    let from_label = el
        .attr("id")
        .filter(|id| !id.is_empty())
        .and_then(|id| labels.get(id))
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty());

    from_label
        .or_else(|| {
            el.attr("name")
                .filter(|n| !n.trim().is_empty())
                .map(humanize_field_name)
        })
        .or_else(|| {
            el.attr("placeholder")
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
        })
}

pub fn is_standard_field(question: &str) -> bool {
    let lower = question.to_lowercase();
    STANDARD_FIELD_WORDS.iter().any(|w| lower.contains(w))
}

/// `label[for]` id -> label text on the current page.
pub(crate) async fn label_map(s: &Session<'_>) -> HashMap<String, String> {
    match s.page.query("label[for]").await {
        Ok(labels) => labels
            .into_iter()
            .filter_map(|l| l.attr("for").map(|f| (f.to_string(), l.text.clone())))
            .collect(),
        Err(e) => {
            tracing::warn!("could not read labels: {e:#}");
            HashMap::new()
        }
    }
}

/// Answers every empty, visible free-text field on the page through
/// `source`. Hidden fields (honeypots, collapsed sections) are never asked
/// about. Unanswered fields are left for the operator. Returns how many
/// were filled.
pub async fn answer_screening_questions(
    s: &Session<'_>,
    source: &dyn AnswerSource,
    job: &JobContext,
) -> usize {
    let fields = match s.page.query(QUESTION_FIELDS).await {
        Ok(f) => f,
        Err(e) => {
            tracing::warn!("could not list question fields: {e:#}");
            return 0;
        }
    };
    let labels = label_map(s).await;
    let mut answered = 0;

    for field in fields {
        if !field.current_value().is_empty() || !field.visible {
            continue;
        }
        let Some(question) = derive_question(&field, &labels) else {
            continue;
        };
        if is_standard_field(&question) {
            continue;
        }

        println!("\n  Question: {}", question);
        let answer = match source.answer(&question, s.profile, job).await {
            Ok(a) if !a.trim().is_empty() => a,
            Ok(_) => {
                tracing::warn!(%question, "empty answer; leaving for manual input");
                continue;
            }
            Err(e) => {
                tracing::warn!(%question, "could not get an answer: {e:#}");
                continue;
            }
        };

        match s.page.fill(&field, answer.trim()).await {
            Ok(()) => {
                let preview: String = answer.chars().take(100).collect();
                println!("  Answered: {}", preview);
                answered += 1;
                s.pacing.pause(500, 1000).await;
            }
            Err(e) => tracing::warn!(%question, "fill failed: {e:#}"),
        }
    }

    if answered > 0 {
        tracing::info!(answered, "screening questions answered");
    }
    answered
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use anyhow::anyhow;
    use std::sync::Mutex;

    /// Answers from a fixed table and records every question asked.
    #[derive(Default)]
    pub struct CannedAnswers {
        pub answers: HashMap<String, String>,
        pub asked: Mutex<Vec<String>>,
    }

    impl CannedAnswers {
        pub fn new(pairs: &[(&str, &str)]) -> Self {
            Self {
                answers: pairs
                    .iter()
                    .map(|(q, a)| (q.to_string(), a.to_string()))
                    .collect(),
                asked: Mutex::new(vec![]),
            }
        }

        pub fn asked(&self) -> Vec<String> {
            self.asked.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AnswerSource for CannedAnswers {
        async fn answer(&self, question: &str, _profile: &Profile, _job: &JobContext) -> Result<String> {
            self.asked.lock().unwrap().push(question.to_string());
            self.answers
                .get(question)
                .cloned()
                .ok_or_else(|| anyhow!("service unavailable"))
        }
    }
}
