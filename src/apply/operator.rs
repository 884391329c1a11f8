//! The human in the loop. The flow suspends here whenever it needs someone
//! to act in the browser or confirm before submitting.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorAction {
    OpenApplicationForm,
    LogIn,
    UploadResume,
    ReviewAndSubmit { summary: String },
    SubmitManually,
}

impl OperatorAction {
    pub fn message(&self) -> String {
        match self {
            OperatorAction::OpenApplicationForm => {
                "Apply button not found. Open the application form in the browser.".to_string()
            }
            OperatorAction::LogIn => "Please log in manually in the browser.".to_string(),
            OperatorAction::UploadResume => "Please upload your resume manually.".to_string(),
            OperatorAction::ReviewAndSubmit { summary } => {
                format!("{}\nApplication ready to submit. Review the form on screen.", summary)
            }
            OperatorAction::SubmitManually => {
                "Submit button not found. Please submit the application manually.".to_string()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Continue,
    Cancel,
}

#[async_trait]
pub trait Operator: Send + Sync {
    /// Blocks until the operator has done `action` or chosen to cancel.
    async fn request(&self, action: &OperatorAction) -> Decision;

    /// Non-blocking heads-up that something needs attention.
    fn alert(&self, message: &str);
}

/// Prompts on the controlling terminal. ENTER continues; "c", end of input
/// or Ctrl-C cancels.
pub struct TerminalOperator;

impl TerminalOperator {
    fn parse(line: &str) -> Decision {
        match line.trim().to_lowercase().as_str() {
            "c" | "cancel" | "q" => Decision::Cancel,
            _ => Decision::Continue,
        }
    }
}

#[async_trait]
impl Operator for TerminalOperator {
    async fn request(&self, action: &OperatorAction) -> Decision {
        print!("\x07");
        println!("\n{}", "=".repeat(70));
        for line in action.message().lines() {
            println!("{}", textwrap::fill(line, 70));
        }
        println!("  Press ENTER to continue, or type 'c' then ENTER to cancel");
        println!("{}", "=".repeat(70));

        let mut line = String::new();
        let mut stdin = BufReader::new(tokio::io::stdin());
        tokio::select! {
            read = stdin.read_line(&mut line) => match read {
                Ok(0) => Decision::Cancel,
                Ok(_) => Self::parse(&line),
                Err(e) => {
                    tracing::warn!("could not read operator input: {e}");
                    Decision::Cancel
                }
            },
            _ = tokio::signal::ctrl_c() => {
                println!("\nCancelled by user");
                Decision::Cancel
            }
        }
    }

    fn alert(&self, message: &str) {
        println!("\x07  {}", message);
    }
}

/// Replays queued decisions and records what was asked. Once the queue is
/// empty every request continues.
#[cfg(test)]
#[derive(Default)]
pub struct ScriptedOperator {
    decisions: std::sync::Mutex<std::collections::VecDeque<Decision>>,
    requests: std::sync::Mutex<Vec<OperatorAction>>,
    alerts: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl ScriptedOperator {
    pub fn new(decisions: &[Decision]) -> Self {
        Self {
            decisions: std::sync::Mutex::new(decisions.iter().copied().collect()),
            ..Default::default()
        }
    }

    pub fn requests(&self) -> Vec<OperatorAction> {
        self.requests.lock().unwrap().clone()
    }

    pub fn alerts(&self) -> Vec<String> {
        self.alerts.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl Operator for ScriptedOperator {
    async fn request(&self, action: &OperatorAction) -> Decision {
        self.requests.lock().unwrap().push(action.clone());
        self.decisions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Decision::Continue)
    }

    fn alert(&self, message: &str) {
        self.alerts.lock().unwrap().push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_input_parsing() {
        assert_eq!(TerminalOperator::parse("\n"), Decision::Continue);
        assert_eq!(TerminalOperator::parse("yes\n"), Decision::Continue);
        assert_eq!(TerminalOperator::parse(" C \n"), Decision::Cancel);
        assert_eq!(TerminalOperator::parse("cancel"), Decision::Cancel);
    }

    #[tokio::test]
    async fn test_scripted_operator_replays_then_continues() {
        let op = ScriptedOperator::new(&[Decision::Cancel]);
        assert_eq!(op.request(&OperatorAction::LogIn).await, Decision::Cancel);
        assert_eq!(op.request(&OperatorAction::SubmitManually).await, Decision::Continue);
        assert_eq!(
            op.requests(),
            vec![OperatorAction::LogIn, OperatorAction::SubmitManually]
        );
    }

    #[test]
    fn test_review_message_includes_summary() {
        let action = OperatorAction::ReviewAndSubmit {
            summary: "Pages processed: 3".to_string(),
        };
        assert!(action.message().starts_with("Pages processed: 3"));
    }
}
