//! Drives a job site's apply flow in a browser tab.
//!
//! Elements are found heuristically (see `locator`), standard profile fields
//! are filled (`filler`), free-text questions go to an answer source
//! (`screening`), and `flow` ties it together as a bounded state machine that
//! hands control to a human operator whenever something can't be found.

pub mod filler;
pub mod flow;
pub mod icims;
pub mod locator;
pub mod operator;
pub mod screening;
pub mod steps;

use crate::browser::{Pacing, Page, Timeouts};
use crate::profile::{ApplicantContext, Profile};

pub use flow::{ApplyFlow, FlowConfig};
pub use operator::TerminalOperator;
pub use screening::AnswerSource;

/// Everything a step needs to act on the current tab.
pub struct Session<'a> {
    pub page: &'a dyn Page,
    pub profile: &'a Profile,
    pub applicant: ApplicantContext,
    pub timeouts: Timeouts,
    pub pacing: Pacing,
}

/// Which strategy set drives the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Generic,
    Icims,
}

impl Variant {
    pub fn detect(url: &str, source: &str) -> Self {
        if url.to_lowercase().contains("icims.com") || source.to_lowercase().contains("icims") {
            Variant::Icims
        } else {
            Variant::Generic
        }
    }
}
