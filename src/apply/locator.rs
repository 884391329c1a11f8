use std::time::Duration;

use crate::browser::{ElementRef, Page, wait_for};

/// One way of finding an element. Text and attribute matching is
/// case-insensitive; for `input` controls the text is the `value` attribute.
#[derive(Debug, Clone, Copy)]
pub enum Strategy {
    /// Trimmed text equals one of `patterns`.
    TextEquals {
        scope: &'static str,
        patterns: &'static [&'static str],
        visible_only: bool,
    },
    /// Text contains one of `patterns` and none of `exclude`.
    TextContains {
        scope: &'static str,
        patterns: &'static [&'static str],
        exclude: &'static [&'static str],
        visible_only: bool,
    },
    /// Any of `attrs` contains one of `patterns`, and none of them contains
    /// an `exclude` entry.
    AttrContains {
        scope: &'static str,
        attrs: &'static [&'static str],
        patterns: &'static [&'static str],
        exclude: &'static [&'static str],
        visible_only: bool,
    },
    /// First element matching the selector.
    Css {
        selector: &'static str,
        visible_only: bool,
    },
}

impl Strategy {
    pub fn scope(&self) -> &'static str {
        match self {
            Strategy::TextEquals { scope, .. }
            | Strategy::TextContains { scope, .. }
            | Strategy::AttrContains { scope, .. } => scope,
            Strategy::Css { selector, .. } => selector,
        }
    }

    fn visible_only(&self) -> bool {
        match self {
            Strategy::TextEquals { visible_only, .. }
            | Strategy::TextContains { visible_only, .. }
            | Strategy::AttrContains { visible_only, .. }
            | Strategy::Css { visible_only, .. } => *visible_only,
        }
    }
}

fn text_key(el: &ElementRef) -> String {
    el.label()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn attr_values(el: &ElementRef, attrs: &[&str]) -> Vec<String> {
    attrs
        .iter()
        .filter_map(|a| el.attr(a))
        .map(str::to_lowercase)
        .collect()
}

/// Applies one strategy to a snapshot list (document order). Patterns are the
/// outer loop, so an earlier pattern wins over an earlier element.
pub fn pick<'a>(candidates: &'a [ElementRef], strategy: &Strategy) -> Option<&'a ElementRef> {
    let eligible: Vec<&ElementRef> = candidates
        .iter()
        .filter(|el| el.visible || !strategy.visible_only())
        .collect();

    match strategy {
        Strategy::TextEquals { patterns, .. } => patterns.iter().find_map(|pattern| {
            let pattern = pattern.to_lowercase();
            eligible.iter().copied().find(|el| text_key(el) == pattern)
        }),
        Strategy::TextContains {
            patterns, exclude, ..
        } => patterns.iter().find_map(|pattern| {
            let pattern = pattern.to_lowercase();
            eligible.iter().copied().find(|el| {
                let text = text_key(el);
                text.contains(&pattern) && !exclude.iter().any(|x| text.contains(&x.to_lowercase()))
            })
        }),
        Strategy::AttrContains {
            attrs,
            patterns,
            exclude,
            ..
        } => patterns.iter().find_map(|pattern| {
            let pattern = pattern.to_lowercase();
            eligible.iter().copied().find(|el| {
                let values = attr_values(el, attrs);
                values.iter().any(|v| v.contains(&pattern))
                    && !values
                        .iter()
                        .any(|v| exclude.iter().any(|x| v.contains(&x.to_lowercase())))
            })
        }),
        Strategy::Css { .. } => eligible.first().copied(),
    }
}

/// Tries each strategy in order against the live page. A strategy whose query
/// fails is skipped.
pub async fn locate(page: &dyn Page, strategies: &[Strategy]) -> Option<ElementRef> {
    for strategy in strategies {
        let candidates = match page.query(strategy.scope()).await {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(scope = strategy.scope(), "element query failed: {e:#}");
                continue;
            }
        };
        if let Some(found) = pick(&candidates, strategy) {
            tracing::debug!(element = %found.describe(), "located");
            return Some(found.clone());
        }
    }
    None
}

/// `locate`, retried until `timeout`. Expiry means "not found".
pub async fn wait_locate(
    page: &dyn Page,
    strategies: &[Strategy],
    timeout: Duration,
) -> Option<ElementRef> {
    wait_for(timeout, || locate(page, strategies)).await
}

// --- Strategy tables ---

/// Single-line text inputs a profile value can go into.
pub const TEXT_INPUTS: &str = "input:not([type=hidden]):not([type=checkbox]):not([type=radio])\
:not([type=submit]):not([type=file]):not([type=button]):not([type=password])";

const CLICKABLE: &str = "a, button, span[role=button]";
const NAV_BUTTONS: &str = "button, input[type=submit], a[role=button]";
const SUBMIT_BY_TYPE: Strategy = Strategy::Css {
    selector: "input[type=submit], button[type=submit]",
    visible_only: true,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Apply,
    SignInLink,
    CreateAccountLink,
    EmailField,
    PasswordField,
    AuthSubmit,
    ResumeAutofill,
    DropZone,
    ResumeFileInput,
    UploadButton,
    NextOrSubmit,
    FinalSubmit,
    SuccessElement,
    IcimsApply,
    IcimsEmailNext,
    IcimsLogin,
    IcimsNotOnThisDevice,
    IcimsMyComputer,
    IcimsNext,
}

impl Intent {
    pub fn strategies(self) -> &'static [Strategy] {
        match self {
            Intent::Apply => &[
                Strategy::TextContains {
                    scope: "button, a",
                    patterns: &[
                        "Apply",
                        "Quick Apply",
                        "Easy Apply",
                        "Submit Application",
                        "Apply Now",
                        "Apply for this job",
                        "Submit Your Application",
                    ],
                    exclude: &[],
                    visible_only: true,
                },
                Strategy::AttrContains {
                    scope: "a",
                    attrs: &["href"],
                    patterns: &["/apply", "/job-apply", "apply", "application"],
                    exclude: &[],
                    visible_only: false,
                },
                Strategy::AttrContains {
                    scope: "button, a",
                    attrs: &["class"],
                    patterns: &["apply"],
                    exclude: &[],
                    visible_only: false,
                },
                Strategy::AttrContains {
                    scope: "[data-test], [data-testid]",
                    attrs: &["data-test", "data-testid"],
                    patterns: &["apply"],
                    exclude: &[],
                    visible_only: false,
                },
            ],
            Intent::SignInLink => &[Strategy::TextEquals {
                scope: CLICKABLE,
                patterns: &["Sign In", "Log In"],
                visible_only: true,
            }],
            Intent::CreateAccountLink => &[Strategy::TextContains {
                scope: CLICKABLE,
                patterns: &["Create Account", "Sign Up", "Register"],
                exclude: &[],
                visible_only: true,
            }],
            Intent::EmailField => &[
                Strategy::Css {
                    selector: "input[type=email]",
                    visible_only: false,
                },
                Strategy::AttrContains {
                    scope: "input",
                    attrs: &["name", "id", "placeholder"],
                    patterns: &["email"],
                    exclude: &[],
                    visible_only: false,
                },
            ],
            Intent::PasswordField => &[
                Strategy::Css {
                    selector: "input[type=password]",
                    visible_only: false,
                },
                Strategy::AttrContains {
                    scope: "input",
                    attrs: &["name", "id"],
                    patterns: &["password"],
                    exclude: &[],
                    visible_only: false,
                },
            ],
            Intent::AuthSubmit => &[Strategy::TextContains {
                scope: "button, input[type=submit]",
                patterns: &["Sign In", "Log In", "Submit", "Continue"],
                exclude: &[],
                visible_only: false,
            }],
            Intent::ResumeAutofill => &[Strategy::TextContains {
                scope: CLICKABLE,
                patterns: &[
                    "Autofill with Resume",
                    "Auto-fill with Resume",
                    "Apply with Resume",
                    "Use Resume",
                ],
                exclude: &[],
                visible_only: false,
            }],
            Intent::DropZone => &[Strategy::TextContains {
                scope: "label, button, span, div",
                patterns: &[
                    "Drop file here",
                    "Drop files here",
                    "Select file",
                    "Upload file",
                    "Upload resume",
                    "Attach Resume",
                    "Choose file",
                ],
                exclude: &[],
                visible_only: false,
            }],
            Intent::ResumeFileInput => &[
                Strategy::Css {
                    selector: "input[type=file][name*=resume]",
                    visible_only: false,
                },
                Strategy::Css {
                    selector: "input[type=file][name*=cv]",
                    visible_only: false,
                },
                Strategy::Css {
                    selector: "input[type=file][id*=resume]",
                    visible_only: false,
                },
                Strategy::Css {
                    selector: "input[type=file][id*=cv]",
                    visible_only: false,
                },
                Strategy::Css {
                    selector: "input[type=file]",
                    visible_only: false,
                },
            ],
            Intent::UploadButton => &[Strategy::TextContains {
                scope: "button, a, label",
                patterns: &[
                    "Upload Resume",
                    "Upload CV",
                    "Upload File",
                    "Choose File",
                    "Attach Resume",
                    "Browse",
                ],
                exclude: &[],
                visible_only: false,
            }],
            Intent::NextOrSubmit => &[
                Strategy::TextEquals {
                    scope: NAV_BUTTONS,
                    patterns: &[
                        "Next",
                        "Continue",
                        "Save and Continue",
                        "Save & Continue",
                        "Proceed",
                        "Submit",
                        "Submit Application",
                        "Send Application",
                        "Apply Now",
                        "Complete Application",
                        "Send",
                    ],
                    visible_only: true,
                },
                SUBMIT_BY_TYPE,
            ],
            Intent::FinalSubmit => &[
                Strategy::TextContains {
                    scope: "button, input[type=submit], a",
                    patterns: &[
                        "Submit",
                        "Submit Application",
                        "Send Application",
                        "Apply Now",
                        "Complete Application",
                        "Send",
                    ],
                    exclude: &[],
                    visible_only: true,
                },
                SUBMIT_BY_TYPE,
            ],
            Intent::SuccessElement => &[
                Strategy::Css {
                    selector: "[class*=success]",
                    visible_only: true,
                },
                Strategy::Css {
                    selector: "[class*=confirmation]",
                    visible_only: true,
                },
                Strategy::Css {
                    selector: "[id*=success]",
                    visible_only: true,
                },
                Strategy::Css {
                    selector: "[id*=confirmation]",
                    visible_only: true,
                },
            ],
            Intent::IcimsApply => &[Strategy::TextContains {
                scope: "button, a, input[type=submit]",
                patterns: &[
                    "Apply for this job online",
                    "Apply for this job",
                    "Apply Now",
                    "Apply Online",
                ],
                exclude: &[],
                visible_only: false,
            }],
            Intent::IcimsEmailNext => &[Strategy::TextContains {
                scope: "button, input[type=submit]",
                patterns: &["Next"],
                exclude: &[],
                visible_only: false,
            }],
            Intent::IcimsLogin => &[Strategy::TextContains {
                scope: "button, input[type=submit]",
                patterns: &["Log In", "Sign In", "Submit"],
                exclude: &[],
                visible_only: false,
            }],
            Intent::IcimsNotOnThisDevice => &[Strategy::TextContains {
                scope: "button, a",
                patterns: &["Not on this device"],
                exclude: &[],
                visible_only: false,
            }],
            Intent::IcimsMyComputer => &[Strategy::TextContains {
                scope: "button, a, label, div[role=button]",
                patterns: &["My Computer"],
                exclude: &[],
                visible_only: false,
            }],
            Intent::IcimsNext => &[
                Strategy::TextEquals {
                    scope: NAV_BUTTONS,
                    patterns: &["Next"],
                    visible_only: true,
                },
                Strategy::TextContains {
                    scope: NAV_BUTTONS,
                    patterns: &["Continue", "Proceed", "Submit"],
                    exclude: &["Finish Later"],
                    visible_only: true,
                },
            ],
        }
    }
}
