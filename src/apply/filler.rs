use super::Session;
use super::locator::{Strategy, TEXT_INPUTS, locate};
use crate::profile::{ApplicantContext, Profile};

const FULL_NAME: &[Strategy] = &[Strategy::AttrContains {
    scope: TEXT_INPUTS,
    attrs: &["name", "id", "placeholder"],
    patterns: &["name"],
    exclude: &["first", "last", "middle", "user", "company"],
    visible_only: false,
}];

const FIRST_NAME: &[Strategy] = &[Strategy::AttrContains {
    scope: TEXT_INPUTS,
    attrs: &["name", "id"],
    patterns: &["firstname", "first_name", "first-name", "first"],
    exclude: &[],
    visible_only: false,
}];

const LAST_NAME: &[Strategy] = &[Strategy::AttrContains {
    scope: TEXT_INPUTS,
    attrs: &["name", "id"],
    patterns: &["lastname", "last_name", "last-name", "last"],
    exclude: &[],
    visible_only: false,
}];

const EMAIL: &[Strategy] = &[
    Strategy::Css {
        selector: "input[type=email]",
        visible_only: false,
    },
    Strategy::AttrContains {
        scope: TEXT_INPUTS,
        attrs: &["name", "id"],
        patterns: &["email"],
        exclude: &[],
        visible_only: false,
    },
];

const PHONE: &[Strategy] = &[
    Strategy::Css {
        selector: "input[type=tel]",
        visible_only: false,
    },
    Strategy::AttrContains {
        scope: TEXT_INPUTS,
        attrs: &["name", "id"],
        patterns: &["phone", "mobile"],
        exclude: &[],
        visible_only: false,
    },
];

const LOCATION: &[Strategy] = &[Strategy::AttrContains {
    scope: TEXT_INPUTS,
    attrs: &["name", "id"],
    patterns: &["location", "city"],
    exclude: &[],
    visible_only: false,
}];

const YEARS_EXPERIENCE: &[Strategy] = &[Strategy::AttrContains {
    scope: TEXT_INPUTS,
    attrs: &["name", "id"],
    patterns: &["experience", "years"],
    exclude: &[],
    visible_only: false,
}];

/// `(field, strategies, value)` for every text field the profile can answer.
pub fn text_fields(
    profile: &Profile,
    applicant: &ApplicantContext,
) -> Vec<(&'static str, &'static [Strategy], String)> {
    vec![
        ("full name", FULL_NAME, profile.name.clone()),
        ("first name", FIRST_NAME, profile.first_name.clone()),
        ("last name", LAST_NAME, profile.last_name.clone()),
        ("email", EMAIL, profile.email.clone()),
        ("phone", PHONE, profile.phone.clone()),
        ("location", LOCATION, applicant.location.clone()),
        (
            "years of experience",
            YEARS_EXPERIENCE,
            profile.years_experience.to_string(),
        ),
    ]
}

const fn select_by(patterns: &'static [&'static str]) -> [Strategy; 1] {
    [Strategy::AttrContains {
        scope: "select",
        attrs: &["name", "id"],
        patterns,
        exclude: &[],
        visible_only: false,
    }]
}

const WORK_AUTHORIZATION: &[Strategy] = &select_by(&["authorization"]);
const SPONSORSHIP: &[Strategy] = &select_by(&["sponsorship"]);
const RELOCATION: &[Strategy] = &select_by(&["relocate"]);

/// `(field, strategies, accepted values)` for the yes/no dropdowns.
pub const DROPDOWNS: &[(&str, &[Strategy], &[&str])] = &[
    ("work authorization", WORK_AUTHORIZATION, &["Yes", "Authorized", "true"]),
    ("sponsorship", SPONSORSHIP, &["No", "false"]),
    ("relocation", RELOCATION, &["Yes", "true"]),
];

/// Fills the standard profile fields present on the current page. Fields
/// that already hold a value are left alone, so calling this twice fills
/// nothing the second time. Returns how many fields were set.
pub async fn fill_standard_fields(s: &Session<'_>) -> usize {
    let mut filled = 0;

    for (field, strategies, value) in text_fields(s.profile, &s.applicant) {
        if value.is_empty() {
            continue;
        }
        let Some(el) = locate(s.page, strategies).await else {
            continue;
        };
        if !el.current_value().is_empty() {
            tracing::debug!(field, "already filled");
            continue;
        }
        match s.page.fill(&el, &value).await {
            Ok(()) => {
                println!("  Filled {} ({})", field, el.describe());
                filled += 1;
                s.pacing.pause(300, 600).await;
            }
            Err(e) => tracing::warn!(field, "fill failed: {e:#}"),
        }
    }

    for (field, strategies, accepted) in DROPDOWNS {
        if select_accepted(s, field, strategies, accepted).await {
            filled += 1;
        }
    }

    tracing::info!(filled, "standard fields filled");
    filled
}

/// Picks the first option whose text contains, or whose value equals, an
/// accepted value. Returns true when a new selection was made.
pub(crate) async fn select_accepted(
    s: &Session<'_>,
    field: &str,
    strategies: &[Strategy],
    accepted: &[&str],
) -> bool {
    let Some(select) = locate(s.page, strategies).await else {
        return false;
    };
    let options = match s.page.options(&select).await {
        Ok(o) => o,
        Err(e) => {
            tracing::warn!(field, "could not read options: {e:#}");
            return false;
        }
    };

    let choice = options.iter().find(|o| {
        let text = o.text.to_lowercase();
        let value = o.value.to_lowercase();
        accepted.iter().any(|a| {
            let a = a.to_lowercase();
            text.contains(&a) || value == a
        })
    });
    let Some(choice) = choice else {
        return false;
    };

    let current = select.current_value();
    if !current.is_empty() && current == choice.value {
        return false;
    }

    match s.page.select(&select, &choice.value).await {
        Ok(()) => {
            println!("  Selected {}: {}", field, choice.text);
            s.pacing.pause(300, 600).await;
            true
        }
        Err(e) => {
            tracing::warn!(field, "select failed: {e:#}");
            false
        }
    }
}
