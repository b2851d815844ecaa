//! Job-board profile registry.
//!
//! Per-domain automation knowledge kept as plain data: priority-ordered
//! locator strategies, navigation style, CAPTCHA likelihood, quirks, and
//! rate-limit policy. Resolution walks enabled profiles in registration
//! order and returns the first whose domain pattern matches the job URL;
//! the `generic` catch-all is pinned last so a specific board always wins.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::warn;

pub const GENERIC_BOARD_ID: &str = "generic";

/// How a locator strategy pattern is interpreted against the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Pattern is a CSS selector.
    Css,
    /// Pattern is matched (case-insensitive substring) against the text of
    /// clickable elements.
    ButtonText,
}

/// One locator strategy: a pure data value evaluated by the detector's
/// interpreter. Lists of these are tried in order, first match wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatorStrategy {
    pub kind: StrategyKind,
    pub pattern: String,
}

impl LocatorStrategy {
    pub fn css(pattern: impl Into<String>) -> Self {
        Self {
            kind: StrategyKind::Css,
            pattern: pattern.into(),
        }
    }

    pub fn text(pattern: impl Into<String>) -> Self {
        Self {
            kind: StrategyKind::ButtonText,
            pattern: pattern.into(),
        }
    }
}

/// Priority-ordered locator candidates for the controls a board exposes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectorSet {
    #[serde(default)]
    pub apply_button: Vec<LocatorStrategy>,
    #[serde(default)]
    pub form_container: Vec<LocatorStrategy>,
    /// Per profile-attribute field overrides (e.g. `"email"` → candidates).
    #[serde(default)]
    pub fields: HashMap<String, Vec<LocatorStrategy>>,
    /// Multi-step flows: the "next"/"continue"/"submit" candidates.
    #[serde(default)]
    pub next_button: Vec<LocatorStrategy>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationStyle {
    SinglePage,
    MultiStep,
    Modal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptchaLikelihood {
    Low,
    Medium,
    High,
}

/// Request pacing policy for one board.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimit {
    pub max_per_hour: u32,
    pub max_per_day: u32,
    pub min_delay_seconds: u64,
    pub max_delay_seconds: u64,
}

/// Immutable-after-registration configuration for one job board.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobBoardProfile {
    pub id: String,
    pub label: String,
    /// Case-insensitive regex matched against the full job URL.
    pub domain_pattern: String,
    pub enabled: bool,
    pub captcha_likelihood: CaptchaLikelihood,
    pub navigation_style: NavigationStyle,
    pub selectors: SelectorSet,
    /// Free-text operator notes; never machine-consumed.
    #[serde(default)]
    pub quirks: Vec<String>,
    pub rate_limit: RateLimit,
}

impl JobBoardProfile {
    /// The built-in catch-all profile. Must always exist in a registry so
    /// resolution never fails while it stays enabled.
    pub fn generic() -> Self {
        Self {
            id: GENERIC_BOARD_ID.to_string(),
            label: "Generic".to_string(),
            domain_pattern: ".*".to_string(),
            enabled: true,
            captcha_likelihood: CaptchaLikelihood::Medium,
            navigation_style: NavigationStyle::SinglePage,
            selectors: SelectorSet {
                apply_button: generic_apply_strategies(),
                form_container: vec![
                    LocatorStrategy::css("form"),
                    LocatorStrategy::css("[class*='application']"),
                ],
                fields: HashMap::new(),
                next_button: vec![
                    LocatorStrategy::css("button[type='submit']"),
                    LocatorStrategy::text("submit"),
                    LocatorStrategy::text("continue"),
                ],
            },
            quirks: vec![],
            rate_limit: RateLimit {
                max_per_hour: 10,
                max_per_day: 40,
                min_delay_seconds: 45,
                max_delay_seconds: 180,
            },
        }
    }
}

/// Fallback apply-control candidates, appended after any profile-specific
/// list during detection.
pub fn generic_apply_strategies() -> Vec<LocatorStrategy> {
    vec![
        LocatorStrategy::css("button[data-apply]"),
        LocatorStrategy::css("#apply-button"),
        LocatorStrategy::css(".apply-button"),
        LocatorStrategy::css("a[href*='apply']"),
        LocatorStrategy::text("easy apply"),
        LocatorStrategy::text("apply now"),
        LocatorStrategy::text("apply"),
    ]
}

/// Built-in board catalog. Registration order matters: specific boards
/// first, `generic` last.
pub fn builtin_profiles() -> Vec<JobBoardProfile> {
    vec![
        JobBoardProfile {
            id: "linkedin".into(),
            label: "LinkedIn".into(),
            domain_pattern: r"(^|\.|//)linkedin\.com".into(),
            enabled: true,
            captcha_likelihood: CaptchaLikelihood::High,
            navigation_style: NavigationStyle::MultiStep,
            selectors: SelectorSet {
                apply_button: vec![
                    LocatorStrategy::css(".jobs-apply-button"),
                    LocatorStrategy::css("button[data-control-name='jobdetails_topcard_inapply']"),
                    LocatorStrategy::text("easy apply"),
                ],
                form_container: vec![LocatorStrategy::css(".jobs-easy-apply-content")],
                fields: HashMap::new(),
                next_button: vec![
                    LocatorStrategy::css("button[aria-label='Continue to next step']"),
                    LocatorStrategy::css("button[aria-label='Submit application']"),
                    LocatorStrategy::text("next"),
                ],
            },
            quirks: vec![
                "Easy Apply modal paginates; plain postings link off-site".into(),
                "Aggressive automation detection after ~20 applications/day".into(),
            ],
            rate_limit: RateLimit {
                max_per_hour: 8,
                max_per_day: 25,
                min_delay_seconds: 90,
                max_delay_seconds: 300,
            },
        },
        JobBoardProfile {
            id: "indeed".into(),
            label: "Indeed".into(),
            domain_pattern: r"(^|\.|//)indeed\.com".into(),
            enabled: true,
            captcha_likelihood: CaptchaLikelihood::High,
            navigation_style: NavigationStyle::MultiStep,
            selectors: SelectorSet {
                apply_button: vec![
                    LocatorStrategy::css("#indeedApplyButton"),
                    LocatorStrategy::css(".jobsearch-IndeedApplyButton-newDesign"),
                    LocatorStrategy::text("apply now"),
                ],
                form_container: vec![LocatorStrategy::css(".ia-BasePage-content")],
                fields: HashMap::new(),
                next_button: vec![
                    LocatorStrategy::css(".ia-continueButton"),
                    LocatorStrategy::text("continue"),
                ],
            },
            quirks: vec!["Cloudflare interstitial on fresh IPs".into()],
            rate_limit: RateLimit {
                max_per_hour: 10,
                max_per_day: 40,
                min_delay_seconds: 60,
                max_delay_seconds: 240,
            },
        },
        JobBoardProfile {
            id: "greenhouse".into(),
            label: "Greenhouse".into(),
            domain_pattern: r"(^|\.|//)greenhouse\.io".into(),
            enabled: true,
            captcha_likelihood: CaptchaLikelihood::Low,
            navigation_style: NavigationStyle::SinglePage,
            selectors: SelectorSet {
                apply_button: vec![
                    LocatorStrategy::css("#apply_button"),
                    LocatorStrategy::text("apply for this job"),
                ],
                form_container: vec![LocatorStrategy::css("#application_form")],
                fields: field_overrides(&[
                    ("first_name", "#first_name"),
                    ("last_name", "#last_name"),
                    ("email", "#email"),
                    ("phone", "#phone"),
                    ("resume", "#resume_fieldset input[type='file']"),
                ]),
                next_button: vec![LocatorStrategy::css("#submit_app")],
            },
            quirks: vec!["Form is rendered inline; no click needed on embedded boards".into()],
            rate_limit: RateLimit {
                max_per_hour: 20,
                max_per_day: 100,
                min_delay_seconds: 20,
                max_delay_seconds: 90,
            },
        },
        JobBoardProfile {
            id: "lever".into(),
            label: "Lever".into(),
            domain_pattern: r"(^|\.|//)lever\.co".into(),
            enabled: true,
            captcha_likelihood: CaptchaLikelihood::Low,
            navigation_style: NavigationStyle::SinglePage,
            selectors: SelectorSet {
                apply_button: vec![
                    LocatorStrategy::css(".postings-btn"),
                    LocatorStrategy::text("apply for this job"),
                ],
                form_container: vec![LocatorStrategy::css(".application-form")],
                fields: field_overrides(&[
                    ("email", "input[name='email']"),
                    ("phone", "input[name='phone']"),
                    ("resume", "#resume-upload-input"),
                ]),
                next_button: vec![LocatorStrategy::css("#btn-submit")],
            },
            quirks: vec!["Single 'name' field instead of first/last".into()],
            rate_limit: RateLimit {
                max_per_hour: 20,
                max_per_day: 100,
                min_delay_seconds: 20,
                max_delay_seconds: 90,
            },
        },
        JobBoardProfile {
            id: "workday".into(),
            label: "Workday".into(),
            domain_pattern: r"(^|\.|//)myworkdayjobs\.com".into(),
            enabled: true,
            captcha_likelihood: CaptchaLikelihood::Medium,
            navigation_style: NavigationStyle::MultiStep,
            selectors: SelectorSet {
                apply_button: vec![
                    LocatorStrategy::css("a[data-automation-id='adventureButton']"),
                    LocatorStrategy::text("apply"),
                ],
                form_container: vec![
                    LocatorStrategy::css("[data-automation-id='applyFlowPage']"),
                ],
                fields: HashMap::new(),
                next_button: vec![
                    LocatorStrategy::css("button[data-automation-id='bottom-navigation-next-button']"),
                ],
            },
            quirks: vec![
                "Requires account creation before the form on most tenants".into(),
                "data-automation-id attributes are stable across tenants".into(),
            ],
            rate_limit: RateLimit {
                max_per_hour: 12,
                max_per_day: 50,
                min_delay_seconds: 45,
                max_delay_seconds: 180,
            },
        },
        JobBoardProfile::generic(),
    ]
}

fn field_overrides(pairs: &[(&str, &str)]) -> HashMap<String, Vec<LocatorStrategy>> {
    pairs
        .iter()
        .map(|(attr, sel)| (attr.to_string(), vec![LocatorStrategy::css(*sel)]))
        .collect()
}

// ───────────────────────────────────────────────────────────────────────────
// Registry
// ───────────────────────────────────────────────────────────────────────────

/// Ordered, read-mostly profile store. Writes are rare administrative
/// actions; reads are safe to issue concurrently.
pub struct BoardRegistry {
    profiles: RwLock<Vec<JobBoardProfile>>,
}

impl Default for BoardRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl BoardRegistry {
    /// Empty registry; callers must register a `generic` profile themselves
    /// for resolution to be total.
    pub fn new() -> Self {
        Self {
            profiles: RwLock::new(Vec::new()),
        }
    }

    /// Registry pre-loaded with the built-in board catalog.
    pub fn with_builtins() -> Self {
        Self {
            profiles: RwLock::new(builtin_profiles()),
        }
    }

    /// Insert or overwrite by id. Mutation is a full replace; an overwrite
    /// keeps the profile's position, a new id lands just before the pinned
    /// `generic` catch-all so it can still be resolved.
    pub fn register(&self, profile: JobBoardProfile) {
        let mut profiles = self.profiles.write().unwrap();
        if let Some(existing) = profiles.iter_mut().find(|p| p.id == profile.id) {
            *existing = profile;
            return;
        }
        let at = profiles
            .iter()
            .position(|p| p.id == GENERIC_BOARD_ID)
            .unwrap_or(profiles.len());
        profiles.insert(at, profile);
    }

    pub fn get(&self, id: &str) -> Option<JobBoardProfile> {
        self.profiles
            .read()
            .unwrap()
            .iter()
            .find(|p| p.id == id)
            .cloned()
    }

    /// First enabled profile (registration order) whose domain pattern
    /// matches `url`. `None` only when the generic fallback is disabled;
    /// callers should then fall back to built-in generic defaults.
    pub fn resolve(&self, url: &str) -> Option<JobBoardProfile> {
        let profiles = self.profiles.read().unwrap();
        for profile in profiles.iter().filter(|p| p.enabled) {
            let re = match regex::RegexBuilder::new(&profile.domain_pattern)
                .case_insensitive(true)
                .build()
            {
                Ok(re) => re,
                Err(e) => {
                    warn!("board '{}': bad domain pattern: {}", profile.id, e);
                    continue;
                }
            };
            if re.is_match(url) {
                return Some(profile.clone());
            }
        }
        None
    }

    /// Toggle a profile without removing it. Disabled profiles are skipped
    /// by `resolve` but remain retrievable by id. Returns `false` when no
    /// profile carries this id.
    pub fn set_enabled(&self, id: &str, enabled: bool) -> bool {
        let mut profiles = self.profiles.write().unwrap();
        match profiles.iter_mut().find(|p| p.id == id) {
            Some(p) => {
                p.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Snapshot of all registered profiles in registration order.
    pub fn all(&self) -> Vec<JobBoardProfile> {
        self.profiles.read().unwrap().clone()
    }
}
