//! Field → profile mapping and form filling.

use super::shots;
use crate::browser::BrowserDriver;
use crate::core::types::{FieldKind, FieldMapping, FillResult, FormField, UserProfile};
use std::path::Path;
use tracing::{debug, info};

/// One keyword family tying fields to a profile attribute. Confidence is a
/// fixed constant reflecting how unambiguous the family is, not a string
/// similarity.
pub struct MappingRule {
    pub profile_field: &'static str,
    pub keywords: &'static [&'static str],
    pub confidence: f64,
}

/// Ordered rule table; the first family whose keyword appears in a field's
/// lower-cased name/id/placeholder wins that field.
pub const MAPPING_RULES: &[MappingRule] = &[
    MappingRule {
        profile_field: "first_name",
        keywords: &[
            "first_name",
            "firstname",
            "first-name",
            "first name",
            "fname",
            "given_name",
            "given-name",
            "given name",
        ],
        confidence: 0.9,
    },
    MappingRule {
        profile_field: "last_name",
        keywords: &[
            "last_name",
            "lastname",
            "last-name",
            "last name",
            "lname",
            "surname",
            "family_name",
            "family-name",
            "family name",
        ],
        confidence: 0.9,
    },
    MappingRule {
        profile_field: "email",
        keywords: &["email", "e-mail"],
        confidence: 0.95,
    },
    MappingRule {
        profile_field: "phone",
        keywords: &["phone", "mobile", "telephone", "tel"],
        confidence: 0.9,
    },
    MappingRule {
        profile_field: "location",
        keywords: &["location", "city", "address"],
        confidence: 0.8,
    },
    MappingRule {
        profile_field: "linkedin",
        keywords: &["linkedin"],
        confidence: 0.85,
    },
    MappingRule {
        profile_field: "portfolio",
        keywords: &["portfolio", "website", "personal_site", "personal-site", "homepage"],
        confidence: 0.8,
    },
    MappingRule {
        profile_field: "resume",
        keywords: &["resume", "cv", "curriculum"],
        confidence: 0.95,
    },
];

fn resolve_value(
    rule: &MappingRule,
    profile: &UserProfile,
    resume_path: Option<&Path>,
) -> String {
    match rule.profile_field {
        "first_name" => profile.first_name.clone(),
        "last_name" => profile.last_name.clone(),
        "email" => profile.email.clone(),
        "phone" => profile.phone.clone(),
        "location" => profile.location.clone(),
        "linkedin" => profile.linkedin.clone(),
        "portfolio" => profile.portfolio.clone(),
        "resume" => resume_path.map(|p| p.to_string_lossy().to_string()),
        _ => None,
    }
    .unwrap_or_default()
}

/// Match classified fields to profile attributes.
///
/// Per field, the lower-cased name/id/placeholder is tested against the
/// rule table in order; the first matching family fixes the field's
/// attribute, so no field maps to more than one. The resume family only
/// applies to `File` fields. A field matching nothing, or resolving to an
/// empty value, is omitted; it surfaces as an unfilled field at the
/// caller, not as an error.
pub fn map_fields(
    fields: &[FormField],
    profile: &UserProfile,
    resume_path: Option<&Path>,
) -> Vec<FieldMapping> {
    let mut mappings = Vec::new();

    for field in fields {
        let haystack = format!(
            "{} {} {}",
            field.name,
            field.id.as_deref().unwrap_or_default(),
            field.placeholder.as_deref().unwrap_or_default()
        )
        .to_lowercase();

        for rule in MAPPING_RULES {
            if !rule.keywords.iter().any(|k| haystack.contains(k)) {
                continue;
            }
            if rule.profile_field == "resume" && field.kind != FieldKind::File {
                continue;
            }
            let value = resolve_value(rule, profile, resume_path);
            if !value.is_empty() {
                mappings.push(FieldMapping {
                    field: field.clone(),
                    profile_field: rule.profile_field.to_string(),
                    value,
                    confidence: rule.confidence,
                });
            } else {
                debug!(
                    "field '{}' matched '{}' but profile value is empty — omitted",
                    field.selector, rule.profile_field
                );
            }
            break; // first matching attribute wins
        }
    }

    mappings
}

/// Apply mappings to the live page.
///
/// Per mapping: file upload (only when the path exists on disk), idempotent
/// checkbox check, select-by-label falling back to select-by-value, or a
/// plain text fill. Per-field failures are captured into `errors` and the
/// loop continues, so one broken field never aborts the rest.
pub async fn apply_mappings(
    driver: &dyn BrowserDriver,
    mappings: &[FieldMapping],
    shot_dir: &Path,
) -> FillResult {
    let mut result = FillResult::default();

    for mapping in mappings {
        let selector = mapping.field.selector.clone();

        let outcome: Result<(), String> = match mapping.field.kind {
            FieldKind::File => {
                let path = Path::new(&mapping.value);
                if path.exists() {
                    driver
                        .set_input_files(&selector, path)
                        .await
                        .map_err(|e| e.to_string())
                } else {
                    result.warnings.push(format!(
                        "upload skipped for {}: file not found: {}",
                        selector, mapping.value
                    ));
                    result.unfilled.push(selector);
                    continue;
                }
            }
            FieldKind::Checkbox => match driver.is_checked(&selector).await {
                Ok(true) => Ok(()), // already checked
                Ok(false) => driver.check(&selector).await.map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            },
            FieldKind::Select => {
                match driver.select_by_label(&selector, &mapping.value).await {
                    Ok(()) => Ok(()),
                    Err(label_err) => {
                        match driver.select_by_value(&selector, &mapping.value).await {
                            Ok(()) => Ok(()),
                            Err(value_err) => {
                                result.warnings.push(format!(
                                    "select {} matched no option by label ({}) or value ({})",
                                    selector, label_err, value_err
                                ));
                                result.unfilled.push(selector);
                                continue;
                            }
                        }
                    }
                }
            }
            _ => driver
                .fill(&selector, &mapping.value)
                .await
                .map_err(|e| e.to_string()),
        };

        match outcome {
            Ok(()) => result.filled.push(selector),
            Err(e) => {
                result.errors.push(format!("{}: {}", selector, e));
                result.unfilled.push(selector);
            }
        }
    }

    if let Some(path) = shots::capture(driver, shot_dir, "after-fill").await {
        result.screenshots.push(path);
    }

    result.success = result.errors.is_empty();
    info!(
        "fill finished: {} filled, {} unfilled, {} warnings",
        result.filled.len(),
        result.unfilled.len(),
        result.warnings.len()
    );
    result
}
