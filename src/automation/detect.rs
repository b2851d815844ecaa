//! Apply-control location and form-field enumeration.

use super::{classify, shots};
use crate::boards::{generic_apply_strategies, JobBoardProfile, LocatorStrategy, StrategyKind};
use crate::browser::BrowserDriver;
use crate::core::types::DetectionResult;
use std::path::Path;
use tracing::{debug, info, warn};

/// Input-kind selectors scanned during field enumeration. Order is fixed so
/// detection results are reproducible for the same page.
pub const FIELD_SCAN_SELECTORS: &[&str] = &[
    "input[type='text']",
    "input[type='email']",
    "input[type='tel']",
    "input[type='password']",
    "textarea",
    "select",
    "input[type='file']",
    "input[type='checkbox']",
    "input[type='radio']",
];

/// Clickable candidates scanned when a strategy matches by text.
const CLICKABLE_SELECTOR: &str = "a, button, input[type='submit'], [role='button']";

/// Evaluate a priority-ordered strategy list against the live page and
/// return the locator of the first candidate that is present, visible, and
/// carries non-empty text. First match wins; later strategies are not
/// evaluated. Any per-strategy error counts as "no match for this strategy".
pub async fn locate_control(
    driver: &dyn BrowserDriver,
    strategies: &[LocatorStrategy],
) -> Option<String> {
    for strategy in strategies {
        match strategy.kind {
            StrategyKind::Css => {
                let elements = match driver.query_all(&strategy.pattern).await {
                    Ok(els) => els,
                    Err(e) => {
                        debug!("strategy '{}' errored: {}", strategy.pattern, e);
                        continue;
                    }
                };
                let has_text = matches!(elements.first(), Some(el) if !el.text.is_empty());
                if !has_text {
                    continue;
                }
                match driver.is_visible(&strategy.pattern).await {
                    Ok(true) => return Some(strategy.pattern.clone()),
                    Ok(false) => debug!("strategy '{}' matched but not visible", strategy.pattern),
                    Err(e) => debug!("visibility probe for '{}' errored: {}", strategy.pattern, e),
                }
            }
            StrategyKind::ButtonText => {
                let needle = strategy.pattern.to_lowercase();
                let elements = match driver.query_all(CLICKABLE_SELECTOR).await {
                    Ok(els) => els,
                    Err(e) => {
                        debug!("clickable scan errored: {}", e);
                        continue;
                    }
                };
                for el in elements
                    .iter()
                    .filter(|el| !el.text.is_empty() && el.text.to_lowercase().contains(&needle))
                {
                    let selector = classify::element_selector(el);
                    match driver.is_visible(&selector).await {
                        Ok(true) => return Some(selector),
                        Ok(false) => debug!("'{}' text-matched but not visible", selector),
                        Err(e) => debug!("visibility probe for '{}' errored: {}", selector, e),
                    }
                }
            }
        }
    }
    None
}

/// Navigate to a job URL, try to open its application form, and enumerate
/// the form's input fields.
///
/// The apply-control candidates are the profile-specific list (when a board
/// profile resolved) with the generic fallback list appended. When no
/// candidate matches, the *current* page is still scanned, since some sites
/// render the form without requiring a click, and a warning is recorded.
pub async fn detect_application_form(
    driver: &dyn BrowserDriver,
    url: &str,
    board: Option<&JobBoardProfile>,
    shot_dir: &Path,
) -> DetectionResult {
    let mut result = DetectionResult {
        success: false,
        apply_control_found: false,
        apply_control_selector: None,
        fields: Vec::new(),
        page_title: String::new(),
        page_url: url.to_string(),
        screenshots: Vec::new(),
        errors: Vec::new(),
        warnings: Vec::new(),
    };

    if let Err(e) = driver.goto(url).await {
        result.errors.push(format!("navigation failed: {}", e));
        return result;
    }

    if let Some(path) = shots::capture(driver, shot_dir, "page-loaded").await {
        result.screenshots.push(path);
    }

    let mut strategies: Vec<LocatorStrategy> = board
        .map(|b| b.selectors.apply_button.clone())
        .unwrap_or_default();
    strategies.extend(generic_apply_strategies());

    match locate_control(driver, &strategies).await {
        Some(selector) => {
            info!("apply control matched: {}", selector);
            match driver.click(&selector).await {
                Ok(()) => {
                    result.apply_control_found = true;
                    result.apply_control_selector = Some(selector);
                    if let Err(e) = driver.wait_until_settled().await {
                        result.warnings.push(format!("post-click settle: {}", e));
                    }
                    if let Some(path) = shots::capture(driver, shot_dir, "after-apply").await {
                        result.screenshots.push(path);
                    }
                }
                Err(e) => {
                    result
                        .errors
                        .push(format!("apply control click failed ({}): {}", selector, e));
                }
            }
        }
        None => {
            warn!("no apply control matched on {}", url);
            result
                .warnings
                .push("no apply control matched; scanning current page for fields".to_string());
        }
    }

    result.page_title = driver.title().await.unwrap_or_default();
    result.page_url = driver.current_url().await.unwrap_or_else(|_| url.to_string());

    for scan in FIELD_SCAN_SELECTORS {
        let elements = match driver.query_all(scan).await {
            Ok(els) => els,
            Err(e) => {
                result.warnings.push(format!("field scan '{}': {}", scan, e));
                continue;
            }
        };
        for el in &elements {
            if let Some(field) = classify::classify_element(driver, el).await {
                result.fields.push(field);
            }
        }
    }

    debug!(
        "detection finished: {} fields, apply_control_found={}",
        result.fields.len(),
        result.apply_control_found
    );
    result.success = result.errors.is_empty();
    result
}
