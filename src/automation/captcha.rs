//! Anti-bot challenge detection.
//!
//! Four signature passes run in a fixed order (reCAPTCHA, hCaptcha,
//! Cloudflare challenge, Turnstile); the first pass returning any indicator
//! fixes the detection kind and confidence; later passes are not merged
//! in. Only when all four come back empty does a low-confidence generic
//! text pass run. Detection only; this module never attempts a bypass.

use super::shots;
use crate::browser::BrowserDriver;
use crate::core::types::{CaptchaDetection, CaptchaKind};
use aho_corasick::AhoCorasick;
use chrono::Utc;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, info};

pub struct CaptchaSignature {
    pub kind: CaptchaKind,
    pub confidence: f64,
    pub selectors: &'static [&'static str],
    pub phrases: &'static [&'static str],
}

/// Signature passes in evaluation order.
pub const CAPTCHA_SIGNATURES: &[CaptchaSignature] = &[
    CaptchaSignature {
        kind: CaptchaKind::Recaptcha,
        confidence: 0.95,
        selectors: &[
            "iframe[src*='recaptcha']",
            ".g-recaptcha",
            "#recaptcha",
            "[data-sitekey]",
            "textarea[name='g-recaptcha-response']",
        ],
        phrases: &["i'm not a robot", "recaptcha"],
    },
    CaptchaSignature {
        kind: CaptchaKind::Hcaptcha,
        confidence: 0.95,
        selectors: &[
            "iframe[src*='hcaptcha']",
            ".h-captcha",
            "[data-hcaptcha-widget-id]",
        ],
        phrases: &["hcaptcha"],
    },
    CaptchaSignature {
        kind: CaptchaKind::Cloudflare,
        confidence: 0.9,
        selectors: &[
            "#challenge-form",
            "#cf-challenge-running",
            ".cf-browser-verification",
            "#cf-wrapper",
        ],
        phrases: &[
            "checking your browser",
            "just a moment",
            "attention required",
            "ray id",
        ],
    },
    CaptchaSignature {
        kind: CaptchaKind::Turnstile,
        confidence: 0.9,
        selectors: &["iframe[src*='turnstile']", ".cf-turnstile"],
        phrases: &["turnstile"],
    },
];

/// Phrases for the generic fallback pass.
const GENERIC_PHRASES: &[&str] = &[
    "verify you are human",
    "are you a robot",
    "prove you are human",
    "security check",
    "unusual traffic",
    "press & hold",
    "press and hold",
    "complete the challenge",
];

const GENERIC_CONFIDENCE: f64 = 0.7;

fn phrase_matcher(phrases: &'static [&'static str], slot: &'static OnceLock<AhoCorasick>) -> &'static AhoCorasick {
    slot.get_or_init(|| {
        AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .build(phrases)
            .expect("valid captcha phrase patterns")
    })
}

fn signature_matcher(index: usize) -> &'static AhoCorasick {
    static SLOTS: [OnceLock<AhoCorasick>; 4] = [
        OnceLock::new(),
        OnceLock::new(),
        OnceLock::new(),
        OnceLock::new(),
    ];
    phrase_matcher(CAPTCHA_SIGNATURES[index].phrases, &SLOTS[index])
}

fn generic_matcher() -> &'static AhoCorasick {
    static SLOT: OnceLock<AhoCorasick> = OnceLock::new();
    phrase_matcher(GENERIC_PHRASES, &SLOT)
}

/// Distinct phrases from `phrases` present in `text`, as indicator strings.
fn scan_phrases(matcher: &AhoCorasick, phrases: &[&str], text: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    for m in matcher.find_iter(text) {
        seen.insert(m.pattern().as_usize());
    }
    seen.into_iter()
        .map(|i| format!("text: {}", phrases[i]))
        .collect()
}

/// One signature pass: selector probes, then a phrase scan. Probe errors
/// become indicator strings rather than aborting the pass.
async fn run_pass(
    driver: &dyn BrowserDriver,
    signature: &CaptchaSignature,
    matcher: &AhoCorasick,
    page_text: &Result<String, String>,
) -> Vec<String> {
    let mut indicators = Vec::new();

    for selector in signature.selectors {
        match driver.query_all(selector).await {
            Ok(elements) if !elements.is_empty() => {
                indicators.push(format!("selector: {}", selector));
            }
            Ok(_) => {}
            Err(e) => indicators.push(format!("error: {}: {}", selector, e)),
        }
    }

    match page_text {
        Ok(text) => indicators.extend(scan_phrases(matcher, signature.phrases, text)),
        Err(e) => indicators.push(format!("error: page text unavailable: {}", e)),
    }

    indicators
}

/// Inspect the currently loaded page for anti-bot challenges.
///
/// A screenshot is captured only when a challenge is detected.
pub async fn detect_captcha_on_page(
    driver: &dyn BrowserDriver,
    shot_dir: &Path,
) -> CaptchaDetection {
    let page_url = driver.current_url().await.unwrap_or_default();
    let page_text = driver
        .page_text()
        .await
        .map(|t| t.to_lowercase())
        .map_err(|e| e.to_string());

    for (index, signature) in CAPTCHA_SIGNATURES.iter().enumerate() {
        let indicators = run_pass(driver, signature, signature_matcher(index), &page_text).await;
        if !indicators.is_empty() {
            info!(
                "captcha detected: {:?} ({} indicators)",
                signature.kind,
                indicators.len()
            );
            let screenshot_path = shots::capture(driver, shot_dir, "captcha").await;
            return CaptchaDetection {
                detected: true,
                kind: signature.kind,
                confidence: signature.confidence,
                indicators,
                screenshot_path,
                page_url,
                detected_at: Utc::now(),
            };
        }
    }

    // Generic low-confidence pass, only when every specific pass was empty.
    if let Ok(text) = &page_text {
        let indicators = scan_phrases(generic_matcher(), GENERIC_PHRASES, text);
        if !indicators.is_empty() {
            info!("generic challenge text detected ({} phrases)", indicators.len());
            let screenshot_path = shots::capture(driver, shot_dir, "captcha").await;
            return CaptchaDetection {
                detected: true,
                kind: CaptchaKind::Unknown,
                confidence: GENERIC_CONFIDENCE,
                indicators,
                screenshot_path,
                page_url,
                detected_at: Utc::now(),
            };
        }
    }

    debug!("no challenge indicators on {}", page_url);
    CaptchaDetection {
        detected: false,
        kind: CaptchaKind::Unknown,
        confidence: 0.0,
        indicators: Vec::new(),
        screenshot_path: None,
        page_url,
        detected_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phrase_scan_is_case_insensitive_and_deduplicated() {
        let text = "Checking Your Browser... checking your browser ... Ray ID: abc";
        let matched = scan_phrases(
            signature_matcher(2),
            CAPTCHA_SIGNATURES[2].phrases,
            &text.to_lowercase(),
        );
        assert_eq!(
            matched,
            vec!["text: checking your browser", "text: ray id"]
        );
    }

    #[test]
    fn test_signature_order_is_fixed() {
        let kinds: Vec<CaptchaKind> = CAPTCHA_SIGNATURES.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                CaptchaKind::Recaptcha,
                CaptchaKind::Hcaptcha,
                CaptchaKind::Cloudflare,
                CaptchaKind::Turnstile,
            ]
        );
    }
}
