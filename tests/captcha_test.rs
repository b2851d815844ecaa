mod common;

use apply_pilot::automation::captcha::detect_captcha_on_page;
use apply_pilot::browser::BrowserDriver;
use apply_pilot::CaptchaKind;
use common::{init_logger, DriverAction, MockDriver, MockElement, MockPage};
use std::path::Path;

fn shot_dir() -> &'static Path {
    Path::new("/tmp/apply-pilot-test-shots")
}

async fn scan(driver: &MockDriver, url: &str) -> apply_pilot::CaptchaDetection {
    driver.goto(url).await.unwrap();
    detect_captcha_on_page(driver, shot_dir()).await
}

#[tokio::test]
async fn test_recaptcha_iframe_detected() {
    init_logger();
    let url = "https://jobs.example.com/guarded";
    let driver = MockDriver::new().with_page(MockPage::new(url).element(MockElement::new(
        "iframe",
        &[("src", "https://www.google.com/recaptcha/api2/anchor")],
        "",
    )));

    let result = scan(&driver, url).await;
    assert!(result.detected);
    assert_eq!(result.kind, CaptchaKind::Recaptcha);
    assert_eq!(result.confidence, 0.95);
    assert!(result
        .indicators
        .contains(&"selector: iframe[src*='recaptcha']".to_string()));
    assert_eq!(result.page_url, url);
    // Screenshot captured because something was detected.
    assert!(result.screenshot_path.is_some());
}

#[tokio::test]
async fn test_recaptcha_takes_precedence_over_later_passes() {
    init_logger();
    let url = "https://jobs.example.com/both";
    let driver = MockDriver::new().with_page(
        MockPage::new(url)
            .element(MockElement::new("div", &[("class", "g-recaptcha")], ""))
            .element(MockElement::new("div", &[("class", "h-captcha")], ""))
            .body_text("checking your browser before accessing"),
    );

    let result = scan(&driver, url).await;
    assert!(result.detected);
    assert_eq!(result.kind, CaptchaKind::Recaptcha);
    assert_eq!(result.confidence, 0.95);
    // Later passes' indicators are not merged in.
    assert!(result.indicators.iter().all(|i| !i.contains("h-captcha")));
    assert!(result
        .indicators
        .iter()
        .all(|i| !i.contains("checking your browser")));
}

#[tokio::test]
async fn test_hcaptcha_detected_when_recaptcha_pass_empty() {
    init_logger();
    let url = "https://jobs.example.com/hc";
    let driver = MockDriver::new().with_page(
        MockPage::new(url).element(MockElement::new("div", &[("class", "h-captcha")], "")),
    );

    let result = scan(&driver, url).await;
    assert!(result.detected);
    assert_eq!(result.kind, CaptchaKind::Hcaptcha);
    assert_eq!(result.confidence, 0.95);
}

#[tokio::test]
async fn test_cloudflare_challenge_via_page_text() {
    init_logger();
    let url = "https://jobs.example.com/cf";
    let driver = MockDriver::new().with_page(
        MockPage::new(url)
            .title("Just a moment...")
            .body_text("Checking your browser before accessing jobs.example.com. Ray ID: 8a1"),
    );

    let result = scan(&driver, url).await;
    assert!(result.detected);
    assert_eq!(result.kind, CaptchaKind::Cloudflare);
    assert_eq!(result.confidence, 0.9);
    assert!(result
        .indicators
        .contains(&"text: checking your browser".to_string()));
    assert!(result.indicators.contains(&"text: ray id".to_string()));
}

#[tokio::test]
async fn test_turnstile_detected() {
    init_logger();
    let url = "https://jobs.example.com/ts";
    let driver = MockDriver::new().with_page(
        MockPage::new(url).element(MockElement::new("div", &[("class", "cf-turnstile")], "")),
    );

    let result = scan(&driver, url).await;
    assert!(result.detected);
    assert_eq!(result.kind, CaptchaKind::Turnstile);
    assert_eq!(result.confidence, 0.9);
}

#[tokio::test]
async fn test_generic_fallback_low_confidence() {
    init_logger();
    let url = "https://jobs.example.com/odd";
    let driver = MockDriver::new()
        .with_page(MockPage::new(url).body_text("Please verify you are human to continue"));

    let result = scan(&driver, url).await;
    assert!(result.detected);
    assert_eq!(result.kind, CaptchaKind::Unknown);
    assert_eq!(result.confidence, 0.7);
    assert_eq!(result.indicators, vec!["text: verify you are human"]);
}

#[tokio::test]
async fn test_clean_page_not_detected_and_no_screenshot() {
    init_logger();
    let url = "https://jobs.example.com/clean";
    let driver = MockDriver::new().with_page(
        MockPage::new(url)
            .title("Senior Engineer — Acme")
            .body_text("We are hiring. Apply below with your details."),
    );

    let result = scan(&driver, url).await;
    assert!(!result.detected);
    assert!(result.indicators.is_empty());
    assert!(result.screenshot_path.is_none());
    assert!(!driver
        .actions()
        .iter()
        .any(|a| matches!(a, DriverAction::Screenshot)));
}
