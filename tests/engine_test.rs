mod common;

use apply_pilot::boards::BoardRegistry;
use apply_pilot::browser::BrowserDriver;
use apply_pilot::core::config::PilotConfig;
use apply_pilot::core::{AutomationEngine, AutomationError};
use common::{init_logger, sample_profile, DriverAction, MockDriver, MockElement, MockPage};
use std::sync::Arc;

const JOB_URL: &str = "https://boards.greenhouse.io/acme/jobs/42";

fn engine_with(driver: MockDriver) -> (AutomationEngine, Arc<MockDriver>) {
    let driver = Arc::new(driver);
    let engine = AutomationEngine::new(
        driver.clone(),
        Arc::new(BoardRegistry::with_builtins()),
        &PilotConfig {
            screenshot_dir: Some("/tmp/apply-pilot-test-shots".into()),
            ..Default::default()
        },
    );
    (engine, driver)
}

#[tokio::test]
async fn test_board_resolution_via_engine() {
    init_logger();
    let (engine, _driver) = engine_with(MockDriver::new());
    assert_eq!(engine.board_profile_for(JOB_URL).unwrap().id, "greenhouse");
    assert_eq!(
        engine
            .board_profile_for("https://somewhere-else.example/x")
            .unwrap()
            .id,
        "generic"
    );
}

#[tokio::test]
async fn test_auto_fill_form_end_to_end() {
    init_logger();
    let driver = MockDriver::new().with_page(
        MockPage::new(JOB_URL)
            .input(&[("type", "email"), ("name", "email"), ("id", "email")])
            .input(&[("type", "tel"), ("name", "phone")]),
    );
    let (engine, driver) = engine_with(driver);

    let result = engine
        .auto_fill_form(JOB_URL, &sample_profile(), None)
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.filled.len(), 2);
    assert!(driver.actions().contains(&DriverAction::Fill {
        selector: "#email".into(),
        value: "ada@example.com".into(),
    }));
}

#[tokio::test]
async fn test_auto_fill_form_rejects_empty_profile() {
    init_logger();
    let (engine, driver) = engine_with(MockDriver::new());
    let err = engine
        .auto_fill_form(JOB_URL, &apply_pilot::UserProfile::default(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AutomationError::MissingProfile));
    // Nothing was navigated; the check happens at the call boundary.
    assert!(driver.navigated_urls().is_empty());
}

#[tokio::test]
async fn test_auto_fill_form_surfaces_navigation_failure() {
    init_logger();
    let (engine, _driver) = engine_with(MockDriver::new().fail_navigation(JOB_URL));

    let err = engine
        .auto_fill_form(JOB_URL, &sample_profile(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AutomationError::DetectionFailed(_)));
}

#[tokio::test]
async fn test_detect_captcha_navigates_then_scans() {
    init_logger();
    let driver = MockDriver::new().with_page(
        MockPage::new(JOB_URL).body_text("Checking your browser before accessing"),
    );
    let (engine, driver) = engine_with(driver);

    let detection = engine.detect_captcha(JOB_URL).await.unwrap();
    assert!(detection.detected);
    assert_eq!(driver.navigated_urls(), vec![JOB_URL.to_string()]);
}

#[tokio::test]
async fn test_submit_clicks_board_navigation_control() {
    init_logger();
    let board = BoardRegistry::with_builtins().get("greenhouse").unwrap();
    let driver = MockDriver::new().with_page(
        MockPage::new(JOB_URL).element(MockElement::new(
            "input",
            &[("type", "submit"), ("id", "submit_app")],
            "Submit application",
        )),
    );
    let (engine, driver) = engine_with(driver);
    driver.goto(JOB_URL).await.unwrap();

    engine.submit_application(Some(&board)).await.unwrap();
    assert!(driver.actions().contains(&DriverAction::Click("#submit_app".into())));
}

#[tokio::test]
async fn test_submit_with_no_control_is_an_error() {
    init_logger();
    let (engine, driver) = engine_with(MockDriver::new().with_page(MockPage::new(JOB_URL)));
    driver.goto(JOB_URL).await.unwrap();

    let err = engine.submit_application(None).await.unwrap_err();
    assert!(matches!(err, AutomationError::SubmitFailed(_)));
}
