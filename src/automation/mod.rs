//! Page automation heuristics: apply-control detection, field
//! classification, profile mapping/filling, and CAPTCHA scanning.
//!
//! Everything here runs against the injected [`crate::browser::BrowserDriver`]
//! and returns structured results (`errors`/`warnings` aggregated, partial
//! progress preserved); a single bad selector or element never aborts a
//! whole pass.

pub mod captcha;
pub mod classify;
pub mod detect;
pub mod mapper;
pub mod shots;

pub use captcha::{detect_captcha_on_page, CAPTCHA_SIGNATURES};
pub use classify::{classify_element, element_selector, infer_kind};
pub use detect::{detect_application_form, locate_control, FIELD_SCAN_SELECTORS};
pub use mapper::{apply_mappings, map_fields, MAPPING_RULES};
