//! Field classification: raw element snapshot → typed [`FormField`].

use crate::browser::{BrowserDriver, DriverError, ElementInfo};
use crate::core::types::{FieldKind, FormField};
use tracing::debug;

/// Infer the semantic kind of an input element.
///
/// The explicit `type` attribute overrides tag-based inference; anything
/// unrecognized defaults to `Text`. Deterministic: depends only on the
/// element's own attributes and tag, never on document order.
pub fn infer_kind(el: &ElementInfo) -> FieldKind {
    match el.attr("type").map(|t| t.to_ascii_lowercase()).as_deref() {
        Some("email") => return FieldKind::Email,
        Some("tel") => return FieldKind::Phone,
        Some("file") => return FieldKind::File,
        Some("checkbox") => return FieldKind::Checkbox,
        Some("radio") => return FieldKind::Radio,
        _ => {}
    }
    match el.tag.as_str() {
        "textarea" => FieldKind::Textarea,
        "select" => FieldKind::Select,
        _ => FieldKind::Text,
    }
}

/// Generate a locator for the element, most specific wins: `#id`, then
/// `[name="…"]`, then tag plus class list, then the bare tag.
pub fn element_selector(el: &ElementInfo) -> String {
    if let Some(id) = el.attr("id").filter(|s| !s.is_empty()) {
        return format!("#{}", id);
    }
    if let Some(name) = el.attr("name").filter(|s| !s.is_empty()) {
        return format!("{}[name=\"{}\"]", el.tag, name);
    }
    if let Some(class) = el.attr("class").filter(|s| !s.trim().is_empty()) {
        let classes: Vec<&str> = class.split_whitespace().collect();
        if !classes.is_empty() {
            return format!("{}.{}", el.tag, classes.join("."));
        }
    }
    el.tag.clone()
}

/// Classify one element snapshot into a [`FormField`], probing the driver
/// for an associated `<label for=…>` when the element carries an id.
///
/// Returns `None` when probing the element fails; the caller skips it and
/// moves on; one bad element never aborts enumeration.
pub async fn classify_element(driver: &dyn BrowserDriver, el: &ElementInfo) -> Option<FormField> {
    let kind = infer_kind(el);
    let selector = element_selector(el);
    let id = el.attr("id").filter(|s| !s.is_empty()).map(str::to_string);

    let label = match &id {
        Some(id) => match driver.text_content(&format!("label[for=\"{}\"]", id)).await {
            Ok(text) => {
                let text = text.trim().to_string();
                (!text.is_empty()).then_some(text)
            }
            // No label is not an error; a broken probe skips the element.
            Err(DriverError::Selector { .. }) => None,
            Err(e) => {
                debug!("skipping element {}: label probe failed: {}", selector, e);
                return None;
            }
        },
        None => None,
    };

    Some(FormField {
        kind,
        name: el.attr("name").unwrap_or_default().to_string(),
        id,
        placeholder: el
            .attr("placeholder")
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        label,
        required: el.attrs.contains_key("required"),
        selector,
        value: el.attr("value").filter(|s| !s.is_empty()).map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn element(tag: &str, attrs: &[(&str, &str)]) -> ElementInfo {
        ElementInfo {
            tag: tag.to_string(),
            attrs: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
            text: String::new(),
        }
    }

    #[test]
    fn test_type_attribute_overrides_tag() {
        assert_eq!(
            infer_kind(&element("input", &[("type", "email")])),
            FieldKind::Email
        );
        assert_eq!(
            infer_kind(&element("input", &[("type", "tel")])),
            FieldKind::Phone
        );
        assert_eq!(
            infer_kind(&element("input", &[("type", "file")])),
            FieldKind::File
        );
        assert_eq!(
            infer_kind(&element("input", &[("type", "checkbox")])),
            FieldKind::Checkbox
        );
        assert_eq!(
            infer_kind(&element("input", &[("type", "radio")])),
            FieldKind::Radio
        );
    }

    #[test]
    fn test_tag_inference_and_text_default() {
        assert_eq!(infer_kind(&element("textarea", &[])), FieldKind::Textarea);
        assert_eq!(infer_kind(&element("select", &[])), FieldKind::Select);
        assert_eq!(
            infer_kind(&element("input", &[("type", "text")])),
            FieldKind::Text
        );
        // Unknown type attribute falls through to the tag, then to Text.
        assert_eq!(
            infer_kind(&element("input", &[("type", "datetime-local")])),
            FieldKind::Text
        );
        assert_eq!(infer_kind(&element("input", &[])), FieldKind::Text);
    }

    #[test]
    fn test_selector_precedence() {
        assert_eq!(
            element_selector(&element("input", &[("id", "email"), ("name", "em")])),
            "#email"
        );
        assert_eq!(
            element_selector(&element("input", &[("name", "em")])),
            "input[name=\"em\"]"
        );
        assert_eq!(
            element_selector(&element("input", &[("class", "form-control wide")])),
            "input.form-control.wide"
        );
        assert_eq!(element_selector(&element("textarea", &[])), "textarea");
    }
}
