//! Applies a content payload to the page.
//!
//! All edits are located against the original text first and then spliced in
//! one pass, so a failure anywhere in the section leaves the caller's document
//! untouched and a success only changes the targeted byte ranges.

use crate::site::error::PatchError;
use crate::site::locators::{self, ListKind, ListSpec, Target, ITEMS_KEY};
use crate::site::markup::{escape_html, Markup, Selector};
use cms_common::model::list_item::{ServiceItem, TestimonialItem};
use cms_common::model::section::Section;
use log::warn;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::ops::Range;

/// Result of a successful patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchOutcome {
    pub document: String,
    /// Keys written into the document.
    pub applied: Vec<String>,
    /// Keys with a locator that matched nothing; left as they were.
    pub skipped: Vec<String>,
    /// Keys with no locator for the section.
    pub ignored: Vec<String>,
}

impl PatchOutcome {
    fn unchanged(document: &str, ignored: Vec<String>) -> Self {
        PatchOutcome {
            document: document.to_string(),
            applied: Vec::new(),
            skipped: Vec::new(),
            ignored,
        }
    }
}

struct Edit {
    key: String,
    range: Range<usize>,
    replacement: String,
}

/// Patches `section` of `document` with `payload`.
///
/// A section name outside the fixed set is a no-op: the document comes back
/// unchanged and every key is reported as ignored.
pub fn patch(
    document: &str,
    section: &str,
    payload: &Map<String, Value>,
) -> Result<PatchOutcome, PatchError> {
    match section.parse::<Section>() {
        Ok(section) => patch_section(document, section, payload),
        Err(e) => {
            warn!("{e}, nothing to patch");
            Ok(PatchOutcome::unchanged(
                document,
                payload.keys().cloned().collect(),
            ))
        }
    }
}

pub fn patch_section(
    document: &str,
    section: Section,
    payload: &Map<String, Value>,
) -> Result<PatchOutcome, PatchError> {
    let markup = Markup::parse(document);
    let root_selector = locators::section_root(section);
    let root = markup
        .select_first(None, &root_selector.parse()?)
        .ok_or_else(|| PatchError::SectionMissing {
            section: section.to_string(),
            selector: root_selector,
        })?;

    let mut edits = Vec::new();
    let mut outcome = PatchOutcome::unchanged("", Vec::new());

    for (key, value) in payload {
        if key == ITEMS_KEY {
            if let Some(list) = locators::list_spec(section) {
                edits.push(list_edit(&markup, root, list, value)?);
                outcome.applied.push(key.clone());
                continue;
            }
        }

        let Some(locator) = locators::resolve(section, key) else {
            outcome.ignored.push(key.clone());
            continue;
        };
        let Some(text) = field_text(value) else {
            warn!("Ignoring non-text value for {section}.{key}");
            outcome.ignored.push(key.clone());
            continue;
        };

        let selector: Selector = locator.selector.parse()?;
        let Some(idx) = markup.select_first(Some(root), &selector) else {
            warn!(
                "No element matches '{}' for {section}.{key}, skipping",
                locator.selector
            );
            outcome.skipped.push(key.clone());
            continue;
        };

        let Some(edit) = field_edit(&markup, idx, locator.target, key, &text) else {
            warn!(
                "Element '{}' for {section}.{key} has no closed content, skipping",
                locator.selector
            );
            outcome.skipped.push(key.clone());
            continue;
        };
        edits.push(edit);
        outcome.applied.push(key.clone());
    }

    outcome.document = apply_edits(document, edits)?;
    Ok(outcome)
}

fn field_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn field_edit(
    markup: &Markup<'_>,
    idx: usize,
    target: Target,
    key: &str,
    text: &str,
) -> Option<Edit> {
    let element = markup.element(idx);
    let escaped = escape_html(text);
    let (range, replacement) = match target {
        Target::Text => (element.content_range()?, escaped),
        Target::Attribute(name) => match element.attribute(name) {
            Some(attr) if attr.quoted => match &attr.value_span {
                Some(span) => (span.clone(), escaped),
                None => (attr.span.clone(), format!("{name}=\"{escaped}\"")),
            },
            Some(attr) => (attr.span.clone(), format!("{name}=\"{escaped}\"")),
            None => {
                let tag = &markup.source()[element.start_tag.clone()];
                let close_len = if tag.ends_with("/>") { 2 } else { 1 };
                let at = element.start_tag.end - close_len;
                (at..at, format!(" {name}=\"{escaped}\""))
            }
        },
    };
    Some(Edit {
        key: key.to_string(),
        range,
        replacement,
    })
}

fn list_edit(
    markup: &Markup<'_>,
    root: usize,
    list: &ListSpec,
    value: &Value,
) -> Result<Edit, PatchError> {
    let container = markup
        .select_first(Some(root), &list.container.parse()?)
        .ok_or_else(|| PatchError::ListContainerMissing {
            section: list.section.to_string(),
            selector: list.container,
        })?;
    let entries = value
        .as_array()
        .ok_or_else(|| PatchError::NotAList(format!("{}.{ITEMS_KEY}", list.section)))?;

    let element = markup.element(container);
    let indent = line_indent(markup.source(), element.start_tag.start);
    let child_indent = format!("{indent}    ");

    let blocks = match list.kind {
        ListKind::Services => parse_items::<ServiceItem>(list.section, entries)?
            .iter()
            .map(|item| render_service(&child_indent, item))
            .collect::<Vec<_>>(),
        ListKind::Testimonials => parse_items::<TestimonialItem>(list.section, entries)?
            .iter()
            .enumerate()
            .map(|(i, item)| render_testimonial(&child_indent, item, i == 0))
            .collect::<Vec<_>>(),
    };

    let replacement = if blocks.is_empty() {
        format!("\n{indent}")
    } else {
        format!("\n{}\n{indent}", blocks.join("\n"))
    };

    Ok(Edit {
        key: ITEMS_KEY.to_string(),
        range: element.inner.clone(),
        replacement,
    })
}

fn parse_items<T: DeserializeOwned>(section: Section, entries: &[Value]) -> Result<Vec<T>, PatchError> {
    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            serde_json::from_value(entry.clone()).map_err(|e| PatchError::InvalidItem {
                section: section.to_string(),
                index,
                reason: e.to_string(),
            })
        })
        .collect()
}

/// Leading whitespace of the line that contains `pos`.
fn line_indent(source: &str, pos: usize) -> &str {
    let line_start = source[..pos].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let line = &source[line_start..pos];
    let end = line
        .find(|c: char| c != ' ' && c != '\t')
        .unwrap_or(line.len());
    &line[..end]
}

fn render_service(indent: &str, item: &ServiceItem) -> String {
    [
        format!("{indent}<div class=\"service-card\">"),
        format!("{indent}    <i class=\"{}\"></i>", escape_html(&item.icon)),
        format!("{indent}    <h3>{}</h3>", escape_html(&item.title)),
        format!("{indent}    <p>{}</p>", escape_html(&item.description)),
        format!("{indent}</div>"),
    ]
    .join("\n")
}

fn render_testimonial(indent: &str, item: &TestimonialItem, active: bool) -> String {
    let class = if active {
        "testimonial-slide active"
    } else {
        "testimonial-slide"
    };
    [
        format!("{indent}<div class=\"{class}\">"),
        format!("{indent}    <p>{}</p>", escape_html(&item.text)),
        format!("{indent}    <div class=\"client-info\">"),
        format!("{indent}        <h4>{}</h4>", escape_html(&item.name)),
        format!("{indent}        <span>{}</span>", escape_html(&item.info)),
        format!("{indent}    </div>"),
        format!("{indent}</div>"),
    ]
    .join("\n")
}

fn apply_edits(document: &str, mut edits: Vec<Edit>) -> Result<String, PatchError> {
    edits.sort_by_key(|edit| (edit.range.start, edit.range.end));
    for pair in edits.windows(2) {
        if pair[0].range.end > pair[1].range.start {
            return Err(PatchError::OverlappingEdits(
                pair[0].key.clone(),
                pair[1].key.clone(),
            ));
        }
    }

    let mut out = String::with_capacity(document.len());
    let mut cursor = 0;
    for edit in &edits {
        out.push_str(&document[cursor..edit.range.start]);
        out.push_str(&edit.replacement);
        cursor = edit.range.end;
    }
    out.push_str(&document[cursor..]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::testing::FIXTURE;

    fn payload(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn texts(document: &str, selector: &str) -> Vec<String> {
        let markup = Markup::parse(document);
        markup
            .select_all(None, &selector.parse().unwrap())
            .into_iter()
            .map(|idx| markup.inner_text(idx).to_string())
            .collect()
    }

    #[test]
    fn each_locator_changes_only_its_target() {
        let value = "Patched <&> value";
        let escaped = escape_html(value);
        let markup = Markup::parse(FIXTURE);

        for locator in locators::all_locators() {
            let root_selector: Selector = locators::section_root(locator.section).parse().unwrap();
            let root = markup.select_first(None, &root_selector).unwrap();
            let idx = markup
                .select_first(Some(root), &locator.selector.parse().unwrap())
                .unwrap();
            let element = markup.element(idx);
            let range = match locator.target {
                Target::Text => element.inner.clone(),
                Target::Attribute(name) => element.attribute(name).unwrap().value_span.clone().unwrap(),
            };
            let expected = format!("{}{}{}", &FIXTURE[..range.start], escaped, &FIXTURE[range.end..]);

            let outcome = patch_section(
                FIXTURE,
                locator.section,
                &payload(json!({ locator.key: value })),
            )
            .unwrap();
            assert_eq!(
                outcome.document, expected,
                "{}.{} touched more than its target",
                locator.section, locator.key
            );
            assert_eq!(outcome.applied, vec![locator.key.to_string()]);
        }
    }

    #[test]
    fn site_title_example() {
        let outcome = patch(FIXTURE, "general", &payload(json!({ "siteTitle": "Acme Gym" }))).unwrap();
        assert!(outcome.document.contains("<title>Acme Gym</title>"));
        assert!(!outcome.document.contains("Old Title"));
        assert_eq!(
            outcome.document.replace("Acme Gym", "Old Title"),
            FIXTURE,
            "only the title should differ"
        );
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let outcome = patch(
            FIXTURE,
            "general",
            &payload(json!({ "primaryColor": "#ff0000", "logoText": "Acme" })),
        )
        .unwrap();
        assert_eq!(outcome.ignored, vec!["primaryColor".to_string()]);
        assert_eq!(outcome.applied, vec!["logoText".to_string()]);
        assert_eq!(texts(&outcome.document, ".logo h1"), vec!["Acme"]);
        assert!(!outcome.document.contains("#ff0000"));
    }

    #[test]
    fn unknown_section_is_a_no_op() {
        let outcome = patch(FIXTURE, "pricing", &payload(json!({ "title": "x" }))).unwrap();
        assert_eq!(outcome.document, FIXTURE);
        assert_eq!(outcome.ignored, vec!["title".to_string()]);
    }

    #[test]
    fn services_are_regenerated_in_payload_order() {
        let outcome = patch(
            FIXTURE,
            "services",
            &payload(json!({
                "title": "What I Offer",
                "items": [
                    { "title": "Yoga", "icon": "fas fa-spa", "description": "Stretch." },
                    { "title": "Boxing", "icon": "fas fa-fist-raised", "description": "Punch." }
                ]
            })),
        )
        .unwrap();
        let doc = &outcome.document;
        assert_eq!(texts(doc, ".services-grid .service-card h3"), vec!["Yoga", "Boxing"]);
        assert_eq!(texts(doc, ".services-grid .service-card p"), vec!["Stretch.", "Punch."]);
        assert_eq!(texts(doc, "#services h2"), vec!["What I Offer"]);
        assert!(doc.contains("<i class=\"fas fa-spa\"></i>"));
        assert!(!doc.contains("Strength Training"));
        // Markup outside the section is untouched.
        let split = FIXTURE.find("<!-- Testimonials -->").unwrap();
        assert!(doc.ends_with(&FIXTURE[split..]));
    }

    #[test]
    fn first_testimonial_is_active() {
        let outcome = patch(
            FIXTURE,
            "testimonials",
            &payload(json!({
                "items": [
                    { "text": "Great.", "name": "A", "info": "2020" },
                    { "text": "Good.", "name": "B", "info": "2021" },
                    { "text": "Fine.", "name": "C" }
                ]
            })),
        )
        .unwrap();
        let markup = Markup::parse(&outcome.document);
        let slides = markup.select_all(None, &".testimonial-slider .testimonial-slide".parse().unwrap());
        assert_eq!(slides.len(), 3);
        let active: Vec<bool> = slides
            .iter()
            .map(|&idx| markup.element(idx).has_class("active"))
            .collect();
        assert_eq!(active, vec![true, false, false]);
        assert_eq!(texts(&outcome.document, ".client-info h4"), vec!["A", "B", "C"]);
        assert_eq!(texts(&outcome.document, ".client-info span")[2], "");
        // Slider controls live outside the container and survive.
        assert!(outcome.document.contains("class=\"prev-btn\""));
    }

    #[test]
    fn empty_list_empties_the_container() {
        let outcome = patch(FIXTURE, "services", &payload(json!({ "items": [] }))).unwrap();
        let markup = Markup::parse(&outcome.document);
        let grid = markup.select_first(None, &".services-grid".parse().unwrap()).unwrap();
        assert!(markup.element(grid).children.is_empty());
        assert_eq!(markup.inner_text(grid).trim(), "");
    }

    #[test]
    fn missing_section_root_aborts() {
        let document = FIXTURE.replace("id=\"hero\"", "id=\"banner\"");
        let err = patch(&document, "hero", &payload(json!({ "title": "x" }))).unwrap_err();
        assert!(matches!(err, PatchError::SectionMissing { .. }));
    }

    #[test]
    fn missing_list_container_aborts() {
        let document = FIXTURE.replace("services-grid", "cards");
        let err = patch(
            &document,
            "services",
            &payload(json!({ "title": "New", "items": [] })),
        )
        .unwrap_err();
        assert!(matches!(err, PatchError::ListContainerMissing { .. }));
    }

    #[test]
    fn malformed_entries_abort() {
        let err = patch(FIXTURE, "services", &payload(json!({ "items": ["oops"] }))).unwrap_err();
        assert!(matches!(err, PatchError::InvalidItem { index: 0, .. }));
        let err = patch(FIXTURE, "testimonials", &payload(json!({ "items": "oops" }))).unwrap_err();
        assert!(matches!(err, PatchError::NotAList(_)));
    }

    #[test]
    fn unmatched_field_is_skipped() {
        let document = "<section id=\"hero\"><div class=\"hero-content\"><h1>Hi</h1></div></section>";
        let outcome = patch(
            document,
            "hero",
            &payload(json!({ "title": "Hello", "subtext": "more" })),
        )
        .unwrap();
        assert_eq!(outcome.skipped, vec!["subtext".to_string()]);
        assert_eq!(
            outcome.document,
            "<section id=\"hero\"><div class=\"hero-content\"><h1>Hello</h1></div></section>"
        );
    }

    #[test]
    fn unclosed_element_content_is_skipped() {
        let document = "<section id=\"hero\"><div class=\"hero-content\"><h1>Hi</div></section>";
        let outcome = patch(document, "hero", &payload(json!({ "title": "Hello" }))).unwrap();
        assert_eq!(outcome.skipped, vec!["title".to_string()]);
        assert!(outcome.applied.is_empty());
        assert_eq!(outcome.document, document);
    }

    #[test]
    fn missing_attribute_is_added() {
        let document = "<section id=\"hero\"><div class=\"hero-content\"><a class=btn>Go</a></div></section>";
        let outcome = patch(document, "hero", &payload(json!({ "buttonLink": "#contact" }))).unwrap();
        assert_eq!(
            outcome.document,
            "<section id=\"hero\"><div class=\"hero-content\"><a class=btn href=\"#contact\">Go</a></div></section>"
        );
    }

    #[test]
    fn non_string_scalars_are_rendered() {
        let outcome = patch(FIXTURE, "footer", &payload(json!({ "copyright": 2025, "twitter": null }))).unwrap();
        assert_eq!(texts(&outcome.document, "footer p"), vec!["2025"]);
        assert_eq!(outcome.ignored, vec!["twitter".to_string()]);
    }
}
