//! Field locator table.
//!
//! Maps `(section, field key)` to the place in the page template that holds
//! the field. Selectors are structural (tag, class, id, nth-of-type) and are
//! evaluated inside the section's root container, so a change to the page
//! template is a table migration: bump `LOCATOR_TABLE_VERSION` and update the
//! fixture test in this module.

use cms_common::model::section::Section;

pub const LOCATOR_TABLE_VERSION: u32 = 1;

/// Payload key holding the ordered blocks of a list section.
pub const ITEMS_KEY: &str = "items";

/// Payload key of the image reference in sections that have one.
pub const IMAGE_KEY: &str = "image";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Replace the element's inner content with escaped text.
    Text,
    /// Replace (or add) the named attribute.
    Attribute(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldLocator {
    pub section: Section,
    pub key: &'static str,
    /// Evaluated relative to the section root.
    pub selector: &'static str,
    pub target: Target,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Services,
    Testimonials,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListSpec {
    pub section: Section,
    /// Container whose children are regenerated, relative to the section root.
    pub container: &'static str,
    pub kind: ListKind,
}

const fn text(section: Section, key: &'static str, selector: &'static str) -> FieldLocator {
    FieldLocator {
        section,
        key,
        selector,
        target: Target::Text,
    }
}

const fn attr(
    section: Section,
    key: &'static str,
    selector: &'static str,
    name: &'static str,
) -> FieldLocator {
    FieldLocator {
        section,
        key,
        selector,
        target: Target::Attribute(name),
    }
}

static SECTION_ROOTS: &[(Section, &str)] = &[
    (Section::General, "html"),
    (Section::Hero, "#hero"),
    (Section::About, "#about"),
    (Section::Services, "#services"),
    (Section::Testimonials, "#testimonials"),
    (Section::Contact, "#contact"),
    (Section::Footer, "footer"),
];

static LOCATORS: &[FieldLocator] = &[
    text(Section::General, "siteTitle", "title"),
    text(Section::General, "logoText", ".logo h1"),
    attr(Section::General, IMAGE_KEY, "#favicon", "href"),
    text(Section::Hero, "title", ".hero-content h1"),
    text(Section::Hero, "text", ".hero-content p:nth-of-type(1)"),
    text(Section::Hero, "subtext", ".hero-content p:nth-of-type(2)"),
    text(Section::Hero, "buttonText", ".hero-content a.btn"),
    attr(Section::Hero, "buttonLink", ".hero-content a.btn", "href"),
    attr(Section::Hero, IMAGE_KEY, "#trainer-image", "src"),
    text(Section::About, "title", ".about-text h2"),
    text(Section::About, "text", ".about-text p:nth-of-type(1)"),
    text(Section::About, "subtext", ".about-text p:nth-of-type(2)"),
    attr(Section::About, IMAGE_KEY, "#about-image", "src"),
    text(Section::Services, "title", "h2"),
    text(Section::Testimonials, "title", "h2"),
    text(Section::Contact, "title", "h2"),
    text(Section::Contact, "address", ".contact-info p:nth-of-type(1) span"),
    text(Section::Contact, "phone", ".contact-info p:nth-of-type(2) span"),
    text(Section::Contact, "email", ".contact-info p:nth-of-type(3) a"),
    attr(Section::Contact, "emailLink", ".contact-info p:nth-of-type(3) a", "href"),
    text(Section::Footer, "copyright", "p"),
    attr(Section::Footer, "facebook", ".social-links a:nth-of-type(1)", "href"),
    attr(Section::Footer, "instagram", ".social-links a:nth-of-type(2)", "href"),
    attr(Section::Footer, "twitter", ".social-links a:nth-of-type(3)", "href"),
];

static LISTS: &[ListSpec] = &[
    ListSpec {
        section: Section::Services,
        container: ".services-grid",
        kind: ListKind::Services,
    },
    ListSpec {
        section: Section::Testimonials,
        container: ".testimonial-slider",
        kind: ListKind::Testimonials,
    },
];

pub fn resolve(section: Section, key: &str) -> Option<&'static FieldLocator> {
    LOCATORS
        .iter()
        .find(|locator| locator.section == section && locator.key == key)
}

pub fn section_root(section: Section) -> &'static str {
    SECTION_ROOTS
        .iter()
        .find(|(s, _)| *s == section)
        .map(|(_, selector)| *selector)
        .unwrap_or("html")
}

pub fn list_spec(section: Section) -> Option<&'static ListSpec> {
    LISTS.iter().find(|list| list.section == section)
}

pub fn image_locator(section: Section) -> Option<&'static FieldLocator> {
    resolve(section, IMAGE_KEY)
}

#[cfg(test)]
pub fn all_locators() -> &'static [FieldLocator] {
    LOCATORS
}
