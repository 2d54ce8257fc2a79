use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A named region of the published page.
///
/// The set is fixed by the page template. Every variant has an entry in the
/// backend's locator table, and the admin UI uses the lowercase name as the
/// `section` value of its requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    General,
    Hero,
    About,
    Services,
    Testimonials,
    Contact,
    Footer,
}

impl Section {
    pub const ALL: [Section; 7] = [
        Section::General,
        Section::Hero,
        Section::About,
        Section::Services,
        Section::Testimonials,
        Section::Contact,
        Section::Footer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Section::General => "general",
            Section::Hero => "hero",
            Section::About => "about",
            Section::Services => "services",
            Section::Testimonials => "testimonials",
            Section::Contact => "contact",
            Section::Footer => "footer",
        }
    }

    /// Sections whose content is an ordered, regenerated list of blocks.
    pub fn is_list(&self) -> bool {
        matches!(self, Section::Services | Section::Testimonials)
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSection(pub String);

impl fmt::Display for UnknownSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown section '{}'", self.0)
    }
}

impl std::error::Error for UnknownSection {}

impl FromStr for Section {
    type Err = UnknownSection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Section::ALL
            .into_iter()
            .find(|section| section.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownSection(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_case_insensitively() {
        assert_eq!("hero".parse::<Section>(), Ok(Section::Hero));
        assert_eq!(" Testimonials ".parse::<Section>(), Ok(Section::Testimonials));
        assert!("favicon".parse::<Section>().is_err());
    }

    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&Section::Footer).unwrap();
        assert_eq!(json, "\"footer\"");
        for section in Section::ALL {
            assert_eq!(section.to_string(), section.as_str());
        }
    }
}
