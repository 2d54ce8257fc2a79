use serde::{Deserialize, Serialize};

/// One card of the services grid.
///
/// Missing fields deserialize as empty strings so a half-filled row in the
/// admin form still renders a block in its position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceItem {
    pub title: String,
    /// Icon class list, e.g. `fas fa-dumbbell`.
    pub icon: String,
    pub description: String,
}

/// One slide of the testimonial slider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestimonialItem {
    pub text: String,
    pub name: String,
    /// Short line under the client name ("Member since 2021").
    pub info: String,
}
