use serde::{Deserialize, Serialize};

/// RGBA display colour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const CLEAR: Color = Color::rgba(0, 0, 0, 0);
    pub const BLACK: Color = Color::rgba(0, 0, 0, 255);
    pub const RED: Color = Color::rgba(255, 0, 0, 255);
    pub const BLUE: Color = Color::rgba(0, 0, 255, 255);

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

/// Object classes the overlay knows how to draw.
///
/// Every identifier the model can emit that should be shown needs a variant
/// here. Anything else is dropped before rendering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label {
    #[serde(rename = "stop_sign")]
    StopSign,
    #[serde(rename = "oneway_sign")]
    OneWaySign,
}

impl Label {
    pub const ALL: [Label; 2] = [Label::StopSign, Label::OneWaySign];

    /// Look up a model identifier. Unknown identifiers yield `None`.
    pub fn from_identifier(identifier: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|label| label.identifier() == identifier)
    }

    /// Identifier as emitted by the model.
    pub fn identifier(&self) -> &'static str {
        match self {
            Label::StopSign => "stop_sign",
            Label::OneWaySign => "oneway_sign",
        }
    }

    pub fn color(&self) -> Color {
        match self {
            Label::StopSign => Color::RED,
            Label::OneWaySign => Color::BLUE,
        }
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.identifier())
    }
}
