//! crates/coffee_analysis_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any transport or storage format.

use serde::{Deserialize, Serialize};

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    /// Parses the wire-format role name ("user" / "assistant" / "system").
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            "system" => Some(Role::System),
            _ => None,
        }
    }
}

/// A compressed image embedded in a message as an inline data URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    /// Always an `image/...` type; the compressor emits `image/jpeg`.
    pub content_type: String,
    /// `data:<media type>;base64,<payload>` inline data reference.
    pub url: String,
}

impl Attachment {
    /// Checks that the inline data URL prefix agrees with the declared
    /// content type. Consumers must call this before decoding or
    /// forwarding the payload.
    pub fn url_matches_content_type(&self) -> bool {
        self.url.starts_with(&format!("data:{};", self.content_type))
    }
}

/// One turn in the conversation. Immutable once sent; retained only in
/// in-memory session state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// The roast scale position (1-5) read off the package, plus its label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoastLevel {
    pub value: u8,
}

impl RoastLevel {
    pub fn new(value: u8) -> Self {
        debug_assert!((1..=5).contains(&value));
        Self { value }
    }

    pub fn label(&self) -> &'static str {
        match self.value {
            1 => "Light",
            2 => "Medium-Light",
            3 => "Medium",
            4 => "Medium-Dark",
            5 => "Dark",
            _ => "Medium",
        }
    }
}

impl std::fmt::Display for RoastLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}/5)", self.label(), self.value)
    }
}

/// Where the coffee was grown, as far as the text revealed it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Origin {
    pub country: Option<String>,
    pub region: Option<String>,
}

impl Origin {
    pub fn is_empty(&self) -> bool {
        self.country.is_none() && self.region.is_none()
    }
}

/// Tasting descriptors collected from the analysis text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FlavorProfile {
    pub notes: Vec<String>,
    pub acidity: Option<String>,
    pub body: Option<String>,
}

/// The structured output of the extraction engine, consumed by the
/// presentation layer. Every field has a documented default; extraction
/// never fails.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoffeeAnalysis {
    /// Always populated; defaults to Medium (3/5) when no signal is found.
    pub roast_level: RoastLevel,
    pub origin: Option<Origin>,
    pub flavor_profile: Option<FlavorProfile>,
    pub processing_method: Option<String>,
    pub brewing_methods: Vec<String>,
    /// Always populated; starts at 4.5 and is capped at 5.0.
    pub overall_rating: f32,
    /// Set when the model judged the package unbranded and the user
    /// must re-upload a genuine product photo.
    pub needs_reupload: bool,
}
