//! Recognition settings sent along with OCR requests.

use serde::{Deserialize, Serialize};

/// Broad kind of content on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentType {
    Document,
    Scene,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Document => "Document",
            Self::Scene => "Scene",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "document" => Some(Self::Document),
            "scene" => Some(Self::Scene),
            _ => None,
        }
    }

    /// Subcategories the backend accepts for this content type.
    pub fn subcategories(&self) -> &'static [&'static str] {
        match self {
            Self::Document => &[
                "Academic",
                "Business",
                "Content",
                "Table",
                "Handwritten",
                "Complex",
            ],
            Self::Scene => &["Street", "Photo", "Objects", "Verification"],
        }
    }

    /// Canonical spelling of a subcategory, if it belongs to this content type.
    pub fn subcategory(&self, name: &str) -> Option<&'static str> {
        self.subcategories()
            .iter()
            .copied()
            .find(|s| s.eq_ignore_ascii_case(name))
    }
}

/// Visual token budget given to the recognition model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Complexity {
    Tiny,
    Small,
    Medium,
    Large,
    Gundam,
}

impl Complexity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tiny => "Tiny",
            Self::Small => "Small",
            Self::Medium => "Medium",
            Self::Large => "Large",
            Self::Gundam => "Gundam",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "tiny" => Some(Self::Tiny),
            "small" => Some(Self::Small),
            "medium" => Some(Self::Medium),
            "large" => Some(Self::Large),
            "gundam" => Some(Self::Gundam),
            _ => None,
        }
    }

    /// Approximate number of vision tokens per page.
    pub fn tokens(&self) -> u32 {
        match self {
            Self::Tiny => 64,
            Self::Small => 100,
            Self::Medium => 256,
            Self::Large => 400,
            Self::Gundam => 800,
        }
    }
}

/// Content type, subcategory and complexity for a recognition call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionConfig {
    pub content_type: ContentType,
    pub subcategory: String,
    pub complexity: Complexity,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            content_type: ContentType::Document,
            subcategory: "Academic".to_string(),
            complexity: Complexity::Medium,
        }
    }
}

impl RecognitionConfig {
    /// Build a config from user-facing names, normalizing their spelling.
    ///
    /// Returns a description of the first invalid field on failure.
    pub fn parse(content_type: &str, subcategory: &str, complexity: &str) -> Result<Self, String> {
        let content = ContentType::from_str(content_type)
            .ok_or_else(|| format!("unknown content type '{}'", content_type))?;
        let sub = content.subcategory(subcategory).ok_or_else(|| {
            format!(
                "'{}' is not a {} subcategory (expected one of: {})",
                subcategory,
                content.as_str(),
                content.subcategories().join(", ")
            )
        })?;
        let complexity = Complexity::from_str(complexity)
            .ok_or_else(|| format!("unknown complexity '{}'", complexity))?;

        Ok(Self {
            content_type: content,
            subcategory: sub.to_string(),
            complexity,
        })
    }

    /// Whether the subcategory belongs to the content type.
    pub fn is_valid(&self) -> bool {
        self.content_type.subcategory(&self.subcategory).is_some()
    }

    /// Form fields as the backend expects them.
    pub fn form_fields(&self) -> [(&'static str, String); 3] {
        [
            ("content_type", self.content_type.as_str().to_string()),
            ("subcategory", self.subcategory.clone()),
            ("complexity", self.complexity.as_str().to_string()),
        ]
    }
}

impl std::fmt::Display for RecognitionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{} (~{} tokens)",
            self.content_type.as_str(),
            self.subcategory,
            self.complexity.as_str(),
            self.complexity.tokens()
        )
    }
}
