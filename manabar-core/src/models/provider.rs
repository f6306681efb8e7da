//! Provider-related types.
//!
//! This module contains types related to API providers:
//! - [`ProviderKind`] - Enum of supported providers
//! - [`Provider`] - Provider descriptor
//! - [`UsageShape`] - Canonical usage shape declared by a provider family
//! - [`AuthMethod`] - How credentials are obtained

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

// ============================================================================
// Usage Shape
// ============================================================================

/// The canonical usage shape a provider family reports.
///
/// Fixed per provider family; resolved once by the normalizer and never
/// re-inferred downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageShape {
    /// Percentage-of-quota windows (e.g. 5-hour period and weekly).
    UtilizationWindow,
    /// Token and cost counters accumulated over a number of days.
    TokenCostCounter,
}

impl fmt::Display for UsageShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UtilizationWindow => write!(f, "utilization window"),
            Self::TokenCostCounter => write!(f, "token/cost counter"),
        }
    }
}

/// How a provider's credentials are obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    /// OAuth tokens managed by the provider's own CLI.
    OAuth,
    /// API key kept in the system keychain.
    ApiKey,
}

// ============================================================================
// Provider Kind
// ============================================================================

/// Supported API provider kinds.
///
/// Serialized as the stable provider id (`"anthropic"`, `"openai"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Anthropic Claude
    Anthropic,
    /// `OpenAI` (Codex)
    OpenAI,
    /// Google Gemini
    Google,
    /// Microsoft Azure `OpenAI` Service
    Azure,
    /// Cohere
    Cohere,
    /// Mistral AI
    Mistral,
    /// Perplexity
    Perplexity,
}

impl ProviderKind {
    /// Returns all available provider kinds.
    pub fn all() -> &'static [ProviderKind] {
        &[
            Self::Anthropic,
            Self::OpenAI,
            Self::Google,
            Self::Azure,
            Self::Cohere,
            Self::Mistral,
            Self::Perplexity,
        ]
    }

    /// Returns the stable provider id used in settings and on the CLI.
    pub fn id(&self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::OpenAI => "openai",
            Self::Google => "google",
            Self::Azure => "azure",
            Self::Cohere => "cohere",
            Self::Mistral => "mistral",
            Self::Perplexity => "perplexity",
        }
    }

    /// Returns the display name for this provider.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Anthropic => "Claude",
            Self::OpenAI => "Codex",
            Self::Google => "Gemini",
            Self::Azure => "Azure OpenAI",
            Self::Cohere => "Cohere",
            Self::Mistral => "Mistral AI",
            Self::Perplexity => "Perplexity",
        }
    }

    /// Returns the usage shape this provider family reports.
    pub fn usage_shape(&self) -> UsageShape {
        match self {
            Self::Anthropic => UsageShape::UtilizationWindow,
            _ => UsageShape::TokenCostCounter,
        }
    }

    /// Returns how credentials for this provider are obtained.
    pub fn auth_method(&self) -> AuthMethod {
        match self {
            Self::Anthropic => AuthMethod::OAuth,
            _ => AuthMethod::ApiKey,
        }
    }

    /// Returns the full descriptor for this provider.
    pub fn descriptor(self) -> Provider {
        Provider::from(self)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ProviderKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "openai" | "codex" => Ok(Self::OpenAI),
            "google" | "gemini" => Ok(Self::Google),
            "azure" => Ok(Self::Azure),
            "cohere" => Ok(Self::Cohere),
            "mistral" => Ok(Self::Mistral),
            "perplexity" => Ok(Self::Perplexity),
            other => Err(CoreError::Validation(format!("unknown provider id: {other:?}"))),
        }
    }
}

// ============================================================================
// Provider Descriptor
// ============================================================================

/// Descriptor of a provider: id, display name and declared usage shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
    /// Stable provider id.
    pub id: ProviderKind,
    /// Human-readable name.
    pub display_name: String,
    /// Usage shape reported by this provider family.
    pub usage_shape: UsageShape,
}

impl From<ProviderKind> for Provider {
    fn from(kind: ProviderKind) -> Self {
        Self {
            id: kind,
            display_name: kind.display_name().to_string(),
            usage_shape: kind.usage_shape(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ids_and_aliases() {
        assert_eq!("anthropic".parse::<ProviderKind>().unwrap(), ProviderKind::Anthropic);
        assert_eq!("Claude".parse::<ProviderKind>().unwrap(), ProviderKind::Anthropic);
        assert_eq!("codex".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAI);
        assert_eq!(" gemini ".parse::<ProviderKind>().unwrap(), ProviderKind::Google);
    }

    #[test]
    fn test_parse_unknown_is_validation_error() {
        let err = "bard".parse::<ProviderKind>().unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_id_roundtrips_through_serde() {
        for kind in ProviderKind::all() {
            let json = serde_json::to_string(kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.id()));
            let back: ProviderKind = serde_json::from_str(&json).unwrap();
            assert_eq!(back, *kind);
        }
    }

    #[test]
    fn test_usage_shapes() {
        assert_eq!(ProviderKind::Anthropic.usage_shape(), UsageShape::UtilizationWindow);
        assert_eq!(ProviderKind::OpenAI.usage_shape(), UsageShape::TokenCostCounter);
        assert_eq!(ProviderKind::Anthropic.auth_method(), AuthMethod::OAuth);
        assert_eq!(ProviderKind::Mistral.auth_method(), AuthMethod::ApiKey);
    }
}
