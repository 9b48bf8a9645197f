use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Model backend identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Gemini,
    Groq,
}

impl Provider {
    pub const ALL: [Provider; 2] = [Provider::Gemini, Provider::Groq];

    pub fn id(&self) -> &'static str {
        match self {
            Provider::Gemini => "gemini",
            Provider::Groq => "groq",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::Gemini => "Gemini",
            Provider::Groq => "Groq",
        }
    }

    /// Primary environment variable holding this provider's key.
    pub fn env_var(&self) -> &'static str {
        match self {
            Provider::Gemini => "GEMINI_API_KEY",
            Provider::Groq => "GROQ_API_KEY",
        }
    }

    /// All environment variables consulted, in order.
    pub fn env_vars(&self) -> &'static [&'static str] {
        match self {
            Provider::Gemini => &["GEMINI_API_KEY", "API_KEY"],
            Provider::Groq => &["GROQ_API_KEY"],
        }
    }

    /// The other backend.
    pub fn other(&self) -> Provider {
        match self {
            Provider::Gemini => Provider::Groq,
            Provider::Groq => Provider::Gemini,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" => Ok(Provider::Gemini),
            "groq" => Ok(Provider::Groq),
            other => Err(format!("Unknown provider: {}", other)),
        }
    }
}

/// Provider selection for one call: pinned to a backend, or automatic with failover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderChoice {
    Gemini,
    Groq,
    #[default]
    Auto,
}

impl ProviderChoice {
    /// The pinned provider, or `None` for `Auto`.
    pub fn pinned(&self) -> Option<Provider> {
        match self {
            ProviderChoice::Gemini => Some(Provider::Gemini),
            ProviderChoice::Groq => Some(Provider::Groq),
            ProviderChoice::Auto => None,
        }
    }

    pub fn is_auto(&self) -> bool {
        matches!(self, ProviderChoice::Auto)
    }
}

impl From<Provider> for ProviderChoice {
    fn from(p: Provider) -> Self {
        match p {
            Provider::Gemini => ProviderChoice::Gemini,
            Provider::Groq => ProviderChoice::Groq,
        }
    }
}

impl fmt::Display for ProviderChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.pinned() {
            Some(p) => f.write_str(p.id()),
            None => f.write_str("auto"),
        }
    }
}

impl FromStr for ProviderChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("auto") {
            return Ok(ProviderChoice::Auto);
        }
        s.parse::<Provider>().map(ProviderChoice::from)
    }
}
