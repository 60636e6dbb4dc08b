use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Caption length preference. Affects wording only, never tiering.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptionStyle {
    #[default]
    Concise,
    Detailed,
}

impl CaptionStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            CaptionStyle::Concise => "concise",
            CaptionStyle::Detailed => "detailed",
        }
    }

    /// Upper bound on generated caption length.
    pub fn max_words(self) -> usize {
        match self {
            CaptionStyle::Concise => 12,
            CaptionStyle::Detailed => 20,
        }
    }

    /// Completion budget for the generation service.
    pub fn max_tokens(self) -> u32 {
        match self {
            CaptionStyle::Concise => 30,
            CaptionStyle::Detailed => 50,
        }
    }
}

impl fmt::Display for CaptionStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaptionStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "concise" => Ok(CaptionStyle::Concise),
            "detailed" => Ok(CaptionStyle::Detailed),
            other => Err(format!("unknown caption style '{other}'")),
        }
    }
}
