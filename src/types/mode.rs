use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::MindfulError;

/// Operating mode of the companion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Gentle summaries, breathing, journal and blink reminders.
    #[default]
    Calm,
    /// Usefulness scoring against the browsing intent, with drift nudges.
    Focus,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Calm => "calm",
            Mode::Focus => "focus",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = MindfulError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "calm" => Ok(Mode::Calm),
            "focus" => Ok(Mode::Focus),
            other => Err(MindfulError::InvalidInput(format!("unknown mode '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_round_trips_through_str() {
        assert_eq!("Focus".parse::<Mode>().unwrap(), Mode::Focus);
        assert_eq!(Mode::Calm.to_string(), "calm");
        assert!("zen".parse::<Mode>().is_err());
    }

    #[test]
    fn mode_serializes_lowercase() {
        assert_eq!(serde_json::to_value(Mode::Focus).unwrap(), "focus");
    }
}
