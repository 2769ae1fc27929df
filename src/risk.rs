use std::{fmt, result, str::FromStr};

use anyhow::{bail, Error};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// Risk level reported by the language model for a chunk of findings.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Copy, Clone)]
pub enum RiskLevel {
    /// Low risk finding.
    Low,
    /// Medium risk finding.
    Medium,
    /// High risk finding.
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", format!("{:?}", self).to_lowercase())
    }
}

impl Serialize for RiskLevel {
    fn serialize<S>(&self, serializer: S) -> result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(format!("{}", self).as_str())
    }
}

impl<'de> Deserialize<'de> for RiskLevel {
    fn deserialize<D>(de: D) -> result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level = String::deserialize(de)?;

        Self::from_str(&level)
            .map_err(|_| de::Error::custom(format!("unexpected risk level: {:?}", level)))
    }
}

impl FromStr for RiskLevel {
    type Err = Error;

    fn from_str(s: &str) -> result::Result<Self, Error> {
        match s.to_lowercase().as_str() {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            _ => bail!("could not parse {} as a risk level", s),
        }
    }
}
