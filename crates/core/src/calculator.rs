//! Calculator trait: external procedures that derive parameters for
//! specific trigger tasks.
//!
//! Calculators are opaque: the engine only knows which task triggers which
//! calculator and that a successful call yields a small parameter map.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CalculatorError;
use crate::params::ParamMap;

/// The known derivation calculators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculatorKind {
    /// Hubbard-U parameters: `LDAUL`, `LDAUU`, `LDAUJ`.
    DftU,
    /// Initial magnetic moments: `MAGMOM`.
    Magmom,
    /// Reaction-path image count: `IMAGES`.
    NebImages,
}

impl CalculatorKind {
    pub const ALL: [CalculatorKind; 3] = [Self::DftU, Self::Magmom, Self::NebImages];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DftU => "dftu",
            Self::Magmom => "magmom",
            Self::NebImages => "neb_images",
        }
    }

    /// Parameter keys a successful result is expected to carry.
    pub fn output_keys(&self) -> &'static [&'static str] {
        match self {
            Self::DftU => &["LDAUL", "LDAUU", "LDAUJ"],
            Self::Magmom => &["MAGMOM"],
            Self::NebImages => &["IMAGES"],
        }
    }
}

impl fmt::Display for CalculatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CalculatorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dftu" | "dft+u" => Ok(Self::DftU),
            "magmom" => Ok(Self::Magmom),
            "neb_images" | "images" => Ok(Self::NebImages),
            other => Err(format!("unknown calculator '{other}'")),
        }
    }
}

/// A derivation calculator.
#[async_trait]
pub trait Calculator: Send + Sync {
    /// Which calculator this is.
    fn kind(&self) -> CalculatorKind;

    /// Run the calculation. Failure means "no derived value available".
    async fn calculate(&self) -> Result<ParamMap, CalculatorError>;
}
