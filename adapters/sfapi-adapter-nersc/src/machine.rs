//! NERSC compute resources addressable through the Superfacility API.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::NerscError;

/// A machine that accepts batch jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Machine {
    /// Perlmutter (HPE Cray EX).
    Perlmutter,
    /// Data transfer nodes.
    Dtns,
    /// Cori (retired, kept for archived accounting queries).
    Cori,
}

impl Machine {
    /// Every known machine.
    pub const ALL: [Machine; 3] = [Machine::Perlmutter, Machine::Dtns, Machine::Cori];

    /// Path segment used by the API.
    pub fn as_str(&self) -> &'static str {
        match self {
            Machine::Perlmutter => "perlmutter",
            Machine::Dtns => "dtns",
            Machine::Cori => "cori",
        }
    }
}

impl fmt::Display for Machine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Machine {
    type Err = NerscError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Machine::ALL
            .into_iter()
            .find(|m| m.as_str() == lower)
            .ok_or_else(|| NerscError::UnknownMachine(s.to_string()))
    }
}
