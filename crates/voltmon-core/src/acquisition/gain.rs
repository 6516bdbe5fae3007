//! Analog front-end gain settings
//!
//! Four discrete attenuation levels, declared from least to most sensitive.
//! The derived `Ord` follows declaration order, so `a < b` reads as
//! "`a` is less sensitive than `b`".

use serde::{Deserialize, Serialize};
use std::fmt;

/// Discrete attenuation level of the analog front end
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum GainSetting {
    /// 12 dB attenuation, widest input range
    #[serde(rename = "12dB")]
    Atten12Db,
    /// 6 dB attenuation
    #[serde(rename = "6dB")]
    Atten6Db,
    /// 2.5 dB attenuation
    #[serde(rename = "2.5dB")]
    Atten2p5Db,
    /// No attenuation, narrowest input range
    #[serde(rename = "0dB")]
    Atten0Db,
}

impl GainSetting {
    /// Number of gain levels
    pub const COUNT: usize = 4;

    /// All levels, least sensitive first
    pub const ALL: [GainSetting; Self::COUNT] = [
        GainSetting::Atten12Db,
        GainSetting::Atten6Db,
        GainSetting::Atten2p5Db,
        GainSetting::Atten0Db,
    ];

    /// Widest range; auto-ranging starts here
    pub const LEAST_SENSITIVE: GainSetting = GainSetting::Atten12Db;

    /// Narrowest range
    pub const MOST_SENSITIVE: GainSetting = GainSetting::Atten0Db;

    /// Position in the sensitivity ordering (0 = least sensitive)
    pub fn index(self) -> usize {
        self as usize
    }

    /// One level more sensitive; a no-op at [`Self::MOST_SENSITIVE`]
    pub fn more_sensitive(self) -> Self {
        Self::ALL
            .get(self.index() + 1)
            .copied()
            .unwrap_or(self)
    }

    /// One level less sensitive; a no-op at [`Self::LEAST_SENSITIVE`]
    pub fn less_sensitive(self) -> Self {
        match self.index() {
            0 => self,
            i => Self::ALL[i - 1],
        }
    }

    pub fn is_most_sensitive(self) -> bool {
        self == Self::MOST_SENSITIVE
    }

    /// Nominal attenuation in dB
    pub fn attenuation_db(self) -> f32 {
        match self {
            GainSetting::Atten12Db => 12.0,
            GainSetting::Atten6Db => 6.0,
            GainSetting::Atten2p5Db => 2.5,
            GainSetting::Atten0Db => 0.0,
        }
    }
}

impl Default for GainSetting {
    fn default() -> Self {
        Self::LEAST_SENSITIVE
    }
}

impl fmt::Display for GainSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}dB", self.attenuation_db())
    }
}
