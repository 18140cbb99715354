//! Readout channel types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Share of one step's charge collected by one strip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelContribution {
    /// Strip index, always in `[0, nstrips)`.
    pub strip: u32,
    /// Fraction of the deposited charge collected by the strip.
    pub fraction: f64,
    /// Collected charge (electrons).
    pub electrons: f64,
    /// Arrival time of the charge (ns).
    pub time: f64,
}

/// Which part of a strip collected the charge.
///
/// Strips crossing the central hole of a disk are cut in two and read out
/// separately; all other strips are read out whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StripHalf {
    Full,
    /// Part at negative along-strip coordinate.
    Low,
    /// Part at positive along-strip coordinate.
    High,
}

/// Composite identifier of a readout channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChannelId {
    pub sector: i32,
    pub layer: i32,
    pub strip: u32,
    pub half: StripHalf,
}

impl ChannelId {
    /// Creates an identifier for a whole strip.
    #[must_use]
    pub fn new(sector: i32, layer: i32, strip: u32) -> Self {
        Self {
            sector,
            layer,
            strip,
            half: StripHalf::Full,
        }
    }

    /// Returns the same strip restricted to `half`.
    #[must_use]
    pub fn with_half(mut self, half: StripHalf) -> Self {
        self.half = half;
        self
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.sector, self.layer, self.strip)?;
        match self.half {
            StripHalf::Full => Ok(()),
            StripHalf::Low => f.write_str("L"),
            StripHalf::High => f.write_str("H"),
        }
    }
}
