//! Strip index to readout channel mapping.

use stripsim_core::channel::{ChannelId, StripHalf};

/// Maps geometric strip indices to composite channel identifiers.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StripMapping {
    /// Inner radius of the central hole; strips crossing it are read out as
    /// two halves. `None` reads every strip out whole.
    pub hole_radius: Option<f64>,
}

impl StripMapping {
    /// Mapping that reads every strip out whole.
    #[must_use]
    pub fn full_strips() -> Self {
        Self { hole_radius: None }
    }

    /// Mapping that splits strips crossing a central hole of radius `rmin`.
    #[must_use]
    pub fn split_at_hole(rmin: f64) -> Self {
        Self {
            hole_radius: Some(rmin),
        }
    }

    /// Which half of a strip spanning `edges` collects charge at along-strip
    /// coordinate `v`. The `v = 0` cut belongs to the high half.
    #[must_use]
    pub fn half(&self, edges: (f64, f64), v: f64) -> StripHalf {
        match self.hole_radius {
            Some(rmin) if edges.0 < rmin && edges.1 > -rmin => {
                if v < 0.0 {
                    StripHalf::Low
                } else {
                    StripHalf::High
                }
            }
            _ => StripHalf::Full,
        }
    }

    /// Composite channel identifier of `strip`.
    #[must_use]
    pub fn channel(
        &self,
        sector: i32,
        layer: i32,
        strip: u32,
        edges: (f64, f64),
        v: f64,
    ) -> ChannelId {
        ChannelId::new(sector, layer, strip).with_half(self.half(edges, v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_strips_never_split() {
        let mapping = StripMapping::full_strips();
        assert_eq!(mapping.half((-0.25, 0.25), -3.0), StripHalf::Full);
        assert_eq!(mapping.half((-0.25, 0.25), 3.0), StripHalf::Full);
    }

    #[test]
    fn test_split_inside_hole_band() {
        let mapping = StripMapping::split_at_hole(5.0);
        assert_eq!(mapping.half((-0.25, 0.25), -3.0), StripHalf::Low);
        assert_eq!(mapping.half((-0.25, 0.25), 3.0), StripHalf::High);
        assert_eq!(mapping.half((-0.25, 0.25), 0.0), StripHalf::High);
        // Strip partially overlapping the band is still cut.
        assert_eq!(mapping.half((4.75, 5.25), -1.0), StripHalf::Low);
        // Strips clear of the hole are whole.
        assert_eq!(mapping.half((5.0, 5.5), -1.0), StripHalf::Full);
        assert_eq!(mapping.half((-5.5, -5.0), 1.0), StripHalf::Full);
    }

    #[test]
    fn test_channel_composition() {
        let mapping = StripMapping::split_at_hole(5.0);
        let id = mapping.channel(0, 2, 50, (0.0, 0.5), -1.0);
        assert_eq!(id, ChannelId::new(0, 2, 50).with_half(StripHalf::Low));
    }
}
