//! High-level helpers digitizing whole events and runs.

use rayon::prelude::*;
use serde::Serialize;
use stripsim_core::error::Result;
use stripsim_core::hit::Hit;

use crate::digitizer::{Digitizer, IntegratedDigi, StripDigi};

/// Both digitized views of one event.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DigitizedEvent {
    /// One record per hit.
    pub integrated: Vec<IntegratedDigi>,
    /// One record per (hit, channel) pair.
    pub strips: Vec<StripDigi>,
}

impl DigitizedEvent {
    /// Number of hits digitized.
    #[must_use]
    pub fn len(&self) -> usize {
        self.integrated.len()
    }

    /// Returns true if the event had no hits.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.integrated.is_empty()
    }
}

/// Integrated records of `hits`, computed in parallel, in input order.
pub fn integrate_hits<D>(digitizer: &D, hits: &[Hit]) -> Result<Vec<IntegratedDigi>>
where
    D: Digitizer + ?Sized,
{
    hits.par_iter().map(|hit| digitizer.integrate_dgt(hit)).collect()
}

/// Per-channel records of `hits`, computed in parallel, in input order.
pub fn multi_dgt_hits<D>(digitizer: &D, hits: &[Hit]) -> Result<Vec<StripDigi>>
where
    D: Digitizer + ?Sized,
{
    let per_hit: Vec<Vec<StripDigi>> = hits
        .par_iter()
        .map(|hit| digitizer.multi_dgt(hit))
        .collect::<Result<_>>()?;
    Ok(per_hit.into_iter().flatten().collect())
}

/// Digitizes one event sequentially.
pub fn digitize_event<D>(digitizer: &D, hits: &[Hit]) -> Result<DigitizedEvent>
where
    D: Digitizer + ?Sized,
{
    let mut event = DigitizedEvent {
        integrated: Vec::with_capacity(hits.len()),
        strips: Vec::new(),
    };
    for hit in hits {
        event.integrated.push(digitizer.integrate_dgt(hit)?);
        event.strips.extend(digitizer.multi_dgt(hit)?);
    }
    Ok(event)
}

/// Digitizes independent events in parallel, preserving event order.
pub fn digitize_events<D>(digitizer: &D, events: &[Vec<Hit>]) -> Result<Vec<DigitizedEvent>>
where
    D: Digitizer + ?Sized,
{
    events
        .par_iter()
        .map(|hits| digitize_event(digitizer, hits))
        .collect()
}
