//! Simulated hits, steps and identifiers.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::geometry::SensorGeometry;

/// Position in the local frame of a sensor (mm).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    /// Creates a new position.
    #[inline]
    #[must_use]
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// One transport step inside the sensitive volume.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Local position of the step.
    pub local: Position,
    /// Deposited energy (MeV).
    pub edep: f64,
    /// Global time of the step (ns).
    pub time: f64,
}

impl Step {
    /// Creates a new step.
    #[inline]
    #[must_use]
    pub fn new(local: Position, edep: f64, time: f64) -> Self {
        Self { local, edep, time }
    }
}

/// A named geometric identifier (sector, layer, strip...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identifier {
    pub name: String,
    pub value: i32,
}

impl Identifier {
    /// Creates a new identifier.
    pub fn new(name: impl Into<String>, value: i32) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Ordered identifier set of a hit, with the fraction of the deposit it
/// carries when the hit is shared between channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub fields: Vec<Identifier>,
    /// Share of the deposit attributed to this identity (1 when unshared).
    pub sharing: f64,
}

impl Default for Identity {
    fn default() -> Self {
        Self {
            fields: Vec::new(),
            sharing: 1.0,
        }
    }
}

impl Identity {
    /// Creates an unshared identity from `(name, value)` pairs.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, i32)>) -> Self {
        Self {
            fields: pairs
                .into_iter()
                .map(|(name, value)| Identifier::new(name, value))
                .collect(),
            sharing: 1.0,
        }
    }

    /// Returns the value of the identifier called `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<i32> {
        self.fields.iter().find(|id| id.name == name).map(|id| id.value)
    }

    /// Sets the identifier called `name`, appending it when absent.
    pub fn set(&mut self, name: &str, value: i32) {
        match self.fields.iter_mut().find(|id| id.name == name) {
            Some(id) => id.value = value,
            None => self.fields.push(Identifier::new(name, value)),
        }
    }

    /// Builder form of [`Identity::set`].
    #[must_use]
    pub fn with(mut self, name: &str, value: i32) -> Self {
        self.set(name, value);
        self
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, id) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}={}", id.name, id.value)?;
        }
        Ok(())
    }
}

/// Aggregated true information of a hit.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TrueInfo {
    /// Number of steps.
    pub nsteps: usize,
    /// Total deposited energy (MeV).
    pub e_tot: f64,
    /// Energy-weighted local position (plain average when `e_tot` is zero).
    pub local: Position,
    /// Energy-weighted time (plain average when `e_tot` is zero).
    pub time: f64,
}

/// One simulated hit: the steps a particle left in a single sensitive
/// element, its identity and the geometry it lives in.
#[derive(Debug, Clone)]
pub struct Hit {
    pub identity: Identity,
    pub steps: Vec<Step>,
    pub geometry: Arc<dyn SensorGeometry>,
}

impl Hit {
    /// Creates a new hit.
    pub fn new(identity: Identity, steps: Vec<Step>, geometry: Arc<dyn SensorGeometry>) -> Self {
        Self {
            identity,
            steps,
            geometry,
        }
    }

    /// Total deposited energy (MeV).
    #[must_use]
    pub fn edep(&self) -> f64 {
        self.steps.iter().map(|s| s.edep).sum()
    }

    /// Returns true when the hit has no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Aggregates the steps into the hit's true information.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn true_info(&self) -> TrueInfo {
        let nsteps = self.steps.len();
        if nsteps == 0 {
            return TrueInfo::default();
        }

        let e_tot = self.edep();
        let uniform = e_tot <= 0.0;
        let total = if uniform { nsteps as f64 } else { e_tot };

        let mut local = Position::default();
        let mut time = 0.0;
        for step in &self.steps {
            let w = if uniform { 1.0 } else { step.edep };
            local.x += step.local.x * w;
            local.y += step.local.y * w;
            local.z += step.local.z * w;
            time += step.time * w;
        }

        TrueInfo {
            nsteps,
            e_tot,
            local: Position::new(local.x / total, local.y / total, local.z / total),
            time: time / total,
        }
    }
}
