//! Read-only sensor geometry capability.
//!
//! The digitization core only needs, per layer, how its strips are oriented
//! in the local frame, where the strip array is centered and where the
//! readout plane sits. Everything else about the host geometry stays
//! outside.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::hit::Position;

/// Placement of one strip layer in the local frame of its sensor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayerPlacement {
    /// Angle (radians) between the local x axis and the measured coordinate.
    #[serde(default)]
    pub angle: f64,
    /// Shift (mm) of the strip array center along the measured coordinate.
    #[serde(default)]
    pub offset: f64,
    /// Local z of the readout plane (mm).
    #[serde(default)]
    pub readout_z: f64,
}

impl LayerPlacement {
    /// Creates a new layer placement.
    #[must_use]
    pub fn new(angle: f64, offset: f64, readout_z: f64) -> Self {
        Self {
            angle,
            offset,
            readout_z,
        }
    }

    /// Projects a local position onto the strip frame.
    ///
    /// Returns `(u, v)`: `u` is measured across the strips, `v` runs along
    /// them.
    #[inline]
    #[must_use]
    pub fn to_strip_frame(&self, pos: Position) -> (f64, f64) {
        let (sin, cos) = self.angle.sin_cos();
        (pos.x * cos + pos.y * sin, -pos.x * sin + pos.y * cos)
    }

    /// Distance drifted by charge created at `pos` before reaching the
    /// readout plane.
    #[inline]
    #[must_use]
    pub fn drift_distance(&self, pos: Position) -> f64 {
        (pos.z - self.readout_z).abs()
    }
}

/// Narrow read-only view on the host geometry.
pub trait SensorGeometry: Send + Sync + fmt::Debug {
    /// Returns the placement of `layer`, if the sensor has such a layer.
    fn layer(&self, layer: i32) -> Option<LayerPlacement>;

    /// Returns the placement of `layer` or an [`Error::UnknownLayer`].
    fn require_layer(&self, layer: i32) -> Result<LayerPlacement> {
        self.layer(layer).ok_or(Error::UnknownLayer(layer))
    }
}

/// Table of strip layers keyed by layer number.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StripPlaneGeometry {
    layers: BTreeMap<i32, LayerPlacement>,
}

#[derive(Deserialize)]
struct JsonGeometry {
    layers: Vec<JsonLayer>,
}

#[derive(Deserialize)]
struct JsonLayer {
    layer: i32,
    #[serde(flatten)]
    placement: LayerPlacement,
    /// Convenience alternative to `angle`.
    angle_deg: Option<f64>,
}

impl StripPlaneGeometry {
    /// Creates an empty geometry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a geometry with a single centered layer.
    #[must_use]
    pub fn single_layer(layer: i32, angle: f64, readout_z: f64) -> Self {
        Self::new().with_layer(layer, LayerPlacement::new(angle, 0.0, readout_z))
    }

    /// Adds or replaces a layer.
    #[must_use]
    pub fn with_layer(mut self, layer: i32, placement: LayerPlacement) -> Self {
        self.layers.insert(layer, placement);
        self
    }

    /// Number of layers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Returns true if no layer is defined.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Load a geometry from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::Geometry(e.to_string()))?;
        let json: JsonGeometry = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| Error::Geometry(e.to_string()))?;
        Self::from_json_geometry(json)
    }

    /// Load a geometry from a JSON string.
    ///
    /// ```json
    /// { "layers": [ { "layer": 1, "angle_deg": 0.0, "readout_z": -2.5 } ] }
    /// ```
    pub fn from_json(json: &str) -> Result<Self> {
        let json: JsonGeometry =
            serde_json::from_str(json).map_err(|e| Error::Geometry(e.to_string()))?;
        Self::from_json_geometry(json)
    }

    fn from_json_geometry(json: JsonGeometry) -> Result<Self> {
        let mut geometry = Self::new();
        for entry in json.layers {
            let mut placement = entry.placement;
            if let Some(deg) = entry.angle_deg {
                placement.angle = deg.to_radians();
            }
            if ![placement.angle, placement.offset, placement.readout_z]
                .iter()
                .all(|v| v.is_finite())
            {
                return Err(Error::Geometry(format!(
                    "layer {} has a non-finite placement",
                    entry.layer
                )));
            }
            if geometry.layers.insert(entry.layer, placement).is_some() {
                return Err(Error::Geometry(format!(
                    "layer {} defined twice",
                    entry.layer
                )));
            }
        }
        Ok(geometry)
    }
}

impl SensorGeometry for StripPlaneGeometry {
    fn layer(&self, layer: i32) -> Option<LayerPlacement> {
        self.layers.get(&layer).copied()
    }
}
