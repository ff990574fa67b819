//! Axis-aligned regions on a page.
//!
//! Regions use the document's native units. Layouts are authored against the
//! same units, so containment checks must use the fuzz the layout was written
//! with (see [`DEFAULT_FUZZ`]).

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Containment tolerance applied on every side of a region.
pub const DEFAULT_FUZZ: f64 = 0.1;

const EPSILON: f64 = 1e-6;

/// A bounding box, always normalized so that `xmin <= xmax` and `ymin <= ymax`.
///
/// Serialized as `[xmin, xmax, ymin, ymax]`.
#[derive(Debug, Clone, Copy)]
pub struct Region {
    xmin: f64,
    xmax: f64,
    ymin: f64,
    ymax: f64,
}

impl Region {
    /// Build a region from two x bounds and two y bounds in any order.
    pub fn new(x0: f64, x1: f64, y0: f64, y1: f64) -> Self {
        Self {
            xmin: x0.min(x1),
            xmax: x0.max(x1),
            ymin: y0.min(y1),
            ymax: y0.max(y1),
        }
    }

    /// Build a region from a PDF-style `(x0, y0, x1, y1)` corner pair.
    pub fn from_corners(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self::new(x0, x1, y0, y1)
    }

    pub fn xmin(&self) -> f64 {
        self.xmin
    }

    pub fn xmax(&self) -> f64 {
        self.xmax
    }

    pub fn ymin(&self) -> f64 {
        self.ymin
    }

    pub fn ymax(&self) -> f64 {
        self.ymax
    }

    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    /// Whether `other` lies within this region expanded by `fuzz` on every side.
    ///
    /// Boundaries are inclusive.
    pub fn contains(&self, other: &Region, fuzz: f64) -> bool {
        other.ymax - fuzz <= self.ymax
            && other.ymin + fuzz >= self.ymin
            && other.xmax - fuzz <= self.xmax
            && other.xmin + fuzz >= self.xmin
    }

    /// Whether the two regions intersect on both axes. Touching edges do not count.
    pub fn overlaps(&self, other: &Region) -> bool {
        other.xmin < self.xmax
            && other.xmax > self.xmin
            && other.ymin < self.ymax
            && other.ymax > self.ymin
    }

    /// Smallest region containing both.
    pub fn merge(&self, other: &Region) -> Region {
        Region {
            xmin: self.xmin.min(other.xmin),
            xmax: self.xmax.max(other.xmax),
            ymin: self.ymin.min(other.ymin),
            ymax: self.ymax.max(other.ymax),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
    }

    pub fn to_array(&self) -> [f64; 4] {
        [self.xmin, self.xmax, self.ymin, self.ymax]
    }
}

impl PartialEq for Region {
    fn eq(&self, other: &Self) -> bool {
        self.to_array()
            .iter()
            .zip(other.to_array().iter())
            .all(|(a, b)| (a - b).abs() < EPSILON)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Region(xmin={}, xmax={}, ymin={}, ymax={})",
            self.xmin, self.xmax, self.ymin, self.ymax
        )
    }
}

impl From<[f64; 4]> for Region {
    fn from(bounds: [f64; 4]) -> Self {
        Region::new(bounds[0], bounds[1], bounds[2], bounds[3])
    }
}

impl Serialize for Region {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_array().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Region {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bounds = <[f64; 4]>::deserialize(deserializer)?;
        Ok(Region::from(bounds))
    }
}
