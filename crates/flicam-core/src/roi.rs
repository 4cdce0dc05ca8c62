//! ROI geometry translation.
//!
//! Requested rectangles are snapped to the active variant's pixel-block
//! granularity and clipped to the live sensor extent. Offsets round to the
//! offset granularity, far edges to the edge granularity, both half-up.

use flicam_hw::variant::{profile, Variant};
use serde::Serialize;

/// Rectangle in sensor pixel coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegionOfInterest {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl RegionOfInterest {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Exclusive right edge.
    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.width)
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.height)
    }
}

impl std::fmt::Display for RegionOfInterest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

/// Live full-sensor extent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SensorBounds {
    pub max_width: u32,
    pub max_height: u32,
}

impl SensorBounds {
    pub fn full_frame(&self) -> RegionOfInterest {
        RegionOfInterest::new(0, 0, self.max_width, self.max_height)
    }
}

/// Round `value` to the nearest multiple of `multiple`, ties rounding up.
pub fn round_half_up(value: u32, multiple: u32) -> u32 {
    if multiple <= 1 {
        return value;
    }
    let (v, m) = (u64::from(value), u64::from(multiple));
    let rem = v % m;
    let rounded = if rem * 2 < m { v - rem } else { v - rem + m };
    u32::try_from(rounded).unwrap_or(u32::MAX - u32::MAX % multiple)
}

/// Align one axis. Returns `(start, end)` with `end` exclusive.
fn align_axis(start: u32, len: u32, offset_g: u32, edge_g: u32, max: u32) -> (u32, u32) {
    let offset_g = offset_g.max(1);
    let edge_g = edge_g.max(1);
    let edge_limit = max - max % edge_g;

    let mut lo = round_half_up(start, offset_g);
    if len == 0 {
        let lo = lo.min(edge_limit);
        return (lo, lo);
    }
    let mut hi = round_half_up(start.saturating_add(len), edge_g).min(edge_limit);

    // Non-empty request rounded to nothing: widen by one block.
    if hi <= lo {
        hi = (lo / edge_g).saturating_add(1).saturating_mul(edge_g);
        if hi > edge_limit {
            hi = edge_limit;
            lo = hi.saturating_sub(1) / offset_g * offset_g;
        }
    }
    (lo.min(hi), hi)
}

/// Translate a requested rectangle into one the hardware accepts.
///
/// The result starts on an offset-granularity boundary, ends on an
/// edge-granularity boundary, lies inside `sensor` and is non-empty whenever
/// the request is non-empty and the sensor holds at least one block.
pub fn to_hardware_region(
    requested: RegionOfInterest,
    variant: Variant,
    sensor: SensorBounds,
) -> RegionOfInterest {
    let align = profile(variant).roi;
    let (x0, x1) = align_axis(
        requested.x,
        requested.width,
        align.offset_alignment[0],
        align.edge_alignment[0],
        sensor.max_width,
    );
    let (y0, y1) = align_axis(
        requested.y,
        requested.height,
        align.offset_alignment[1],
        align.edge_alignment[1],
        sensor.max_height,
    );
    RegionOfInterest::new(x0, y0, x1 - x0, y1 - y0)
}
