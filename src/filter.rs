//! Filter definitions and the device-space region a filter application
//! covers.

use serde::{Deserialize, Serialize};

use crate::bbox::DeviceBounds;
use crate::geom::Length;

/// A filter element: an ordered list of primitives. The renderer applies
/// them in sequence, each consuming its declared input.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub primitives: Vec<FilterPrimitive>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum FilterPrimitive {
    GaussianBlur {
        /// Per-axis standard deviation. A single-valued `stdDeviation`
        /// attribute repeats on both axes.
        std_deviation: (Length, Length),
        input: FilterInput,
    },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterInput {
    /// The rendering of the filtered subtree itself.
    #[default]
    SourceGraphic,
    /// The canvas content accumulated behind the filtered subtree.
    BackgroundImage,
}

/// Integer pixel rectangle on the canvas that a filter reads and writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FilterRegion {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Size the filter region: the subtree's device bounds grown by the blur
/// diameter on every side, snapped outward to whole pixels and clipped to
/// the canvas. `None` when nothing remains — an empty subtree, or bounds
/// entirely off-canvas.
pub fn filter_region(
    bounds: &DeviceBounds,
    margin: (u32, u32),
    canvas_width: u32,
    canvas_height: u32,
) -> Option<FilterRegion> {
    if bounds.is_empty() {
        return None;
    }

    let (mx, my) = (f64::from(margin.0), f64::from(margin.1));
    let x0 = (bounds.min.x - mx).floor().max(0.0);
    let y0 = (bounds.min.y - my).floor().max(0.0);
    let x1 = (bounds.max.x + mx).ceil().min(f64::from(canvas_width));
    let y1 = (bounds.max.y + my).ceil().min(f64::from(canvas_height));
    if x1 <= x0 || y1 <= y0 {
        return None;
    }

    Some(FilterRegion {
        x: x0 as i32,
        y: y0 as i32,
        width: (x1 - x0) as u32,
        height: (y1 - y0) as u32,
    })
}
