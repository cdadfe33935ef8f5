//! Paint servers: gradient definitions, reference-chain resolution and
//! conversion to backend brushes.
//!
//! A gradient element may leave any attribute unset and point at another
//! gradient via `href`; resolution walks that chain and takes the first
//! definition found for each attribute independently. Geometry only
//! transfers between gradients of the same kind.

use std::collections::HashSet;

use kurbo::{Affine, Rect};
use serde::{Deserialize, Serialize};

use crate::geom::{transforms_to_affine, Axis, Length, Transform, Viewport};
use crate::style::Rgba8;
use crate::tree::{Document, ElementKind};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GradientStop {
    /// Position along the gradient vector, nominally in `[0, 1]`.
    pub offset: f64,
    pub color: Rgba8,
    /// `stop-opacity`, folded into the stop alpha at paint build time.
    pub opacity: f32,
}

impl GradientStop {
    pub fn new(offset: f64, color: Rgba8) -> Self {
        Self {
            offset,
            color,
            opacity: 1.0,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpreadMethod {
    #[default]
    Pad,
    Reflect,
    Repeat,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GradientUnits {
    UserSpaceOnUse,
    /// Coordinates are fractions of the painted shape's user-space bounding
    /// box. The default.
    #[default]
    ObjectBoundingBox,
}

/// Attributes shared by both gradient kinds. Empty `stops` means "no stops
/// declared here", which is distinct from declaring zero stops: the chain
/// keeps searching.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GradientCommon {
    pub stops: Vec<GradientStop>,
    pub units: Option<GradientUnits>,
    pub spread: Option<SpreadMethod>,
    pub transform: Option<Vec<Transform>>,
    pub href: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LinearGradient {
    pub common: GradientCommon,
    pub x1: Option<Length>,
    pub y1: Option<Length>,
    pub x2: Option<Length>,
    pub y2: Option<Length>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RadialGradient {
    pub common: GradientCommon,
    pub cx: Option<Length>,
    pub cy: Option<Length>,
    pub r: Option<Length>,
    pub fx: Option<Length>,
    pub fy: Option<Length>,
}

/// A gradient after chain resolution: every attribute has a value.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedGradient {
    pub geometry: GradientGeometry,
    pub stops: Vec<GradientStop>,
    pub units: GradientUnits,
    pub spread: SpreadMethod,
    pub transform: Affine,
}

#[derive(Clone, Debug, PartialEq)]
pub enum GradientGeometry {
    Linear {
        x1: Length,
        y1: Length,
        x2: Length,
        y2: Length,
    },
    Radial {
        cx: Length,
        cy: Length,
        r: Length,
        fx: Length,
        fy: Length,
    },
}

/// What a paint-server reference boils down to for the backend.
#[derive(Clone, Debug)]
pub enum ResolvedPaint {
    Solid(vello_cpu::peniko::Color),
    Gradient {
        gradient: vello_cpu::peniko::Gradient,
        /// Paint-space transform, in the caller's kurbo convention.
        transform: Affine,
    },
}

/// Resolve a gradient element and its `href` chain. Returns `None` when `id`
/// does not name a gradient. A chain link that is missing, is not a
/// gradient, or has been seen before ends the walk; attributes still unset
/// at that point take their defaults.
pub fn resolve_gradient(doc: &Document, id: &str) -> Option<ResolvedGradient> {
    let first = doc.find(id)?;
    let is_linear = match &first.kind {
        ElementKind::LinearGradient(_) => true,
        ElementKind::RadialGradient(_) => false,
        _ => return None,
    };

    let mut stops: Option<Vec<GradientStop>> = None;
    let mut units: Option<GradientUnits> = None;
    let mut spread: Option<SpreadMethod> = None;
    let mut transform: Option<Affine> = None;
    let mut lin: [Option<Length>; 4] = [None; 4];
    let mut rad: [Option<Length>; 5] = [None; 5];

    let mut visited = HashSet::new();
    visited.insert(id.to_string());
    let mut current = Some(first);

    while let Some(el) = current {
        let common = match &el.kind {
            ElementKind::LinearGradient(g) => {
                if is_linear {
                    merge(&mut lin[0], g.x1);
                    merge(&mut lin[1], g.y1);
                    merge(&mut lin[2], g.x2);
                    merge(&mut lin[3], g.y2);
                }
                &g.common
            }
            ElementKind::RadialGradient(g) => {
                if !is_linear {
                    merge(&mut rad[0], g.cx);
                    merge(&mut rad[1], g.cy);
                    merge(&mut rad[2], g.r);
                    merge(&mut rad[3], g.fx);
                    merge(&mut rad[4], g.fy);
                }
                &g.common
            }
            _ => break,
        };

        if stops.is_none() && !common.stops.is_empty() {
            stops = Some(common.stops.clone());
        }
        if units.is_none() {
            units = common.units;
        }
        if spread.is_none() {
            spread = common.spread;
        }
        if transform.is_none()
            && let Some(list) = &common.transform
        {
            transform = Some(transforms_to_affine(list));
        }

        current = common
            .href
            .as_deref()
            .filter(|href| visited.insert((*href).to_string()))
            .and_then(|href| doc.find(href));
    }

    let geometry = if is_linear {
        GradientGeometry::Linear {
            x1: lin[0].unwrap_or(Length::percent(0.0)),
            y1: lin[1].unwrap_or(Length::percent(0.0)),
            x2: lin[2].unwrap_or(Length::percent(100.0)),
            y2: lin[3].unwrap_or(Length::percent(0.0)),
        }
    } else {
        let cx = rad[0].unwrap_or(Length::percent(50.0));
        let cy = rad[1].unwrap_or(Length::percent(50.0));
        GradientGeometry::Radial {
            cx,
            cy,
            r: rad[2].unwrap_or(Length::percent(50.0)),
            fx: rad[3].unwrap_or(cx),
            fy: rad[4].unwrap_or(cy),
        }
    };

    Some(ResolvedGradient {
        geometry,
        stops: stops.unwrap_or_default(),
        units: units.unwrap_or_default(),
        spread: spread.unwrap_or_default(),
        transform: transform.unwrap_or(Affine::IDENTITY),
    })
}

fn merge(slot: &mut Option<Length>, value: Option<Length>) {
    if slot.is_none() {
        *slot = value;
    }
}

impl ResolvedGradient {
    /// Build the backend paint for a shape with the given user-space bounds.
    ///
    /// Returns `None` when no stops resolved (the shape is not painted).
    /// Degenerate cases collapse to a solid of the last stop: a single stop,
    /// a non-positive radius, or bounding-box units on a zero-area shape.
    pub fn to_paint(&self, object_bounds: Rect, vp: &Viewport) -> Option<ResolvedPaint> {
        if self.stops.is_empty() {
            return None;
        }

        let mut prev = 0.0f32;
        let stops: Vec<vello_cpu::peniko::ColorStop> = self
            .stops
            .iter()
            .map(|s| {
                // Clamp into [0, 1] and force the sequence non-decreasing.
                let mut offset = s.offset.clamp(0.0, 1.0) as f32;
                if offset < prev {
                    offset = prev;
                }
                prev = offset;
                vello_cpu::peniko::ColorStop::from((offset, stop_color(s)))
            })
            .collect();

        let last = self.stops.len() - 1;
        if self.stops.len() == 1 {
            return Some(ResolvedPaint::Solid(stop_color(&self.stops[last])));
        }

        let bbox_units = self.units == GradientUnits::ObjectBoundingBox;
        if bbox_units && (object_bounds.width() <= 0.0 || object_bounds.height() <= 0.0) {
            return Some(ResolvedPaint::Solid(stop_color(&self.stops[last])));
        }

        let kind = match &self.geometry {
            GradientGeometry::Linear { x1, y1, x2, y2 } => {
                let (x1, y1) = self.coords(*x1, *y1, vp);
                let (x2, y2) = self.coords(*x2, *y2, vp);
                vello_cpu::peniko::GradientKind::Linear(
                    vello_cpu::peniko::LinearGradientPosition::new((x1, y1), (x2, y2)),
                )
            }
            GradientGeometry::Radial { cx, cy, r, fx, fy } => {
                let radius = if bbox_units {
                    r.to_fraction()
                } else {
                    r.to_px(Axis::Omni, vp)
                };
                if radius <= 0.0 {
                    return Some(ResolvedPaint::Solid(stop_color(&self.stops[last])));
                }
                let (cx, cy) = self.coords(*cx, *cy, vp);
                let (fx, fy) = self.coords(*fx, *fy, vp);
                vello_cpu::peniko::GradientKind::Radial(
                    vello_cpu::peniko::RadialGradientPosition::new_two_point(
                        (fx, fy),
                        0.0,
                        (cx, cy),
                        radius as f32,
                    ),
                )
            }
        };

        let extend = match self.spread {
            SpreadMethod::Pad => vello_cpu::peniko::Extend::Pad,
            SpreadMethod::Reflect => vello_cpu::peniko::Extend::Reflect,
            SpreadMethod::Repeat => vello_cpu::peniko::Extend::Repeat,
        };

        let transform = if bbox_units {
            // Map the unit square onto the shape's bounding box, then apply
            // the gradient's own transform inside that space.
            Affine::translate((object_bounds.x0, object_bounds.y0))
                * Affine::scale_non_uniform(object_bounds.width(), object_bounds.height())
                * self.transform
        } else {
            self.transform
        };

        Some(ResolvedPaint::Gradient {
            gradient: vello_cpu::peniko::Gradient {
                kind,
                extend,
                stops: vello_cpu::peniko::ColorStops::from(stops.as_slice()),
                ..vello_cpu::peniko::Gradient::default()
            },
            transform,
        })
    }

    fn coords(&self, x: Length, y: Length, vp: &Viewport) -> (f64, f64) {
        match self.units {
            GradientUnits::ObjectBoundingBox => (x.to_fraction(), y.to_fraction()),
            GradientUnits::UserSpaceOnUse => (x.to_px(Axis::X, vp), y.to_px(Axis::Y, vp)),
        }
    }
}

fn stop_color(stop: &GradientStop) -> vello_cpu::peniko::Color {
    let opacity = stop.opacity.clamp(0.0, 1.0);
    let a = (f32::from(stop.color.a) * opacity).round().clamp(0.0, 255.0) as u8;
    vello_cpu::peniko::Color::from_rgba8(stop.color.r, stop.color.g, stop.color.b, a)
}
