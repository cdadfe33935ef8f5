use kurbo::Affine;
use serde::{Deserialize, Serialize};

/// A length value as it appears in the document: a number plus a unit.
///
/// Conversion to device pixels depends on dpi, the current viewport and the
/// axis the length applies to, all carried by [`Viewport`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Length {
    pub value: f64,
    pub unit: Unit,
}

impl Length {
    pub const ZERO: Length = Length {
        value: 0.0,
        unit: Unit::Number,
    };

    pub fn new(value: f64, unit: Unit) -> Self {
        Self { value, unit }
    }

    pub fn px(value: f64) -> Self {
        Self::new(value, Unit::Px)
    }

    pub fn percent(value: f64) -> Self {
        Self::new(value, Unit::Percent)
    }

    /// Convert to device pixels.
    ///
    /// Absolute units go through inches scaled by dpi; percentages resolve
    /// against the viewport (width for [`Axis::X`], height for [`Axis::Y`],
    /// the normalized diagonal for [`Axis::Omni`]); unitless values are px.
    pub fn to_px(&self, axis: Axis, vp: &Viewport) -> f64 {
        match self.unit {
            Unit::Number | Unit::Px => self.value,
            Unit::In => self.value * vp.dpi,
            Unit::Pt => self.value * vp.dpi / 72.0,
            Unit::Pc => self.value * vp.dpi / 6.0,
            Unit::Cm => self.value * vp.dpi / 2.54,
            Unit::Mm => self.value * vp.dpi / 25.4,
            Unit::Em => self.value * vp.font_size,
            Unit::Ex => self.value * vp.font_size * 0.5,
            Unit::Percent => self.value / 100.0 * vp.percent_basis(axis),
        }
    }

    /// The length as a plain fraction, for `objectBoundingBox` coordinates
    /// where percentages mean fractions of the unit square.
    pub fn to_fraction(&self) -> f64 {
        match self.unit {
            Unit::Percent => self.value / 100.0,
            _ => self.value,
        }
    }
}

/// Length units. An unrecognized unit string is the producer's problem; when
/// a producer cannot classify a unit it should fall back to [`Unit::Number`],
/// which is treated as px.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unit {
    #[default]
    Number,
    Px,
    Cm,
    Mm,
    In,
    Pt,
    Pc,
    Em,
    Ex,
    Percent,
}

/// Which viewport dimension a percentage length resolves against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    /// No defined axis (radii, blur deviations): percentage of the viewport
    /// diagonal, `sqrt(w^2 + h^2) / sqrt(2)`.
    Omni,
}

/// The length-resolution context: current viewport size, dpi and nominal
/// font size for em/ex.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
    pub dpi: f64,
    pub font_size: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64, dpi: f64) -> Self {
        Self {
            width,
            height,
            dpi,
            font_size: 12.0,
        }
    }

    fn percent_basis(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.width,
            Axis::Y => self.height,
            Axis::Omni => {
                (self.width * self.width + self.height * self.height).sqrt()
                    / std::f64::consts::SQRT_2
            }
        }
    }
}

/// One operation of a transform list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Transform {
    Translate { x: f64, y: f64 },
    Scale { x: f64, y: f64 },
    Rotate { degrees: f64, center: Option<(f64, f64)> },
    SkewX(f64),
    SkewY(f64),
    /// `[a, b, c, d, e, f]` in the usual column-major 2x3 convention
    /// (`x' = a*x + c*y + e`), matching `kurbo::Affine` coefficients.
    Matrix([f64; 6]),
}

impl Transform {
    pub fn to_affine(&self) -> Affine {
        match *self {
            Transform::Translate { x, y } => Affine::translate((x, y)),
            Transform::Scale { x, y } => Affine::scale_non_uniform(x, y),
            Transform::Rotate { degrees, center } => {
                let rot = Affine::rotate(degrees.to_radians());
                match center {
                    None => rot,
                    Some((cx, cy)) => {
                        Affine::translate((cx, cy)) * rot * Affine::translate((-cx, -cy))
                    }
                }
            }
            Transform::SkewX(degrees) => Affine::skew(degrees.to_radians().tan(), 0.0),
            Transform::SkewY(degrees) => Affine::skew(0.0, degrees.to_radians().tan()),
            Transform::Matrix(m) => Affine::new(m),
        }
    }
}

/// Compose a transform list into a single affine. Operations apply
/// left-to-right: each entry is right-multiplied onto the accumulated matrix.
pub fn transforms_to_affine(list: &[Transform]) -> Affine {
    list.iter()
        .fold(Affine::IDENTITY, |acc, t| acc * t.to_affine())
}

/// A `viewBox` rectangle establishing a new user coordinate system.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViewBox {
    pub min_x: f64,
    pub min_y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectAlign {
    None,
    XMinYMin,
    XMidYMin,
    XMaxYMin,
    XMinYMid,
    #[default]
    XMidYMid,
    XMaxYMid,
    XMinYMax,
    XMidYMax,
    XMaxYMax,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectFit {
    #[default]
    Meet,
    Slice,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreserveAspectRatio {
    pub align: AspectAlign,
    pub fit: AspectFit,
}

impl AspectAlign {
    /// Alignment factors for the leftover space on each axis.
    fn factors(self) -> (f64, f64) {
        match self {
            AspectAlign::None | AspectAlign::XMinYMin => (0.0, 0.0),
            AspectAlign::XMidYMin => (0.5, 0.0),
            AspectAlign::XMaxYMin => (1.0, 0.0),
            AspectAlign::XMinYMid => (0.0, 0.5),
            AspectAlign::XMidYMid => (0.5, 0.5),
            AspectAlign::XMaxYMid => (1.0, 0.5),
            AspectAlign::XMinYMax => (0.0, 1.0),
            AspectAlign::XMidYMax => (0.5, 1.0),
            AspectAlign::XMaxYMax => (1.0, 1.0),
        }
    }
}

/// The affine mapping a viewBox onto a viewport of the given size.
pub fn view_box_transform(
    vb: &ViewBox,
    viewport_width: f64,
    viewport_height: f64,
    par: PreserveAspectRatio,
) -> Affine {
    if vb.width <= 0.0 || vb.height <= 0.0 {
        return Affine::IDENTITY;
    }

    let mut sx = viewport_width / vb.width;
    let mut sy = viewport_height / vb.height;
    if par.align != AspectAlign::None {
        let s = match par.fit {
            AspectFit::Meet => sx.min(sy),
            AspectFit::Slice => sx.max(sy),
        };
        sx = s;
        sy = s;
    }

    let (fx, fy) = par.align.factors();
    let tx = (viewport_width - vb.width * sx) * fx;
    let ty = (viewport_height - vb.height * sy) * fy;

    Affine::translate((tx, ty))
        * Affine::scale_non_uniform(sx, sy)
        * Affine::translate((-vb.min_x, -vb.min_y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Point;

    fn vp(w: f64, h: f64) -> Viewport {
        Viewport::new(w, h, 96.0)
    }

    #[test]
    fn absolute_units_at_96_dpi() {
        let v = vp(100.0, 100.0);
        assert_eq!(Length::new(1.0, Unit::In).to_px(Axis::X, &v), 96.0);
        assert_eq!(Length::new(72.0, Unit::Pt).to_px(Axis::X, &v), 96.0);
        assert_eq!(Length::new(6.0, Unit::Pc).to_px(Axis::X, &v), 96.0);
        assert!((Length::new(2.54, Unit::Cm).to_px(Axis::X, &v) - 96.0).abs() < 1e-9);
        assert!((Length::new(25.4, Unit::Mm).to_px(Axis::X, &v) - 96.0).abs() < 1e-9);
        assert_eq!(Length::px(7.0).to_px(Axis::Y, &v), 7.0);
        assert_eq!(Length::new(7.0, Unit::Number).to_px(Axis::Y, &v), 7.0);
    }

    #[test]
    fn percent_resolves_per_axis() {
        let v = vp(200.0, 100.0);
        assert_eq!(Length::percent(50.0).to_px(Axis::X, &v), 100.0);
        assert_eq!(Length::percent(50.0).to_px(Axis::Y, &v), 50.0);

        let diagonal = (200.0f64 * 200.0 + 100.0 * 100.0).sqrt() / std::f64::consts::SQRT_2;
        let got = Length::percent(50.0).to_px(Axis::Omni, &v);
        assert!((got - 0.5 * diagonal).abs() < 1e-9);
    }

    #[test]
    fn em_and_ex_use_font_size() {
        let mut v = vp(100.0, 100.0);
        v.font_size = 10.0;
        assert_eq!(Length::new(2.0, Unit::Em).to_px(Axis::X, &v), 20.0);
        assert_eq!(Length::new(2.0, Unit::Ex).to_px(Axis::X, &v), 10.0);
    }

    #[test]
    fn transform_list_applies_left_to_right() {
        let a = transforms_to_affine(&[
            Transform::Translate { x: 10.0, y: 0.0 },
            Transform::Scale { x: 2.0, y: 2.0 },
        ]);
        // Scale happens in the translated frame: (1, 1) -> (12, 2).
        let p = a * Point::new(1.0, 1.0);
        assert!((p.x - 12.0).abs() < 1e-9);
        assert!((p.y - 2.0).abs() < 1e-9);
    }

    #[test]
    fn rotate_about_center() {
        let a = Transform::Rotate {
            degrees: 90.0,
            center: Some((1.0, 1.0)),
        }
        .to_affine();
        let p = a * Point::new(2.0, 1.0);
        assert!((p.x - 1.0).abs() < 1e-9);
        assert!((p.y - 2.0).abs() < 1e-9);
    }

    #[test]
    fn view_box_meet_centers_leftover_space() {
        let vb = ViewBox {
            min_x: 0.0,
            min_y: 0.0,
            width: 10.0,
            height: 10.0,
        };
        // 20x10 viewport, uniform scale 1, centered horizontally.
        let a = view_box_transform(&vb, 20.0, 10.0, PreserveAspectRatio::default());
        let p = a * Point::new(0.0, 0.0);
        assert!((p.x - 5.0).abs() < 1e-9);
        assert!((p.y - 0.0).abs() < 1e-9);
    }

    #[test]
    fn view_box_slice_overflows() {
        let vb = ViewBox {
            min_x: 0.0,
            min_y: 0.0,
            width: 10.0,
            height: 10.0,
        };
        let a = view_box_transform(
            &vb,
            20.0,
            10.0,
            PreserveAspectRatio {
                align: AspectAlign::XMidYMid,
                fit: AspectFit::Slice,
            },
        );
        // Scale 2 on both axes, vertically centered: y overflows by 5 on each side.
        let p = a * Point::new(0.0, 0.0);
        assert!((p.x - 0.0).abs() < 1e-9);
        assert!((p.y + 5.0).abs() < 1e-9);
    }
}
