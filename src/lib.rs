//! CPU renderer for a scene-tree vector document model: shapes, gradients,
//! group opacity and Gaussian-blur filters, rasterized to premultiplied RGBA.

#![forbid(unsafe_code)]

pub mod bbox;
pub mod blur;
pub mod error;
pub mod filter;
pub mod geom;
pub mod gradient;
pub mod render;
pub mod style;
pub mod surface;
pub mod tree;

pub use bbox::DeviceBounds;
pub use blur::{box_diameter, gaussian_blur};
pub use error::{VektaError, VektaResult};
pub use filter::{Filter, FilterInput, FilterPrimitive, FilterRegion};
pub use geom::{
    Axis, Length, PreserveAspectRatio, Transform, Unit, ViewBox, Viewport,
};
pub use gradient::{
    GradientCommon, GradientStop, GradientUnits, LinearGradient, RadialGradient, SpreadMethod,
};
pub use render::{render, RenderOptions};
pub use style::{Paint, Rgba8, Style};
pub use surface::{PixelFormat, Surface};
pub use tree::{Document, Element, ElementKind};
