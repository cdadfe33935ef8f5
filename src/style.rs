use serde::{Deserialize, Serialize};

use crate::geom::Length;

/// A straight-alpha color as it appears in the document.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8 {
    pub const BLACK: Rgba8 = Rgba8::rgb(0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

/// A fill or stroke value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Paint {
    /// Explicit no-paint (`fill="none"`).
    None,
    Color(Rgba8),
    /// Reference to a paint server (gradient) element by id.
    Reference(String),
}

/// Presentation attributes of one element. `None` means "not set here";
/// whether an unset attribute inherits is a property of the attribute, see
/// [`StyleStack`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Style {
    pub fill: Option<Paint>,
    pub stroke: Option<Paint>,
    pub stroke_width: Option<Length>,
    pub fill_opacity: Option<f32>,
    pub stroke_opacity: Option<f32>,
    /// Group opacity; applies to the element as a whole, not inherited.
    pub opacity: Option<f32>,
    /// `false` is `display: none`: the subtree is not rendered at all.
    pub display: Option<bool>,
    /// `false` is `visibility: hidden`; inherited.
    pub visibility: Option<bool>,
    /// Filter reference (element id); not inherited.
    pub filter: Option<String>,
}

/// The cascade: one frame per open element, innermost last.
///
/// Inherited attributes (fill, stroke, stroke-width, the paint opacities,
/// visibility) search from the innermost frame outward; element-scoped
/// attributes (display, opacity, filter) only consult the innermost frame.
#[derive(Clone, Debug, Default)]
pub struct StyleStack {
    frames: Vec<Style>,
}

impl StyleStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, style: &Style) {
        self.frames.push(style.clone());
    }

    pub fn pop(&mut self) {
        let popped = self.frames.pop();
        debug_assert!(popped.is_some(), "style stack underflow");
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    fn inherited<'a, T>(&'a self, get: impl Fn(&'a Style) -> Option<&'a T>) -> Option<&'a T> {
        self.frames.iter().rev().find_map(get)
    }

    fn innermost(&self) -> Option<&Style> {
        self.frames.last()
    }

    /// Effective fill paint. The initial value is opaque black.
    pub fn fill(&self) -> Paint {
        self.inherited(|s| s.fill.as_ref())
            .cloned()
            .unwrap_or(Paint::Color(Rgba8::BLACK))
    }

    /// Effective stroke paint. The initial value is no stroke.
    pub fn stroke(&self) -> Paint {
        self.inherited(|s| s.stroke.as_ref())
            .cloned()
            .unwrap_or(Paint::None)
    }

    pub fn stroke_width(&self) -> Length {
        self.inherited(|s| s.stroke_width.as_ref())
            .copied()
            .unwrap_or(Length::px(1.0))
    }

    pub fn fill_opacity(&self) -> f32 {
        self.inherited(|s| s.fill_opacity.as_ref())
            .copied()
            .unwrap_or(1.0)
            .clamp(0.0, 1.0)
    }

    pub fn stroke_opacity(&self) -> f32 {
        self.inherited(|s| s.stroke_opacity.as_ref())
            .copied()
            .unwrap_or(1.0)
            .clamp(0.0, 1.0)
    }

    pub fn visible(&self) -> bool {
        self.inherited(|s| s.visibility.as_ref())
            .copied()
            .unwrap_or(true)
    }

    pub fn displayed(&self) -> bool {
        self.innermost().and_then(|s| s.display).unwrap_or(true)
    }

    pub fn opacity(&self) -> f32 {
        self.innermost()
            .and_then(|s| s.opacity)
            .unwrap_or(1.0)
            .clamp(0.0, 1.0)
    }

    pub fn filter(&self) -> Option<&str> {
        self.innermost().and_then(|s| s.filter.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_values() {
        let ss = StyleStack::new();
        assert_eq!(ss.fill(), Paint::Color(Rgba8::BLACK));
        assert_eq!(ss.stroke(), Paint::None);
        assert_eq!(ss.stroke_width(), Length::px(1.0));
        assert!(ss.visible());
        assert!(ss.displayed());
        assert_eq!(ss.opacity(), 1.0);
        assert!(ss.filter().is_none());
    }

    #[test]
    fn innermost_fill_wins() {
        let mut ss = StyleStack::new();
        ss.push(&Style {
            fill: Some(Paint::Color(Rgba8::rgb(255, 0, 0))),
            ..Style::default()
        });
        ss.push(&Style::default());
        assert_eq!(ss.fill(), Paint::Color(Rgba8::rgb(255, 0, 0)));

        ss.push(&Style {
            fill: Some(Paint::None),
            ..Style::default()
        });
        assert_eq!(ss.fill(), Paint::None);
        ss.pop();
        assert_eq!(ss.fill(), Paint::Color(Rgba8::rgb(255, 0, 0)));
    }

    #[test]
    fn display_and_filter_do_not_inherit() {
        let mut ss = StyleStack::new();
        ss.push(&Style {
            display: Some(false),
            filter: Some("f".to_string()),
            opacity: Some(0.5),
            ..Style::default()
        });
        ss.push(&Style::default());
        assert!(ss.displayed());
        assert!(ss.filter().is_none());
        assert_eq!(ss.opacity(), 1.0);
    }

    #[test]
    fn visibility_inherits() {
        let mut ss = StyleStack::new();
        ss.push(&Style {
            visibility: Some(false),
            ..Style::default()
        });
        ss.push(&Style::default());
        assert!(!ss.visible());
    }
}
