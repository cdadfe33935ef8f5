//! The document model consumed by the renderer: a tree of elements with a
//! closed set of kinds, plus an id-indexed finder for reference resolution.
//!
//! Producing this tree (markup parsing, color parsing) is the caller's job.

use std::collections::HashMap;

use kurbo::{BezPath, Point};
use serde::{Deserialize, Serialize};

use crate::filter::Filter;
use crate::geom::{Length, PreserveAspectRatio, Transform, ViewBox};
use crate::gradient::{LinearGradient, RadialGradient};
use crate::style::Style;

/// One element of the scene tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub id: Option<String>,
    pub kind: ElementKind,
    pub style: Style,
    pub transform: Vec<Transform>,
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(kind: ElementKind) -> Self {
        Self {
            id: None,
            kind,
            style: Style::default(),
            transform: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_style(mut self, style: Style) -> Self {
        self.style = style;
        self
    }

    pub fn with_transform(mut self, transform: Vec<Transform>) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_children(mut self, children: Vec<Element>) -> Self {
        self.children = children;
        self
    }
}

/// The closed set of element kinds the walker dispatches on.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ElementKind {
    Svg {
        x: Length,
        y: Length,
        width: Length,
        height: Length,
        view_box: Option<ViewBox>,
        preserve_aspect_ratio: PreserveAspectRatio,
    },
    Group,
    Use {
        href: String,
        x: Length,
        y: Length,
    },
    Path {
        data: BezPath,
    },
    Rect {
        x: Length,
        y: Length,
        width: Length,
        height: Length,
        rx: Option<Length>,
        ry: Option<Length>,
    },
    Circle {
        cx: Length,
        cy: Length,
        r: Length,
    },
    Ellipse {
        cx: Length,
        cy: Length,
        rx: Length,
        ry: Length,
    },
    Line {
        x1: Length,
        y1: Length,
        x2: Length,
        y2: Length,
    },
    Polyline {
        points: Vec<Point>,
    },
    Polygon {
        points: Vec<Point>,
    },
    LinearGradient(LinearGradient),
    RadialGradient(RadialGradient),
    Filter(Filter),
    /// An element kind this renderer does not know. Rendered as nothing;
    /// children are still visited when it is a container.
    Unknown {
        container: bool,
    },
}

impl ElementKind {
    /// A root/nested viewport element covering the whole parent viewport.
    pub fn svg() -> Self {
        ElementKind::Svg {
            x: Length::ZERO,
            y: Length::ZERO,
            width: Length::percent(100.0),
            height: Length::percent(100.0),
            view_box: None,
            preserve_aspect_ratio: PreserveAspectRatio::default(),
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(
            self,
            ElementKind::Svg { .. } | ElementKind::Group | ElementKind::Unknown { container: true }
        )
    }
}

/// A scene document: the element tree plus an id index built once at
/// construction. Lookup follows recorded child-index paths, so the tree
/// stays a plain owned structure.
#[derive(Clone, Debug)]
pub struct Document {
    pub root: Element,
    ids: HashMap<String, Vec<usize>>,
}

impl Document {
    pub fn new(root: Element) -> Self {
        let mut ids = HashMap::new();
        let mut path = Vec::new();
        index_ids(&root, &mut path, &mut ids);
        Self { root, ids }
    }

    /// Find an element by id. The first occurrence in document order wins.
    pub fn find(&self, id: &str) -> Option<&Element> {
        let path = self.ids.get(id)?;
        let mut el = &self.root;
        for &i in path {
            el = el.children.get(i)?;
        }
        Some(el)
    }
}

fn index_ids(el: &Element, path: &mut Vec<usize>, ids: &mut HashMap<String, Vec<usize>>) {
    if let Some(id) = &el.id
        && !ids.contains_key(id)
    {
        ids.insert(id.clone(), path.clone());
    }
    for (i, child) in el.children.iter().enumerate() {
        path.push(i);
        index_ids(child, path, ids);
        path.pop();
    }
}
