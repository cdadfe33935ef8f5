//! The document walker: renders a [`Document`] onto a premultiplied
//! [`Surface`] through a `vello_cpu` context.
//!
//! Draws accumulate in a pending render context and are flushed to the
//! canvas surface whenever raw pixel access is needed (filters, opacity
//! groups, final readback). Filtered subtrees render into an isolated
//! canvas-sized target first; the filtered patch is then composited back
//! at its device-space region.

use kurbo::{Affine, BezPath, Circle, Ellipse, Rect, Shape};

use crate::bbox::DeviceBounds;
use crate::blur::{box_diameter, gaussian_blur};
use crate::error::{VektaError, VektaResult};
use crate::filter::{filter_region, FilterInput, FilterPrimitive};
use crate::geom::{transforms_to_affine, view_box_transform, Axis, Viewport};
use crate::gradient::{resolve_gradient, ResolvedPaint};
use crate::style::{Paint, StyleStack};
use crate::surface::{over_in_place, premul_rgba8, Surface};
use crate::tree::{Document, Element, ElementKind};

/// Options for one render call.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderOptions {
    /// Canvas size in device pixels.
    pub width: u32,
    pub height: u32,
    pub dpi: f64,
    /// Straight-alpha clear color. `None` leaves the canvas transparent.
    pub clear_rgba: Option<[u8; 4]>,
}

impl RenderOptions {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            dpi: 96.0,
            clear_rgba: None,
        }
    }

    pub fn with_dpi(mut self, dpi: f64) -> Self {
        self.dpi = dpi;
        self
    }

    pub fn with_clear_rgba(mut self, rgba: [u8; 4]) -> Self {
        self.clear_rgba = Some(rgba);
        self
    }
}

/// Render a document onto a fresh premultiplied canvas.
#[tracing::instrument(skip_all, fields(width = opts.width, height = opts.height))]
pub fn render(doc: &Document, opts: &RenderOptions) -> VektaResult<Surface> {
    if opts.width == 0 || opts.height == 0 {
        return Err(VektaError::validation("canvas dimensions must be non-zero"));
    }
    if !opts.dpi.is_finite() || opts.dpi <= 0.0 {
        return Err(VektaError::validation("dpi must be finite and positive"));
    }

    let mut target = CanvasTarget::new(opts.width, opts.height)?;
    if let Some(rgba) = opts.clear_rgba {
        target.surface.fill(premul_rgba8(rgba));
    }

    let mut state = RenderState {
        doc,
        vp: Viewport::new(f64::from(opts.width), f64::from(opts.height), opts.dpi),
        transform: Affine::IDENTITY,
        styles: StyleStack::new(),
        outermost: true,
        device_bounds: DeviceBounds::EMPTY,
        use_stack: Vec::new(),
    };
    render_element(&doc.root, &mut state, &mut target, true)?;
    target.flush()?;
    Ok(target.surface)
}

/// The canvas plus its pending draw context. `render_to_pixmap` overwrites
/// the whole pixmap, so finished draws are composited over the surface and
/// the context is reset for the next batch.
struct CanvasTarget {
    surface: Surface,
    ctx: vello_cpu::RenderContext,
    scratch: vello_cpu::Pixmap,
    pending: bool,
}

impl CanvasTarget {
    fn new(width: u32, height: u32) -> VektaResult<Self> {
        let w: u16 = width
            .try_into()
            .map_err(|_| VektaError::validation("canvas width exceeds u16"))?;
        let h: u16 = height
            .try_into()
            .map_err(|_| VektaError::validation("canvas height exceeds u16"))?;
        Ok(Self {
            surface: Surface::new(width, height)?,
            ctx: vello_cpu::RenderContext::new(w, h),
            scratch: vello_cpu::Pixmap::new(w, h),
            pending: false,
        })
    }

    fn flush(&mut self) -> VektaResult<()> {
        if !self.pending {
            return Ok(());
        }
        self.ctx.flush();
        self.ctx.render_to_pixmap(&mut self.scratch);
        over_in_place(
            self.surface.data_mut(),
            self.scratch.data_as_u8_slice(),
            1.0,
        )?;
        self.ctx.reset();
        self.pending = false;
        Ok(())
    }
}

struct RenderState<'a> {
    doc: &'a Document,
    vp: Viewport,
    /// User space to device space.
    transform: Affine,
    styles: StyleStack,
    /// True until the first `Svg` element is entered; the outermost viewport
    /// ignores its own x/y.
    outermost: bool,
    /// Device-space extent of everything drawn so far in the current
    /// bounds-tracking scope.
    device_bounds: DeviceBounds,
    /// Hrefs of the `Use` elements currently being expanded.
    use_stack: Vec<String>,
}

/// Enter one element: push its style frame and transform, dispatch, restore.
fn render_element(
    el: &Element,
    state: &mut RenderState<'_>,
    target: &mut CanvasTarget,
    apply_filter: bool,
) -> VektaResult<()> {
    state.styles.push(&el.style);
    let saved = state.transform;
    state.transform *= transforms_to_affine(&el.transform);

    let result = dispatch(el, state, target, apply_filter);

    state.transform = saved;
    state.styles.pop();
    result
}

/// Dispatch with the element's frames already on the stacks. Handles the
/// element-scoped concerns (display, filter, group opacity) before the
/// per-kind rendering.
fn dispatch(
    el: &Element,
    state: &mut RenderState<'_>,
    target: &mut CanvasTarget,
    apply_filter: bool,
) -> VektaResult<()> {
    if !state.styles.displayed() {
        return Ok(());
    }

    if apply_filter
        && let Some(filter_id) = state.styles.filter().map(str::to_string)
    {
        return apply_filter_chain(el, &filter_id, state, target);
    }

    let opacity = state.styles.opacity();
    if opacity < 1.0 {
        // Isolate the subtree so the opacity applies to its composite, not
        // to each draw separately.
        target.flush()?;
        let mut sub = CanvasTarget::new(target.surface.width(), target.surface.height())?;
        render_kind(el, state, &mut sub)?;
        sub.flush()?;
        over_in_place(target.surface.data_mut(), sub.surface.data(), opacity)?;
        return Ok(());
    }

    render_kind(el, state, target)
}

fn render_kind(
    el: &Element,
    state: &mut RenderState<'_>,
    target: &mut CanvasTarget,
) -> VektaResult<()> {
    match &el.kind {
        ElementKind::Svg {
            x,
            y,
            width,
            height,
            view_box,
            preserve_aspect_ratio,
        } => {
            let w = width.to_px(Axis::X, &state.vp);
            let h = height.to_px(Axis::Y, &state.vp);
            if w <= 0.0 || h <= 0.0 {
                return Ok(());
            }

            let saved_vp = state.vp;
            let saved_transform = state.transform;
            let saved_outermost = state.outermost;

            if !state.outermost {
                let tx = x.to_px(Axis::X, &state.vp);
                let ty = y.to_px(Axis::Y, &state.vp);
                state.transform *= Affine::translate((tx, ty));
            }
            state.outermost = false;

            match view_box {
                Some(vb) => {
                    state.transform *= view_box_transform(vb, w, h, *preserve_aspect_ratio);
                    state.vp = Viewport {
                        width: vb.width,
                        height: vb.height,
                        ..state.vp
                    };
                }
                None => {
                    state.vp = Viewport {
                        width: w,
                        height: h,
                        ..state.vp
                    };
                }
            }

            let result = render_children(el, state, target);

            state.outermost = saved_outermost;
            state.transform = saved_transform;
            state.vp = saved_vp;
            result
        }

        ElementKind::Group | ElementKind::Unknown { container: true } => {
            render_children(el, state, target)
        }

        ElementKind::Use { href, x, y } => {
            if state.use_stack.iter().any(|h| h == href) {
                tracing::warn!(href = %href, "use reference cycle; skipping");
                return Ok(());
            }
            let Some(referenced) = state.doc.find(href) else {
                tracing::debug!(href = %href, "use reference not found");
                return Ok(());
            };

            let saved = state.transform;
            state.transform *= Affine::translate((
                x.to_px(Axis::X, &state.vp),
                y.to_px(Axis::Y, &state.vp),
            ));
            state.use_stack.push(href.clone());
            let result = render_element(referenced, state, target, true);
            state.use_stack.pop();
            state.transform = saved;
            result
        }

        ElementKind::Path { .. }
        | ElementKind::Rect { .. }
        | ElementKind::Circle { .. }
        | ElementKind::Ellipse { .. }
        | ElementKind::Line { .. }
        | ElementKind::Polyline { .. }
        | ElementKind::Polygon { .. } => render_shape(el, state, target),

        // Definitions render nothing and are only reached by reference.
        ElementKind::LinearGradient(_)
        | ElementKind::RadialGradient(_)
        | ElementKind::Filter(_)
        | ElementKind::Unknown { container: false } => Ok(()),
    }
}

fn render_children(
    el: &Element,
    state: &mut RenderState<'_>,
    target: &mut CanvasTarget,
) -> VektaResult<()> {
    for child in &el.children {
        render_element(child, state, target, true)?;
    }
    Ok(())
}

fn render_shape(
    el: &Element,
    state: &mut RenderState<'_>,
    target: &mut CanvasTarget,
) -> VektaResult<()> {
    let Some(path) = shape_path(&el.kind, &state.vp) else {
        return Ok(());
    };
    let user_bounds = path.bounding_box();

    // Invisible shapes are not drawn, but inside a use expansion they still
    // count toward the referencing element's extent.
    let visible = state.styles.visible();
    if visible || !state.use_stack.is_empty() {
        // A stroke paints half its width outside the fill geometry; grow the
        // tracked extent so filter regions cover it.
        let mut tracked = user_bounds;
        if !matches!(state.styles.stroke(), Paint::None) {
            let half = state.styles.stroke_width().to_px(Axis::Omni, &state.vp).max(0.0) / 2.0;
            tracked = tracked.inflate(half, half);
        }
        state.device_bounds.union_rect(state.transform, tracked);
    }
    if !visible {
        return Ok(());
    }

    let cpu_path = bezpath_to_cpu(&path);

    if let Some(paint) = prepare_paint(&state.styles.fill(), state, user_bounds)? {
        draw_path(target, state, &cpu_path, paint, state.styles.fill_opacity(), None);
    }

    let stroke = state.styles.stroke();
    if !matches!(stroke, Paint::None) {
        let width = state.styles.stroke_width().to_px(Axis::Omni, &state.vp);
        if width > 0.0
            && let Some(paint) = prepare_paint(&stroke, state, user_bounds)?
        {
            draw_path(
                target,
                state,
                &cpu_path,
                paint,
                state.styles.stroke_opacity(),
                Some(width),
            );
        }
    }
    Ok(())
}

fn draw_path(
    target: &mut CanvasTarget,
    state: &RenderState<'_>,
    path: &vello_cpu::kurbo::BezPath,
    paint: ResolvedPaint,
    opacity: f32,
    stroke_width: Option<f64>,
) {
    target.ctx.set_transform(affine_to_cpu(state.transform));
    match paint {
        ResolvedPaint::Solid(color) => {
            target
                .ctx
                .set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
            target.ctx.set_paint(color);
        }
        ResolvedPaint::Gradient {
            gradient,
            transform,
        } => {
            // Paint space follows the object transform; only the gradient's
            // own mapping remains to be applied.
            target.ctx.set_paint_transform(affine_to_cpu(transform));
            target.ctx.set_paint(gradient);
        }
    }

    if opacity < 1.0 {
        target.ctx.push_opacity_layer(opacity);
    }
    match stroke_width {
        None => target.ctx.fill_path(path),
        Some(width) => {
            target.ctx.set_stroke(vello_cpu::kurbo::Stroke::new(width));
            target.ctx.stroke_path(path);
        }
    }
    if opacity < 1.0 {
        target.ctx.pop_layer();
    }
    target.pending = true;
}

/// Turn a fill or stroke value into a backend paint. `Ok(None)` means the
/// shape is not painted with this value.
fn prepare_paint(
    paint: &Paint,
    state: &RenderState<'_>,
    user_bounds: Rect,
) -> VektaResult<Option<ResolvedPaint>> {
    match paint {
        Paint::None => Ok(None),
        Paint::Color(c) => {
            if c.a == 0 {
                return Ok(None);
            }
            Ok(Some(ResolvedPaint::Solid(
                vello_cpu::peniko::Color::from_rgba8(c.r, c.g, c.b, c.a),
            )))
        }
        Paint::Reference(id) => {
            let Some(gradient) = resolve_gradient(state.doc, id) else {
                tracing::warn!(id = %id, "paint reference did not resolve; skipping paint");
                return Ok(None);
            };
            Ok(gradient.to_paint(user_bounds, &state.vp))
        }
    }
}

/// Apply the referenced filter to `el`: render the subtree isolated, run the
/// primitives over the affected region, composite the patch back.
fn apply_filter_chain(
    el: &Element,
    filter_id: &str,
    state: &mut RenderState<'_>,
    target: &mut CanvasTarget,
) -> VektaResult<()> {
    let filter = match state.doc.find(filter_id).map(|e| &e.kind) {
        Some(ElementKind::Filter(f)) => f.clone(),
        _ => {
            tracing::warn!(
                filter = filter_id,
                "filter reference did not resolve; rendering unfiltered"
            );
            return dispatch(el, state, target, false);
        }
    };

    // Bring the canvas up to date: BackgroundImage reads it, and the patch
    // composites over it.
    target.flush()?;
    let width = target.surface.width();
    let height = target.surface.height();

    // Isolated sub-render with its own bounds scope.
    let saved_bounds = std::mem::replace(&mut state.device_bounds, DeviceBounds::EMPTY);
    let mut source = CanvasTarget::new(width, height)?;
    let rendered = dispatch(el, state, &mut source, false);
    let source_bounds = state.device_bounds;
    state.device_bounds = saved_bounds;
    state.device_bounds.union(&source_bounds);
    rendered?;
    source.flush()?;

    // Deviations are user-space lengths; scale them into device pixels.
    let (scale_x, scale_y) = transform_scale(state.transform);
    let mut margin = (0u32, 0u32);
    let mut passes = Vec::with_capacity(filter.primitives.len());
    for primitive in &filter.primitives {
        match primitive {
            FilterPrimitive::GaussianBlur {
                std_deviation,
                input,
            } => {
                // A deviation length has no defined axis: percentages resolve
                // against the viewport diagonal on both axes.
                let sx = (std_deviation.0.to_px(Axis::Omni, &state.vp) * scale_x).max(0.0);
                let sy = (std_deviation.1.to_px(Axis::Omni, &state.vp) * scale_y).max(0.0);
                margin.0 += box_diameter(sx);
                margin.1 += box_diameter(sy);
                passes.push((sx, sy, *input));
            }
        }
    }

    let Some(region) = filter_region(&source_bounds, margin, width, height) else {
        return Ok(());
    };
    // filter_region clamps to the canvas, so the origin casts are lossless.
    let mut patch = source.surface.copy_region(
        region.x as u32,
        region.y as u32,
        region.width,
        region.height,
    )?;

    for (sx, sy, input) in passes {
        if input == FilterInput::BackgroundImage {
            patch = target.surface.copy_region(
                region.x as u32,
                region.y as u32,
                region.width,
                region.height,
            )?;
        }
        blur_patch(&mut patch, sx, sy);
    }

    target
        .surface
        .blit_over(&patch, i64::from(region.x), i64::from(region.y))
}

/// Blur a filter patch in place. A refused blur (format mismatch) degrades
/// to compositing the patch unblurred rather than failing the render.
fn blur_patch(patch: &mut Surface, std_dev_x: f64, std_dev_y: f64) {
    if let Err(err) = gaussian_blur(patch, std_dev_x, std_dev_y) {
        tracing::warn!(%err, "blur skipped; compositing unblurred");
    }
}

/// Per-axis scale factors of an affine, ignoring translation.
fn transform_scale(a: Affine) -> (f64, f64) {
    let c = a.as_coeffs();
    (c[0].hypot(c[1]), c[2].hypot(c[3]))
}

/// The outline of a shape element in user space. `None` for degenerate
/// geometry that renders nothing.
fn shape_path(kind: &ElementKind, vp: &Viewport) -> Option<BezPath> {
    match kind {
        ElementKind::Path { data } => Some(data.clone()),

        ElementKind::Rect {
            x,
            y,
            width,
            height,
            rx,
            ry,
        } => {
            let w = width.to_px(Axis::X, vp);
            let h = height.to_px(Axis::Y, vp);
            if w <= 0.0 || h <= 0.0 {
                return None;
            }
            let x = x.to_px(Axis::X, vp);
            let y = y.to_px(Axis::Y, vp);

            // A missing radius mirrors the other; both clamp to half the side.
            let rx_px = rx.map(|l| l.to_px(Axis::X, vp));
            let ry_px = ry.map(|l| l.to_px(Axis::Y, vp));
            let rx = rx_px.or(ry_px).unwrap_or(0.0).clamp(0.0, w / 2.0);
            let ry = ry_px.or(rx_px).unwrap_or(0.0).clamp(0.0, h / 2.0);

            if rx > 0.0 && ry > 0.0 {
                Some(rounded_rect_path(x, y, w, h, rx, ry))
            } else {
                Some(Rect::new(x, y, x + w, y + h).to_path(0.1))
            }
        }

        ElementKind::Circle { cx, cy, r } => {
            let r = r.to_px(Axis::Omni, vp);
            if r <= 0.0 {
                return None;
            }
            let center = (cx.to_px(Axis::X, vp), cy.to_px(Axis::Y, vp));
            Some(Circle::new(center, r).to_path(0.1))
        }

        ElementKind::Ellipse { cx, cy, rx, ry } => {
            let rx = rx.to_px(Axis::X, vp);
            let ry = ry.to_px(Axis::Y, vp);
            if rx <= 0.0 || ry <= 0.0 {
                return None;
            }
            let center = (cx.to_px(Axis::X, vp), cy.to_px(Axis::Y, vp));
            Some(Ellipse::new(center, (rx, ry), 0.0).to_path(0.1))
        }

        ElementKind::Line { x1, y1, x2, y2 } => {
            let mut p = BezPath::new();
            p.move_to((x1.to_px(Axis::X, vp), y1.to_px(Axis::Y, vp)));
            p.line_to((x2.to_px(Axis::X, vp), y2.to_px(Axis::Y, vp)));
            Some(p)
        }

        ElementKind::Polyline { points } | ElementKind::Polygon { points } => {
            let (first, rest) = points.split_first()?;
            if rest.is_empty() {
                return None;
            }
            let mut p = BezPath::new();
            p.move_to(*first);
            for pt in rest {
                p.line_to(*pt);
            }
            if matches!(kind, ElementKind::Polygon { .. }) {
                p.close_path();
            }
            Some(p)
        }

        _ => None,
    }
}

/// Axis-aligned rectangle with elliptical corners, built from cubic
/// quarter-arc approximations.
fn rounded_rect_path(x: f64, y: f64, w: f64, h: f64, rx: f64, ry: f64) -> BezPath {
    const K: f64 = 0.552_284_749_830_793_4;
    let (kx, ky) = (rx * K, ry * K);
    let (x1, y1) = (x + w, y + h);

    let mut p = BezPath::new();
    p.move_to((x + rx, y));
    p.line_to((x1 - rx, y));
    p.curve_to((x1 - rx + kx, y), (x1, y + ry - ky), (x1, y + ry));
    p.line_to((x1, y1 - ry));
    p.curve_to((x1, y1 - ry + ky), (x1 - rx + kx, y1), (x1 - rx, y1));
    p.line_to((x + rx, y1));
    p.curve_to((x + rx - kx, y1), (x, y1 - ry + ky), (x, y1 - ry));
    p.line_to((x, y + ry));
    p.curve_to((x, y + ry - ky), (x + rx - kx, y), (x + rx, y));
    p.close_path();
    p
}

fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

fn point_to_cpu(p: kurbo::Point) -> vello_cpu::kurbo::Point {
    vello_cpu::kurbo::Point::new(p.x, p.y)
}

fn bezpath_to_cpu(path: &BezPath) -> vello_cpu::kurbo::BezPath {
    use kurbo::PathEl;

    let mut out = vello_cpu::kurbo::BezPath::new();
    for &el in path.elements() {
        match el {
            PathEl::MoveTo(p) => out.move_to(point_to_cpu(p)),
            PathEl::LineTo(p) => out.line_to(point_to_cpu(p)),
            PathEl::QuadTo(p1, p2) => out.quad_to(point_to_cpu(p1), point_to_cpu(p2)),
            PathEl::CurveTo(p1, p2, p3) => {
                out.curve_to(point_to_cpu(p1), point_to_cpu(p2), point_to_cpu(p3));
            }
            PathEl::ClosePath => out.close_path(),
        }
    }
    out
}
