use crate::error::{VektaError, VektaResult};

/// Pixel layout of a [`Surface`]. Four bytes per pixel in both cases.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PixelFormat {
    /// RGBA, color channels pre-scaled by alpha. The working format of the
    /// renderer; the only format the blur filter accepts.
    #[default]
    Rgba8Premul,
    /// RGBA with straight (unassociated) alpha, for presentation/export.
    Rgba8,
}

/// An owned pixel buffer: `stride >= width`, `data.len() == stride * height * 4`.
#[derive(Clone, Debug, PartialEq)]
pub struct Surface {
    width: u32,
    height: u32,
    stride: u32,
    format: PixelFormat,
    data: Vec<u8>,
}

impl Surface {
    /// A transparent premultiplied surface with a tight stride.
    pub fn new(width: u32, height: u32) -> VektaResult<Self> {
        Self::with_stride(width, height, width)
    }

    /// A transparent premultiplied surface with an explicit row stride
    /// (in pixels).
    pub fn with_stride(width: u32, height: u32, stride: u32) -> VektaResult<Self> {
        if stride < width {
            return Err(VektaError::validation("surface stride must be >= width"));
        }
        let len = (stride as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(4))
            .ok_or_else(|| VektaError::validation("surface size overflow"))?;
        Ok(Self {
            width,
            height,
            stride,
            format: PixelFormat::Rgba8Premul,
            data: vec![0u8; len],
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row stride in pixels.
    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn fill(&mut self, rgba: [u8; 4]) {
        for px in self.data.chunks_exact_mut(4) {
            px.copy_from_slice(&rgba);
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let idx = ((y as usize) * (self.stride as usize) + (x as usize)) * 4;
        [
            self.data[idx],
            self.data[idx + 1],
            self.data[idx + 2],
            self.data[idx + 3],
        ]
    }

    /// Copy out a rectangular region, clamped to the surface bounds.
    /// The copy has a tight stride.
    pub fn copy_region(&self, x: u32, y: u32, width: u32, height: u32) -> VektaResult<Surface> {
        let x = x.min(self.width);
        let y = y.min(self.height);
        let w = width.min(self.width - x);
        let h = height.min(self.height - y);
        let mut out = Surface::with_stride(w, h, w)?;
        out.format = self.format;
        for row in 0..h {
            let src_start = (((y + row) as usize) * (self.stride as usize) + x as usize) * 4;
            let dst_start = (row as usize) * (w as usize) * 4;
            let n = (w as usize) * 4;
            out.data[dst_start..dst_start + n]
                .copy_from_slice(&self.data[src_start..src_start + n]);
        }
        Ok(out)
    }

    /// Composite `src` over `self` with its top-left corner at `(x, y)`,
    /// clipping to this surface. Both surfaces must be premultiplied.
    pub fn blit_over(&mut self, src: &Surface, x: i64, y: i64) -> VektaResult<()> {
        if self.format != PixelFormat::Rgba8Premul || src.format != PixelFormat::Rgba8Premul {
            return Err(VektaError::format(
                "blit_over expects premultiplied rgba8 surfaces",
            ));
        }
        for sy in 0..src.height as i64 {
            let dy = y + sy;
            if dy < 0 || dy >= self.height as i64 {
                continue;
            }
            for sx in 0..src.width as i64 {
                let dx = x + sx;
                if dx < 0 || dx >= self.width as i64 {
                    continue;
                }
                let s = src.pixel(sx as u32, sy as u32);
                let idx = ((dy as usize) * (self.stride as usize) + dx as usize) * 4;
                let d = [
                    self.data[idx],
                    self.data[idx + 1],
                    self.data[idx + 2],
                    self.data[idx + 3],
                ];
                self.data[idx..idx + 4].copy_from_slice(&over(d, s, 1.0));
            }
        }
        Ok(())
    }

    /// Convert in place to straight alpha for presentation. No-op when the
    /// surface already is straight rgba.
    pub fn unpremultiply(&mut self) {
        if self.format == PixelFormat::Rgba8 {
            return;
        }
        for px in self.data.chunks_exact_mut(4) {
            let a = px[3] as u32;
            if a == 0 {
                px[0] = 0;
                px[1] = 0;
                px[2] = 0;
                continue;
            }
            for c in &mut px[..3] {
                *c = (((*c as u32) * 255 + a / 2) / a).min(255) as u8;
            }
        }
        self.format = PixelFormat::Rgba8;
    }
}

pub type PremulRgba8 = [u8; 4];

/// Premultiplied source-over with an extra scalar opacity on the source.
pub fn over(dst: PremulRgba8, src: PremulRgba8, opacity: f32) -> PremulRgba8 {
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 || src[3] == 0 {
        return dst;
    }

    let op = ((opacity * 255.0).round() as i32).clamp(0, 255) as u16;
    let sa = mul_div255(u16::from(src[3]), op);
    if sa == 0 {
        return dst;
    }

    let inv = 255u16 - u16::from(sa);

    let mut out = [0u8; 4];
    out[3] = add_sat_u8(sa, mul_div255(u16::from(dst[3]), inv));

    for i in 0..3 {
        let sc = mul_div255(u16::from(src[i]), op);
        let dc = mul_div255(u16::from(dst[i]), inv);
        out[i] = add_sat_u8(sc, dc);
    }
    out
}

/// Composite equal-sized premultiplied buffers: `src` over `dst` in place.
pub fn over_in_place(dst: &mut [u8], src: &[u8], opacity: f32) -> VektaResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(VektaError::render(
            "over_in_place expects equal-length rgba8 buffers",
        ));
    }
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let out = over([d[0], d[1], d[2], d[3]], [s[0], s[1], s[2], s[3]], opacity);
        d.copy_from_slice(&out);
    }
    Ok(())
}

/// Scale straight rgba into premultiplied form.
pub fn premul_rgba8(rgba: [u8; 4]) -> [u8; 4] {
    let [r, g, b, a] = rgba;
    let a16 = u16::from(a);
    let premul = |c: u8| -> u8 { (((u16::from(c) * a16) + 127) / 255) as u8 };
    [premul(r), premul(g), premul(b), a]
}

fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}

fn add_sat_u8(a: u8, b: u8) -> u8 {
    a.saturating_add(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surface_invariants() {
        let s = Surface::with_stride(3, 2, 5).unwrap();
        assert_eq!(s.data().len(), 5 * 2 * 4);
        assert!(Surface::with_stride(3, 2, 2).is_err());
    }

    #[test]
    fn over_opacity_0_is_noop() {
        let dst = [1, 2, 3, 4];
        let src = [200, 200, 200, 200];
        assert_eq!(over(dst, src, 0.0), dst);
    }

    #[test]
    fn over_src_opaque_replaces_dst() {
        let dst = [0, 0, 0, 255];
        let src = [255, 0, 0, 255];
        assert_eq!(over(dst, src, 1.0), src);
    }

    #[test]
    fn over_dst_transparent_returns_scaled_src() {
        let dst = [0, 0, 0, 0];
        let src = [100, 110, 120, 200];
        assert_eq!(over(dst, src, 1.0), src);
    }

    #[test]
    fn blit_over_clips_and_offsets() {
        let mut dst = Surface::new(4, 4).unwrap();
        let mut src = Surface::new(2, 2).unwrap();
        src.fill([255, 0, 0, 255]);

        dst.blit_over(&src, 3, 3).unwrap();
        assert_eq!(dst.pixel(3, 3), [255, 0, 0, 255]);
        assert_eq!(dst.pixel(2, 2), [0, 0, 0, 0]);
        // Negative offsets clip too.
        dst.blit_over(&src, -1, -1).unwrap();
        assert_eq!(dst.pixel(0, 0), [255, 0, 0, 255]);
        assert_eq!(dst.pixel(1, 1), [0, 0, 0, 0]);
    }

    #[test]
    fn copy_region_respects_stride() {
        let mut s = Surface::with_stride(4, 3, 6).unwrap();
        let idx = ((1 * 6) + 2) * 4;
        s.data_mut()[idx..idx + 4].copy_from_slice(&[9, 8, 7, 255]);

        let r = s.copy_region(2, 1, 2, 2).unwrap();
        assert_eq!(r.width(), 2);
        assert_eq!(r.height(), 2);
        assert_eq!(r.pixel(0, 0), [9, 8, 7, 255]);
    }

    #[test]
    fn unpremultiply_round_trips_opaque() {
        let mut s = Surface::new(1, 1).unwrap();
        s.fill(premul_rgba8([10, 20, 30, 255]));
        s.unpremultiply();
        assert_eq!(s.format(), PixelFormat::Rgba8);
        assert_eq!(s.pixel(0, 0), [10, 20, 30, 255]);
    }
}
