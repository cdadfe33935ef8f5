//! Triple-box-blur approximation of a Gaussian blur, operating in place on a
//! premultiplied RGBA8 [`Surface`].
//!
//! Per the W3C filter-effects approximation: for a standard deviation `s`,
//! three successive box blurs of diameter `d = floor(s * 3 * sqrt(2*pi) / 4 + 0.5)`
//! per axis approximate the true Gaussian. Pixels outside the buffer are
//! treated as copies of the nearest edge pixel.

use crate::error::{VektaError, VektaResult};
use crate::surface::{PixelFormat, Surface};

/// Box diameter for a given standard deviation. Zero means the axis is left
/// untouched.
pub fn box_diameter(std_dev: f64) -> u32 {
    if !std_dev.is_finite() || std_dev <= 0.0 {
        return 0;
    }
    (std_dev * 3.0 * (2.0 * std::f64::consts::PI).sqrt() / 4.0 + 0.5).floor() as u32
}

/// The three (box size, box offset) pairs for one axis.
///
/// Even diameters split the middle pass across the pixel boundary and widen
/// the last pass by one; odd diameters center all three passes.
fn box_passes(d: u32) -> [(u32, u32); 3] {
    if d.is_multiple_of(2) {
        [(d, d / 2), (d, d / 2 + 1), (d + 1, d / 2)]
    } else {
        [(d, d / 2); 3]
    }
}

/// Blur `surface` in place with the given per-axis standard deviations in
/// device pixels.
///
/// The surface must be [`PixelFormat::Rgba8Premul`]; any other format is
/// refused and the buffer is left untouched. All four channels are blurred
/// identically.
pub fn gaussian_blur(surface: &mut Surface, std_dev_x: f64, std_dev_y: f64) -> VektaResult<()> {
    if surface.format() != PixelFormat::Rgba8Premul {
        tracing::warn!(
            format = ?surface.format(),
            "gaussian_blur refused: surface is not premultiplied rgba8"
        );
        return Err(VektaError::format(
            "gaussian_blur requires a premultiplied rgba8 surface",
        ));
    }

    let width = surface.width();
    let height = surface.height();
    let stride = surface.stride();
    if width == 0 || height == 0 {
        return Ok(());
    }

    let dx = box_diameter(std_dev_x);
    let dy = box_diameter(std_dev_y);
    if dx == 0 && dy == 0 {
        return Ok(());
    }

    let mut scratch = vec![0u8; surface.data().len()];
    let data = surface.data_mut();
    let mut flipped = false;

    if dx > 0 {
        for (size, offset) in box_passes(dx) {
            if flipped {
                box_blur_horizontal(&scratch, data, width, height, stride, size, offset);
            } else {
                box_blur_horizontal(data, &mut scratch, width, height, stride, size, offset);
            }
            flipped = !flipped;
        }
    }
    if dy > 0 {
        for (size, offset) in box_passes(dy) {
            if flipped {
                box_blur_vertical(&scratch, data, width, height, stride, size, offset);
            } else {
                box_blur_vertical(data, &mut scratch, width, height, stride, size, offset);
            }
            flipped = !flipped;
        }
    }

    if flipped {
        data.copy_from_slice(&scratch);
    }
    Ok(())
}

fn box_blur_horizontal(
    src: &[u8],
    dst: &mut [u8],
    width: u32,
    height: u32,
    stride: u32,
    box_size: u32,
    box_offset: u32,
) {
    debug_assert!(box_size > 0);
    let w = width as i32;
    let off = box_offset as i32;
    for y in 0..height {
        let row = (y as usize) * (stride as usize) * 4;
        let mut sum = [0u32; 4];
        for i in 0..box_size as i32 {
            let pos = (i - off).clamp(0, w - 1) as usize;
            for c in 0..4 {
                sum[c] += u32::from(src[row + pos * 4 + c]);
            }
        }
        for x in 0..w {
            let last = (x - off).max(0) as usize;
            let next = (x - off + box_size as i32).min(w - 1) as usize;
            let out = row + (x as usize) * 4;
            for c in 0..4 {
                dst[out + c] = (sum[c] / box_size) as u8;
                sum[c] += u32::from(src[row + next * 4 + c]);
                sum[c] -= u32::from(src[row + last * 4 + c]);
            }
        }
    }
}

fn box_blur_vertical(
    src: &[u8],
    dst: &mut [u8],
    width: u32,
    height: u32,
    stride: u32,
    box_size: u32,
    box_offset: u32,
) {
    debug_assert!(box_size > 0);
    let h = height as i32;
    let off = box_offset as i32;
    let stride = stride as usize;
    for x in 0..width as usize {
        let mut sum = [0u32; 4];
        for i in 0..box_size as i32 {
            let pos = (i - off).clamp(0, h - 1) as usize;
            for c in 0..4 {
                sum[c] += u32::from(src[(pos * stride + x) * 4 + c]);
            }
        }
        for y in 0..h {
            let last = (y - off).max(0) as usize;
            let next = (y - off + box_size as i32).min(h - 1) as usize;
            let out = ((y as usize) * stride + x) * 4;
            for c in 0..4 {
                dst[out + c] = (sum[c] / box_size) as u8;
                sum[c] += u32::from(src[(next * stride + x) * 4 + c]);
                sum[c] -= u32::from(src[(last * stride + x) * 4 + c]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_pixel_surface(size: u32, value: [u8; 4]) -> Surface {
        let mut s = Surface::new(size, size).unwrap();
        let center = size / 2;
        let idx = ((center * size + center) as usize) * 4;
        s.data_mut()[idx..idx + 4].copy_from_slice(&value);
        s
    }

    #[test]
    fn diameter_formula() {
        assert_eq!(box_diameter(0.0), 0);
        assert_eq!(box_diameter(-1.0), 0);
        assert_eq!(box_diameter(f64::NAN), 0);
        // 2 * 3 * sqrt(2*pi) / 4 + 0.5 = 4.259..., floor 4
        assert_eq!(box_diameter(2.0), 4);
        assert_eq!(box_diameter(1.5), 3);
    }

    #[test]
    fn pass_parity_rule() {
        assert_eq!(box_passes(4), [(4, 2), (4, 3), (5, 2)]);
        assert_eq!(box_passes(3), [(3, 1), (3, 1), (3, 1)]);
    }

    #[test]
    fn zero_deviation_is_identity() {
        let mut s = single_pixel_surface(5, [255, 255, 255, 255]);
        let before = s.data().to_vec();
        gaussian_blur(&mut s, 0.0, 0.0).unwrap();
        assert_eq!(s.data(), &before[..]);
    }

    #[test]
    fn wrong_format_is_refused_and_untouched() {
        let mut s = single_pixel_surface(5, [255, 255, 255, 255]);
        s.unpremultiply();
        let before = s.data().to_vec();
        let err = gaussian_blur(&mut s, 1.5, 1.5);
        assert!(matches!(err, Err(VektaError::Format(_))));
        assert_eq!(s.data(), &before[..]);
    }

    #[test]
    fn single_pixel_spread_is_symmetric_and_mass_conserving() {
        // sigma 1.5 gives d = 3, odd, so all passes are centered.
        let mut s = single_pixel_surface(11, [243, 243, 243, 243]);
        let before: u32 = s.data().iter().step_by(4).map(|&v| u32::from(v)).sum();
        gaussian_blur(&mut s, 1.5, 1.5).unwrap();

        let after: u32 = s.data().iter().step_by(4).map(|&v| u32::from(v)).sum();
        assert!(before - after <= 8, "mass lost: {before} -> {after}");

        let c = 5u32;
        for k in 1..=4u32 {
            assert_eq!(s.pixel(c - k, c)[3], s.pixel(c + k, c)[3]);
            assert_eq!(s.pixel(c, c - k)[3], s.pixel(c, c + k)[3]);
        }
        assert!(s.pixel(c + 1, c)[3] > 0);
        assert!(s.pixel(c, c)[3] < 243);
    }

    #[test]
    fn horizontal_only_blur_leaves_other_rows_untouched() {
        let mut s = single_pixel_surface(9, [240, 240, 240, 240]);
        gaussian_blur(&mut s, 1.5, 0.0).unwrap();
        let c = 4u32;
        assert!(s.pixel(c + 1, c)[3] > 0);
        assert_eq!(s.pixel(c, c + 1)[3], 0);
    }

    #[test]
    fn constant_image_is_unchanged() {
        let mut s = Surface::new(6, 6).unwrap();
        s.fill([40, 80, 120, 200]);
        gaussian_blur(&mut s, 2.0, 2.0).unwrap();
        // Edge replication keeps every window constant, so the truncating
        // division is exact and the image is unchanged.
        for y in 0..6 {
            for x in 0..6 {
                assert_eq!(s.pixel(x, y), [40, 80, 120, 200]);
            }
        }
    }
}
