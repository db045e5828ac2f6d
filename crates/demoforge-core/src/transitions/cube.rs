// crates/demoforge-core/src/transitions/cube.rs
//
// Approximates a rotating cube face by pushing frame_a off to the left as
// frame_b enters from the right (same boundary math as `slide::SlideLeft`),
// with a row-dependent skew that bulges outward at the transition's midpoint
// and vanishes at both ends — a cheap stand-in for the perspective bow a
// real 3D cube rotation would show, without a 3D pipeline.

use super::helpers::{ease_in_out_cubic, split_planes};
use super::VideoTransition;
use crate::timeline::TransitionKind;

/// Peak skew as a fraction of width, applied at the transition's midpoint.
const BULGE_FRACTION: f32 = 0.08;

pub struct Cube;

impl VideoTransition for Cube {
    fn kind(&self) -> TransitionKind {
        TransitionKind::Cube
    }

    fn label(&self) -> &'static str {
        "Cube"
    }

    fn apply(&self, frame_a: &[u8], frame_b: &[u8], width: u32, height: u32, alpha: f32) -> Vec<u8> {
        debug_assert_eq!(frame_a.len(), frame_b.len(), "Cube::apply — frame size mismatch");

        let p = ease_in_out_cubic(alpha);
        let bulge = 4.0 * p * (1.0 - p); // 0 at p=0/1, peaks at p=0.5

        let (ay, au, av) = split_planes(frame_a, width, height);
        let (by, bu, bv) = split_planes(frame_b, width, height);

        let mut out = Vec::with_capacity(frame_a.len());
        cube_plane(ay, by, width, height, p, bulge, &mut out);
        let (uw, uh) = (width / 2, height / 2);
        cube_plane(au, bu, uw, uh, p, bulge, &mut out);
        cube_plane(av, bv, uw, uh, p, bulge, &mut out);
        out
    }
}

fn cube_plane(a: &[u8], b: &[u8], w: u32, h: u32, p: f32, bulge: f32, out: &mut Vec<u8>) {
    let base_boundary = (1.0 - p) * w as f32;
    let shift_a = p * w as f32;

    for py in 0..h {
        let row_frac = py as f32 / h.max(1) as f32 - 0.5; // [-0.5, 0.5)
        let skew = row_frac * bulge * BULGE_FRACTION * w as f32;
        let boundary = (base_boundary + skew).round().clamp(0.0, w as f32) as u32;
        let shift_a = shift_a.round() as u32;

        for px in 0..w {
            if px < boundary {
                let src_x = (px + shift_a).min(w - 1);
                out.push(a[(py * w + src_x) as usize]);
            } else {
                let src_x = px - boundary;
                out.push(b[(py * w + src_x) as usize]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::helpers::y_len;

    fn gradient_frame(w: u32, h: u32, base: u8) -> Vec<u8> {
        let mut buf = Vec::with_capacity(y_len(w, h));
        for _ in 0..h {
            for px in 0..w {
                buf.push(base.wrapping_add(px as u8));
            }
        }
        buf.extend(vec![128u8; (w / 2 * h / 2) as usize * 2]);
        buf
    }

    #[test]
    fn alpha_zero_is_pure_frame_a() {
        let (w, h) = (16_u32, 8_u32);
        let a = gradient_frame(w, h, 0);
        let b = gradient_frame(w, h, 100);
        let out = Cube.apply(&a, &b, w, h, 0.0);
        assert_eq!(&out[..y_len(w, h)], &a[..y_len(w, h)]);
    }

    #[test]
    fn alpha_one_is_pure_frame_b() {
        let (w, h) = (16_u32, 8_u32);
        let a = gradient_frame(w, h, 0);
        let b = gradient_frame(w, h, 100);
        let out = Cube.apply(&a, &b, w, h, 1.0);
        assert_eq!(&out[..y_len(w, h)], &b[..y_len(w, h)]);
    }

    #[test]
    fn output_length_matches_input() {
        let (w, h) = (16_u32, 8_u32);
        let a = gradient_frame(w, h, 0);
        let b = gradient_frame(w, h, 100);
        assert_eq!(Cube.apply(&a, &b, w, h, 0.5).len(), a.len());
    }
}
