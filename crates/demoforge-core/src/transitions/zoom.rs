// crates/demoforge-core/src/transitions/zoom.rs
//
// frame_a scales up and fades out while frame_b scales in from a point,
// both about the frame center. Nearest-neighbour sampling keeps the cost
// proportional to output size; this runs once per transition output frame,
// not in a tight encode loop.

use super::helpers::{blend_byte, ease_in_out_cubic, norm_x, norm_y, split_planes};
use super::VideoTransition;
use crate::timeline::TransitionKind;

/// How far frame_a scales up before fully faded out.
const MAX_SCALE_OUT: f32 = 1.4;
/// How far frame_b starts scaled down before settling to 1.0.
const MIN_SCALE_IN: f32 = 0.7;

pub struct Zoom;

fn sample_scaled(plane: &[u8], w: u32, h: u32, nx: f32, ny: f32, scale: f32) -> u8 {
    let sx = ((nx - 0.5) / scale + 0.5).clamp(0.0, 0.999_999);
    let sy = ((ny - 0.5) / scale + 0.5).clamp(0.0, 0.999_999);
    let px = (sx * w as f32) as u32;
    let py = (sy * h as f32) as u32;
    plane[(py.min(h - 1) * w + px.min(w - 1)) as usize]
}

impl VideoTransition for Zoom {
    fn kind(&self) -> TransitionKind {
        TransitionKind::Zoom
    }

    fn label(&self) -> &'static str {
        "Zoom"
    }

    fn apply(&self, frame_a: &[u8], frame_b: &[u8], width: u32, height: u32, alpha: f32) -> Vec<u8> {
        debug_assert_eq!(frame_a.len(), frame_b.len(), "Zoom::apply — frame size mismatch");

        let p = ease_in_out_cubic(alpha);
        let scale_a = 1.0 + (MAX_SCALE_OUT - 1.0) * p;
        let scale_b = MIN_SCALE_IN + (1.0 - MIN_SCALE_IN) * p;

        let (ay, au, av) = split_planes(frame_a, width, height);
        let (by, bu, bv) = split_planes(frame_b, width, height);

        let mut out = Vec::with_capacity(frame_a.len());
        zoom_plane(ay, by, width, height, scale_a, scale_b, p, &mut out);
        let (uw, uh) = (width / 2, height / 2);
        zoom_plane(au, bu, uw, uh, scale_a, scale_b, p, &mut out);
        zoom_plane(av, bv, uw, uh, scale_a, scale_b, p, &mut out);
        out
    }
}

fn zoom_plane(a: &[u8], b: &[u8], w: u32, h: u32, scale_a: f32, scale_b: f32, p: f32, out: &mut Vec<u8>) {
    for py in 0..h {
        for px in 0..w {
            let nx = norm_x(px, w);
            let ny = norm_y(py, h);
            let va = sample_scaled(a, w, h, nx, ny, scale_a);
            let vb = sample_scaled(b, w, h, nx, ny, scale_b);
            out.push(blend_byte(va, vb, p));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::helpers::{uv_len, y_len};

    fn yuv_frame(y_val: u8, uv_val: u8, w: u32, h: u32) -> Vec<u8> {
        let mut buf = vec![y_val; y_len(w, h)];
        buf.extend(vec![uv_val; uv_len(w, h) * 2]);
        buf
    }

    #[test]
    fn alpha_zero_returns_frame_a() {
        let (w, h) = (8_u32, 4_u32);
        let a = yuv_frame(200, 100, w, h);
        let b = yuv_frame(50, 128, w, h);
        let out = Zoom.apply(&a, &b, w, h, 0.0);
        assert!(out[..y_len(w, h)].iter().all(|&v| v == 200));
    }

    #[test]
    fn alpha_one_returns_frame_b() {
        let (w, h) = (8_u32, 4_u32);
        let a = yuv_frame(200, 100, w, h);
        let b = yuv_frame(50, 128, w, h);
        let out = Zoom.apply(&a, &b, w, h, 1.0);
        assert!(out[..y_len(w, h)].iter().all(|&v| v == 50));
    }

    #[test]
    fn output_length_matches_input() {
        let (w, h) = (8_u32, 4_u32);
        let a = yuv_frame(100, 128, w, h);
        let b = yuv_frame(200, 128, w, h);
        assert_eq!(Zoom.apply(&a, &b, w, h, 0.5).len(), a.len());
    }
}
