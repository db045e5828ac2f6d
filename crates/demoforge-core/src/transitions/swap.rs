// crates/demoforge-core/src/transitions/swap.rs
//
// frame_a collapses horizontally toward the center line while frame_b sits
// as a full-size backdrop throughout, so the incoming clip is "already
// there" the moment the outgoing one thins away to nothing.

use super::helpers::{blend_byte, clamp01, ease_in_out_cubic, norm_x, norm_y, split_planes};
use super::VideoTransition;
use crate::timeline::TransitionKind;

/// Floor for the horizontal scale factor — avoids a division by zero as
/// frame_a collapses to a zero-width sliver.
const MIN_SCALE: f32 = 0.001;

pub struct Swap;

fn sample_collapsed(plane: &[u8], w: u32, h: u32, nx: f32, ny: f32, scale_x: f32) -> u8 {
    let scale_x = scale_x.max(MIN_SCALE);
    let sx = clamp01((nx - 0.5) / scale_x + 0.5);
    let px = ((sx * w as f32) as u32).min(w - 1);
    let py = ((ny * h as f32) as u32).min(h - 1);
    plane[(py * w + px) as usize]
}

impl VideoTransition for Swap {
    fn kind(&self) -> TransitionKind {
        TransitionKind::Swap
    }

    fn label(&self) -> &'static str {
        "Swap"
    }

    fn apply(&self, frame_a: &[u8], frame_b: &[u8], width: u32, height: u32, alpha: f32) -> Vec<u8> {
        debug_assert_eq!(frame_a.len(), frame_b.len(), "Swap::apply — frame size mismatch");

        let p = ease_in_out_cubic(alpha);
        let scale_x = 1.0 - p;
        let visibility = scale_x;

        let (ay, au, av) = split_planes(frame_a, width, height);
        let (by, bu, bv) = split_planes(frame_b, width, height);

        let mut out = Vec::with_capacity(frame_a.len());
        swap_plane(ay, by, width, height, scale_x, visibility, &mut out);
        let (uw, uh) = (width / 2, height / 2);
        swap_plane(au, bu, uw, uh, scale_x, visibility, &mut out);
        swap_plane(av, bv, uw, uh, scale_x, visibility, &mut out);
        out
    }
}

fn swap_plane(a: &[u8], b: &[u8], w: u32, h: u32, scale_x: f32, visibility: f32, out: &mut Vec<u8>) {
    for py in 0..h {
        for px in 0..w {
            let nx = norm_x(px, w);
            let ny = norm_y(py, h);
            let idx = (py * w + px) as usize;
            let va = sample_collapsed(a, w, h, nx, ny, scale_x);
            out.push(blend_byte(b[idx], va, visibility));
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
        let out = Swap.apply(&a, &b, w, h, 0.0);
        assert!(out[..y_len(w, h)].iter().all(|&v| v == 200));
    }

    #[test]
    fn alpha_one_returns_frame_b() {
        let (w, h) = (8_u32, 4_u32);
        let a = yuv_frame(200, 100, w, h);
        let b = yuv_frame(50, 128, w, h);
        let out = Swap.apply(&a, &b, w, h, 1.0);
        assert!(out[..y_len(w, h)].iter().all(|&v| v == 50));
    }

    #[test]
    fn output_length_matches_input() {
        let (w, h) = (8_u32, 4_u32);
        let a = yuv_frame(100, 128, w, h);
        let b = yuv_frame(200, 128, w, h);
        assert_eq!(Swap.apply(&a, &b, w, h, 0.5).len(), a.len());
    }
}
