// crates/demoforge-core/src/transitions/wipe.rs
//
// Left-to-right wipe: a vertical bar sweeps across the frame, revealing
// frame_b behind it. A small feather gives an anti-aliased edge instead of
// a hard-aliased seam.

use super::helpers::{blend_byte, ease_in_out, norm_x, split_planes};
use super::VideoTransition;
use crate::timeline::TransitionKind;

const FEATHER: f32 = 0.02;

pub struct Wipe;

impl VideoTransition for Wipe {
    fn kind(&self) -> TransitionKind {
        TransitionKind::Wipe
    }

    fn label(&self) -> &'static str {
        "Wipe"
    }

    fn apply(&self, frame_a: &[u8], frame_b: &[u8], width: u32, height: u32, alpha: f32) -> Vec<u8> {
        debug_assert_eq!(frame_a.len(), frame_b.len(), "Wipe::apply — frame size mismatch");

        let edge = ease_in_out(alpha);
        let (ay, au, av) = split_planes(frame_a, width, height);
        let (by, bu, bv) = split_planes(frame_b, width, height);

        let mut out = Vec::with_capacity(frame_a.len());
        blend_plane(ay, by, width, height, edge, &mut out);

        let uw = width / 2;
        let uh = height / 2;
        blend_plane(au, bu, uw, uh, edge, &mut out);
        blend_plane(av, bv, uw, uh, edge, &mut out);

        out
    }
}

fn blend_plane(a: &[u8], b: &[u8], w: u32, h: u32, edge: f32, out: &mut Vec<u8>) {
    for py in 0..h {
        for px in 0..w {
            let nx = norm_x(px, w);
            let wa = super::helpers::wipe_alpha(nx, edge, FEATHER);
            let idx = (py * w + px) as usize;
            out.push(blend_byte(b[idx], a[idx], wa));
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
    fn alpha_zero_is_all_frame_a() {
        let (w, h) = (8_u32, 4_u32);
        let a = yuv_frame(200, 100, w, h);
        let b = yuv_frame(50, 128, w, h);
        let out = Wipe.apply(&a, &b, w, h, 0.0);
        assert!(out[..y_len(w, h)].iter().all(|&v| v == 200));
    }

    #[test]
    fn alpha_one_is_all_frame_b() {
        let (w, h) = (8_u32, 4_u32);
        let a = yuv_frame(200, 100, w, h);
        let b = yuv_frame(50, 128, w, h);
        let out = Wipe.apply(&a, &b, w, h, 1.0);
        assert!(out[..y_len(w, h)].iter().all(|&v| v == 50));
    }

    #[test]
    fn half_alpha_splits_left_right() {
        let (w, h) = (8_u32, 4_u32);
        let a = yuv_frame(200, 100, w, h);
        let b = yuv_frame(50, 128, w, h);
        let out = Wipe.apply(&a, &b, w, h, 0.5);
        assert_eq!(out[0], 50);
        assert_eq!(out[7], 200);
    }
}
