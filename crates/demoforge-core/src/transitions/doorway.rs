// crates/demoforge-core/src/transitions/doorway.rs
//
// frame_a splits into two halves that swing open toward the left and right
// edges like double doors, revealing frame_b filling the frame behind them.
// The split seam stays at the horizontal center throughout.

use super::helpers::{ease_in_out_cubic, norm_x, split_planes};
use super::VideoTransition;
use crate::timeline::TransitionKind;

pub struct Doorway;

impl VideoTransition for Doorway {
    fn kind(&self) -> TransitionKind {
        TransitionKind::Doorway
    }

    fn label(&self) -> &'static str {
        "Doorway"
    }

    fn apply(&self, frame_a: &[u8], frame_b: &[u8], width: u32, height: u32, alpha: f32) -> Vec<u8> {
        debug_assert_eq!(frame_a.len(), frame_b.len(), "Doorway::apply — frame size mismatch");

        let p = ease_in_out_cubic(alpha);
        let (ay, au, av) = split_planes(frame_a, width, height);
        let (by, bu, bv) = split_planes(frame_b, width, height);

        let mut out = Vec::with_capacity(frame_a.len());
        doorway_plane(ay, by, width, height, p, &mut out);
        let (uw, uh) = (width / 2, height / 2);
        doorway_plane(au, bu, uw, uh, p, &mut out);
        doorway_plane(av, bv, uw, uh, p, &mut out);
        out
    }
}

/// Each door half has receded by `p * w/2` pixels toward its own edge by the
/// time the transition completes; the gap in between shows frame_b.
fn doorway_plane(a: &[u8], b: &[u8], w: u32, h: u32, p: f32, out: &mut Vec<u8>) {
    let half = w as f32 / 2.0;
    let recede = p * half;

    for py in 0..h {
        for px in 0..w {
            let nx = norm_x(px, w) * w as f32;
            let in_left_door = nx < half && nx >= recede;
            let in_right_door = nx >= half && nx < w as f32 - recede;

            let idx = (py * w + px) as usize;
            if in_left_door {
                let src_x = (nx - recede).min(half - 1.0).max(0.0) as u32;
                out.push(a[(py * w + src_x) as usize]);
            } else if in_right_door {
                let src_x = (nx + recede).min(w as f32 - 1.0) as u32;
                out.push(a[(py * w + src_x) as usize]);
            } else {
                out.push(b[idx]);
            }
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
        let out = Doorway.apply(&a, &b, w, h, 0.0);
        assert!(out[..y_len(w, h)].iter().all(|&v| v == 200));
    }

    #[test]
    fn alpha_one_is_all_frame_b() {
        let (w, h) = (8_u32, 4_u32);
        let a = yuv_frame(200, 100, w, h);
        let b = yuv_frame(50, 128, w, h);
        let out = Doorway.apply(&a, &b, w, h, 1.0);
        assert!(out[..y_len(w, h)].iter().all(|&v| v == 50));
    }

    #[test]
    fn output_length_matches_input() {
        let (w, h) = (8_u32, 4_u32);
        let a = yuv_frame(100, 128, w, h);
        let b = yuv_frame(200, 128, w, h);
        assert_eq!(Doorway.apply(&a, &b, w, h, 0.5).len(), a.len());
    }
}
