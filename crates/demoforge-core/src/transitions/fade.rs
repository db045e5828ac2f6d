// crates/demoforge-core/src/transitions/fade.rs
//
// Linear dissolve. Blend runs in gamma-encoded byte space — a correct
// approximation for SDR content, see `helpers::blend_byte`. Smooth-step
// easing is applied before blending so the midpoint doesn't read "muddy".

use super::helpers::{blend_byte, ease_in_out};
use super::VideoTransition;
use crate::timeline::TransitionKind;

pub struct Fade;

impl VideoTransition for Fade {
    fn kind(&self) -> TransitionKind {
        TransitionKind::Fade
    }

    fn label(&self) -> &'static str {
        "Fade"
    }

    fn apply(&self, frame_a: &[u8], frame_b: &[u8], _width: u32, _height: u32, alpha: f32) -> Vec<u8> {
        debug_assert_eq!(frame_a.len(), frame_b.len(), "Fade::apply — frame size mismatch");
        let eased = ease_in_out(alpha);
        frame_a
            .iter()
            .zip(frame_b.iter())
            .map(|(&a, &b)| blend_byte(a, b, eased))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(value: u8, len: usize) -> Vec<u8> {
        vec![value; len]
    }

    #[test]
    fn alpha_zero_returns_frame_a() {
        let out = Fade.apply(&frame(100, 12), &frame(200, 12), 4, 3, 0.0);
        assert!(out.iter().all(|&v| v == 100));
    }

    #[test]
    fn alpha_one_returns_frame_b() {
        let out = Fade.apply(&frame(100, 12), &frame(200, 12), 4, 3, 1.0);
        assert!(out.iter().all(|&v| v == 200));
    }

    #[test]
    fn midpoint_is_symmetric() {
        let out = Fade.apply(&frame(0, 12), &frame(200, 12), 4, 3, 0.5);
        assert!(out.iter().all(|&v| v == 100));
    }
}
