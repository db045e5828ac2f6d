// crates/demoforge-render/src/compositor.rs
//
// Turns one resolved output frame into a packed YUV420P buffer ready for the
// encoder: decode (with a small LRU so holds don't re-decode the same JPEG
// every tick), blend via the transition registry when the resolver says so,
// then paint the cursor and any active click ripple on top.
//
// Decoding is pure disk + swscale work per distinct source file, so it
// parallelizes the same way `demoforge_core::resolver::resolve_output_frame`
// does — the worker pool in `render.rs` calls this once per output frame
// with no shared mutable state beyond the frames directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use ffmpeg_the_third::format::{input, Pixel};
use ffmpeg_the_third::software::scaling::{context::Context as ScaleCtx, flag::Flags as ScaleFlags};
use ffmpeg_the_third::util::frame::video::Video as VideoFrame;

use demoforge_core::error::{DemoforgeError, Result};
use demoforge_core::resolver::ResolvedFrame;
use demoforge_core::transitions::registry;

use crate::yuv::extract_yuv;

const CURSOR_RADIUS_PX: i32 = 9;
const CURSOR_LUMA: u8 = 235;
const RIPPLE_MAX_RADIUS_PX: i32 = 46;
const RIPPLE_DURATION_MS: u64 = 400;

const CHROME_BAR_LUMA: u8 = 40;
const CHROME_PILL_LUMA: u8 = 210;
const CHROME_DOT_RADIUS_PX: i32 = 6;
const CHROME_DOT_SPACING_PX: i32 = 22;
const CHROME_MARGIN_PX: i32 = 16;
const CHROME_PILL_CHAR_WIDTH_PX: i32 = 7;

pub struct FrameCache {
    frames_dir: PathBuf,
    width: u32,
    height: u32,
    cache: Mutex<HashMap<String, Vec<u8>>>,
}

impl FrameCache {
    pub fn new(frames_dir: impl Into<PathBuf>, width: u32, height: u32) -> FrameCache {
        FrameCache {
            frames_dir: frames_dir.into(),
            width,
            height,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Decode `file` (relative to the frames directory) to packed YUV420P at
    /// the render's output resolution, caching by filename. Safe to call
    /// concurrently from multiple worker threads.
    pub fn decode(&self, file: &str) -> Result<Vec<u8>> {
        if let Some(cached) = self.cache.lock().unwrap().get(file) {
            return Ok(cached.clone());
        }
        let packed = decode_jpeg_to_yuv420p(&self.frames_dir.join(file), self.width, self.height)?;
        self.cache.lock().unwrap().insert(file.to_string(), packed.clone());
        Ok(packed)
    }
}

fn decode_jpeg_to_yuv420p(path: &Path, out_w: u32, out_h: u32) -> Result<Vec<u8>> {
    let mut ictx = input(path)
        .map_err(|e| DemoforgeError::RenderFailure(format!("open frame '{}': {e}", path.display())))?;

    let stream_idx = ictx
        .streams()
        .best(ffmpeg_the_third::media::Type::Video)
        .ok_or_else(|| DemoforgeError::RenderFailure(format!("no image stream in '{}'", path.display())))?
        .index();

    let params = ictx.stream(stream_idx).unwrap().parameters();
    let ctx = ffmpeg_the_third::codec::context::Context::from_parameters(params)
        .map_err(|e| DemoforgeError::RenderFailure(format!("decoder context: {e}")))?;
    let mut decoder = ctx
        .decoder()
        .video()
        .map_err(|e| DemoforgeError::RenderFailure(format!("open image decoder: {e}")))?;

    for result in ictx.packets() {
        let (stream, packet) =
            result.map_err(|e| DemoforgeError::RenderFailure(format!("read packet: {e}")))?;
        if stream.index() != stream_idx {
            continue;
        }
        decoder
            .send_packet(&packet)
            .map_err(|e| DemoforgeError::RenderFailure(format!("send packet: {e}")))?;

        let mut decoded = VideoFrame::empty();
        if decoder.receive_frame(&mut decoded).is_ok() {
            let mut scaler = ScaleCtx::get(
                decoded.format(),
                decoder.width(),
                decoder.height(),
                Pixel::YUV420P,
                out_w,
                out_h,
                ScaleFlags::BILINEAR,
            )
            .map_err(|e| DemoforgeError::RenderFailure(format!("create scaler: {e}")))?;

            let mut yuv = VideoFrame::empty();
            scaler
                .run(&decoded, &mut yuv)
                .map_err(|e| DemoforgeError::RenderFailure(format!("scale frame: {e}")))?;

            let uv_w = out_w / 2;
            let uv_h = out_h / 2;
            return Ok(extract_yuv(&yuv, out_w as usize, out_h as usize, uv_w as usize, uv_h as usize));
        }
    }

    Err(DemoforgeError::RenderFailure(format!(
        "no decodable frame in '{}'",
        path.display()
    )))
}

/// Cursor position at a given source time, eased between the two nearest
/// `CursorTarget` endpoints that straddle it. Callers precompute the
/// surrounding pair; this only does the interpolation.
pub fn interpolate_cursor(from: (i32, i32), to: (i32, i32), t: f32) -> (i32, i32) {
    let eased = demoforge_core::transitions::helpers::ease_in_out(t);
    let x = demoforge_core::transitions::helpers::lerp(from.0 as f32, to.0 as f32, eased);
    let y = demoforge_core::transitions::helpers::lerp(from.1 as f32, to.1 as f32, eased);
    (x.round() as i32, y.round() as i32)
}

/// Resolve one output frame to its composited, packed YUV420P bytes.
pub fn compose(cache: &FrameCache, resolved: &ResolvedFrame, width: u32, height: u32) -> Result<Vec<u8>> {
    match resolved {
        ResolvedFrame::Source { file } => cache.decode(file),
        ResolvedFrame::Transition { before_file, after_file, progress, kind } => {
            let a = cache.decode(before_file)?;
            let b = cache.decode(after_file)?;
            let registry = registry();
            let transition = registry
                .get(kind)
                .ok_or_else(|| DemoforgeError::RenderFailure(format!("no transition registered for {kind:?}")))?;
            Ok(transition.apply(&a, &b, width, height, *progress))
        }
    }
}

/// Paint a solid circular cursor dot and, if `ripple_progress` is `Some`, an
/// expanding ring centered on the same point. Operates directly on the Y
/// plane of a packed YUV420P buffer — chroma is left untouched, which reads
/// as a neutral gray dot rather than colored, matching the rest of this
/// codebase's preference for simple, high-contrast overlays.
pub fn draw_cursor_overlay(buf: &mut [u8], width: u32, height: u32, pos: (i32, i32), ripple_progress: Option<f32>) {
    let w = width as i32;
    let h = height as i32;
    let (cx, cy) = pos;

    for dy in -CURSOR_RADIUS_PX..=CURSOR_RADIUS_PX {
        for dx in -CURSOR_RADIUS_PX..=CURSOR_RADIUS_PX {
            if dx * dx + dy * dy > CURSOR_RADIUS_PX * CURSOR_RADIUS_PX {
                continue;
            }
            let (x, y) = (cx + dx, cy + dy);
            if x < 0 || y < 0 || x >= w || y >= h {
                continue;
            }
            buf[(y * w + x) as usize] = CURSOR_LUMA;
        }
    }

    if let Some(t) = ripple_progress {
        let t = t.clamp(0.0, 1.0);
        let radius = (RIPPLE_MAX_RADIUS_PX as f32 * demoforge_core::transitions::helpers::ease_out(t)) as i32;
        let thickness = 3;
        let fade = 1.0 - t;
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                let dist_sq = dx * dx + dy * dy;
                if dist_sq < (radius - thickness) * (radius - thickness) || dist_sq > radius * radius {
                    continue;
                }
                let (x, y) = (cx + dx, cy + dy);
                if x < 0 || y < 0 || x >= w || y >= h {
                    continue;
                }
                let idx = (y * w + x) as usize;
                buf[idx] = demoforge_core::transitions::helpers::blend_byte(buf[idx], 255, fade * 0.6);
            }
        }
    }
}

/// Paints a minimal browser-chrome frame atop the Y plane: a title bar,
/// three traffic-light dots, and an address-bar pill. This codebase draws no
/// glyphs anywhere (no font-rasterizing dependency), so the pill is sized
/// off `url`'s length to gesture at the address bar's content rather than
/// lettering it — callers should pass the navigated URL's host+path.
pub fn draw_chrome_overlay(buf: &mut [u8], width: u32, height: u32, url: &str) {
    let w = width as i32;
    let h = height as i32;
    let bar_height = ((height / 14) as i32).clamp(20, 64).min(h);

    for y in 0..bar_height {
        for x in 0..w {
            buf[(y * w + x) as usize] = CHROME_BAR_LUMA;
        }
    }

    let dot_y = bar_height / 2;
    for i in 0..3 {
        let cx = CHROME_MARGIN_PX + i * CHROME_DOT_SPACING_PX;
        fill_circle(buf, w, bar_height, (cx, dot_y), CHROME_DOT_RADIUS_PX, CHROME_PILL_LUMA);
    }

    let pill_left = CHROME_MARGIN_PX + 3 * CHROME_DOT_SPACING_PX + CHROME_MARGIN_PX;
    let pill_top = 5;
    let pill_height = (bar_height - 2 * pill_top).max(0);
    let max_width = (w - pill_left - CHROME_MARGIN_PX).max(0);
    let pill_width = (url.len() as i32 * CHROME_PILL_CHAR_WIDTH_PX).clamp(40, max_width.max(40)).min(max_width);

    for y in pill_top..(pill_top + pill_height) {
        for x in pill_left..(pill_left + pill_width) {
            if x >= 0 && x < w && y >= 0 && y < bar_height {
                buf[(y * w + x) as usize] = CHROME_PILL_LUMA;
            }
        }
    }
}

fn fill_circle(buf: &mut [u8], w: i32, h: i32, center: (i32, i32), radius: i32, luma: u8) {
    let (cx, cy) = center;
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy > radius * radius {
                continue;
            }
            let (x, y) = (cx + dx, cy + dy);
            if x < 0 || y < 0 || x >= w || y >= h {
                continue;
            }
            buf[(y * w + x) as usize] = luma;
        }
    }
}

/// Whether a click ripple should currently be drawn, and its progress
/// through `RIPPLE_DURATION_MS`, given the time since the triggering click.
pub fn ripple_progress_at(ms_since_click: u64) -> Option<f32> {
    if ms_since_click >= RIPPLE_DURATION_MS {
        None
    } else {
        Some(ms_since_click as f32 / RIPPLE_DURATION_MS as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpolate_cursor_endpoints() {
        assert_eq!(interpolate_cursor((0, 0), (100, 50), 0.0), (0, 0));
        assert_eq!(interpolate_cursor((0, 0), (100, 50), 1.0), (100, 50));
    }

    #[test]
    fn ripple_progress_windows_correctly() {
        assert!(ripple_progress_at(0).is_some());
        assert!(ripple_progress_at(399).is_some());
        assert!(ripple_progress_at(400).is_none());
    }

    #[test]
    fn cursor_dot_paints_luma_only() {
        let (w, h) = (64u32, 64u32);
        let mut buf = vec![0u8; (w * h) as usize];
        draw_cursor_overlay(&mut buf, w, h, (32, 32), None);
        assert_eq!(buf[(32 * w + 32) as usize], CURSOR_LUMA);
    }

    #[test]
    fn chrome_overlay_paints_bar_and_leaves_rest_untouched() {
        let (w, h) = (640u32, 480u32);
        let mut buf = vec![0u8; (w * h) as usize];
        draw_chrome_overlay(&mut buf, w, h, "example.com/pricing");
        assert_eq!(buf[0], CHROME_BAR_LUMA);
        assert_eq!(buf[((h - 1) * w) as usize], 0, "bar should not extend past its own height");
    }
}
