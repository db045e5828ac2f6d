// crates/demoforge-render/src/encoder.rs
//
// H.264 + AAC MP4 encode, generalised from a fixed clip-list source to a
// frame-resolver callback: the caller supplies one composited YUV420P buffer
// per output frame plus a set of narration clips placed at absolute output
// times, and this module owns PTS bookkeeping, the audio FIFO, and muxing.
//
// Stream layout in the output MP4:
//   Stream 0 — H.264 video (YUV420P, CRF 18, preset fast)
//   Stream 1 — AAC audio  (FLTP stereo, 44100 Hz, 128 kbps) — present only
//              when at least one narration clip is supplied.

use std::path::{Path, PathBuf};

use ffmpeg_the_third as ffmpeg;
use ffmpeg::codec::{self, Id as CodecId};
use ffmpeg::encoder;
use ffmpeg::format::sample::Type as SampleType;
use ffmpeg::format::{input as open_input, output as open_output, Sample};
use ffmpeg::media::Type as MediaType;
use ffmpeg::software::resampling;
use ffmpeg::util::channel_layout::{ChannelLayout, ChannelLayoutMask};
use ffmpeg::util::frame::audio::Audio as AudioFrame;
use ffmpeg::util::frame::video::Video as VideoFrame;
use ffmpeg::util::rational::Rational;
use ffmpeg::Packet;

use demoforge_core::error::{DemoforgeError, Result};

use crate::yuv::write_yuv;

const AUDIO_RATE: i32 = 44_100;

/// One narration clip to be mixed into the output's audio track.
pub struct PlacedAudio {
    pub file: PathBuf,
    pub output_start_ms: u64,
}

pub struct EncodeSpec {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub total_frames: u64,
    pub narration: Vec<PlacedAudio>,
    pub output: PathBuf,
}

/// Supplies one composited packed YUV420P frame at a time. Implemented by
/// the render worker pool; kept as a trait so tests can supply canned frames
/// without standing up the compositor.
pub trait Encoder {
    fn encode<F>(&self, spec: &EncodeSpec, next_frame: F) -> Result<()>
    where
        F: FnMut(u64) -> Result<Vec<u8>>;
}

pub struct FfmpegEncoder;

struct AudioFifo {
    left: Vec<f32>,
    right: Vec<f32>,
}

impl AudioFifo {
    fn new() -> AudioFifo {
        AudioFifo { left: Vec::new(), right: Vec::new() }
    }

    fn len(&self) -> usize {
        self.left.len()
    }

    fn push_silence(&mut self, samples: usize) {
        self.left.extend(std::iter::repeat(0.0f32).take(samples));
        self.right.extend(std::iter::repeat(0.0f32).take(samples));
    }

    fn push(&mut self, frame: &AudioFrame) {
        let n = frame.samples();
        if n == 0 {
            return;
        }
        unsafe {
            let l_bytes = frame.data(0);
            let l_f32 = std::slice::from_raw_parts(l_bytes.as_ptr() as *const f32, n);
            self.left.extend_from_slice(l_f32);
            let r_bytes = if frame.ch_layout().channels() >= 2 { frame.data(1) } else { frame.data(0) };
            let r_f32 = std::slice::from_raw_parts(r_bytes.as_ptr() as *const f32, n);
            self.right.extend_from_slice(r_f32);
        }
    }

    fn pop_frame(&mut self, n: usize, sample_idx: i64) -> AudioFrame {
        let available = self.left.len().min(n);
        let mut frame = AudioFrame::new(Sample::F32(SampleType::Planar), n, ChannelLayoutMask::STEREO);
        frame.set_rate(AUDIO_RATE as u32);
        frame.set_pts(Some(sample_idx));
        unsafe {
            let ldata = frame.data_mut(0);
            let ldst = std::slice::from_raw_parts_mut(ldata.as_mut_ptr() as *mut f32, n);
            ldst[..available].copy_from_slice(&self.left[..available]);
            if available < n {
                ldst[available..].fill(0.0);
            }
            let rdata = frame.data_mut(1);
            let rdst = std::slice::from_raw_parts_mut(rdata.as_mut_ptr() as *mut f32, n);
            rdst[..available].copy_from_slice(&self.right[..available]);
            if available < n {
                rdst[available..].fill(0.0);
            }
        }
        self.left.drain(..available);
        self.right.drain(..available);
        frame
    }
}

impl Encoder for FfmpegEncoder {
    fn encode<F>(&self, spec: &EncodeSpec, mut next_frame: F) -> Result<()>
    where
        F: FnMut(u64) -> Result<Vec<u8>>,
    {
        if spec.total_frames == 0 {
            return Err(DemoforgeError::RenderFailure("nothing to encode: zero output frames".into()));
        }

        let mut octx = open_output(&spec.output)
            .map_err(|e| DemoforgeError::RenderFailure(format!("open output '{}': {e}", spec.output.display())))?;

        let frame_tb = Rational::new(1, spec.fps as i32);

        let h264 = encoder::find(CodecId::H264)
            .ok_or_else(|| DemoforgeError::RenderFailure("H.264 encoder not found".into()))?;
        let mut ost_video = octx
            .add_stream(h264)
            .map_err(|e| DemoforgeError::RenderFailure(format!("add video stream: {e}")))?;
        ost_video.set_time_base(frame_tb);

        let video_enc_ctx = codec::context::Context::new_with_codec(h264);
        let mut video_enc = video_enc_ctx
            .encoder()
            .video()
            .map_err(|e| DemoforgeError::RenderFailure(format!("video encoder context: {e}")))?;
        video_enc.set_width(spec.width);
        video_enc.set_height(spec.height);
        video_enc.set_format(ffmpeg::format::Pixel::YUV420P);
        video_enc.set_time_base(frame_tb);
        video_enc.set_frame_rate(Some(Rational::new(spec.fps as i32, 1)));
        video_enc.set_bit_rate(0);

        let mut opts = ffmpeg::Dictionary::new();
        opts.set("crf", "18");
        opts.set("preset", "fast");
        let mut video_encoder = video_enc
            .open_as_with(h264, opts)
            .map_err(|e| DemoforgeError::RenderFailure(format!("open H.264 encoder: {e}")))?;
        video_encoder.set_aspect_ratio(Rational::new(1, 1));

        unsafe {
            let ret = ffmpeg::ffi::avcodec_parameters_from_context(
                (**(*octx.as_mut_ptr()).streams.add(0)).codecpar,
                video_encoder.as_ptr() as *mut ffmpeg::ffi::AVCodecContext,
            );
            if ret < 0 {
                return Err(DemoforgeError::RenderFailure(format!("copy video codecpar: {ret}")));
            }
        }

        let has_audio = !spec.narration.is_empty();
        let mut audio_parts = if has_audio {
            Some(setup_audio_stream(&mut octx)?)
        } else {
            None
        };

        ffmpeg::format::context::output::dump(&octx, 0, Some(&spec.output.to_string_lossy()));
        octx.write_header()
            .map_err(|e| DemoforgeError::RenderFailure(format!("write header: {e}")))?;

        let ost_video_tb = octx.stream(0).unwrap().time_base();
        let uv_w = spec.width / 2;
        let uv_h = spec.height / 2;

        if let Some(parts) = &mut audio_parts {
            preload_narration(&spec.narration, spec.fps, parts)?;
        }

        for f in 0..spec.total_frames {
            let packed = next_frame(f)?;

            let mut raw = VideoFrame::new(ffmpeg::format::Pixel::YUV420P, spec.width, spec.height);
            write_yuv(&packed, &mut raw, spec.width as usize, spec.height as usize, uv_w as usize, uv_h as usize);
            raw.set_pts(Some(f as i64));
            unsafe {
                (*raw.as_mut_ptr()).sample_aspect_ratio = ffmpeg::ffi::AVRational { num: 1, den: 1 };
            }

            video_encoder
                .send_frame(&raw)
                .map_err(|e| DemoforgeError::RenderFailure(format!("send video frame: {e}")))?;

            let mut pkt = Packet::empty();
            while video_encoder.receive_packet(&mut pkt).is_ok() {
                pkt.set_stream(0);
                pkt.rescale_ts(frame_tb, ost_video_tb);
                pkt.write_interleaved(&mut octx)
                    .map_err(|e| DemoforgeError::RenderFailure(format!("write video packet: {e}")))?;
            }

            if let Some(parts) = &mut audio_parts {
                let target_samples = ((f + 1) * AUDIO_RATE as u64 / spec.fps as u64) as usize;
                drain_up_to(parts, &mut octx, target_samples, false)?;
            }
        }

        video_encoder
            .send_eof()
            .map_err(|e| DemoforgeError::RenderFailure(format!("flush video: {e}")))?;
        let mut pkt = Packet::empty();
        while video_encoder.receive_packet(&mut pkt).is_ok() {
            pkt.set_stream(0);
            pkt.rescale_ts(frame_tb, ost_video_tb);
            pkt.write_interleaved(&mut octx)
                .map_err(|e| DemoforgeError::RenderFailure(format!("write flush video packet: {e}")))?;
        }

        if let Some(mut parts) = audio_parts {
            drain_up_to(&mut parts, &mut octx, usize::MAX, true)?;
            parts
                .encoder
                .send_eof()
                .map_err(|e| DemoforgeError::RenderFailure(format!("flush audio: {e}")))?;
            drain_audio_packets(&mut parts, &mut octx)?;
        }

        octx.write_trailer()
            .map_err(|e| DemoforgeError::RenderFailure(format!("write trailer: {e}")))?;
        Ok(())
    }
}

struct AudioParts {
    encoder: ffmpeg::encoder::Audio,
    out_sample_idx: i64,
    frame_size: usize,
    fifo: AudioFifo,
    audio_tb: Rational,
    ost_audio_tb: Rational,
}

fn setup_audio_stream(octx: &mut ffmpeg::format::context::Output) -> Result<AudioParts> {
    let audio_tb = Rational::new(1, AUDIO_RATE);
    let aac = encoder::find(CodecId::AAC).ok_or_else(|| DemoforgeError::RenderFailure("AAC encoder not found".into()))?;
    let mut ost_audio = octx
        .add_stream(aac)
        .map_err(|e| DemoforgeError::RenderFailure(format!("add audio stream: {e}")))?;
    ost_audio.set_time_base(audio_tb);

    let audio_enc_ctx = codec::context::Context::new_with_codec(aac);
    let mut audio_enc = audio_enc_ctx
        .encoder()
        .audio()
        .map_err(|e| DemoforgeError::RenderFailure(format!("audio encoder context: {e}")))?;
    audio_enc.set_rate(AUDIO_RATE);
    audio_enc.set_ch_layout(ChannelLayout::STEREO);
    audio_enc.set_format(Sample::F32(SampleType::Planar));
    audio_enc.set_bit_rate(128_000);

    let audio_encoder = audio_enc
        .open_as_with(aac, ffmpeg::Dictionary::new())
        .map_err(|e| DemoforgeError::RenderFailure(format!("open AAC encoder: {e}")))?;
    let frame_size = (audio_encoder.frame_size() as usize).max(1024);
    let ost_audio_tb = octx.stream(1).unwrap().time_base();

    unsafe {
        let ret = ffmpeg::ffi::avcodec_parameters_from_context(
            (**(*octx.as_mut_ptr()).streams.add(1)).codecpar,
            audio_encoder.as_ptr() as *mut ffmpeg::ffi::AVCodecContext,
        );
        if ret < 0 {
            return Err(DemoforgeError::RenderFailure(format!("copy audio codecpar: {ret}")));
        }
    }

    Ok(AudioParts {
        encoder: audio_encoder,
        out_sample_idx: 0,
        frame_size,
        fifo: AudioFifo::new(),
        audio_tb,
        ost_audio_tb,
    })
}

/// Decode every narration clip up front and lay it into the FIFO at its
/// placed position, padding gaps with silence. Narration clips are short
/// (seconds, not minutes) so holding all of them decoded at once is fine.
fn preload_narration(clips: &[PlacedAudio], fps: u32, parts: &mut AudioParts) -> Result<()> {
    let mut clips: Vec<&PlacedAudio> = clips.iter().collect();
    clips.sort_by_key(|c| c.output_start_ms);

    let mut cursor_samples: usize = 0;
    for clip in clips {
        let target_sample = (clip.output_start_ms as u64 * AUDIO_RATE as u64 / 1000) as usize;
        if target_sample > cursor_samples {
            parts.fifo.push_silence(target_sample - cursor_samples);
            cursor_samples = target_sample;
        }
        let pushed = decode_and_push(&clip.file, parts)?;
        cursor_samples += pushed;
    }
    let _ = fps;
    Ok(())
}

fn decode_and_push(path: &Path, parts: &mut AudioParts) -> Result<usize> {
    let mut ictx = open_input(path)
        .map_err(|e| DemoforgeError::RenderFailure(format!("open narration clip '{}': {e}", path.display())))?;
    let stream_idx = ictx
        .streams()
        .best(MediaType::Audio)
        .ok_or_else(|| DemoforgeError::RenderFailure(format!("no audio stream in '{}'", path.display())))?
        .index();

    let dec_ctx = codec::context::Context::from_parameters(ictx.stream(stream_idx).unwrap().parameters())
        .map_err(|e| DemoforgeError::RenderFailure(format!("narration decoder context: {e}")))?;
    let mut decoder = dec_ctx
        .decoder()
        .audio()
        .map_err(|e| DemoforgeError::RenderFailure(format!("open narration decoder: {e}")))?;

    let target_fmt = Sample::F32(SampleType::Planar);
    let mut resampler: Option<resampling::Context> = None;
    let mut pushed = 0usize;

    for result in ictx.packets() {
        let (stream, packet) = result.map_err(|e| DemoforgeError::RenderFailure(format!("read narration packet: {e}")))?;
        if stream.index() != stream_idx {
            continue;
        }
        if decoder.send_packet(&packet).is_err() {
            continue;
        }
        let mut raw = AudioFrame::empty();
        while decoder.receive_frame(&mut raw).is_ok() {
            let needs_resample =
                raw.format() != target_fmt || raw.rate() != AUDIO_RATE as u32 || raw.ch_layout().channels() != 2;
            if needs_resample {
                let rs = resampler.get_or_insert_with(|| {
                    let src_layout = if raw.ch_layout().channels() >= 2 { raw.ch_layout() } else { ChannelLayout::MONO };
                    resampling::Context::get2(raw.format(), src_layout, raw.rate(), target_fmt, ChannelLayout::STEREO, AUDIO_RATE as u32)
                        .expect("create narration resampler")
                });
                let mut resampled = AudioFrame::empty();
                if rs.run(&raw, &mut resampled).is_ok() && resampled.samples() > 0 {
                    pushed += resampled.samples();
                    parts.fifo.push(&resampled);
                }
            } else {
                pushed += raw.samples();
                parts.fifo.push(&raw);
            }
        }
    }
    Ok(pushed)
}

fn drain_up_to(parts: &mut AudioParts, octx: &mut ffmpeg::format::context::Output, target_samples: usize, flush: bool) -> Result<()> {
    while parts.fifo.len() >= parts.frame_size && (parts.out_sample_idx as usize) < target_samples {
        encode_one_audio_frame(parts, octx)?;
    }
    if flush {
        while parts.fifo.len() > 0 {
            encode_one_audio_frame(parts, octx)?;
        }
    }
    Ok(())
}

fn encode_one_audio_frame(parts: &mut AudioParts, octx: &mut ffmpeg::format::context::Output) -> Result<()> {
    let frame = parts.fifo.pop_frame(parts.frame_size, parts.out_sample_idx);
    parts.out_sample_idx += parts.frame_size as i64;
    parts
        .encoder
        .send_frame(&frame)
        .map_err(|e| DemoforgeError::RenderFailure(format!("send audio frame: {e}")))?;
    drain_audio_packets(parts, octx)
}

fn drain_audio_packets(parts: &mut AudioParts, octx: &mut ffmpeg::format::context::Output) -> Result<()> {
    let mut pkt = Packet::empty();
    while parts.encoder.receive_packet(&mut pkt).is_ok() {
        pkt.set_stream(1);
        pkt.rescale_ts(parts.audio_tb, parts.ost_audio_tb);
        pkt.write_interleaved(octx)
            .map_err(|e| DemoforgeError::RenderFailure(format!("write audio packet: {e}")))?;
    }
    Ok(())
}
