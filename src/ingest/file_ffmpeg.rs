//! Container decoding with FFmpeg.
//!
//! Packets of the best video stream are decoded in-memory and converted to
//! RGB24. Once the demuxer is exhausted the decoder is flushed so trailing
//! buffered frames are still delivered.

use anyhow::{Context, Result};
use ffmpeg_next as ffmpeg;
use std::path::Path;

use super::{FrameSource, VideoError};
use crate::frame::Frame;

const FALLBACK_FPS: f64 = 30.0;

pub(crate) struct FfmpegVideo {
    path: String,
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    fps: f64,
    frame_count_hint: Option<u64>,
    frames_decoded: u64,
    flushed: bool,
}

impl FfmpegVideo {
    pub(crate) fn open(path: &Path) -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;
        let display = path.display().to_string();
        let input = ffmpeg::format::input(&path).map_err(|err| VideoError::Open {
            path: display.clone(),
            reason: err.to_string(),
        })?;
        let input_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| VideoError::NoVideoTrack {
                path: display.clone(),
            })?;
        let stream_index = input_stream.index();

        let rate = f64::from(input_stream.avg_frame_rate());
        let fps = if rate.is_finite() && rate > 0.0 {
            rate
        } else {
            FALLBACK_FPS
        };
        let frame_count_hint = u64::try_from(input_stream.frames()).ok().filter(|n| *n > 0);

        let context = ffmpeg::codec::context::Context::from_parameters(input_stream.parameters())
            .context("load video decoder parameters")?;
        let decoder = context
            .decoder()
            .video()
            .map_err(|err| VideoError::Open {
                path: display.clone(),
                reason: format!("open video decoder: {err}"),
            })?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("create ffmpeg scaler")?;

        log::info!(
            "FfmpegVideo: opened {display} ({}x{} @ {fps:.2} fps)",
            decoder.width(),
            decoder.height()
        );

        Ok(Self {
            path: display,
            input,
            stream_index,
            decoder,
            scaler,
            fps,
            frame_count_hint,
            frames_decoded: 0,
            flushed: false,
        })
    }

    fn receive(&mut self) -> Result<Option<Frame>> {
        let mut decoded = ffmpeg::frame::Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return Ok(None);
        }
        let mut rgb_frame = ffmpeg::frame::Video::empty();
        self.scaler
            .run(&decoded, &mut rgb_frame)
            .context("scale frame to RGB")?;
        let (pixels, width, height) = frame_to_pixels(&rgb_frame)?;
        self.frames_decoded += 1;
        Frame::new(pixels, width, height).map(Some)
    }
}

impl FrameSource for FfmpegVideo {
    fn fps(&self) -> f64 {
        self.fps
    }

    fn frame_count_hint(&self) -> Option<u64> {
        self.frame_count_hint
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            if let Some(frame) = self.receive()? {
                return Ok(Some(frame));
            }
            if self.flushed {
                log::debug!(
                    "FfmpegVideo: {} ended after {} frames",
                    self.path,
                    self.frames_decoded
                );
                return Ok(None);
            }

            let next = self
                .input
                .packets()
                .next()
                .map(|(stream, packet)| (stream.index(), packet));
            match next {
                Some((index, packet)) => {
                    if index != self.stream_index {
                        continue;
                    }
                    self.decoder
                        .send_packet(&packet)
                        .with_context(|| format!("decode packet from {}", self.path))?;
                }
                None => {
                    self.decoder.send_eof().context("flush ffmpeg decoder")?;
                    self.flushed = true;
                }
            }
        }
    }
}

fn frame_to_pixels(frame: &ffmpeg::frame::Video) -> Result<(Vec<u8>, u32, u32)> {
    let width = frame.width();
    let height = frame.height();
    let row_bytes = (width as usize) * 3;
    let stride = frame.stride(0);
    let data = frame.data(0);

    if stride == row_bytes {
        let len = row_bytes * height as usize;
        let pixels = data
            .get(..len)
            .context("ffmpeg frame is shorter than its dimensions")?;
        return Ok((pixels.to_vec(), width, height));
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let end = start + row_bytes;
        pixels.extend_from_slice(
            data.get(start..end)
                .context("ffmpeg frame row is out of bounds")?,
        );
    }

    Ok((pixels, width, height))
}
