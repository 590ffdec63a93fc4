//! Local file frame sampler using FFmpeg.
//!
//! Decoding is sequential. Every decoded frame advances the source index, only
//! frames on the sampling stride are converted to RGB and resized to the target
//! resolution. Frames buffered inside the decoder are drained before the next
//! packet is read, and again after end of file.

use anyhow::{Context, Result};
use ffmpeg_next as ffmpeg;

use super::file::{FileStats, SamplerConfig};
use super::stall::StallWatch;
use crate::frame::Frame;

pub(crate) struct FfmpegFileSource {
    config: SamplerConfig,
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    sample_limit: Option<usize>,
    decoded_count: u64,
    sampled_count: usize,
    eof_sent: bool,
    stall: StallWatch,
}

impl FfmpegFileSource {
    pub(crate) fn new(config: SamplerConfig) -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;
        let input = ffmpeg::format::input(&config.path)
            .with_context(|| format!("failed to open file input '{}' with ffmpeg", config.path))?;
        let input_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| anyhow::anyhow!("file '{}' has no video track", config.path))?;
        let stream_index = input_stream.index();
        let total_frames = input_stream.frames();
        let context = ffmpeg::codec::context::Context::from_parameters(input_stream.parameters())
            .context("load video decoder parameters")?;
        let decoder = context
            .decoder()
            .video()
            .context("open ffmpeg video decoder")?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::RGB24,
            config.target_width,
            config.target_height,
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("create ffmpeg scaler")?;

        // Containers that do not record a frame count are sampled to end of file.
        let sample_limit = (total_frames > 0)
            .then(|| (total_frames as u64 / config.frame_interval) as usize);

        let stall = StallWatch::new(config.frame_timeout);
        Ok(Self {
            config,
            input,
            stream_index,
            decoder,
            scaler,
            sample_limit,
            decoded_count: 0,
            sampled_count: 0,
            eof_sent: false,
            stall,
        })
    }

    pub(crate) fn connect(&mut self) -> Result<()> {
        match self.sample_limit {
            Some(limit) => log::info!(
                "FileSource: connected to {} (ffmpeg, {} samples)",
                self.config.path,
                limit
            ),
            None => log::info!(
                "FileSource: connected to {} (ffmpeg, frame count unknown)",
                self.config.path
            ),
        }
        Ok(())
    }

    pub(crate) fn next_frame(&mut self) -> Result<Option<Frame>> {
        self.stall.progress();
        loop {
            if self.exhausted() {
                return Ok(None);
            }
            if let Some(frame) = self.drain_decoder()? {
                return Ok(Some(frame));
            }
            if self.eof_sent {
                return Ok(None);
            }
            if self.stall.is_stalled() {
                anyhow::bail!(
                    "file ingestion stalled: no frame decoded for {:?} after {} frames of {}",
                    self.stall.timeout(),
                    self.decoded_count,
                    self.config.path
                );
            }
            match self.read_video_packet() {
                Some(packet) => self.decoder.send_packet(&packet).with_context(|| {
                    format!(
                        "failed to decode frame {} of {}",
                        self.decoded_count, self.config.path
                    )
                })?,
                None => {
                    self.decoder
                        .send_eof()
                        .context("flush ffmpeg decoder")?;
                    self.eof_sent = true;
                }
            }
        }
    }

    pub(crate) fn sample_count(&self) -> Option<usize> {
        self.sample_limit
    }

    pub(crate) fn stats(&self) -> FileStats {
        FileStats {
            frames_sampled: self.sampled_count as u64,
            path: self.config.path.clone(),
        }
    }

    fn exhausted(&self) -> bool {
        self.sample_limit
            .is_some_and(|limit| self.sampled_count >= limit)
    }

    fn read_video_packet(&mut self) -> Option<ffmpeg::Packet> {
        let stream_index = self.stream_index;
        self.input
            .packets()
            .find(|(stream, _)| stream.index() == stream_index)
            .map(|(_, packet)| packet)
    }

    /// Pull decoded frames until one lands on the sampling stride.
    fn drain_decoder(&mut self) -> Result<Option<Frame>> {
        let mut decoded = ffmpeg::frame::Video::empty();
        while self.decoder.receive_frame(&mut decoded).is_ok() {
            let source_index = self.decoded_count;
            self.decoded_count += 1;
            self.stall.progress();
            if source_index % self.config.frame_interval != 0 {
                continue;
            }

            let mut rgb_frame = ffmpeg::frame::Video::empty();
            self.scaler
                .run(&decoded, &mut rgb_frame)
                .with_context(|| format!("scale frame {} to RGB", source_index))?;
            let (pixels, width, height) = frame_to_pixels(&rgb_frame)?;

            let sample_index = self.sampled_count;
            self.sampled_count += 1;
            log::debug!(
                "sampled frame {} (source frame {}) from {}",
                sample_index,
                source_index,
                self.config.path
            );
            return Frame::new(sample_index, source_index, width, height, pixels).map(Some);
        }
        Ok(None)
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
