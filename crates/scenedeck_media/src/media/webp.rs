use std::time::Duration;

use image::RgbaImage;
use webp::{AnimDecoder, BitstreamFeatures};

use crate::error::DecodeError;
use crate::media::{DecodedImage, DEFAULT_FRAME_DELAY, MIN_FRAME_DELAY};
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebpType {
    Static,
    Animated,
}

/// Classify raw WebP bytes as static or animated.
///
/// Defaults to `Static` when the bitstream features cannot be read; the
/// static decode path then reports the real error.
pub fn detect_webp_type(webp_bytes: &[u8]) -> WebpType {
    if let Some(bit_stream) = BitstreamFeatures::new(webp_bytes) {
        return match bit_stream.has_animation() {
            true => WebpType::Animated,
            false => WebpType::Static,
        };
    }

    tracing::warn!("failed to read webp bitstream features, assuming static");
    WebpType::Static
}

/// Decode an animated WebP byte buffer into fully-composited frames.
///
/// The external decoder already blends each frame against the canvas, so
/// unlike GIF there is no disposal bookkeeping here: every decoded frame
/// is display-ready and only the timing needs assembling. Frames carry a
/// monotonically increasing timestamp; frame `i` holds for
/// `timestamp[i+1] - timestamp[i]`.
pub fn decode_webp(bytes: &[u8]) -> Result<DecodedImage> {
    let decoded = AnimDecoder::new(bytes)
        .decode()
        .map_err(|e| DecodeError::Webp(format!("decode failed: {e}")))?;

    if decoded.len() == 0 {
        return Err(DecodeError::NoFrames.into());
    }

    let Some(frame_list) = decoded.get_frames(0..decoded.len()) else {
        return Err(DecodeError::Webp("failed to iterate decoded frames".to_owned()).into());
    };

    let width = frame_list[0].width();
    let height = frame_list[0].height();

    let mut frames = Vec::with_capacity(frame_list.len());
    let mut durations = Vec::with_capacity(frame_list.len());

    for (index, frame) in frame_list.iter().enumerate() {
        if frame.width() != width || frame.height() != height {
            return Err(DecodeError::FrameSizeMismatch {
                index,
                width: frame.width(),
                height: frame.height(),
                canvas_width: width,
                canvas_height: height,
            }
            .into());
        }

        let next_ms = frame_list.get(index + 1).map(|next| next.get_time_ms());
        durations.push(frame_duration(frame.get_time_ms(), next_ms));
        frames.push(frame_to_rgba(index, frame)?);
    }

    Ok(DecodedImage {
        frames,
        durations,
        width,
        height,
    })
}

/// Decode a single-image WebP into a static raster.
pub(crate) fn decode_static_webp(bytes: &[u8]) -> Result<RgbaImage> {
    let image = webp::Decoder::new(bytes)
        .decode()
        .ok_or_else(|| DecodeError::Webp("failed to decode static webp".to_owned()))?;

    Ok(image.to_image().to_rgba8())
}

/// Hold time for a frame given its timestamp and its successor's.
///
/// Malformed streams produce zero or backwards gaps; those clamp to the
/// floor. The last frame has no successor to diff against and holds for
/// the default.
fn frame_duration(cur_ms: i32, next_ms: Option<i32>) -> Duration {
    match next_ms {
        Some(next) => {
            let cur = cur_ms.max(0) as u64;
            let next = next.max(0) as u64;
            Duration::from_millis(next.saturating_sub(cur)).max(MIN_FRAME_DELAY)
        }
        None => DEFAULT_FRAME_DELAY,
    }
}

fn frame_to_rgba(index: usize, frame: &webp::AnimFrame<'_>) -> Result<RgbaImage> {
    let width = frame.width();
    let height = frame.height();
    let data = frame.get_image();

    let rgba = match frame.get_layout() {
        webp::PixelLayout::Rgb => {
            let mut buf = Vec::with_capacity(data.len() / 3 * 4);
            for px in data.chunks_exact(3) {
                buf.extend_from_slice(px);
                buf.push(0xff);
            }
            buf
        }
        webp::PixelLayout::Rgba => data.to_vec(),
    };

    RgbaImage::from_raw(width, height, rgba).ok_or_else(|| {
        DecodeError::Webp(format!(
            "frame {index}: pixel buffer does not cover {width}x{height}"
        ))
        .into()
    })
}
