pub mod gif;
pub mod network;
pub mod webp;

pub use self::gif::decode_gif;
pub use self::webp::{decode_webp, detect_webp_type, WebpType};

use std::time::Duration;

use image::RgbaImage;

use crate::sequence::Sequence;
use crate::urls::MediaType;
use crate::Result;

/// Minimum per-frame hold time. Broken encoders write zero (or negative)
/// delays; browsers clamp these and so do we.
pub(crate) const MIN_FRAME_DELAY: Duration = Duration::from_millis(10);

/// Hold time for a frame with no usable timing information.
pub(crate) const DEFAULT_FRAME_DELAY: Duration = Duration::from_millis(100);

/// Output of a format decoder: every frame is a fully-composited
/// `width`x`height` RGBA raster, display-ready as-is. Patches and disposal
/// bookkeeping never escape the decoders.
///
/// Invariant: `frames.len() == durations.len() >= 1`, every frame has the
/// declared canvas dimensions, and every duration is at least
/// [`MIN_FRAME_DELAY`].
#[derive(Debug)]
pub struct DecodedImage {
    pub frames: Vec<RgbaImage>,
    pub durations: Vec<Duration>,
    pub width: u32,
    pub height: u32,
}

impl DecodedImage {
    /// Wrap the frame list in a playback [`Sequence`].
    pub fn into_sequence(self, looping: bool) -> Sequence<RgbaImage> {
        Sequence::new(self.frames.into_iter().zip(self.durations), looping)
    }
}

/// What a decode produced: a single raster or an animation.
pub enum DecodedMedia {
    Static(RgbaImage),
    Animated(DecodedImage),
}

/// Decode fetched bytes according to the resolved media type.
///
/// GIFs always come back animated (a single-frame GIF is a one-frame
/// animation); WebP is classified first since the container carries both
/// static and animated payloads. Everything else goes through the
/// general-purpose decoder.
pub fn decode_media(media_type: MediaType, bytes: &[u8]) -> Result<DecodedMedia> {
    match media_type {
        MediaType::Gif => Ok(DecodedMedia::Animated(decode_gif(bytes)?)),
        MediaType::Webp => match detect_webp_type(bytes) {
            WebpType::Animated => Ok(DecodedMedia::Animated(decode_webp(bytes)?)),
            WebpType::Static => Ok(DecodedMedia::Static(webp::decode_static_webp(bytes)?)),
        },
        MediaType::Image => decode_static(bytes).map(DecodedMedia::Static),
    }
}

fn decode_static(bytes: &[u8]) -> Result<RgbaImage> {
    let dyn_image = image::load_from_memory(bytes)?;
    Ok(dyn_image.to_rgba8())
}
