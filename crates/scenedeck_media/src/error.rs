use std::io;

/// Media pipeline errors
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("fetch error: {0}")]
    Fetch(String),

    #[error("image error: {0}")]
    Image(#[from] image::error::ImageError),

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("generic error: {0}")]
    Generic(String),
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Generic(s)
    }
}

/// A malformed or truncated media bitstream. Always fatal to the decode
/// attempt that hit it; the pipeline never emits a partial animation.
#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("no frames decoded")]
    NoFrames,

    #[error("gif frame {index}: {source}")]
    Gif {
        index: usize,
        source: gif::DecodingError,
    },

    #[error("webp: {0}")]
    Webp(String),

    #[error("frame {index}: {actual} byte patch does not cover a {width}x{height} rect")]
    PatchSizeMismatch {
        index: usize,
        width: u32,
        height: u32,
        actual: usize,
    },

    #[error("frame {index}: empty {width}x{height} patch rect")]
    EmptyPatch { index: usize, width: u32, height: u32 },

    #[error(
        "frame {index}: patch rect {left},{top} {width}x{height} lies outside the {canvas_width}x{canvas_height} canvas"
    )]
    PatchOutOfBounds {
        index: usize,
        left: u32,
        top: u32,
        width: u32,
        height: u32,
        canvas_width: u32,
        canvas_height: u32,
    },

    #[error("frame {index}: {width}x{height} frame on a {canvas_width}x{canvas_height} canvas")]
    FrameSizeMismatch {
        index: usize,
        width: u32,
        height: u32,
        canvas_width: u32,
        canvas_height: u32,
    },
}

impl DecodeError {
    pub fn gif(index: usize, source: gif::DecodingError) -> Self {
        DecodeError::Gif { index, source }
    }
}
