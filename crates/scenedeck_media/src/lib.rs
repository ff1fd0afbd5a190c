mod error;
mod imgcache;
pub mod media;
mod result;
pub mod sequence;
mod urls;

pub use error::{DecodeError, Error};
pub use imgcache::{ImageLoader, ImageState, LoadedImage};
pub use media::gif::decode_gif;
pub use media::network::{FetchBytes, FetchedBytes, HttpFetcher};
pub use media::webp::{decode_webp, detect_webp_type, WebpType};
pub use media::{decode_media, DecodedImage, DecodedMedia};
pub use result::Result;
pub use sequence::Sequence;
pub use urls::{resolve_media_type, MediaType};
