use std::collections::HashMap;
use std::sync::Arc;
use std::thread;

use image::RgbaImage;
use poll_promise::Promise;

use crate::error::Error;
use crate::media::network::{FetchBytes, FetchedBytes};
use crate::media::{decode_media, DecodedMedia};
use crate::sequence::Sequence;
use crate::urls::resolve_media_type;
use crate::Result;

/// A decoded, render-ready media entry.
pub enum LoadedImage {
    /// A single raster, blitted as-is.
    Static(RgbaImage),
    /// A looping animation; advance it with [`Sequence::update`] once per
    /// render tick.
    Animated(Sequence<RgbaImage>),
    /// Nothing to draw. Substituted when a load fails and the fallback
    /// placeholder cannot be loaded either; not an error.
    Empty,
}

impl LoadedImage {
    pub fn is_animated(&self) -> bool {
        matches!(self, LoadedImage::Animated(_))
    }

    fn from_decoded(media: DecodedMedia) -> Self {
        match media {
            DecodedMedia::Static(image) => LoadedImage::Static(image),
            DecodedMedia::Animated(decoded) => LoadedImage::Animated(decoded.into_sequence(true)),
        }
    }
}

impl std::fmt::Debug for LoadedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Static(image) => f.debug_tuple("Static").field(&image.dimensions()).finish(),
            Self::Animated(seq) => f.debug_tuple("Animated").field(&seq.len()).finish(),
            Self::Empty => write!(f, "Empty"),
        }
    }
}

type LoadPromise = Promise<Option<Result<LoadedImage>>>;

/// One cache slot: a decode in flight, or its result.
pub enum ImageState {
    Pending(LoadPromise),
    Loaded(LoadedImage),
}

struct CacheEntry {
    state: ImageState,
    last_used: u64,
}

/// Deduplicating front door to the decode pipeline.
///
/// Keyed by source URL; one decode is in flight per URL no matter how many
/// callers poll it (single-flight). Failed entries are evicted so the next
/// call retries, and callers are served a fallback placeholder instead of
/// an error. There is no cancellation: once started, a load runs to
/// completion even if nobody is left polling for it.
pub struct ImageLoader {
    fetcher: Arc<dyn FetchBytes>,
    cache: HashMap<String, CacheEntry>,
    fallback_url: Option<String>,
    max_entries: Option<usize>,
    clock: u64,
}

impl ImageLoader {
    pub fn new(fetcher: Arc<dyn FetchBytes>) -> Self {
        Self {
            fetcher,
            cache: HashMap::new(),
            fallback_url: None,
            max_entries: None,
            clock: 0,
        }
    }

    /// Serve `url` in place of media that failed to load.
    ///
    /// The placeholder goes through the normal load path, so it is decoded
    /// once and cached like anything else.
    pub fn set_fallback_url(&mut self, url: impl Into<String>) {
        self.fallback_url = Some(url.into());
    }

    /// Bound the cache, evicting the least-recently-used resolved entry
    /// once `max` entries are reached. In-flight loads are never evicted.
    /// Unbounded by default.
    pub fn set_max_entries(&mut self, max: usize) {
        self.max_entries = Some(max);
    }

    pub fn contains(&self, url: &str) -> bool {
        self.cache.contains_key(url)
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Get the image for `url`, starting a decode on first sight.
    ///
    /// Returns `None` while the decode is in flight; poll again next tick.
    /// A failed decode is logged, its entry evicted (the next call
    /// retries), and the fallback placeholder is served in its place.
    pub fn load(&mut self, url: &str) -> Option<&mut LoadedImage> {
        self.clock += 1;
        let clock = self.clock;

        let Some(entry) = self.cache.get_mut(url) else {
            self.start_load(url);
            return None;
        };
        entry.last_used = clock;

        let resolved = match &mut entry.state {
            ImageState::Loaded(_) => None,
            ImageState::Pending(promise) => match promise.ready_mut() {
                None => return None,
                Some(slot) => match slot.take() {
                    Some(result) => Some(result),
                    None => return None,
                },
            },
        };

        match resolved {
            None => {}
            Some(Ok(image)) => entry.state = ImageState::Loaded(image),
            Some(Err(err)) => {
                tracing::warn!("failed to load {url}: {err}");
                self.cache.remove(url);
                return self.serve_fallback(url);
            }
        }

        match &mut self.cache.get_mut(url)?.state {
            ImageState::Loaded(image) => Some(image),
            ImageState::Pending(_) => None,
        }
    }

    /// Insert the pending entry before the worker spawns so a concurrent
    /// caller joins this decode instead of starting its own.
    fn start_load(&mut self, url: &str) {
        self.evict_for_capacity();

        let (sender, promise) = Promise::new();
        self.cache.insert(
            url.to_owned(),
            CacheEntry {
                state: ImageState::Pending(promise),
                last_used: self.clock,
            },
        );

        let fetcher = self.fetcher.clone();
        let task_url = url.to_owned();
        thread::spawn(move || {
            let result = fetch_and_decode(fetcher.as_ref(), &task_url);
            sender.send(Some(result));
        });
    }

    fn serve_fallback(&mut self, failed_url: &str) -> Option<&mut LoadedImage> {
        let fallback = self.fallback_url.clone()?;

        if failed_url == fallback {
            // The placeholder itself is broken. Pin an empty image under
            // its key so it is not refetched on every substitution.
            tracing::error!("fallback image {failed_url} failed to load");
            let clock = self.clock;
            let entry = self.cache.entry(fallback).or_insert_with(|| CacheEntry {
                state: ImageState::Loaded(LoadedImage::Empty),
                last_used: clock,
            });
            return match &mut entry.state {
                ImageState::Loaded(image) => Some(image),
                ImageState::Pending(_) => None,
            };
        }

        self.load(&fallback)
    }

    fn evict_for_capacity(&mut self) {
        let Some(max) = self.max_entries else {
            return;
        };

        while self.cache.len() >= max.max(1) {
            let victim = self
                .cache
                .iter()
                .filter(|(_, entry)| matches!(entry.state, ImageState::Loaded(_)))
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(url, _)| url.clone());

            match victim {
                Some(url) => {
                    tracing::trace!("evicting {url}");
                    self.cache.remove(&url);
                }
                None => break,
            }
        }
    }
}

fn fetch_and_decode(fetcher: &dyn FetchBytes, url: &str) -> Result<LoadedImage> {
    tracing::trace!("fetching {url}");
    let FetchedBytes {
        bytes,
        content_type,
    } = fetcher.fetch(url)?;

    let media_type = resolve_media_type(url, content_type.as_deref(), &bytes);
    tracing::trace!("decoding {url} as {media_type:?}");

    let media = decode_media(media_type, &bytes)?;
    Ok(LoadedImage::from_decoded(media))
}
