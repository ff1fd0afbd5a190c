use crate::error::Error;
use crate::Result;

/// A fetched resource: raw bytes plus the content type the transport
/// reported, if it reported one.
#[derive(Debug, Clone)]
pub struct FetchedBytes {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Byte-source collaborator for the image loader.
///
/// Implementations run on the loader's decode threads and may block.
pub trait FetchBytes: Send + Sync {
    fn fetch(&self, url: &str) -> Result<FetchedBytes>;
}

/// HTTP byte source.
pub struct HttpFetcher;

impl FetchBytes for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<FetchedBytes> {
        let request = ehttp::Request::get(url);
        let response = ehttp::fetch_blocking(&request).map_err(Error::Fetch)?;

        if !response.ok {
            return Err(Error::Fetch(format!(
                "{url}: http {} {}",
                response.status, response.status_text
            )));
        }

        Ok(FetchedBytes {
            content_type: response.content_type().map(|ct| ct.to_owned()),
            bytes: response.bytes,
        })
    }
}
