//! Resource fetching for XInclude.
//!
//! The XIncluder never touches the file system or network itself; it asks a
//! [`Fetcher`] for the bytes behind a resolved URI. [`FileFetcher`] serves
//! `file:` URLs and plain paths, [`HttpFetcher`] serves `http:` and `https:`
//! URLs (with the `http` feature), and [`DefaultFetcher`] picks between them
//! by scheme. [`MemoryFetcher`] serves an in-memory map, and any closure
//! `Fn(&FetchRequest) -> io::Result<Resource>` works too.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use url::Url;

/// What the XIncluder asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// The absolute (or, without a base URI, relative) resource URI, with
    /// no fragment identifier.
    pub uri: String,
    /// The include element's `accept` attribute, already checked to be
    /// printable ASCII.
    pub accept: Option<String>,
    /// The include element's `accept-language` attribute, already checked
    /// to be printable ASCII.
    pub accept_language: Option<String>,
}

impl FetchRequest {
    /// Creates a request with no content negotiation headers.
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            accept: None,
            accept_language: None,
        }
    }
}

/// A fetched resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    /// The URI the content was actually served from.
    pub uri: String,
    /// The raw bytes.
    pub content: Vec<u8>,
    /// The transport media type, e.g. `text/plain; charset=ISO-8859-1`.
    pub content_type: Option<String>,
    /// The transport content coding, e.g. `gzip`. Only `identity` is
    /// accepted.
    pub content_encoding: Option<String>,
    /// The length the transport announced.
    pub content_length: Option<usize>,
}

impl Resource {
    /// Creates a resource with no transport metadata.
    pub fn new(uri: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            uri: uri.into(),
            content: content.into(),
            content_type: None,
            content_encoding: None,
            content_length: None,
        }
    }

    /// Sets the media type.
    #[must_use]
    pub fn with_content_type(mut self, content_type: &str) -> Self {
        self.content_type = Some(content_type.to_string());
        self
    }

    /// Sets the content coding.
    #[must_use]
    pub fn with_content_encoding(mut self, encoding: &str) -> Self {
        self.content_encoding = Some(encoding.to_string());
        self
    }

    /// Sets the announced length.
    #[must_use]
    pub fn with_content_length(mut self, length: usize) -> Self {
        self.content_length = Some(length);
        self
    }

    /// Checks the transport metadata against the content.
    ///
    /// # Errors
    ///
    /// Returns an `InvalidData` error if the announced length differs from
    /// the content length or the content coding is not `identity`.
    pub fn validate(&self) -> io::Result<()> {
        if let Some(length) = self.content_length {
            if length != self.content.len() {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "{}: announced {length} bytes but received {}",
                        self.uri,
                        self.content.len()
                    ),
                ));
            }
        }
        if let Some(coding) = &self.content_encoding {
            if !coding.trim().eq_ignore_ascii_case("identity") {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("{}: unsupported content encoding {coding}", self.uri),
                ));
            }
        }
        Ok(())
    }
}

/// A source of included resources.
pub trait Fetcher {
    /// Retrieves the resource named by `request.uri`.
    ///
    /// # Errors
    ///
    /// Any `io::Error`; the XIncluder treats it as a resource error, which
    /// an `xi:fallback` can recover from.
    fn fetch(&self, request: &FetchRequest) -> io::Result<Resource>;
}

impl<F> Fetcher for F
where
    F: Fn(&FetchRequest) -> io::Result<Resource>,
{
    fn fetch(&self, request: &FetchRequest) -> io::Result<Resource> {
        self(request)
    }
}

/// Reads `file:` URLs and plain paths from the local file system.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileFetcher;

impl FileFetcher {
    fn path_for(uri: &str) -> io::Result<PathBuf> {
        if uri.starts_with("file:") {
            let url = Url::parse(uri).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
            return url.to_file_path().map_err(|()| {
                io::Error::new(io::ErrorKind::InvalidInput, format!("{uri} is not a local file"))
            });
        }
        if crate::util::uri::is_absolute(uri) {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("no fetcher for {uri}"),
            ));
        }
        Ok(PathBuf::from(uri))
    }
}

impl Fetcher for FileFetcher {
    fn fetch(&self, request: &FetchRequest) -> io::Result<Resource> {
        let path = Self::path_for(&request.uri)?;
        tracing::debug!(uri = %request.uri, path = %path.display(), "reading included file");
        let content = std::fs::read(&path)?;
        let content_type = match path.extension().and_then(|e| e.to_str()) {
            Some("xml" | "xsd" | "xsl" | "xslt") => Some("application/xml".to_string()),
            Some("txt") => Some("text/plain".to_string()),
            _ => None,
        };
        Ok(Resource {
            content_type,
            ..Resource::new(request.uri.clone(), content)
        })
    }
}

/// Retrieves `http:` and `https:` URLs with a blocking `reqwest` client.
///
/// The request's `accept` and `accept_language` become `Accept` and
/// `Accept-Language` headers. `Content-Type`, `Content-Encoding` and
/// `Content-Length` of the response are copied into the [`Resource`], whose
/// `uri` is the URL after redirects. A non-success status is an error.
#[cfg(feature = "http")]
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

#[cfg(feature = "http")]
impl HttpFetcher {
    /// Creates a fetcher with a default client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a fetcher around a configured client (timeouts, proxies,
    /// redirect policy).
    #[must_use]
    pub fn with_client(client: reqwest::blocking::Client) -> Self {
        Self { client }
    }
}

#[cfg(feature = "http")]
impl Fetcher for HttpFetcher {
    fn fetch(&self, request: &FetchRequest) -> io::Result<Resource> {
        use reqwest::header::{
            HeaderName, ACCEPT, ACCEPT_LANGUAGE, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE,
        };
        use reqwest::StatusCode;

        let mut outgoing = self.client.get(&request.uri);
        if let Some(accept) = &request.accept {
            outgoing = outgoing.header(ACCEPT, accept);
        }
        if let Some(language) = &request.accept_language {
            outgoing = outgoing.header(ACCEPT_LANGUAGE, language);
        }
        tracing::debug!(uri = %request.uri, "requesting included resource");
        let response = outgoing.send().map_err(http_error)?;

        let status = response.status();
        if !status.is_success() {
            let kind = match status {
                StatusCode::NOT_FOUND | StatusCode::GONE => io::ErrorKind::NotFound,
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => io::ErrorKind::PermissionDenied,
                _ => io::ErrorKind::Other,
            };
            return Err(io::Error::new(kind, format!("{}: HTTP status {status}", request.uri)));
        }

        let header = |name: HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };
        let content_type = header(CONTENT_TYPE);
        let content_encoding = header(CONTENT_ENCODING);
        let content_length = header(CONTENT_LENGTH).and_then(|v| v.trim().parse().ok());
        let uri = response.url().to_string();
        let content = response.bytes().map_err(http_error)?.to_vec();
        Ok(Resource {
            uri,
            content,
            content_type,
            content_encoding,
            content_length,
        })
    }
}

#[cfg(feature = "http")]
fn http_error(err: reqwest::Error) -> io::Error {
    let kind = if err.is_timeout() {
        io::ErrorKind::TimedOut
    } else if err.is_connect() {
        io::ErrorKind::ConnectionRefused
    } else {
        io::ErrorKind::Other
    };
    io::Error::new(kind, err)
}

/// Sends `http:` and `https:` URLs to an [`HttpFetcher`] and everything
/// else to [`FileFetcher`]. Without the `http` feature, web URLs fail as
/// unsupported.
#[derive(Debug, Clone, Default)]
pub struct DefaultFetcher {
    #[cfg(feature = "http")]
    http: HttpFetcher,
}

impl DefaultFetcher {
    /// Creates a fetcher for local files and, with the `http` feature, the
    /// web.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Fetcher for DefaultFetcher {
    fn fetch(&self, request: &FetchRequest) -> io::Result<Resource> {
        #[cfg(feature = "http")]
        {
            let scheme = request.uri.split_once(':').map(|(scheme, _)| scheme);
            if scheme.is_some_and(|s| s.eq_ignore_ascii_case("http") || s.eq_ignore_ascii_case("https")) {
                return self.http.fetch(request);
            }
        }
        FileFetcher.fetch(request)
    }
}

/// Serves resources from memory and records every request.
///
/// # Examples
///
/// ```
/// use xmlcore::xinclude::fetch::{FetchRequest, Fetcher, MemoryFetcher};
///
/// let mut fetcher = MemoryFetcher::new();
/// fetcher.insert("mem:/a.txt", "hello");
/// let resource = fetcher.fetch(&FetchRequest::new("mem:/a.txt")).unwrap();
/// assert_eq!(resource.content, b"hello");
/// assert!(fetcher.fetch(&FetchRequest::new("mem:/b.txt")).is_err());
/// assert_eq!(fetcher.requests(), vec!["mem:/a.txt", "mem:/b.txt"]);
/// ```
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    resources: HashMap<String, Resource>,
    requests: Mutex<Vec<String>>,
}

impl MemoryFetcher {
    /// Creates an empty fetcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `content` at `uri`.
    pub fn insert(&mut self, uri: &str, content: impl Into<Vec<u8>>) {
        self.insert_resource(Resource::new(uri, content));
    }

    /// Serves a resource with full metadata at its `uri`.
    pub fn insert_resource(&mut self, resource: Resource) {
        self.resources.insert(resource.uri.clone(), resource);
    }

    /// Returns the URIs requested so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }
}

impl Fetcher for MemoryFetcher {
    fn fetch(&self, request: &FetchRequest) -> io::Result<Resource> {
        if let Ok(mut log) = self.requests.lock() {
            log.push(request.uri.clone());
        }
        self.resources.get(&request.uri).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("{} not found", request.uri))
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn test_length_mismatch_rejected() {
        let resource = Resource::new("mem:/a", "abc").with_content_length(4);
        assert_eq!(resource.validate().unwrap_err().kind(), io::ErrorKind::InvalidData);
        assert!(Resource::new("mem:/a", "abc").with_content_length(3).validate().is_ok());
    }

    #[test]
    fn test_content_encoding_must_be_identity() {
        let gzip = Resource::new("mem:/a", "abc").with_content_encoding("gzip");
        assert!(gzip.validate().is_err());
        let identity = Resource::new("mem:/a", "abc").with_content_encoding("Identity");
        assert!(identity.validate().is_ok());
    }

    #[test]
    fn test_file_fetcher_reads_file_url() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"<r/>").unwrap();
        let url = Url::from_file_path(file.path()).unwrap();
        let resource = FileFetcher.fetch(&FetchRequest::new(url.as_str())).unwrap();
        assert_eq!(resource.content, b"<r/>");
        assert_eq!(resource.uri, url.as_str());
    }

    #[test]
    fn test_file_fetcher_rejects_other_schemes() {
        let err = FileFetcher
            .fetch(&FetchRequest::new("http://example.com/a.xml"))
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.xml");
        let err = FileFetcher
            .fetch(&FetchRequest::new(path.to_string_lossy()))
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_default_fetcher_reads_files() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"local").unwrap();
        let url = Url::from_file_path(file.path()).unwrap();
        let resource = DefaultFetcher::new().fetch(&FetchRequest::new(url.as_str())).unwrap();
        assert_eq!(resource.content, b"local");
    }

    #[test]
    fn test_closure_fetcher() {
        let fetcher = |request: &FetchRequest| -> io::Result<Resource> {
            Ok(Resource::new(request.uri.clone(), "x"))
        };
        assert_eq!(fetcher.fetch(&FetchRequest::new("any")).unwrap().content, b"x");
    }

    #[cfg(feature = "http")]
    mod http {
        use super::*;
        use std::io::{Read as _, Write as _};
        use std::net::TcpListener;
        use std::thread::{self, JoinHandle};

        /// Answers one request with `response` and hands back the raw
        /// request head.
        fn serve_once(response: &'static [u8]) -> (String, JoinHandle<String>) {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            let address = listener.local_addr().unwrap();
            let handle = thread::spawn(move || {
                let (mut stream, _) = listener.accept().unwrap();
                let mut head = Vec::new();
                let mut buf = [0u8; 1024];
                while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = stream.read(&mut buf).unwrap();
                    if n == 0 {
                        break;
                    }
                    head.extend_from_slice(&buf[..n]);
                }
                stream.write_all(response).unwrap();
                String::from_utf8_lossy(&head).to_ascii_lowercase()
            });
            (format!("http://{address}/doc.txt"), handle)
        }

        #[test]
        fn test_http_headers_sent_and_mapped() {
            let (url, server) = serve_once(
                b"HTTP/1.1 200 OK\r\nContent-Type: text/plain; charset=ISO-8859-1\r\n\
                  Content-Length: 4\r\nConnection: close\r\n\r\ncaf\xe9",
            );
            let request = FetchRequest {
                uri: url.clone(),
                accept: Some("text/plain".to_string()),
                accept_language: Some("fr".to_string()),
            };
            let resource = HttpFetcher::new().fetch(&request).unwrap();
            let head = server.join().unwrap();

            assert!(head.contains("\r\naccept: text/plain\r\n"), "{head}");
            assert!(head.contains("\r\naccept-language: fr\r\n"), "{head}");
            assert_eq!(resource.uri, url);
            assert_eq!(resource.content, b"caf\xe9");
            assert_eq!(
                resource.content_type.as_deref(),
                Some("text/plain; charset=ISO-8859-1")
            );
            assert_eq!(resource.content_length, Some(4));
            assert!(resource.validate().is_ok());
        }

        #[test]
        fn test_http_content_encoding_is_reported() {
            let (url, server) = serve_once(
                b"HTTP/1.1 200 OK\r\nContent-Encoding: gzip\r\nContent-Length: 3\r\n\
                  Connection: close\r\n\r\nabc",
            );
            let resource = DefaultFetcher::new().fetch(&FetchRequest::new(url)).unwrap();
            server.join().unwrap();
            assert_eq!(resource.content_encoding.as_deref(), Some("gzip"));
            assert_eq!(resource.validate().unwrap_err().kind(), io::ErrorKind::InvalidData);
        }

        #[test]
        fn test_http_not_found() {
            let (url, server) = serve_once(
                b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            );
            let err = HttpFetcher::new().fetch(&FetchRequest::new(url)).unwrap_err();
            server.join().unwrap();
            assert_eq!(err.kind(), io::ErrorKind::NotFound);
        }
    }
}
