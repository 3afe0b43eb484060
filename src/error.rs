use std::path::PathBuf;
use std::time::Duration;

/// Fatal errors. Anything that can fail partially (dropped plan entries,
/// skipped embeds, multimodal degradation) is reported as data instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("malformed document: {0}")]
    MalformedDocument(String),

    #[error("inference failed on {provider}: {source}")]
    InferenceTransport {
        provider: String,
        #[source]
        source: InferenceError,
    },

    #[error("cannot write {}: {reason}", path.display())]
    DocumentWrite { path: PathBuf, reason: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<roxmltree::Error> for Error {
    fn from(e: roxmltree::Error) -> Self {
        Error::MalformedDocument(format!("XML parse error: {e}"))
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(e: zip::result::ZipError) -> Self {
        Error::MalformedDocument(format!("ZIP container error: {e}"))
    }
}

/// Failures at the model boundary. In multimodal mode every variant triggers
/// the text-only retry; in text-only mode they are fatal.
#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("provider returned HTTP {status}: {body}")]
    Provider { status: u16, body: String },

    #[error("provider returned an empty reply")]
    EmptyReply,

    #[error("reply is not a placement plan: {0}")]
    MalformedReply(String),

    #[error("provider does not accept image input")]
    ImagesUnsupported,
}

impl InferenceError {
    pub(crate) fn from_reqwest(e: reqwest::Error, timeout: Duration) -> Self {
        if e.is_timeout() {
            InferenceError::Timeout(timeout)
        } else {
            InferenceError::Transport(e.to_string())
        }
    }
}
