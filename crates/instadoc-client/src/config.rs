use crate::ClientError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub url: String,
}

impl ClientConfig {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.trim_end_matches('/').to_owned(),
        }
    }

    /// Reject endpoints the HTTP transport cannot reach.
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.url.starts_with("http://") || self.url.starts_with("https://") {
            Ok(())
        } else {
            Err(ClientError::Config(format!(
                "store endpoint must be an http(s) URI, got '{}'",
                self.url
            )))
        }
    }
}
