use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("no usable Chromium-family installation was found")]
    NoInstallationFound,
    #[error("failed to launch browser process: {0}")]
    LaunchFailed(String),
    #[error("browser process exited before becoming ready")]
    ProcessDied,
    #[error("timed out waiting for the browser to become ready")]
    Timeout,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("http error talking to the debug port: {0}")]
    Http(#[from] reqwest::Error),
    #[error("malformed response from the debug port: {0}")]
    MalformedResponse(String),
    #[error(transparent)]
    Provision(#[from] cdp_provision::ProvisionError),
}
