pub type CardsmithResult<T> = Result<T, CardsmithError>;

#[derive(thiserror::Error, Debug)]
pub enum CardsmithError {
    #[error("malformed layout: {0}")]
    MalformedLayout(String),

    #[error("missing asset: {0}")]
    MissingAsset(String),

    #[error("data error: {0}")]
    Data(String),

    #[error("render failure: {0}")]
    Render(String),

    #[error("external tool failure: {0}")]
    ExternalTool(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CardsmithError {
    pub fn malformed_layout(msg: impl Into<String>) -> Self {
        Self::MalformedLayout(msg.into())
    }

    pub fn missing_asset(msg: impl Into<String>) -> Self {
        Self::MissingAsset(msg.into())
    }

    pub fn data(msg: impl Into<String>) -> Self {
        Self::Data(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    pub fn external_tool(msg: impl Into<String>) -> Self {
        Self::ExternalTool(msg.into())
    }
}
