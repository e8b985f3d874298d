use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}. Please ensure it exists.")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("API key not found: set the {0} environment variable")]
    MissingApiKey(String),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Model endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed model response: {0}")]
    MalformedResponse(String),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RequestError {
    #[error("Grade level must be between 1 and 12, got {0}")]
    GradeOutOfRange(u32),

    #[error("Questions per section must be between 1 and 20, got {0}")]
    QuestionsOutOfRange(u32),

    #[error("At least one topic must be provided")]
    NoTopics,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Lesson store I/O failed for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Lesson store at {path} is corrupt: {source}")]
    Serialization {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("PDF content encoding failed: {0}")]
    Encoding(String),

    #[error("PDF save failed: {0}")]
    Save(String),
}

#[derive(Error, Debug)]
pub enum WorksheetError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

pub type Result<T> = std::result::Result<T, WorksheetError>;
