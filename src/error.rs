use thiserror::Error;

pub const INVALID_INPUT: &str = "INVALID_INPUT";
pub const MEASUREMENT_FAILURE: &str = "MEASUREMENT_FAILURE";
pub const SURFACE_FAILURE: &str = "SURFACE_FAILURE";

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("text measurement returned {width} for {text:?}")]
    MeasurementFailure { text: String, width: f32 },

    #[error("drawing surface failed: {0}")]
    Surface(#[from] SurfaceError),
}

impl ChatError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Stable machine-readable code, printed by the CLI ahead of the message.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => INVALID_INPUT,
            Self::MeasurementFailure { .. } => MEASUREMENT_FAILURE,
            Self::Surface(_) => SURFACE_FAILURE,
        }
    }
}

#[derive(Error, Debug)]
pub enum SurfaceError {
    #[error("failed to allocate {width}x{height} canvas")]
    Allocate { width: u32, height: u32 },

    #[error("no font loaded for text drawing")]
    MissingFont,

    #[error("failed to encode frame: {0}")]
    Encode(String),
}

pub type Result<T> = std::result::Result<T, ChatError>;

pub fn find_chat_error(error: &anyhow::Error) -> Option<&ChatError> {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<ChatError>())
}
