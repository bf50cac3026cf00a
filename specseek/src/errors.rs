use forust_ml::errors::ForustError;
use std::fmt::Display;
use std::path::PathBuf;

/// Errors raised by the deterministic feature core.
///
/// These are precondition violations or degenerate-data conditions; the
/// ingestion and serving boundaries decide which of them are recoverable.
#[derive(Debug)]
pub enum DataProcessingError {
    ExpectedSlicesSameLength {
        expected: usize,
        other: usize,
        context: String,
    },
    ExpectedNonEmptyData {
        context: Option<String>,
    },
    ExpectedVectorLength {
        real: usize,
        expected: usize,
        context: String,
    },
    InsufficientData {
        real: usize,
        expected: usize,
        context: String,
    },
    /// No peaks cleared the prominence threshold; the feature vector would
    /// be all zeros and must not reach the classifier.
    DegenerateSpectrum {
        context: String,
    },
    /// A two-column spectrum file that is not actually two columns of
    /// at least two samples.
    MalformedShape {
        context: String,
    },
    InvalidParameter {
        param: &'static str,
        context: String,
    },
}

impl DataProcessingError {
    pub fn append_to_context(mut self, extra: &str) -> Self {
        match &mut self {
            DataProcessingError::ExpectedSlicesSameLength { context, .. }
            | DataProcessingError::ExpectedVectorLength { context, .. }
            | DataProcessingError::InsufficientData { context, .. }
            | DataProcessingError::DegenerateSpectrum { context }
            | DataProcessingError::MalformedShape { context }
            | DataProcessingError::InvalidParameter { context, .. } => {
                context.push_str(extra);
            }
            DataProcessingError::ExpectedNonEmptyData { context } => match context {
                Some(x) => x.push_str(extra),
                None => *context = Some(extra.to_string()),
            },
        }
        self
    }
}

/// Errors around persisting and re-loading a trained model bundle.
#[derive(Debug)]
pub enum ModelError {
    ManifestParsingError {
        source: serde_json::Error,
        context: &'static str,
    },
    BoosterError {
        source: ForustError,
        context: String,
    },
    /// The bundle's booster files do not match its label set.
    InconsistentBundle {
        labels: usize,
        boosters: usize,
    },
    /// A feature vector whose length does not match the schema the model
    /// was trained with.
    SchemaMismatch {
        expected: usize,
        real: usize,
    },
}

#[derive(Debug)]
pub enum SpecSeekError {
    Io {
        source: std::io::Error,
        path: Option<PathBuf>,
    },
    ParseError {
        msg: String,
    },
    DataProcessingError(DataProcessingError),
    ModelError(ModelError),
}

impl Display for SpecSeekError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

pub type Result<T> = std::result::Result<T, SpecSeekError>;

impl From<DataProcessingError> for SpecSeekError {
    fn from(x: DataProcessingError) -> Self {
        Self::DataProcessingError(x)
    }
}

impl From<ModelError> for SpecSeekError {
    fn from(x: ModelError) -> Self {
        Self::ModelError(x)
    }
}

impl From<ForustError> for SpecSeekError {
    fn from(x: ForustError) -> Self {
        Self::ModelError(ModelError::BoosterError {
            source: x,
            context: "".to_string(),
        })
    }
}

impl From<serde_json::Error> for SpecSeekError {
    fn from(val: serde_json::Error) -> Self {
        SpecSeekError::ParseError {
            msg: val.to_string(),
        }
    }
}

impl From<std::num::ParseFloatError> for SpecSeekError {
    fn from(x: std::num::ParseFloatError) -> Self {
        Self::ParseError { msg: x.to_string() }
    }
}

impl From<csv::Error> for SpecSeekError {
    fn from(x: csv::Error) -> Self {
        Self::ParseError { msg: x.to_string() }
    }
}
