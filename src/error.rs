use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("I/O error while {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON error while {context}: {source}")]
    Json {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("{context}: {message}")]
    Runtime {
        context: &'static str,
        message: String,
    },
    /// A JSONL row that does not parse or breaks a dataset rule.
    #[error("{file} line {line}: {message}")]
    Dataset {
        file: &'static str,
        line: usize,
        message: String,
    },
    /// A sample whose prediction is missing or unusable.
    #[error("sample {id:?}: {message}")]
    Sample { id: String, message: String },
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
}

impl EvalError {
    pub(crate) fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }

    pub(crate) fn json(context: &'static str, source: serde_json::Error) -> Self {
        Self::Json { context, source }
    }

    pub(crate) fn runtime(context: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Runtime {
            context,
            message: err.to_string(),
        }
    }

    pub(crate) fn dataset(file: &'static str, line: usize, err: impl std::fmt::Display) -> Self {
        Self::Dataset {
            file,
            line,
            message: err.to_string(),
        }
    }

    pub(crate) fn sample(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Sample {
            id: id.into(),
            message: message.into(),
        }
    }

    pub(crate) fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }
}
