use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("A selection is required.")]
    NoSelection,

    #[error(
        "Selection is {actual} pixels, {ratio:.1} times the maximum of {limit}.  Aborting for safety."
    )]
    SelectionTooLarge { actual: u64, limit: u64, ratio: f64 },

    #[error("invalid selection: {detail}")]
    InvalidSelection { detail: String },

    #[error("path is not valid UTF-8: {path}")]
    NonUtf8Path { path: String },

    #[error("external tool failed: {0}")]
    ExternalTool(#[from] ToolFailure),
}

/// Failures of the jpegpixi process or of its output file.
#[derive(Debug, Error)]
pub enum ToolFailure {
    #[error("could not launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {}: {stderr}", status_label(.code))]
    Exit {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("{program} timed out after {secs}s")]
    Timeout { program: String, secs: u64 },

    #[error("{program} did not produce a readable output image {path}: {reason}")]
    MissingOutput {
        program: String,
        path: String,
        reason: String,
    },
}

fn status_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "no status (terminated by signal)".to_string(),
    }
}
