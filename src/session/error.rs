use std::str::Utf8Error;
use std::string::FromUtf8Error;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // --------------------------------- generic errors --------------------------------------------
    #[error(transparent)]
    IO(#[from] std::io::Error),
    #[error(transparent)]
    Utf8(#[from] Utf8Error),
    #[error(transparent)]
    FromUtf8(#[from] FromUtf8Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    // --------------------------------- transport errors ------------------------------------------
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("connection is not open")]
    NotConnected,
    #[error("connection reset while a call was in flight")]
    ConnectionReset,
    #[error("failed to connect, please retry")]
    ConnectionExhausted,
    #[error("malformed http response: {0}")]
    HttpUpgrade(String),
    #[error("inspector reported no debuggable targets")]
    NoTargets,

    // --------------------------------- remote call errors ----------------------------------------
    #[error("{message}")]
    Rpc { code: i64, message: String },
    #[error("{message}")]
    Evaluation {
        name: String,
        message: String,
        stack: String,
    },

    // --------------------------------- session errors --------------------------------------------
    #[error("the target is not paused")]
    NotPaused,
    #[error("unknown script {0}")]
    UnknownScript(String),
    #[error("frame number {0} not found")]
    FrameNotFound(usize),

    // --------------------------------- child process errors --------------------------------------
    #[error("Target process: {0} doesn't exist.")]
    TargetNotFound(i32),
    #[error("target exited with {0:?}")]
    TargetExited(Option<i32>),
    #[error("spawn target: {0}")]
    Spawn(std::io::Error),
}

impl Error {
    /// Return a hint to an interface - continue debugging after error or stop whole process.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::IO(_) => false,
            Error::Utf8(_) => false,
            Error::FromUtf8(_) => false,
            Error::Json(_) => false,
            Error::Protocol(_) => false,
            Error::NotConnected => false,
            Error::ConnectionReset => false,
            Error::HttpUpgrade(_) => false,
            Error::NoTargets => false,
            Error::Rpc { .. } => false,
            Error::Evaluation { .. } => false,
            Error::NotPaused => false,
            Error::UnknownScript(_) => false,
            Error::FrameNotFound(_) => false,
            Error::TargetExited(_) => false,

            // currently fatal errors
            Error::ConnectionExhausted => true,
            Error::TargetNotFound(_) => true,
            Error::Spawn(_) => true,
        }
    }
}

/// Build the error-shaped value of a thrown evaluation: the class name, the
/// first non-prefix line of the description as message, the description as
/// the stack.
pub fn evaluation_error(exception: &crate::protocol::RemoteObject) -> Error {
    let description = exception.description.clone().unwrap_or_default();
    let name = exception
        .class_name
        .clone()
        .unwrap_or_else(|| "Error".to_string());
    let message = description
        .lines()
        .next()
        .map(|line| {
            // "ReferenceError: x is not defined" keeps only the message part
            match line.split_once(": ") {
                Some((prefix, rest)) if prefix.chars().all(|c| c.is_alphanumeric()) => rest,
                _ => line,
            }
            .to_string()
        })
        .unwrap_or_default();

    Error::Evaluation {
        name,
        message,
        stack: description,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::protocol::RemoteObject;

    #[test]
    fn test_evaluation_error_strips_name_prefix() {
        let exception = RemoteObject {
            kind: "object".to_string(),
            class_name: Some("ReferenceError".to_string()),
            description: Some(
                "ReferenceError: foo is not defined\n    at <anonymous>:1:1".to_string(),
            ),
            ..Default::default()
        };

        match evaluation_error(&exception) {
            Error::Evaluation {
                name,
                message,
                stack,
            } => {
                assert_eq!(name, "ReferenceError");
                assert_eq!(message, "foo is not defined");
                assert!(stack.contains("at <anonymous>"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
