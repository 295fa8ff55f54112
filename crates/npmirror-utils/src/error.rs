use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum PathError {
    #[error("Path is empty")]
    #[diagnostic(code(npmirror_utils::path::empty))]
    Empty,

    #[error("Failed to get current directory: {source}")]
    #[diagnostic(code(npmirror_utils::path::current_dir))]
    CurrentDir { source: std::io::Error },

    #[error("Environment variable `{var}` not set in `{input}`")]
    #[diagnostic(
        code(npmirror_utils::path::missing_env),
        help("Export the variable or use an absolute path")
    )]
    MissingEnvVar { var: String, input: String },

    #[error("Unclosed variable expression starting at `{input}`")]
    #[diagnostic(code(npmirror_utils::path::unclosed_variable))]
    UnclosedVariable { input: String },
}

#[derive(Error, Diagnostic, Debug)]
pub enum FileSystemError {
    #[error("Failed to {action} file `{}`: {source}", path.display())]
    #[diagnostic(code(npmirror_utils::fs::file))]
    File {
        path: PathBuf,
        action: &'static str,
        source: std::io::Error,
    },

    #[error("Failed to {action} directory `{}`: {source}", path.display())]
    #[diagnostic(code(npmirror_utils::fs::directory))]
    Directory {
        path: PathBuf,
        action: &'static str,
        source: std::io::Error,
    },

    #[error("`{}` is not a directory", path.display())]
    #[diagnostic(code(npmirror_utils::fs::not_a_directory))]
    NotADirectory { path: PathBuf },
}

#[derive(Error, Diagnostic, Debug)]
pub enum HashError {
    #[error("Failed to read file `{}`: {source}", path.display())]
    #[diagnostic(code(npmirror_utils::hash::read))]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type FileSystemResult<T> = std::result::Result<T, FileSystemError>;
pub type HashResult<T> = std::result::Result<T, HashError>;
pub type PathResult<T> = std::result::Result<T, PathError>;

#[cfg(test)]
mod tests {
    use std::{error::Error, io};

    use super::*;

    #[test]
    fn test_path_error_display() {
        assert_eq!(PathError::Empty.to_string(), "Path is empty");

        let err = PathError::MissingEnvVar {
            var: "STORE".to_string(),
            input: "$STORE/npm".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Environment variable `STORE` not set in `$STORE/npm`"
        );
    }

    #[test]
    fn test_file_system_error_source() {
        let err = FileSystemError::File {
            path: PathBuf::from("/tmp/left-pad-1.0.0.tgz"),
            action: "write",
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().starts_with("Failed to write file"));
        assert!(err.source().is_some());

        let err = FileSystemError::NotADirectory {
            path: PathBuf::from("/tmp/file"),
        };
        assert!(err.source().is_none());
    }
}
