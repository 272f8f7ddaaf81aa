use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid default rule template: {0}")]
    InvalidTemplate(String),

    #[error("Invalid constraint expression: {0}")]
    InvalidConstraint(String),

    #[error("Invalid label {key}: {reason}")]
    InvalidLabel { key: String, reason: String },
}
