use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProjectEvalError {
    #[error("Invalid input: {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    /// Raised when a calculation needs more periods than it was given
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Division by zero in {context}")]
    DivisionByZero { context: String },

    /// Decimal range exceeded, typically by compounding over a long horizon
    #[error("Arithmetic overflow in {context}")]
    ArithmeticOverflow { context: String },
}
