//! Evaluation errors
use thiserror::Error;

#[derive(Eq, PartialEq, Debug, Clone, Error)]
pub enum EvalError {
    #[error("unbound parameter {0}")]
    UnboundParameter(String),
    #[error("member {member} not available on {value}")]
    NoSuchMember { member: String, value: String },
    #[error("null reference reading {0}")]
    NullReference(String),
    #[error("cannot apply {op} to {left} and {right}")]
    BadOperands {
        op: String,
        left: String,
        right: String,
    },
    #[error("cannot apply {op} to {operand}")]
    BadOperand { op: String, operand: String },
    #[error("arithmetic overflow or division by zero in {0}")]
    Arithmetic(String),
    #[error("cannot convert {value} to {target}")]
    BadConversion { value: String, target: String },
    #[error("method {0} is not supported by the evaluator")]
    UnsupportedMethod(String),
    #[error("expected {expected} but found {found}")]
    TypeMismatch { expected: String, found: String },
    #[error("sequence contains no elements")]
    EmptySequence,
    #[error("index {0} out of range")]
    IndexOutOfRange(i64),
}
