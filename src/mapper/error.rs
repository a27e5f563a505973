//! Errors mapping values between types
use crate::eval::error::EvalError;
use thiserror::Error;

#[derive(Eq, PartialEq, Debug, Clone, Error)]
pub enum MapperError {
    #[error("Missing map from {from} to {to}. Create using CreateMap<{from}, {to}>.")]
    MissingMap { from: String, to: String },
    #[error("cannot map {value} from {from} to {to}")]
    Unsupported {
        value: String,
        from: String,
        to: String,
    },
    #[error("{variant} is not a member of {enum_type}")]
    UnknownVariant { variant: String, enum_type: String },
    #[error(transparent)]
    Eval(#[from] EvalError),
}
