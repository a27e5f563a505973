//! Errors encountered while configuring maps, building typed
//! expressions and rewriting them
use crate::eval::error::EvalError;
use crate::mapper::error::MapperError;
use codespan_reporting::diagnostic::Diagnostic;
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term::{self, termcolor::NoColor};
use itertools::Itertools;
use thiserror::Error;

#[derive(Eq, PartialEq, Debug, Clone, Error)]
pub enum MappingError {
    #[error("Missing map from {data_type} to {model_type}. Create using CreateMap<{data_type}, {model_type}>.")]
    MissingTypeMap {
        data_type: String,
        model_type: String,
    },
    #[error("The source member {member} on {type_name} must be mapped using a custom expression or a source member to be used in the path {path}")]
    UnmappedMember {
        type_name: String,
        member: String,
        path: String,
    },
    #[error("Literal types must match: cannot map {model_member} to {data_member} without a custom expression")]
    LiteralTypeMismatch {
        model_member: String,
        data_member: String,
    },
    #[error("The include expression is too complex: found both {0} and {1}")]
    IncludeTooComplex(String, String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("argument count mismatch mapping {model_type} to {data_type}: expected {expected}, found {actual}")]
    ArgumentCountMismatch {
        model_type: String,
        data_type: String,
        expected: usize,
        actual: usize,
    },
    #[error("member {member} not found on {type_name}")]
    MemberNotFound {
        type_name: String,
        member: String,
        suggestions: Vec<String>,
    },
    #[error("binary operator {op} is not defined for {left} and {right}")]
    OperatorNotDefined {
        op: String,
        left: String,
        right: String,
    },
    #[error("unary operator {op} is not defined for {operand}")]
    UnaryOperatorNotDefined { op: String, operand: String },
    #[error("no conversion exists from {from} to {to}")]
    InvalidConversion { from: String, to: String },
    #[error("argument {index} of {method}: {actual} is not assignable to {expected}")]
    ArgumentTypeMismatch {
        method: String,
        index: usize,
        expected: String,
        actual: String,
    },
    #[error("{method} expects {expected} arguments but {actual} were supplied")]
    ArgumentCount {
        method: String,
        expected: usize,
        actual: usize,
    },
    #[error("method {0} not found")]
    MethodNotFound(String),
    #[error("method {0} could not be instantiated for the rewritten argument types")]
    MethodInstantiation(String),
    #[error("conditional branches have different types {0} and {1}")]
    BranchTypeMismatch(String, String),
    #[error("rewriting exceeded the maximum depth of {0}")]
    RecursionLimit(usize),
    #[error("{model_type} is the destination of several maps (from {candidates}); supply an explicit type pair")]
    AmbiguousDestination {
        model_type: String,
        candidates: String,
    },
    #[error("rewritten lambda of type {actual} does not fit the requested delegate {expected}")]
    DelegateMismatch { expected: String, actual: String },
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("unmapped members found: {}", .0.iter().join(", "))]
    UnmappedMembers(Vec<String>),
    #[error("invalid options: {0}")]
    InvalidOptions(String),
    #[error(transparent)]
    Eval(#[from] EvalError),
    #[error(transparent)]
    Mapper(#[from] MapperError),
}

impl MappingError {
    pub fn to_diagnostic(&self) -> Diagnostic<usize> {
        let diagnostic = Diagnostic::error().with_message(self.to_string());
        match self {
            MappingError::MissingTypeMap {
                data_type,
                model_type,
            } => diagnostic.with_notes(vec![format!(
                "add create_map({}, {}) to the configuration, or reverse_map() on the opposite map",
                data_type, model_type
            )]),
            MappingError::LiteralTypeMismatch { .. } => diagnostic.with_notes(vec![
                "configure the member with for_member(..) to supply a converting expression"
                    .to_string(),
            ]),
            MappingError::IncludeTooComplex(..) => diagnostic.with_notes(vec![
                "include expressions must select a single chain of members".to_string(),
            ]),
            MappingError::MemberNotFound { suggestions, .. } if !suggestions.is_empty() => {
                diagnostic.with_notes(vec![format!("did you mean {}?", suggestions.join(" or "))])
            }
            MappingError::RecursionLimit(_) => diagnostic.with_notes(vec![
                "the mapping configuration may refer back to itself".to_string(),
                "raise max_depth in the rewrite options for very deep expressions".to_string(),
            ]),
            MappingError::UnmappedMembers(_) => diagnostic.with_notes(vec![
                "map each member from a source member, a custom expression or ignore it"
                    .to_string(),
            ]),
            _ => diagnostic,
        }
    }

    /// Render the diagnostic as plain text
    pub fn render(&self) -> String {
        let files: SimpleFiles<String, String> = SimpleFiles::new();
        let mut writer = NoColor::new(Vec::new());
        let config = term::Config::default();
        match term::emit(&mut writer, &config, &files, &self.to_diagnostic()) {
            Ok(()) => String::from_utf8_lossy(&writer.into_inner()).into_owned(),
            Err(_) => self.to_string(),
        }
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    #[test]
    pub fn test_missing_map_message() {
        let err = MappingError::MissingTypeMap {
            data_type: "CarModel".to_string(),
            model_type: "Car".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Missing map from CarModel to Car. Create using CreateMap<CarModel, Car>."
        );
        assert!(err.render().contains("CreateMap<CarModel, Car>"));
    }

    #[test]
    pub fn test_suggestions_in_notes() {
        let err = MappingError::MemberNotFound {
            type_name: "Order".to_string(),
            member: "Totl".to_string(),
            suggestions: vec!["Total".to_string()],
        };
        let diagnostic = err.to_diagnostic();
        assert_eq!(diagnostic.notes, vec!["did you mean Total?".to_string()]);
    }

    #[test]
    pub fn test_unmapped_members_listing() {
        let err = MappingError::UnmappedMembers(vec!["Dest.A".to_string(), "Dest.B".to_string()]);
        assert_eq!(err.to_string(), "unmapped members found: Dest.A, Dest.B");
    }
}
