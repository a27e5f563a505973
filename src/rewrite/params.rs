//! Correspondence between the parameters of the lambda being rewritten
//! and their replacements
use crate::expr::Parameter;
use crate::types::TypeId;
use moniker::FreeVar;
use std::collections::HashMap;

/// Each original parameter is replaced by exactly one parameter for
/// the whole rewrite, so every reference to it resolves to the same
/// replacement.
#[derive(Debug, Clone, Default)]
pub struct ParameterBindings {
    bindings: HashMap<FreeVar<String>, Parameter>,
}

impl ParameterBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, original: &Parameter) -> Option<&Parameter> {
        self.bindings.get(&original.var)
    }

    /// The replacement for `original`, allocating one of type `data`
    /// (with the same name) on first sight. Parameters whose type does
    /// not change are kept as they are.
    pub fn bind(&mut self, original: &Parameter, data: TypeId) -> Parameter {
        self.bindings
            .entry(original.var.clone())
            .or_insert_with(|| {
                if data == original.ty {
                    original.clone()
                } else {
                    Parameter::new(original.name(), data)
                }
            })
            .clone()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
