//! Method definitions and their instantiation over type arguments
use super::{Container, TypeId, TypeKind, TypeRegistry};
use itertools::Itertools;
use std::rc::Rc;

/// A method signature, possibly generic. Parameter and return types
/// refer to method type parameters as `TypeRegistry::param(i)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodDefinition {
    pub declaring: String,
    pub name: String,
    pub is_static: bool,
    pub type_params: usize,
    pub params: Vec<TypeId>,
    pub ret: TypeId,
}

/// A method closed over concrete type arguments
#[derive(Debug, Clone, PartialEq)]
pub struct MethodInfo {
    pub definition: Rc<MethodDefinition>,
    pub type_args: Vec<TypeId>,
    pub params: Vec<TypeId>,
    pub ret: TypeId,
}

impl MethodInfo {
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn declaring(&self) -> &str {
        &self.definition.declaring
    }

    pub fn is_static(&self) -> bool {
        self.definition.is_static
    }

    pub fn is_generic(&self) -> bool {
        self.definition.type_params > 0
    }

    /// Qualified name for diagnostics
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.declaring(), self.name())
    }
}

impl TypeRegistry {
    /// Close a method definition over explicit type arguments
    pub fn make_method(
        &self,
        definition: &Rc<MethodDefinition>,
        type_args: &[TypeId],
    ) -> Option<MethodInfo> {
        if type_args.len() != definition.type_params {
            return None;
        }
        Some(MethodInfo {
            definition: definition.clone(),
            type_args: type_args.to_vec(),
            params: definition
                .params
                .iter()
                .map(|p| self.substitute(*p, type_args))
                .collect(),
            ret: self.substitute(definition.ret, type_args),
        })
    }

    /// Infer type arguments of a generic method from argument types
    pub fn infer_method(
        &self,
        definition: &Rc<MethodDefinition>,
        arg_types: &[TypeId],
    ) -> Option<MethodInfo> {
        if arg_types.len() != definition.params.len() {
            return None;
        }
        let mut bindings = vec![None; definition.type_params];
        for (template, actual) in definition.params.iter().zip(arg_types) {
            if !self.unify(*template, *actual, &mut bindings) {
                return None;
            }
        }
        let type_args: Option<Vec<TypeId>> = bindings.into_iter().collect();
        self.make_method(definition, &type_args?)
    }

    fn unify(&self, template: TypeId, actual: TypeId, bindings: &mut [Option<TypeId>]) -> bool {
        if !self.is_open(template) {
            return self.is_assignable(actual, template);
        }

        let template_kind = self.kind(template);
        let actual_kind = self.kind(actual);
        match (&*template_kind, &*actual_kind) {
            (TypeKind::Param(i), _) => match bindings.get(*i).copied().flatten() {
                Some(bound) => bound == actual || self.is_assignable(actual, bound),
                None => {
                    if let Some(slot) = bindings.get_mut(*i) {
                        *slot = Some(actual);
                    }
                    true
                }
            },
            (TypeKind::Container(Container::Enumerable, ts), _) if self.is_sequence(actual) => {
                match self.element_type(actual) {
                    Some(element) => self.unify(ts[0], element, bindings),
                    None => false,
                }
            }
            (TypeKind::Container(tc, ts), TypeKind::Container(ac, args)) if tc == ac => ts
                .iter()
                .zip(args)
                .all(|(t, a)| self.unify(*t, *a, bindings)),
            (TypeKind::Function(tps, tr), TypeKind::Function(aps, ar)) if tps.len() == aps.len() => {
                tps.iter().zip(aps).all(|(t, a)| self.unify(*t, *a, bindings))
                    && self.unify(*tr, *ar, bindings)
            }
            (TypeKind::Expression(tf), TypeKind::Expression(af)) => self.unify(*tf, *af, bindings),
            (TypeKind::Nullable(t), TypeKind::Nullable(a)) | (TypeKind::Array(t), TypeKind::Array(a)) => {
                self.unify(*t, *a, bindings)
            }
            _ => false,
        }
    }

    /// Describe a method signature for diagnostics
    pub fn display_method(&self, method: &MethodInfo) -> String {
        format!(
            "{} {}({})",
            self.display(method.ret),
            method.qualified_name(),
            method.params.iter().map(|p| self.display(*p)).join(", ")
        )
    }
}

/// Install the query operators and string methods expressions may call
pub(crate) fn install_standard_methods(types: &TypeRegistry) {
    let t0 = types.param(0);
    let t1 = types.param(1);
    let boolean = types.boolean();
    let int32 = types.int32();
    let string = types.string();
    let object = types.object();

    let seq = types.enumerable(t0);
    let query = types.queryable(t0);
    let predicate = types.function(vec![t0], boolean);
    let selector = types.function(vec![t0], t1);
    let int_selector = types.function(vec![t0], int32);
    let quoted_predicate = types.expression(predicate);
    let quoted_selector = types.expression(selector);

    let define = |declaring: &str, name: &str, is_static, type_params, params: Vec<TypeId>, ret| {
        types.define_method(MethodDefinition {
            declaring: declaring.to_string(),
            name: name.to_string(),
            is_static,
            type_params,
            params,
            ret,
        });
    };

    // sequence operators
    let enumerable = |name: &str, type_params, params, ret| {
        define("Enumerable", name, true, type_params, params, ret)
    };
    enumerable("Any", 1, vec![seq], boolean);
    enumerable("Any", 1, vec![seq, predicate], boolean);
    enumerable("All", 1, vec![seq, predicate], boolean);
    enumerable("Count", 1, vec![seq], int32);
    enumerable("Count", 1, vec![seq, predicate], int32);
    enumerable("Where", 1, vec![seq, predicate], seq);
    enumerable("Select", 2, vec![seq, selector], types.enumerable(t1));
    enumerable("First", 1, vec![seq], t0);
    enumerable("First", 1, vec![seq, predicate], t0);
    enumerable("FirstOrDefault", 1, vec![seq], t0);
    enumerable("FirstOrDefault", 1, vec![seq, predicate], t0);
    enumerable("Contains", 1, vec![seq, t0], boolean);
    enumerable("OrderBy", 2, vec![seq, selector], seq);
    enumerable("OrderByDescending", 2, vec![seq, selector], seq);
    enumerable("Sum", 1, vec![seq, int_selector], int32);
    enumerable("Max", 2, vec![seq, selector], t1);
    enumerable("Min", 2, vec![seq, selector], t1);
    enumerable("Take", 1, vec![seq, int32], seq);
    enumerable("Skip", 1, vec![seq, int32], seq);

    // query operators take quoted lambdas
    let queryable = |name: &str, type_params, params, ret| {
        define("Queryable", name, true, type_params, params, ret)
    };
    queryable("Where", 1, vec![query, quoted_predicate], query);
    queryable("Select", 2, vec![query, quoted_selector], types.queryable(t1));
    queryable("OrderBy", 2, vec![query, quoted_selector], query);
    queryable("OrderByDescending", 2, vec![query, quoted_selector], query);
    queryable("Any", 1, vec![query, quoted_predicate], boolean);
    queryable("Count", 1, vec![query], int32);
    queryable("First", 1, vec![query], t0);
    queryable("Take", 1, vec![query, int32], query);
    queryable("Skip", 1, vec![query, int32], query);

    // string instance methods
    for name in ["StartsWith", "EndsWith", "Contains", "Equals"] {
        define("String", name, false, 0, vec![string], boolean);
    }
    for name in ["ToUpper", "ToLower", "Trim"] {
        define("String", name, false, 0, vec![], string);
    }

    define("Object", "ToString", false, 0, vec![], string);
    define("Object", "Equals", false, 0, vec![object], boolean);
}

#[cfg(test)]
pub mod tests {
    use super::*;

    #[test]
    pub fn test_infer_select() {
        let types = TypeRegistry::new();
        let child = types.record("Child").member("Value", types.int32()).build();
        let select = types.find_method("Enumerable", "Select", 2).unwrap();
        let lambda = types.function(vec![child], types.int32());
        let method = types
            .infer_method(&select, &[types.list(child), lambda])
            .unwrap();
        assert_eq!(method.type_args, vec![child, types.int32()]);
        assert_eq!(method.ret, types.enumerable(types.int32()));
    }

    #[test]
    pub fn test_infer_rejects_mismatch() {
        let types = TypeRegistry::new();
        let any = types.find_method("Enumerable", "Any", 2).unwrap();
        let bad = types.function(vec![types.string()], types.boolean());
        assert!(types
            .infer_method(&any, &[types.list(types.int32()), bad])
            .is_none());
    }

    #[test]
    pub fn test_make_method_substitutes() {
        let types = TypeRegistry::new();
        let wh = types.find_method("Queryable", "Where", 2).unwrap();
        let m = types.make_method(&wh, &[types.string()]).unwrap();
        assert_eq!(m.ret, types.queryable(types.string()));
        assert_eq!(
            types.display_method(&m),
            "IQueryable<String> Queryable.Where(IQueryable<String>, Expression<Func<String, Boolean>>)"
        );
        assert!(types.make_method(&wh, &[]).is_none());
    }

    #[test]
    pub fn test_instance_methods() {
        let types = TypeRegistry::new();
        assert!(types.find_method("String", "StartsWith", 1).is_some());
        assert!(types.find_method("String", "StartsWith", 2).is_none());
        assert!(!types.find_method("String", "Trim", 0).unwrap().is_static);
    }
}
