//! Rewriting model expressions into data expressions
//!
//! An expression written against model types (say `Dest`) is rebuilt
//! against the data types the configuration maps onto them (say
//! `Source`), so that `d => d.ChildValue == 10` becomes
//! `s => s.Child.Value == 10`.
//!
//! Each rewrite owns a `TypeMappings` table of model to data type
//! correspondences. Batch rewrites share one table so all expressions
//! in the batch agree on their type choices.
pub mod include;
pub mod options;
pub mod params;
pub mod path;
pub mod typemap;
pub mod visitor;

#[cfg(test)]
pub mod testing;

pub use self::options::RewriteOptions;
pub use self::path::{resolve_path, PathStep};
pub use self::typemap::TypeMappings;

use self::visitor::Rewriter;
use crate::error::MappingError;
use crate::expr::{build, pretty, Expr, RcExpr, UnaryOp};
use crate::mapper::{ConfiguredMapper, ValueMapper};
use crate::mapping::MapperConfiguration;
use crate::types::{TypePair, TypeRegistry};
use tracing::debug;

/// Rewrites lambdas over model types into lambdas over data types
pub struct ExpressionMapper<'c> {
    config: &'c MapperConfiguration,
    mapper: Box<dyn ValueMapper + 'c>,
    options: RewriteOptions,
}

impl<'c> ExpressionMapper<'c> {
    pub fn new(config: &'c MapperConfiguration) -> Self {
        ExpressionMapper {
            config,
            mapper: Box::new(ConfiguredMapper::new(config)),
            options: RewriteOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RewriteOptions) -> Self {
        self.options = options;
        self
    }

    /// Replace the value mapper used to fold constants
    pub fn with_value_mapper<M: ValueMapper + 'c>(mut self, mapper: M) -> Self {
        self.mapper = Box::new(mapper);
        self
    }

    pub fn options(&self) -> &RewriteOptions {
        &self.options
    }

    pub fn config(&self) -> &'c MapperConfiguration {
        self.config
    }

    pub fn types(&self) -> &'c TypeRegistry {
        self.config.types()
    }

    pub fn value_mapper(&self) -> &dyn ValueMapper {
        self.mapper.as_ref()
    }

    /// Rewrite a lambda. With an explicit pair of delegate types
    /// (model delegate as source, data delegate as destination) the
    /// result has exactly the destination delegate type. Otherwise
    /// each parameter takes the unique data type configured to map
    /// onto its model type.
    pub fn rewrite(&self, expr: &RcExpr, pair: Option<TypePair>) -> Result<RcExpr, MappingError> {
        self.rewrite_with(expr, pair, &mut TypeMappings::new())
    }

    /// `rewrite` that passes `None` through
    pub fn rewrite_optional(
        &self,
        expr: Option<&RcExpr>,
        pair: Option<TypePair>,
    ) -> Result<Option<RcExpr>, MappingError> {
        expr.map(|e| self.rewrite(e, pair)).transpose()
    }

    /// `rewrite` sharing a caller supplied correspondence table
    pub fn rewrite_with(
        &self,
        expr: &RcExpr,
        pair: Option<TypePair>,
        mappings: &mut TypeMappings,
    ) -> Result<RcExpr, MappingError> {
        self.run(expr, pair, mappings, false)
    }

    /// Rewrite an include expression to a single member path over the
    /// data type
    pub fn rewrite_as_include(
        &self,
        expr: &RcExpr,
        pair: Option<TypePair>,
    ) -> Result<RcExpr, MappingError> {
        self.run(expr, pair, &mut TypeMappings::new(), true)
    }

    /// Rewrite several lambdas over one correspondence table
    pub fn rewrite_all(&self, exprs: &[RcExpr]) -> Result<Vec<RcExpr>, MappingError> {
        let mut mappings = TypeMappings::new();
        exprs
            .iter()
            .map(|e| self.run(e, None, &mut mappings, false))
            .collect()
    }

    pub fn rewrite_all_as_include(&self, exprs: &[RcExpr]) -> Result<Vec<RcExpr>, MappingError> {
        let mut mappings = TypeMappings::new();
        exprs
            .iter()
            .map(|e| self.run(e, None, &mut mappings, true))
            .collect()
    }

    fn run(
        &self,
        expr: &RcExpr,
        pair: Option<TypePair>,
        mappings: &mut TypeMappings,
        include: bool,
    ) -> Result<RcExpr, MappingError> {
        let types = self.types();
        let quoted = matches!(&*expr.inner, Expr::Unary(UnaryOp::Quote, _, _));
        let (params, _, _) = expr.as_lambda().ok_or_else(|| {
            MappingError::InvalidArgument(format!(
                "expected a lambda expression, found {}",
                types.display(expr.ty())
            ))
        })?;
        debug!(expression = %pretty::text(types, expr), include, "rewrite");

        match pair {
            Some(pair) => self.seed_explicit(pair, params.len(), mappings)?,
            None => {
                for p in params {
                    if mappings.contains(p.ty) {
                        continue;
                    }
                    if let Some(data) = self.config.unique_source_for(p.ty)? {
                        mappings.register(self.config, p.ty, data)?;
                    }
                }
            }
        }

        let lambda = match &*expr.inner {
            Expr::Unary(UnaryOp::Quote, inner, _) => inner.clone(),
            _ => expr.clone(),
        };
        let rewritten = Rewriter::new(
            self.config,
            self.mapper.as_ref(),
            mappings,
            &self.options,
            include,
        )
        .rewrite(&lambda)?;

        let rewritten = match pair {
            Some(pair) => conform(types, rewritten, pair)?,
            None => rewritten,
        };
        let rewritten = if quoted {
            build::quote(types, rewritten)?
        } else {
            rewritten
        };
        debug!(expression = %pretty::text(types, &rewritten), "rewritten");
        Ok(rewritten)
    }

    fn seed_explicit(
        &self,
        pair: TypePair,
        arity: usize,
        mappings: &mut TypeMappings,
    ) -> Result<(), MappingError> {
        let types = self.types();
        let delegate = |ty| {
            types.function_parts(ty).ok_or_else(|| {
                MappingError::InvalidArgument(format!("{} is not a delegate type", types.display(ty)))
            })
        };
        let (model_params, _) = delegate(pair.source)?;
        let (data_params, _) = delegate(pair.destination)?;
        let mismatch = |expected: usize, actual: usize| MappingError::ArgumentCountMismatch {
            model_type: types.display(pair.source),
            data_type: types.display(pair.destination),
            expected,
            actual,
        };
        if model_params.len() != data_params.len() {
            return Err(mismatch(model_params.len(), data_params.len()));
        }
        if model_params.len() != arity {
            return Err(mismatch(model_params.len(), arity));
        }
        // return types are conformed afterwards, not registered
        for (model, data) in model_params.into_iter().zip(data_params) {
            mappings.register(self.config, model, data)?;
        }
        Ok(())
    }
}

/// Give a rewritten lambda exactly the requested data delegate type,
/// converting the body to the delegate's return type where needed
fn conform(types: &TypeRegistry, lambda: RcExpr, pair: TypePair) -> Result<RcExpr, MappingError> {
    let destination = types.unwrap_expression(pair.destination);
    let (_, ret) = types.function_parts(destination).ok_or_else(|| {
        MappingError::InvalidArgument(format!(
            "{} is not a delegate type",
            types.display(destination)
        ))
    })?;
    let (params, body) = match &*lambda.inner {
        Expr::Lambda(params, body, _) => (params.clone(), body.clone()),
        _ => {
            return Err(MappingError::InvalidArgument(
                "rewrite did not produce a lambda".to_string(),
            ))
        }
    };
    let body = if types.is_assignable(body.ty(), ret) {
        body
    } else if types.is_convertible(body.ty(), ret) {
        build::convert(types, body, ret)?
    } else {
        return Err(MappingError::DelegateMismatch {
            expected: types.display(destination),
            actual: types.display(lambda.ty()),
        });
    };
    build::lambda_typed(types, destination, params, body)
}

#[cfg(test)]
pub mod tests {
    use super::testing::*;
    use super::*;
    use crate::eval::apply;
    use crate::expr::build::*;
    use crate::expr::{BinaryOp, Value};

    #[test]
    pub fn test_flattened_member_rewrite() {
        let f = flattening();
        let config = f.config();
        let d = param("d", f.dest);
        let model = lambda(
            &f.types,
            vec![d.clone()],
            equal(
                &f.types,
                member(&f.types, parameter(&d), "ChildValue").unwrap(),
                constant(Value::int(10), f.types.int32()),
            )
            .unwrap(),
        );
        let rewritten = ExpressionMapper::new(&config).rewrite(&model, None).unwrap();
        assert_eq!(pretty::text(&f.types, &rewritten), "d => (d.Child.Value == 10)");
        let (params, _, _) = rewritten.as_lambda().unwrap();
        assert_eq!(params[0].ty, f.source);
    }

    #[test]
    pub fn test_explicit_pair_conforms_return_type() {
        let f = flattening();
        let config = f.config();
        let types = &f.types;
        let d = param("d", f.dest);
        let model = lambda(
            types,
            vec![d.clone()],
            member(types, parameter(&d), "Bar").unwrap(),
        );
        let pair = TypePair::new(
            types.function(vec![f.dest], types.int32()),
            types.function(vec![f.source], types.int64()),
        );
        let rewritten = ExpressionMapper::new(&config).rewrite(&model, Some(pair)).unwrap();
        assert_eq!(pretty::text(types, &rewritten), "d => Convert(d.Foo, Int64)");
        assert_eq!(rewritten.ty(), pair.destination);
    }

    #[test]
    pub fn test_explicit_pair_must_be_delegates() {
        let f = flattening();
        let config = f.config();
        let d = param("d", f.dest);
        let model = lambda(&f.types, vec![d.clone()], parameter(&d));
        let pair = TypePair::new(f.dest, f.source);
        assert!(matches!(
            ExpressionMapper::new(&config).rewrite(&model, Some(pair)),
            Err(MappingError::InvalidArgument(_))
        ));
    }

    #[test]
    pub fn test_explicit_pair_arity_reports_lambda_parameters() {
        let f = flattening();
        let config = f.config();
        let types = &f.types;
        let a = param("a", f.dest);
        let b = param("b", f.dest);
        let model = lambda(
            types,
            vec![a.clone(), b],
            member(types, parameter(&a), "Value").unwrap(),
        );
        let pair = TypePair::new(
            types.function(vec![f.dest], types.int32()),
            types.function(vec![f.source], types.int32()),
        );
        match ExpressionMapper::new(&config).rewrite(&model, Some(pair)) {
            Err(MappingError::ArgumentCountMismatch {
                expected, actual, ..
            }) => assert_eq!((expected, actual), (1, 2)),
            other => panic!("unexpected {:?}", other),
        };
    }

    #[test]
    pub fn test_none_passes_through() {
        let f = flattening();
        let config = f.config();
        assert_eq!(
            ExpressionMapper::new(&config).rewrite_optional(None, None),
            Ok(None)
        );
    }

    #[test]
    pub fn test_enum_constant_becomes_string() {
        let o = orders();
        let config = o.config();
        let types = &o.types;
        let m = param("m", o.order);
        let shipped = convert(
            types,
            constant(Value::enumeration("Shipped"), o.status),
            o.status,
        )
        .unwrap();
        let model = lambda(
            types,
            vec![m.clone()],
            binary(
                types,
                BinaryOp::Equal,
                shipped,
                member(types, parameter(&m), "Status").unwrap(),
            )
            .unwrap(),
        );
        let rewritten = ExpressionMapper::new(&config).rewrite(&model, None).unwrap();
        assert_eq!(pretty::text(types, &rewritten), "m => (\"Shipped\" == m.Status)");

        let row = Value::record(o.order_entity, vec![("Status", Value::str("Shipped"))]);
        assert_eq!(apply(types, &rewritten, vec![row]), Ok(Value::Bool(true)));
    }

    #[test]
    pub fn test_quoted_lambda_stays_quoted() {
        let f = flattening();
        let config = f.config();
        let d = param("d", f.dest);
        let model = quote(
            &f.types,
            lambda(&f.types, vec![d.clone()], member(&f.types, parameter(&d), "Value").unwrap()),
        )
        .unwrap();
        let rewritten = ExpressionMapper::new(&config).rewrite(&model, None).unwrap();
        assert!(matches!(&*rewritten.inner, Expr::Unary(UnaryOp::Quote, _, _)));
        assert_eq!(
            f.types.unwrap_expression(rewritten.ty()),
            f.types.function(vec![f.source], f.types.int32())
        );
    }

    #[test]
    pub fn test_batch_shares_parameter_types() {
        let o = orders();
        let config = o.config();
        let types = &o.types;
        let m = param("m", o.order);
        let name = lambda(
            types,
            vec![m.clone()],
            member(types, parameter(&m), "CustomerName").unwrap(),
        );
        let id = lambda(types, vec![m.clone()], member(types, parameter(&m), "Id").unwrap());
        let rewritten = ExpressionMapper::new(&config).rewrite_all(&[name, id]).unwrap();
        let texts: Vec<String> = rewritten.iter().map(|e| pretty::text(types, e)).collect();
        assert_eq!(texts, vec!["m => m.Customer.Name", "m => m.Id"]);
    }

    #[test]
    pub fn test_recursion_limit() {
        let f = flattening();
        let config = f.config();
        let d = param("d", f.dest);
        let model = lambda(&f.types, vec![d.clone()], member(&f.types, parameter(&d), "Value").unwrap());
        let mapper =
            ExpressionMapper::new(&config).with_options(RewriteOptions::default().with_max_depth(1));
        assert_eq!(
            mapper.rewrite(&model, None),
            Err(MappingError::RecursionLimit(1))
        );
    }
}
