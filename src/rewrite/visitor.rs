//! The expression visitor that rewrites model expressions over data
//! types
use super::include;
use super::options::RewriteOptions;
use super::params::ParameterBindings;
use super::path::{resolve_path, PathStep};
use super::typemap::TypeMappings;
use crate::error::MappingError;
use crate::expr::{build, Expr, Parameter, RcExpr, UnaryOp, Value};
use crate::mapper::ValueMapper;
use crate::mapping::MapperConfiguration;
use crate::types::method::MethodInfo;
use crate::types::{TypeId, TypeRegistry};
use tracing::{trace, warn};

/// Substitute `argument` for the single parameter of a custom lambda
pub fn splice(
    types: &TypeRegistry,
    custom: &RcExpr,
    argument: RcExpr,
) -> Result<RcExpr, MappingError> {
    let (params, body, _) = custom.as_lambda().ok_or_else(|| {
        MappingError::InvalidConfiguration("custom expressions must be lambdas".to_string())
    })?;
    let param = match params {
        [p] => p,
        _ => {
            return Err(MappingError::InvalidConfiguration(format!(
                "custom expressions take one parameter, found {}",
                params.len()
            )))
        }
    };
    let argument = if types.is_assignable(argument.ty(), param.ty) {
        argument
    } else {
        build::convert(types, argument, param.ty)?
    };
    Ok(body.substitute(&param.var, &argument))
}

pub struct Rewriter<'a> {
    config: &'a MapperConfiguration,
    types: &'a TypeRegistry,
    mapper: &'a dyn ValueMapper,
    mappings: &'a mut TypeMappings,
    options: &'a RewriteOptions,
    bindings: ParameterBindings,
    include: bool,
    depth: usize,
}

impl<'a> Rewriter<'a> {
    pub fn new(
        config: &'a MapperConfiguration,
        mapper: &'a dyn ValueMapper,
        mappings: &'a mut TypeMappings,
        options: &'a RewriteOptions,
        include: bool,
    ) -> Self {
        Rewriter {
            config,
            types: config.types(),
            mapper,
            mappings,
            options,
            bindings: ParameterBindings::new(),
            include,
            depth: 0,
        }
    }

    pub fn rewrite(&mut self, expr: &RcExpr) -> Result<RcExpr, MappingError> {
        if self.depth >= self.options.max_depth() {
            return Err(MappingError::RecursionLimit(self.options.max_depth()));
        }
        self.depth += 1;
        let result = self.dispatch(expr);
        self.depth -= 1;
        result
    }

    fn resolve(&self, model: TypeId) -> TypeId {
        self.mappings.resolve(self.types, model)
    }

    fn register(&mut self, model: TypeId, data: TypeId) -> Result<(), MappingError> {
        self.mappings.register(self.config, model, data)
    }

    fn bind(&mut self, p: &Parameter) -> Parameter {
        let data = self.resolve(p.ty);
        self.bindings.bind(p, data)
    }

    fn dispatch(&mut self, expr: &RcExpr) -> Result<RcExpr, MappingError> {
        match &*expr.inner {
            Expr::Parameter(p) => {
                let replacement = self.bind(p);
                Ok(if replacement == *p {
                    expr.clone()
                } else {
                    build::parameter(&replacement)
                })
            }
            Expr::Constant(value, ty) => self.constant(expr, value, *ty),
            Expr::Member(_, _) => self.member(expr),
            Expr::Lambda(params, body, _) => self.lambda(expr, params, body),
            Expr::Unary(op, operand, ty) => self.unary(expr, *op, operand, *ty),
            Expr::Binary(..) => self.binary(expr),
            Expr::Conditional(test, a, b, _) => {
                let (nt, na, nb) = (self.rewrite(test)?, self.rewrite(a)?, self.rewrite(b)?);
                if nt.same(test) && na.same(a) && nb.same(b) {
                    return Ok(expr.clone());
                }
                build::conditional(self.types, nt, na, nb)
            }
            Expr::Call(instance, method, args) => self.call(expr, instance.as_ref(), method, args),
            Expr::New(ty, inits) => self.new_record(expr, *ty, inits),
            Expr::NewArray(ty, items) => {
                let new_items = self.rewrite_all(items)?;
                let element = self.types.element_type(*ty).unwrap_or(*ty);
                let target = self.resolve(element);
                if target == element && same_all(items, &new_items) {
                    return Ok(expr.clone());
                }
                build::new_array(self.types, target, new_items)
            }
            Expr::TypeIs(operand, tested, _) => {
                let new_operand = self.rewrite(operand)?;
                let target = self.resolve(*tested);
                if target == *tested && new_operand.same(operand) {
                    return Ok(expr.clone());
                }
                Ok(build::type_is(self.types, new_operand, target))
            }
            Expr::Invoke(f, args, _) => {
                let new_f = self.rewrite(f)?;
                let new_args = self.rewrite_all(args)?;
                if new_f.same(f) && same_all(args, &new_args) {
                    return Ok(expr.clone());
                }
                build::invoke(self.types, new_f, new_args)
            }
            Expr::Default(ty) => {
                let target = self.resolve(*ty);
                Ok(if target == *ty {
                    expr.clone()
                } else {
                    build::default(target)
                })
            }
        }
    }

    fn rewrite_all(&mut self, exprs: &[RcExpr]) -> Result<Vec<RcExpr>, MappingError> {
        exprs.iter().map(|e| self.rewrite(e)).collect()
    }

    fn constant(&mut self, node: &RcExpr, value: &Value, ty: TypeId) -> Result<RcExpr, MappingError> {
        let target = self.resolve(ty);
        if target == ty {
            return Ok(node.clone());
        }
        let mapped = self.mapper.map_value(value, ty, target)?;
        trace!(from = %value, to = %mapped, "mapped constant");
        Ok(build::constant(mapped, target))
    }

    fn member(&mut self, node: &RcExpr) -> Result<RcExpr, MappingError> {
        let (base, path) = node.member_chain();
        let new_base = self.rewrite(&base)?;

        let steps = resolve_path(
            self.config,
            self.mappings,
            base.ty(),
            new_base.ty(),
            &path,
            self.options.max_depth(),
        )?;
        let custom = steps.iter().any(|s| matches!(s, PathStep::Custom(_)));
        if !custom && new_base.same(&base) && steps_match(&steps, &path) {
            return Ok(node.clone());
        }
        let rebuilt = self.apply_steps(new_base.clone(), &steps)?;

        let model_ty = node.ty();
        let rebuilt = if custom
            && rebuilt.ty() != model_ty
            && self.types.is_scalar(model_ty)
            && self.types.is_scalar(rebuilt.ty())
            && self.types.is_convertible(rebuilt.ty(), model_ty)
        {
            build::convert(self.types, rebuilt, model_ty)?
        } else {
            self.register(model_ty, rebuilt.ty())?;
            rebuilt
        };

        if self.include {
            include::collapse(self.types, &rebuilt, &new_base)
        } else {
            Ok(rebuilt)
        }
    }

    fn apply_steps(&self, base: RcExpr, steps: &[PathStep]) -> Result<RcExpr, MappingError> {
        steps.iter().try_fold(base, |current, step| match step {
            PathStep::Members(members) => Ok(members
                .iter()
                .fold(current, |e, m| RcExpr::from(Expr::Member(e, m.clone())))),
            PathStep::Custom(custom) => splice(self.types, custom, current),
        })
    }

    fn lambda(
        &mut self,
        node: &RcExpr,
        params: &[Parameter],
        body: &RcExpr,
    ) -> Result<RcExpr, MappingError> {
        let new_params: Vec<Parameter> = params.iter().map(|p| self.bind(p)).collect();
        let new_body = self.rewrite(body)?;
        if new_body.same(body) && new_params.as_slice() == params {
            return Ok(node.clone());
        }
        Ok(build::lambda(self.types, new_params, new_body))
    }

    fn unary(
        &mut self,
        node: &RcExpr,
        op: UnaryOp,
        operand: &RcExpr,
        ty: TypeId,
    ) -> Result<RcExpr, MappingError> {
        if let (UnaryOp::Convert | UnaryOp::ConvertChecked, Expr::Constant(value, constant_ty)) =
            (op, &*operand.inner)
        {
            let target = self.resolve(ty);
            if target != ty {
                // the constant takes the data type of the conversion
                let mapped = self.mapper.map_value(value, *constant_ty, target)?;
                return Ok(build::constant(mapped, target));
            }
        }

        let new_operand = self.rewrite(operand)?;
        if op == UnaryOp::Quote {
            return if new_operand.same(operand) {
                Ok(node.clone())
            } else {
                build::quote(self.types, new_operand)
            };
        }

        let target = if op.is_conversion() {
            self.resolve(ty)
        } else {
            ty
        };
        if new_operand.same(operand) && target == ty {
            return Ok(node.clone());
        }
        if self.options.ignore_validations() {
            warn!(op = ?op, "rebuilding unary expression without validation");
            let ty = if op.is_conversion() {
                target
            } else {
                self.resolve(ty)
            };
            return Ok(RcExpr::from(Expr::Unary(op, new_operand, ty)));
        }
        if op.is_conversion() {
            build::conversion(self.types, op, new_operand, target)
        } else {
            build::unary(self.types, op, new_operand)
        }
    }

    /// Left-nested chains such as `a || b || c || ...` are walked along
    /// their left spine in a loop, so only right operands recurse
    fn binary(&mut self, node: &RcExpr) -> Result<RcExpr, MappingError> {
        let mut spine = Vec::new();
        let mut bottom = node.clone();
        loop {
            let next = match &*bottom.inner {
                Expr::Binary(_, left, right, _, _)
                    if matches!(&*left.inner, Expr::Binary(..))
                        && !(left.is_constant() && !right.is_constant()) =>
                {
                    left.clone()
                }
                _ => break,
            };
            spine.push(std::mem::replace(&mut bottom, next));
        }
        let mut result = self.binary_parts(&bottom, None)?;
        for parent in spine.iter().rev() {
            result = self.binary_parts(parent, Some(result))?;
        }
        Ok(result)
    }

    /// Rewrite one binary node, reusing `rewritten_left` when the left
    /// operand was already handled by the spine walk
    fn binary_parts(
        &mut self,
        node: &RcExpr,
        rewritten_left: Option<RcExpr>,
    ) -> Result<RcExpr, MappingError> {
        let (op, left, right, conversion) = match &*node.inner {
            Expr::Binary(op, l, r, c, _) => (*op, l, r, c.as_ref()),
            _ => {
                return Err(MappingError::InvalidArgument(
                    "expected a binary expression".to_string(),
                ))
            }
        };
        // visit the non-constant side first so its types are registered
        // before the constant is mapped
        let (new_left, new_right) = match rewritten_left {
            Some(new_left) => (new_left, self.rewrite(right)?),
            None if left.is_constant() && !right.is_constant() => {
                let new_right = self.rewrite(right)?;
                (self.rewrite(left)?, new_right)
            }
            None => {
                let new_left = self.rewrite(left)?;
                (new_left, self.rewrite(right)?)
            }
        };
        let new_conversion = match conversion {
            Some(c) => Some(self.rewrite(c)?),
            None => None,
        };
        let conversion_same = match (conversion, &new_conversion) {
            (Some(a), Some(b)) => a.same(b),
            _ => true,
        };
        if new_left.same(left) && new_right.same(right) && conversion_same {
            return Ok(node.clone());
        }
        build::binary_with(self.types, op, new_left, new_right, new_conversion)
    }

    fn call(
        &mut self,
        node: &RcExpr,
        instance: Option<&RcExpr>,
        method: &MethodInfo,
        args: &[RcExpr],
    ) -> Result<RcExpr, MappingError> {
        let new_instance = match instance {
            Some(i) => Some(self.rewrite(i)?),
            None => None,
        };
        let mut new_args = Vec::with_capacity(args.len());
        for arg in args {
            let new_arg = self.rewrite(arg)?;
            self.register(arg.ty(), new_arg.ty())?;
            new_args.push(new_arg);
        }

        let instance_same = match (instance, &new_instance) {
            (Some(a), Some(b)) => a.same(b),
            _ => true,
        };
        if instance_same && same_all(args, &new_args) {
            return Ok(node.clone());
        }

        let method = self.remap_method(method, &new_args)?;
        let new_args = new_args
            .into_iter()
            .zip(method.params.iter())
            .map(|(arg, param)| {
                if arg.ty() != *param
                    && self.types.is_value_type(arg.ty())
                    && self.types.is_convertible(arg.ty(), *param)
                {
                    build::convert(self.types, arg, *param)
                } else {
                    Ok(arg)
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        build::call(self.types, new_instance, method, new_args)
    }

    /// Re-instantiate a generic method for the rewritten arguments:
    /// first with remapped type arguments, then by inference
    fn remap_method(&self, method: &MethodInfo, args: &[RcExpr]) -> Result<MethodInfo, MappingError> {
        if !method.is_generic() {
            return Ok(method.clone());
        }
        let types = self.types;
        let arg_types: Vec<TypeId> = args.iter().map(|a| a.ty()).collect();
        let fits = |m: &MethodInfo| {
            m.params.iter().zip(&arg_types).all(|(p, a)| {
                types.is_assignable(*a, *p) || (types.is_value_type(*a) && types.is_convertible(*a, *p))
            })
        };
        let remapped: Vec<TypeId> = method.type_args.iter().map(|t| self.resolve(*t)).collect();
        if let Some(m) = types
            .make_method(&method.definition, &remapped)
            .filter(|m| fits(m))
        {
            return Ok(m);
        }
        types
            .infer_method(&method.definition, &arg_types)
            .ok_or_else(|| MappingError::MethodInstantiation(types.display_method(method)))
    }

    fn new_record(
        &mut self,
        node: &RcExpr,
        ty: TypeId,
        inits: &[(String, RcExpr)],
    ) -> Result<RcExpr, MappingError> {
        let mut changed = false;
        let mut new_inits = Vec::with_capacity(inits.len());
        for (name, value) in inits {
            let new_value = self.rewrite(value)?;
            changed |= !new_value.same(value);
            new_inits.push((name.clone(), new_value));
        }

        if self.types.is_anonymous(ty) {
            return Ok(if changed {
                build::anonymous(self.types, new_inits)
            } else {
                node.clone()
            });
        }

        let target = self.resolve(ty);
        if target == ty {
            return if changed {
                build::new(self.types, ty, new_inits)
            } else {
                Ok(node.clone())
            };
        }

        // initialise data members by their configured names
        let map = self.config.find_type_map(target, ty);
        let renamed = new_inits
            .into_iter()
            .map(|(name, value)| {
                let data_name = map
                    .and_then(|m| self.config.property_map(m, &name))
                    .filter(|pm| pm.custom_expression.is_none())
                    .and_then(|pm| match pm.source_members.as_slice() {
                        [single] => Some(single.name.clone()),
                        _ => None,
                    })
                    .unwrap_or(name);
                (data_name, value)
            })
            .collect();
        build::new(self.types, target, renamed)
    }
}

fn same_all(before: &[RcExpr], after: &[RcExpr]) -> bool {
    before.len() == after.len() && before.iter().zip(after).all(|(a, b)| a.same(b))
}

/// True if the steps are exactly the original member names
fn steps_match(steps: &[PathStep], path: &[String]) -> bool {
    match steps {
        [] => path.is_empty(),
        [PathStep::Members(members)] => {
            members.len() == path.len() && members.iter().zip(path).all(|(m, p)| m.name == *p)
        }
        _ => false,
    }
}
