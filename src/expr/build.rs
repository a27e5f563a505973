//! Typed constructors for expression nodes
//!
//! Constructors derive result types and reject ill-typed combinations
//! the way a typed expression factory would.
use super::{BinaryOp, Expr, Parameter, RcExpr, UnaryOp, Value};
use crate::common::naming::suggest_similar;
use crate::error::MappingError;
use crate::types::method::MethodInfo;
use crate::types::{Literal, Member, TypeId, TypeRegistry};

pub fn param(name: &str, ty: TypeId) -> Parameter {
    Parameter::new(name, ty)
}

pub fn parameter(p: &Parameter) -> RcExpr {
    RcExpr::from(Expr::Parameter(p.clone()))
}

pub fn constant(value: Value, ty: TypeId) -> RcExpr {
    RcExpr::from(Expr::Constant(value, ty))
}

pub fn default(ty: TypeId) -> RcExpr {
    RcExpr::from(Expr::Default(ty))
}

fn member_not_found(types: &TypeRegistry, ty: TypeId, name: &str) -> MappingError {
    MappingError::MemberNotFound {
        type_name: types.display(ty),
        member: name.to_string(),
        suggestions: suggest_similar(name, &types.member_names(ty), 3, 3),
    }
}

/// Access member `name` of `target`
pub fn member(types: &TypeRegistry, target: RcExpr, name: &str) -> Result<RcExpr, MappingError> {
    let m = types
        .member(target.ty(), name)
        .ok_or_else(|| member_not_found(types, target.ty(), name))?;
    Ok(RcExpr::from(Expr::Member(target, m)))
}

/// Access a dotted member path such as `Child.Value`
pub fn path(types: &TypeRegistry, target: RcExpr, dotted: &str) -> Result<RcExpr, MappingError> {
    let segments: Vec<String> = dotted.split('.').map(str::to_string).collect();
    path_segments(types, target, &segments)
}

pub fn path_segments<S: AsRef<str>>(
    types: &TypeRegistry,
    target: RcExpr,
    segments: &[S],
) -> Result<RcExpr, MappingError> {
    segments
        .iter()
        .try_fold(target, |e, s| member(types, e, s.as_ref()))
}

/// Lambda typed as `Func<params..., body>`
pub fn lambda(types: &TypeRegistry, params: Vec<Parameter>, body: RcExpr) -> RcExpr {
    let ty = types.function(params.iter().map(|p| p.ty).collect(), body.ty());
    RcExpr::from(Expr::Lambda(params, body, ty))
}

/// Lambda with an explicit delegate type, which must accept the
/// parameters and body
pub fn lambda_typed(
    types: &TypeRegistry,
    delegate: TypeId,
    params: Vec<Parameter>,
    body: RcExpr,
) -> Result<RcExpr, MappingError> {
    let delegate = types.unwrap_expression(delegate);
    let (ps, ret) = types.function_parts(delegate).ok_or_else(|| {
        MappingError::InvalidArgument(format!("{} is not a delegate type", types.display(delegate)))
    })?;
    let fits = ps.len() == params.len()
        && ps.iter().zip(&params).all(|(t, p)| *t == p.ty)
        && types.is_assignable(body.ty(), ret);
    if !fits {
        let actual = lambda(types, params, body);
        return Err(MappingError::DelegateMismatch {
            expected: types.display(delegate),
            actual: types.display(actual.ty()),
        });
    }
    Ok(RcExpr::from(Expr::Lambda(params, body, delegate)))
}

/// Quote a lambda as `Expression<TDelegate>`
pub fn quote(types: &TypeRegistry, lambda: RcExpr) -> Result<RcExpr, MappingError> {
    if !types.is_delegate(lambda.ty()) {
        return Err(MappingError::UnaryOperatorNotDefined {
            op: "Quote".to_string(),
            operand: types.display(lambda.ty()),
        });
    }
    let ty = types.expression(types.unwrap_expression(lambda.ty()));
    Ok(RcExpr::from(Expr::Unary(UnaryOp::Quote, lambda, ty)))
}

/// Explicit conversion of `operand` to `ty`
pub fn convert(types: &TypeRegistry, operand: RcExpr, ty: TypeId) -> Result<RcExpr, MappingError> {
    conversion(types, UnaryOp::Convert, operand, ty)
}

/// Conversion-like unary (`Convert`, `ConvertChecked`, `TypeAs`)
pub fn conversion(
    types: &TypeRegistry,
    op: UnaryOp,
    operand: RcExpr,
    ty: TypeId,
) -> Result<RcExpr, MappingError> {
    let valid = match op {
        UnaryOp::TypeAs => !types.is_value_type(ty) || types.nullable_underlying(ty).is_some(),
        _ => types.is_convertible(operand.ty(), ty),
    };
    if !valid {
        return Err(MappingError::InvalidConversion {
            from: types.display(operand.ty()),
            to: types.display(ty),
        });
    }
    Ok(RcExpr::from(Expr::Unary(op, operand, ty)))
}

/// Unary operators with a derived result type
pub fn unary(types: &TypeRegistry, op: UnaryOp, operand: RcExpr) -> Result<RcExpr, MappingError> {
    let operand_ty = operand.ty();
    let literal = types.literal_of(operand_ty);
    let ty = match op {
        UnaryOp::Not => match literal {
            Some(Literal::Boolean) => Some(operand_ty),
            Some(l) if l.is_integral() => Some(operand_ty),
            _ => None,
        },
        UnaryOp::Negate => match literal {
            Some(l) if l.is_numeric() || l == Literal::TimeSpan => Some(operand_ty),
            _ => None,
        },
        UnaryOp::ArrayLength => types.element_type(operand_ty).and_then(|_| {
            if types.generic_definition(operand_ty)
                == Some(crate::types::GenericDefinition::Array)
            {
                Some(types.int32())
            } else {
                None
            }
        }),
        UnaryOp::Quote => return quote(types, operand),
        UnaryOp::Convert | UnaryOp::ConvertChecked | UnaryOp::TypeAs => {
            return conversion(types, op, operand, operand_ty)
        }
    };
    match ty {
        Some(t) => Ok(RcExpr::from(Expr::Unary(op, operand, t))),
        None => Err(MappingError::UnaryOperatorNotDefined {
            op: format!("{:?}", op),
            operand: types.display(operand_ty),
        }),
    }
}

pub fn not(types: &TypeRegistry, operand: RcExpr) -> Result<RcExpr, MappingError> {
    unary(types, UnaryOp::Not, operand)
}

fn operator_not_defined(types: &TypeRegistry, op: BinaryOp, l: TypeId, r: TypeId) -> MappingError {
    MappingError::OperatorNotDefined {
        op: op.symbol().to_string(),
        left: types.display(l),
        right: types.display(r),
    }
}

/// Result type of a binary operator over operand types
pub fn binary_type(
    types: &TypeRegistry,
    op: BinaryOp,
    l: TypeId,
    r: TypeId,
) -> Result<TypeId, MappingError> {
    let undefined = || operator_not_defined(types, op, l, r);
    let (ul, ur) = (types.non_nullable(l), types.non_nullable(r));
    let lifted = |t: TypeId| {
        if l != ul || r != ur {
            types.nullable(t)
        } else {
            t
        }
    };
    let literal = types.literal_of(ul).filter(|_| ul == ur);

    match op {
        BinaryOp::Equal | BinaryOp::NotEqual => {
            if ul == ur
                || types.is_assignable(l, r)
                || types.is_assignable(r, l)
                || (!types.is_value_type(l) && !types.is_value_type(r))
            {
                Ok(types.boolean())
            } else {
                Err(undefined())
            }
        }
        BinaryOp::LessThan
        | BinaryOp::LessThanOrEqual
        | BinaryOp::GreaterThan
        | BinaryOp::GreaterThanOrEqual => match literal {
            Some(lit) if lit.is_ordered() => Ok(types.boolean()),
            _ if ul == ur && types.is_enum(ul) => Ok(types.boolean()),
            _ => Err(undefined()),
        },
        BinaryOp::Add => match literal {
            Some(Literal::String) => Ok(types.string()),
            Some(lit) if lit.is_numeric() || lit == Literal::TimeSpan => Ok(lifted(ul)),
            _ if types.literal_of(ul) == Some(Literal::DateTime)
                && types.literal_of(ur) == Some(Literal::TimeSpan) =>
            {
                Ok(lifted(ul))
            }
            _ => Err(undefined()),
        },
        BinaryOp::Subtract => match literal {
            Some(lit) if lit.is_numeric() || lit == Literal::TimeSpan => Ok(lifted(ul)),
            Some(Literal::DateTime) | Some(Literal::DateTimeOffset) => {
                Ok(lifted(types.time_span()))
            }
            _ => Err(undefined()),
        },
        BinaryOp::Multiply | BinaryOp::Divide | BinaryOp::Modulo => match literal {
            Some(lit) if lit.is_numeric() => Ok(lifted(ul)),
            _ => Err(undefined()),
        },
        BinaryOp::And | BinaryOp::Or => match literal {
            Some(lit) if lit == Literal::Boolean || lit.is_integral() => Ok(lifted(ul)),
            _ => Err(undefined()),
        },
        BinaryOp::AndAlso | BinaryOp::OrElse => match literal {
            Some(Literal::Boolean) => Ok(lifted(ul)),
            _ => Err(undefined()),
        },
        BinaryOp::Coalesce => {
            if !types.is_value_type(l) || types.nullable_underlying(l).is_some() {
                if r == ul {
                    Ok(ul)
                } else if types.is_assignable(r, l) {
                    Ok(l)
                } else {
                    Err(undefined())
                }
            } else {
                Err(undefined())
            }
        }
        BinaryOp::ArrayIndex => match types.generic_definition(l) {
            Some(crate::types::GenericDefinition::Array)
                if types.literal_of(r) == Some(Literal::Int32) =>
            {
                types.element_type(l).ok_or_else(undefined)
            }
            _ => Err(undefined()),
        },
    }
}

/// Binary operation with derived result type
pub fn binary(
    types: &TypeRegistry,
    op: BinaryOp,
    left: RcExpr,
    right: RcExpr,
) -> Result<RcExpr, MappingError> {
    binary_with(types, op, left, right, None)
}

/// Binary operation with an optional coalesce conversion lambda
pub fn binary_with(
    types: &TypeRegistry,
    op: BinaryOp,
    left: RcExpr,
    right: RcExpr,
    conversion: Option<RcExpr>,
) -> Result<RcExpr, MappingError> {
    let ty = binary_type(types, op, left.ty(), right.ty())?;
    Ok(RcExpr::from(Expr::Binary(op, left, right, conversion, ty)))
}

pub fn equal(types: &TypeRegistry, left: RcExpr, right: RcExpr) -> Result<RcExpr, MappingError> {
    binary(types, BinaryOp::Equal, left, right)
}

pub fn and_also(types: &TypeRegistry, left: RcExpr, right: RcExpr) -> Result<RcExpr, MappingError> {
    binary(types, BinaryOp::AndAlso, left, right)
}

/// `test ? if_true : if_false`
pub fn conditional(
    types: &TypeRegistry,
    test: RcExpr,
    if_true: RcExpr,
    if_false: RcExpr,
) -> Result<RcExpr, MappingError> {
    if types.literal_of(test.ty()) != Some(Literal::Boolean) || types.nullable_underlying(test.ty()).is_some() {
        return Err(MappingError::InvalidArgument(format!(
            "conditional test must be Boolean, found {}",
            types.display(test.ty())
        )));
    }
    if if_true.ty() != if_false.ty() {
        return Err(MappingError::BranchTypeMismatch(
            types.display(if_true.ty()),
            types.display(if_false.ty()),
        ));
    }
    let ty = if_true.ty();
    Ok(RcExpr::from(Expr::Conditional(test, if_true, if_false, ty)))
}

/// Call a closed method, checking instance and arguments
pub fn call(
    types: &TypeRegistry,
    instance: Option<RcExpr>,
    method: MethodInfo,
    args: Vec<RcExpr>,
) -> Result<RcExpr, MappingError> {
    if method.is_static() == instance.is_some() {
        return Err(MappingError::InvalidArgument(format!(
            "{} {} an instance",
            method.qualified_name(),
            if method.is_static() { "does not take" } else { "requires" }
        )));
    }
    if method.params.len() != args.len() {
        return Err(MappingError::ArgumentCount {
            method: method.qualified_name(),
            expected: method.params.len(),
            actual: args.len(),
        });
    }
    for (index, (expected, arg)) in method.params.iter().zip(&args).enumerate() {
        if !types.is_assignable(arg.ty(), *expected) {
            return Err(MappingError::ArgumentTypeMismatch {
                method: method.qualified_name(),
                index,
                expected: types.display(*expected),
                actual: types.display(arg.ty()),
            });
        }
    }
    Ok(RcExpr::from(Expr::Call(instance, method, args)))
}

/// Call a static catalogue method, inferring type arguments from the
/// arguments when none are supplied
pub fn call_static(
    types: &TypeRegistry,
    declaring: &str,
    name: &str,
    type_args: &[TypeId],
    args: Vec<RcExpr>,
) -> Result<RcExpr, MappingError> {
    let qualified = format!("{}.{}", declaring, name);
    let definition = types
        .find_method(declaring, name, args.len())
        .ok_or_else(|| MappingError::MethodNotFound(qualified.clone()))?;
    let method = if type_args.is_empty() && definition.type_params > 0 {
        let arg_types: Vec<TypeId> = args.iter().map(|a| a.ty()).collect();
        types.infer_method(&definition, &arg_types)
    } else {
        types.make_method(&definition, type_args)
    }
    .ok_or(MappingError::MethodInstantiation(qualified))?;
    call(types, None, method, args)
}

/// Call an instance method on `instance`
pub fn call_instance(
    types: &TypeRegistry,
    instance: RcExpr,
    name: &str,
    args: Vec<RcExpr>,
) -> Result<RcExpr, MappingError> {
    let declaring = match types.literal_of(instance.ty()) {
        Some(Literal::String) => "String",
        _ => "Object",
    };
    let definition = types
        .find_method(declaring, name, args.len())
        .or_else(|| types.find_method("Object", name, args.len()))
        .ok_or_else(|| MappingError::MethodNotFound(format!("{}.{}", declaring, name)))?;
    let method = types
        .make_method(&definition, &[])
        .ok_or_else(|| MappingError::MethodInstantiation(format!("{}.{}", declaring, name)))?;
    call(types, Some(instance), method, args)
}

/// Initialise a record's members
pub fn new(
    types: &TypeRegistry,
    ty: TypeId,
    inits: Vec<(String, RcExpr)>,
) -> Result<RcExpr, MappingError> {
    for (name, value) in &inits {
        let m = types
            .member(ty, name)
            .ok_or_else(|| member_not_found(types, ty, name))?;
        if !types.is_assignable(value.ty(), m.ty) {
            return Err(MappingError::InvalidConversion {
                from: types.display(value.ty()),
                to: types.display(m.ty),
            });
        }
    }
    Ok(RcExpr::from(Expr::New(ty, inits)))
}

/// Construct an anonymous record whose descriptor follows the values
pub fn anonymous(types: &TypeRegistry, inits: Vec<(String, RcExpr)>) -> RcExpr {
    let ty = types.anonymous(inits.iter().map(|(n, e)| Member::new(n, e.ty())).collect());
    RcExpr::from(Expr::New(ty, inits))
}

pub fn new_array(
    types: &TypeRegistry,
    element: TypeId,
    items: Vec<RcExpr>,
) -> Result<RcExpr, MappingError> {
    if let Some(bad) = items.iter().find(|i| !types.is_assignable(i.ty(), element)) {
        return Err(MappingError::InvalidConversion {
            from: types.display(bad.ty()),
            to: types.display(element),
        });
    }
    Ok(RcExpr::from(Expr::NewArray(types.array(element), items)))
}

pub fn type_is(types: &TypeRegistry, operand: RcExpr, tested: TypeId) -> RcExpr {
    RcExpr::from(Expr::TypeIs(operand, tested, types.boolean()))
}

/// Invoke a delegate valued expression
pub fn invoke(types: &TypeRegistry, f: RcExpr, args: Vec<RcExpr>) -> Result<RcExpr, MappingError> {
    let (params, ret) = types.function_parts(f.ty()).ok_or_else(|| {
        MappingError::InvalidArgument(format!("{} is not a delegate type", types.display(f.ty())))
    })?;
    if params.len() != args.len() {
        return Err(MappingError::ArgumentCount {
            method: "Invoke".to_string(),
            expected: params.len(),
            actual: args.len(),
        });
    }
    Ok(RcExpr::from(Expr::Invoke(f, args, ret)))
}

#[cfg(test)]
pub mod tests {
    use super::*;

    #[test]
    pub fn test_member_not_found_suggests() {
        let types = TypeRegistry::new();
        let order = types.record("Order").member("Total", types.int32()).build();
        let p = param("o", order);
        match member(&types, parameter(&p), "Totl") {
            Err(MappingError::MemberNotFound { suggestions, .. }) => {
                assert_eq!(suggestions, vec!["Total".to_string()])
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    pub fn test_binary_typing() {
        let types = TypeRegistry::new();
        let int32 = types.int32();
        let nint = types.nullable(int32);
        assert_eq!(binary_type(&types, BinaryOp::Add, int32, int32), Ok(int32));
        assert_eq!(binary_type(&types, BinaryOp::Add, nint, int32), Ok(nint));
        assert_eq!(binary_type(&types, BinaryOp::Equal, nint, int32), Ok(types.boolean()));
        assert_eq!(binary_type(&types, BinaryOp::Coalesce, nint, int32), Ok(int32));
        assert!(binary_type(&types, BinaryOp::Equal, int32, types.string()).is_err());
        assert!(binary_type(&types, BinaryOp::Add, int32, types.int64()).is_err());
        assert!(binary_type(&types, BinaryOp::LessThan, types.string(), types.string()).is_err());
        assert_eq!(
            binary_type(&types, BinaryOp::Subtract, types.date_time(), types.date_time()),
            Ok(types.time_span())
        );
    }

    #[test]
    pub fn test_convert_validation() {
        let types = TypeRegistry::new();
        let x = constant(Value::int(1), types.int32());
        assert!(convert(&types, x.clone(), types.int64()).is_ok());
        assert!(convert(&types, x.clone(), types.nullable(types.int32())).is_ok());
        assert!(convert(&types, x, types.string()).is_err());
    }

    #[test]
    pub fn test_call_static_infers() {
        let types = TypeRegistry::new();
        let item = types.record("Item").member("Active", types.boolean()).build();
        let owner = types.record("Owner").member("Items", types.list(item)).build();
        let o = param("o", owner);
        let i = param("i", item);
        let predicate = lambda(&types, vec![i.clone()], member(&types, parameter(&i), "Active").unwrap());
        let any = call_static(
            &types,
            "Enumerable",
            "Any",
            &[],
            vec![member(&types, parameter(&o), "Items").unwrap(), predicate],
        )
        .unwrap();
        assert_eq!(any.ty(), types.boolean());
    }

    #[test]
    pub fn test_conditional_requires_matching_branches() {
        let types = TypeRegistry::new();
        let t = constant(Value::Bool(true), types.boolean());
        let a = constant(Value::int(1), types.int32());
        let b = constant(Value::str("x"), types.string());
        assert!(matches!(
            conditional(&types, t, a, b),
            Err(MappingError::BranchTypeMismatch(_, _))
        ));
    }
}
