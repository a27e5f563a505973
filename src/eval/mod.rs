//! A tree-walking evaluator for typed expressions
//!
//! Used to run rewritten predicates against in-memory data and to
//! compute custom member expressions when mapping values.
pub mod error;

use self::error::EvalError;
use crate::common::environment::SimpleEnvironment;
use crate::expr::value::RecordValue;
use crate::expr::{BinaryOp, Expr, RcExpr, UnaryOp, Value};
use crate::types::method::MethodInfo;
use crate::types::{Literal, TypeId, TypeRegistry};
use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate};
use moniker::FreeVar;
use std::cmp::Ordering;
use std::rc::Rc;

/// Evaluate a closed expression
pub fn evaluate(types: &TypeRegistry, expr: &RcExpr) -> Result<Value, EvalError> {
    Evaluator::new(types).eval(expr)
}

/// Apply a lambda expression to argument values
pub fn apply(types: &TypeRegistry, lambda: &RcExpr, args: Vec<Value>) -> Result<Value, EvalError> {
    Evaluator::new(types).apply_expr(lambda, args)
}

pub struct Evaluator<'t> {
    types: &'t TypeRegistry,
    env: SimpleEnvironment<FreeVar<String>, Value>,
}

impl<'t> Evaluator<'t> {
    pub fn new(types: &'t TypeRegistry) -> Self {
        Evaluator {
            types,
            env: SimpleEnvironment::new(),
        }
    }

    pub fn eval(&mut self, expr: &RcExpr) -> Result<Value, EvalError> {
        match &*expr.inner {
            Expr::Parameter(p) => self
                .env
                .get(&p.var)
                .cloned()
                .ok_or_else(|| EvalError::UnboundParameter(p.name().to_string())),
            Expr::Constant(v, _) => Ok(v.clone()),
            Expr::Member(target, m) => {
                let value = self.eval(target)?;
                self.member_value(target.ty(), value, &m.name)
            }
            Expr::Lambda(..) => Ok(Value::Lambda(expr.clone())),
            Expr::Unary(op, e, ty) => self.unary(*op, e, *ty),
            Expr::Binary(op, l, r, conversion, ty) => self.binary(*op, l, r, conversion.as_ref(), *ty),
            Expr::Conditional(test, a, b, _) => match self.eval(test)? {
                Value::Bool(true) => self.eval(a),
                Value::Bool(false) => self.eval(b),
                other => Err(EvalError::TypeMismatch {
                    expected: "Boolean".to_string(),
                    found: other.to_string(),
                }),
            },
            Expr::Call(instance, method, args) => self.call(instance.as_ref(), method, args),
            Expr::New(ty, inits) => {
                let mut fields = indexmap::IndexMap::new();
                for (name, e) in inits {
                    fields.insert(name.clone(), self.eval(e)?);
                }
                Ok(Value::Record(Rc::new(RecordValue { ty: *ty, fields })))
            }
            Expr::NewArray(_, items) => Ok(Value::list(
                items
                    .iter()
                    .map(|i| self.eval(i))
                    .collect::<Result<Vec<_>, _>>()?,
            )),
            Expr::TypeIs(e, tested, _) => {
                let value = self.eval(e)?;
                Ok(Value::Bool(self.is_instance(&value, e.ty(), *tested)))
            }
            Expr::Invoke(f, args, _) => {
                let function = self.eval(f)?;
                let values = args
                    .iter()
                    .map(|a| self.eval(a))
                    .collect::<Result<Vec<_>, _>>()?;
                self.apply(&function, values)
            }
            Expr::Default(ty) => Ok(default_value(self.types, *ty)),
        }
    }

    /// Apply a lambda value to arguments
    pub fn apply(&mut self, function: &Value, args: Vec<Value>) -> Result<Value, EvalError> {
        match function {
            Value::Lambda(lambda) => self.apply_expr(lambda, args),
            other => Err(EvalError::TypeMismatch {
                expected: "lambda".to_string(),
                found: other.to_string(),
            }),
        }
    }

    /// Apply a lambda expression to arguments
    pub fn apply_expr(&mut self, lambda: &RcExpr, args: Vec<Value>) -> Result<Value, EvalError> {
        let (params, body, _) = lambda.as_lambda().ok_or_else(|| EvalError::TypeMismatch {
            expected: "lambda".to_string(),
            found: "expression".to_string(),
        })?;
        self.env
            .push(params.iter().map(|p| p.var.clone()).zip(args));
        let result = self.eval(body);
        self.env.pop();
        result
    }

    fn truthy(&mut self, predicate: &Value, item: &Value) -> Result<bool, EvalError> {
        match self.apply(predicate, vec![item.clone()])? {
            Value::Bool(b) => Ok(b),
            Value::Null => Ok(false),
            other => Err(EvalError::TypeMismatch {
                expected: "Boolean".to_string(),
                found: other.to_string(),
            }),
        }
    }

    fn member_value(&self, target_ty: TypeId, value: Value, name: &str) -> Result<Value, EvalError> {
        if self.types.nullable_underlying(target_ty).is_some() {
            match name {
                "HasValue" => return Ok(Value::Bool(!value.is_null())),
                "Value" if value.is_null() => return Err(EvalError::NullReference(name.to_string())),
                "Value" => return Ok(value),
                _ => {}
            }
        }

        let missing = |value: &Value| EvalError::NoSuchMember {
            member: name.to_string(),
            value: value.to_string(),
        };
        match &value {
            Value::Null => Err(EvalError::NullReference(name.to_string())),
            Value::Record(r) => r.fields.get(name).cloned().ok_or_else(|| missing(&value)),
            Value::List(items) if name == "Count" || name == "Length" => {
                Ok(Value::int(items.len() as i64))
            }
            Value::Str(s) if name == "Length" => Ok(Value::int(s.chars().count() as i64)),
            Value::DateTime(d) => match name {
                "Year" => Ok(Value::int(d.year() as i64)),
                "Month" => Ok(Value::int(d.month() as i64)),
                "Day" => Ok(Value::int(d.day() as i64)),
                "Date" => Ok(d
                    .date()
                    .and_hms_opt(0, 0, 0)
                    .map(Value::DateTime)
                    .unwrap_or(Value::Null)),
                _ => Err(missing(&value)),
            },
            Value::DateTimeOffset(d) => match name {
                "Year" => Ok(Value::int(d.year() as i64)),
                "Month" => Ok(Value::int(d.month() as i64)),
                "Day" => Ok(Value::int(d.day() as i64)),
                "Date" => Ok(d
                    .naive_local()
                    .date()
                    .and_hms_opt(0, 0, 0)
                    .map(Value::DateTime)
                    .unwrap_or(Value::Null)),
                _ => Err(missing(&value)),
            },
            _ => Err(missing(&value)),
        }
    }

    fn unary(&mut self, op: UnaryOp, operand: &RcExpr, ty: TypeId) -> Result<Value, EvalError> {
        if op == UnaryOp::Quote {
            return self.eval(operand);
        }
        let value = self.eval(operand)?;
        let bad = |v: &Value| EvalError::BadOperand {
            op: format!("{:?}", op),
            operand: v.to_string(),
        };
        match op {
            UnaryOp::Convert | UnaryOp::ConvertChecked => {
                convert_value(self.types, &value, operand.ty(), ty)
            }
            UnaryOp::TypeAs => {
                if self.is_instance(&value, operand.ty(), ty) {
                    Ok(value)
                } else {
                    Ok(Value::Null)
                }
            }
            UnaryOp::Not => match &value {
                Value::Bool(b) => Ok(Value::Bool(!b)),
                Value::Null => Ok(Value::Null),
                Value::Num(_) => value.as_i64().map(|n| Value::int(!n)).ok_or_else(|| bad(&value)),
                _ => Err(bad(&value)),
            },
            UnaryOp::Negate => match &value {
                Value::Null => Ok(Value::Null),
                Value::TimeSpan(d) => Ok(Value::TimeSpan(-*d)),
                Value::Num(n) => match n.as_i64() {
                    Some(i) => i
                        .checked_neg()
                        .map(Value::int)
                        .ok_or_else(|| EvalError::Arithmetic("Negate".to_string())),
                    None => Ok(Value::float(-n.as_f64().unwrap_or_default())),
                },
                _ => Err(bad(&value)),
            },
            UnaryOp::ArrayLength => value
                .as_list()
                .map(|items| Value::int(items.len() as i64))
                .ok_or_else(|| bad(&value)),
            UnaryOp::Quote => Ok(value),
        }
    }

    fn is_instance(&self, value: &Value, static_ty: TypeId, tested: TypeId) -> bool {
        let types = self.types;
        match value {
            Value::Null => false,
            Value::Record(r) => {
                types.derives_from(r.ty, types.non_nullable(tested))
                    || types.is_assignable(r.ty, tested)
            }
            _ => types.is_assignable(types.non_nullable(static_ty), types.non_nullable(tested)),
        }
    }

    fn binary(
        &mut self,
        op: BinaryOp,
        l: &RcExpr,
        r: &RcExpr,
        conversion: Option<&RcExpr>,
        ty: TypeId,
    ) -> Result<Value, EvalError> {
        match op {
            BinaryOp::AndAlso => {
                let left = self.eval(l)?;
                if left == Value::Bool(false) {
                    return Ok(left);
                }
                let right = self.eval(r)?;
                logical(op, &left, &right)
            }
            BinaryOp::OrElse => {
                let left = self.eval(l)?;
                if left == Value::Bool(true) {
                    return Ok(left);
                }
                let right = self.eval(r)?;
                logical(op, &left, &right)
            }
            BinaryOp::Coalesce => {
                let left = self.eval(l)?;
                if left.is_null() {
                    self.eval(r)
                } else if let Some(c) = conversion {
                    self.apply_expr(c, vec![left])
                } else {
                    Ok(left)
                }
            }
            _ => {
                let left = self.eval(l)?;
                let right = self.eval(r)?;
                self.strict_binary(op, left, right, ty)
            }
        }
    }

    fn strict_binary(
        &self,
        op: BinaryOp,
        left: Value,
        right: Value,
        ty: TypeId,
    ) -> Result<Value, EvalError> {
        let bad = || EvalError::BadOperands {
            op: op.symbol().to_string(),
            left: left.to_string(),
            right: right.to_string(),
        };
        match op {
            BinaryOp::Equal => Ok(Value::Bool(left.loosely_equals(&right))),
            BinaryOp::NotEqual => Ok(Value::Bool(!left.loosely_equals(&right))),
            BinaryOp::LessThan
            | BinaryOp::LessThanOrEqual
            | BinaryOp::GreaterThan
            | BinaryOp::GreaterThanOrEqual => {
                if left.is_null() || right.is_null() {
                    return Ok(Value::Bool(false));
                }
                let ordering = left.compare(&right).ok_or_else(bad)?;
                Ok(Value::Bool(match op {
                    BinaryOp::LessThan => ordering == Ordering::Less,
                    BinaryOp::LessThanOrEqual => ordering != Ordering::Greater,
                    BinaryOp::GreaterThan => ordering == Ordering::Greater,
                    _ => ordering != Ordering::Less,
                }))
            }
            BinaryOp::And | BinaryOp::Or => match (&left, &right) {
                (Value::Num(_), Value::Num(_)) => {
                    let (a, b) = (left.as_i64().ok_or_else(bad)?, right.as_i64().ok_or_else(bad)?);
                    Ok(Value::int(if op == BinaryOp::And { a & b } else { a | b }))
                }
                _ => logical(op, &left, &right),
            },
            BinaryOp::ArrayIndex => {
                let index = right.as_i64().ok_or_else(bad)?;
                left.as_list()
                    .ok_or_else(bad)?
                    .get(index as usize)
                    .cloned()
                    .ok_or(EvalError::IndexOutOfRange(index))
            }
            _ => self.arithmetic(op, &left, &right, ty).ok_or_else(bad)?,
        }
    }

    fn arithmetic(
        &self,
        op: BinaryOp,
        left: &Value,
        right: &Value,
        ty: TypeId,
    ) -> Option<Result<Value, EvalError>> {
        let overflow = || Err(EvalError::Arithmetic(op.symbol().to_string()));
        match (left, right) {
            (Value::Null, _) | (_, Value::Null) => Some(Ok(Value::Null)),
            (Value::Str(a), Value::Str(b)) if op == BinaryOp::Add => {
                Some(Ok(Value::Str(format!("{}{}", a, b))))
            }
            (Value::Num(_), Value::Num(_)) => {
                let integral = self
                    .types
                    .literal_of(ty)
                    .map(|l| l.is_integral())
                    .unwrap_or(false);
                if integral {
                    let (a, b) = (left.as_i64()?, right.as_i64()?);
                    let result = match op {
                        BinaryOp::Add => a.checked_add(b),
                        BinaryOp::Subtract => a.checked_sub(b),
                        BinaryOp::Multiply => a.checked_mul(b),
                        BinaryOp::Divide => a.checked_div(b),
                        BinaryOp::Modulo => a.checked_rem(b),
                        _ => return None,
                    };
                    Some(result.map(Value::int).map_or_else(overflow, Ok))
                } else {
                    let (a, b) = (left.as_f64()?, right.as_f64()?);
                    let result = match op {
                        BinaryOp::Add => a + b,
                        BinaryOp::Subtract => a - b,
                        BinaryOp::Multiply => a * b,
                        BinaryOp::Divide => a / b,
                        BinaryOp::Modulo => a % b,
                        _ => return None,
                    };
                    Some(Ok(Value::float(result)))
                }
            }
            (Value::DateTime(a), Value::TimeSpan(d)) if op == BinaryOp::Add => {
                Some(Ok(Value::DateTime(*a + *d)))
            }
            (Value::DateTime(a), Value::DateTime(b)) if op == BinaryOp::Subtract => {
                Some(Ok(Value::TimeSpan(*a - *b)))
            }
            (Value::DateTimeOffset(a), Value::DateTimeOffset(b)) if op == BinaryOp::Subtract => {
                Some(Ok(Value::TimeSpan(*a - *b)))
            }
            (Value::TimeSpan(a), Value::TimeSpan(b)) => match op {
                BinaryOp::Add => Some(Ok(Value::TimeSpan(*a + *b))),
                BinaryOp::Subtract => Some(Ok(Value::TimeSpan(*a - *b))),
                _ => None,
            },
            _ => None,
        }
    }

    fn call(
        &mut self,
        instance: Option<&RcExpr>,
        method: &MethodInfo,
        args: &[RcExpr],
    ) -> Result<Value, EvalError> {
        let receiver = match instance {
            Some(i) => Some(self.eval(i)?),
            None => None,
        };
        let values = args
            .iter()
            .map(|a| self.eval(a))
            .collect::<Result<Vec<_>, _>>()?;

        match (method.declaring(), receiver) {
            ("Enumerable", _) | ("Queryable", _) => self.sequence_method(method.name(), &values),
            (_, Some(Value::Null)) => Err(EvalError::NullReference(method.qualified_name())),
            ("String", Some(Value::Str(s))) => string_method(method, &s, &values),
            ("Object", Some(v)) | ("String", Some(v)) => match method.name() {
                "ToString" => Ok(Value::Str(v.to_text())),
                "Equals" => Ok(Value::Bool(
                    values.first().map(|o| v.loosely_equals(o)).unwrap_or(false),
                )),
                _ => Err(EvalError::UnsupportedMethod(method.qualified_name())),
            },
            _ => Err(EvalError::UnsupportedMethod(method.qualified_name())),
        }
    }

    fn sequence_method(&mut self, name: &str, values: &[Value]) -> Result<Value, EvalError> {
        let items: Rc<Vec<Value>> = match values.first() {
            Some(Value::List(items)) => items.clone(),
            Some(Value::Null) => return Err(EvalError::NullReference(name.to_string())),
            other => {
                return Err(EvalError::TypeMismatch {
                    expected: "sequence".to_string(),
                    found: other.map(|v| v.to_string()).unwrap_or_default(),
                })
            }
        };
        let arg = values.get(1);

        match name {
            "Any" => match arg {
                None => Ok(Value::Bool(!items.is_empty())),
                Some(predicate) => {
                    for item in items.iter() {
                        if self.truthy(predicate, item)? {
                            return Ok(Value::Bool(true));
                        }
                    }
                    Ok(Value::Bool(false))
                }
            },
            "All" => {
                let predicate = arg.ok_or(EvalError::EmptySequence)?;
                for item in items.iter() {
                    if !self.truthy(predicate, item)? {
                        return Ok(Value::Bool(false));
                    }
                }
                Ok(Value::Bool(true))
            }
            "Count" => Ok(Value::int(self.filtered(&items, arg)?.len() as i64)),
            "Where" => Ok(Value::list(self.filtered(&items, arg)?)),
            "Select" => {
                let selector = arg.ok_or(EvalError::EmptySequence)?;
                Ok(Value::list(
                    items
                        .iter()
                        .map(|i| self.apply(selector, vec![i.clone()]))
                        .collect::<Result<Vec<_>, _>>()?,
                ))
            }
            "First" => self
                .filtered(&items, arg)?
                .into_iter()
                .next()
                .ok_or(EvalError::EmptySequence),
            "FirstOrDefault" => Ok(self
                .filtered(&items, arg)?
                .into_iter()
                .next()
                .unwrap_or(Value::Null)),
            "Contains" => Ok(Value::Bool(
                arg.map(|v| items.iter().any(|i| i.loosely_equals(v)))
                    .unwrap_or(false),
            )),
            "OrderBy" | "OrderByDescending" => {
                let selector = arg.ok_or(EvalError::EmptySequence)?;
                let mut keyed = items
                    .iter()
                    .map(|i| Ok((self.apply(selector, vec![i.clone()])?, i.clone())))
                    .collect::<Result<Vec<_>, EvalError>>()?;
                if name == "OrderBy" {
                    keyed.sort_by(|(a, _), (b, _)| a.compare(b).unwrap_or(Ordering::Equal));
                } else {
                    keyed.sort_by(|(a, _), (b, _)| b.compare(a).unwrap_or(Ordering::Equal));
                }
                Ok(Value::list(keyed.into_iter().map(|(_, i)| i).collect()))
            }
            "Sum" => {
                let selector = arg.ok_or(EvalError::EmptySequence)?;
                let mut total: i64 = 0;
                for item in items.iter() {
                    let v = self.apply(selector, vec![item.clone()])?;
                    total = total
                        .checked_add(v.as_i64().unwrap_or(0))
                        .ok_or_else(|| EvalError::Arithmetic("Sum".to_string()))?;
                }
                Ok(Value::int(total))
            }
            "Max" | "Min" => {
                let selector = arg.ok_or(EvalError::EmptySequence)?;
                let wanted = if name == "Max" {
                    Ordering::Greater
                } else {
                    Ordering::Less
                };
                let mut best: Option<Value> = None;
                for item in items.iter() {
                    let v = self.apply(selector, vec![item.clone()])?;
                    best = match best {
                        Some(b) if v.compare(&b) != Some(wanted) => Some(b),
                        _ => Some(v),
                    };
                }
                best.ok_or(EvalError::EmptySequence)
            }
            "Take" | "Skip" => {
                let n = arg.and_then(|v| v.as_i64()).unwrap_or(0).max(0) as usize;
                Ok(Value::list(if name == "Take" {
                    items.iter().take(n).cloned().collect()
                } else {
                    items.iter().skip(n).cloned().collect()
                }))
            }
            _ => Err(EvalError::UnsupportedMethod(name.to_string())),
        }
    }

    fn filtered(&mut self, items: &[Value], predicate: Option<&Value>) -> Result<Vec<Value>, EvalError> {
        match predicate {
            None => Ok(items.to_vec()),
            Some(p) => {
                let mut kept = vec![];
                for item in items {
                    if self.truthy(p, item)? {
                        kept.push(item.clone());
                    }
                }
                Ok(kept)
            }
        }
    }
}

fn logical(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    match (left, right) {
        (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(match op {
            BinaryOp::AndAlso | BinaryOp::And => *a && *b,
            _ => *a || *b,
        })),
        (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
        _ => Err(EvalError::BadOperands {
            op: op.symbol().to_string(),
            left: left.to_string(),
            right: right.to_string(),
        }),
    }
}

fn first_str(args: &[Value]) -> Result<&str, EvalError> {
    args.first()
        .and_then(|a| a.as_str())
        .ok_or_else(|| EvalError::TypeMismatch {
            expected: "String".to_string(),
            found: args.first().map(|a| a.to_string()).unwrap_or_default(),
        })
}

fn string_method(method: &MethodInfo, s: &str, args: &[Value]) -> Result<Value, EvalError> {
    let arg = || first_str(args);
    match method.name() {
        "StartsWith" => Ok(Value::Bool(s.starts_with(arg()?))),
        "EndsWith" => Ok(Value::Bool(s.ends_with(arg()?))),
        "Contains" => Ok(Value::Bool(s.contains(arg()?))),
        "Equals" => Ok(Value::Bool(s == arg()?)),
        "ToUpper" => Ok(Value::Str(s.to_uppercase())),
        "ToLower" => Ok(Value::Str(s.to_lowercase())),
        "Trim" => Ok(Value::Str(s.trim().to_string())),
        "ToString" => Ok(Value::str(s)),
        _ => Err(EvalError::UnsupportedMethod(method.qualified_name())),
    }
}

/// Convert a value between scalar types, following the static types
/// of the conversion
pub fn convert_value(
    types: &TypeRegistry,
    value: &Value,
    from: TypeId,
    to: TypeId,
) -> Result<Value, EvalError> {
    let bad = || EvalError::BadConversion {
        value: value.to_string(),
        target: types.display(to),
    };
    if value.is_null() {
        return if types.is_value_type(to) && types.nullable_underlying(to).is_none() {
            Err(EvalError::NullReference(types.display(to)))
        } else {
            Ok(Value::Null)
        };
    }

    let target = types.non_nullable(to);
    let source = types.non_nullable(from);

    if let Some(variants) = types.enum_variants(target) {
        return match value {
            Value::Enum(v) if variants.contains(v) => Ok(value.clone()),
            Value::Num(_) => value
                .as_i64()
                .and_then(|i| usize::try_from(i).ok())
                .and_then(|i| variants.get(i))
                .map(Value::enumeration)
                .ok_or_else(bad),
            _ => Err(bad()),
        };
    }

    let numeric = match value {
        Value::Enum(v) => types
            .enum_variants(source)
            .and_then(|vs| vs.iter().position(|x| x == v))
            .map(|i| Value::int(i as i64)),
        Value::Char(c) => Some(Value::int(*c as i64)),
        Value::Num(_) => Some(value.clone()),
        _ => None,
    };

    match (value, types.literal_of(target)) {
        (Value::DateTimeOffset(d), Some(Literal::DateTime)) => {
            return Ok(Value::DateTime(d.naive_local()))
        }
        (Value::DateTime(d), Some(Literal::DateTimeOffset)) => {
            return FixedOffset::east_opt(0)
                .map(|utc| Value::DateTimeOffset(DateTime::<FixedOffset>::from_utc(*d, utc)))
                .ok_or_else(bad)
        }
        _ => {}
    }

    match types.literal_of(target) {
        Some(l) if l.is_integral() => numeric
            .and_then(|n| n.as_i64())
            .map(Value::int)
            .ok_or_else(bad),
        Some(Literal::Single) | Some(Literal::Double) | Some(Literal::Decimal) => numeric
            .and_then(|n| n.as_f64().or_else(|| n.as_i64().map(|i| i as f64)))
            .map(Value::float)
            .ok_or_else(bad),
        Some(Literal::Char) => numeric
            .and_then(|n| n.as_i64())
            .and_then(|i| u32::try_from(i).ok())
            .and_then(char::from_u32)
            .map(Value::Char)
            .ok_or_else(bad),
        _ => Ok(value.clone()),
    }
}

/// The value a `default(T)` expression produces
pub fn default_value(types: &TypeRegistry, ty: TypeId) -> Value {
    if let Some(variants) = types.enum_variants(ty) {
        return variants.first().map(Value::enumeration).unwrap_or(Value::Null);
    }
    let epoch = NaiveDate::from_ymd_opt(1, 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0));
    match &*types.kind(ty) {
        crate::types::TypeKind::Literal(l) => match l {
            Literal::Boolean => Value::Bool(false),
            Literal::Single | Literal::Double | Literal::Decimal => Value::float(0.0),
            l if l.is_integral() => Value::int(0),
            Literal::Char => Value::Char('\0'),
            Literal::Guid => Value::Guid(uuid::Uuid::nil()),
            Literal::DateTime => epoch.map(Value::DateTime).unwrap_or(Value::Null),
            Literal::DateTimeOffset => epoch
                .zip(FixedOffset::east_opt(0))
                .map(|(n, o)| Value::DateTimeOffset(DateTime::<FixedOffset>::from_utc(n, o)))
                .unwrap_or(Value::Null),
            Literal::TimeSpan => Value::TimeSpan(Duration::zero()),
            _ => Value::Null,
        },
        _ => Value::Null,
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::expr::build::*;

    #[test]
    pub fn test_filter_children() {
        let types = TypeRegistry::new();
        let child = types.record("Child").member("Value", types.int32()).build();
        let parent = types.record("Parent").member("Children", types.list(child)).build();
        let p = param("p", parent);
        let c = param("c", child);
        let predicate = lambda(
            &types,
            vec![c.clone()],
            binary(
                &types,
                BinaryOp::GreaterThan,
                member(&types, parameter(&c), "Value").unwrap(),
                constant(Value::int(1), types.int32()),
            )
            .unwrap(),
        );
        let body = call_static(
            &types,
            "Enumerable",
            "Count",
            &[],
            vec![member(&types, parameter(&p), "Children").unwrap(), predicate],
        )
        .unwrap();
        let f = lambda(&types, vec![p], body);
        let kids = (0..4)
            .map(|i| Value::record(child, vec![("Value", Value::int(i))]))
            .collect();
        let row = Value::record(parent, vec![("Children", Value::list(kids))]);
        assert_eq!(apply(&types, &f, vec![row]), Ok(Value::int(2)));
    }

    #[test]
    pub fn test_nullable_members() {
        let types = TypeRegistry::new();
        let holder = types
            .record("Holder")
            .member("Age", types.nullable(types.int32()))
            .build();
        let h = param("h", holder);
        let f = lambda(&types, vec![h.clone()], path(&types, parameter(&h), "Age.HasValue").unwrap());
        let empty = Value::record(holder, vec![("Age", Value::Null)]);
        let full = Value::record(holder, vec![("Age", Value::int(3))]);
        assert_eq!(apply(&types, &f, vec![empty]), Ok(Value::Bool(false)));
        assert_eq!(apply(&types, &f, vec![full]), Ok(Value::Bool(true)));
    }

    #[test]
    pub fn test_convert_enum_and_numbers() {
        let types = TypeRegistry::new();
        let colour = types.enumeration("Colour", &["Red", "Green"]);
        assert_eq!(
            convert_value(&types, &Value::enumeration("Green"), colour, types.int32()),
            Ok(Value::int(1))
        );
        assert_eq!(
            convert_value(&types, &Value::int(0), types.int32(), colour),
            Ok(Value::enumeration("Red"))
        );
        assert_eq!(
            convert_value(&types, &Value::float(2.7), types.double(), types.int64()),
            Ok(Value::int(2))
        );
        assert!(convert_value(&types, &Value::Null, types.nullable(types.int32()), types.int32()).is_err());
    }

    #[test]
    pub fn test_integer_division_and_overflow() {
        let types = TypeRegistry::new();
        let int32 = types.int32();
        let seven = constant(Value::int(7), int32);
        let two = constant(Value::int(2), int32);
        let zero = constant(Value::int(0), int32);
        let div = binary(&types, BinaryOp::Divide, seven.clone(), two).unwrap();
        assert_eq!(evaluate(&types, &div), Ok(Value::int(3)));
        let by_zero = binary(&types, BinaryOp::Divide, seven, zero).unwrap();
        assert!(matches!(evaluate(&types, &by_zero), Err(EvalError::Arithmetic(_))));
    }

    #[test]
    pub fn test_string_methods() {
        let types = TypeRegistry::new();
        let s = constant(Value::str("Widget"), types.string());
        let starts = call_instance(
            &types,
            s,
            "StartsWith",
            vec![constant(Value::str("Wid"), types.string())],
        )
        .unwrap();
        assert_eq!(evaluate(&types, &starts), Ok(Value::Bool(true)));
    }
}
