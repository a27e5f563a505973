//! Typed lambda expression trees
//!
//! Every node carries (or can compute) its static type. Nodes are
//! immutable and shared via `RcExpr`; rewriting builds new trees.
pub mod build;
pub mod pretty;
pub mod value;

use crate::types::method::MethodInfo;
use crate::types::{Member, TypeId};
use moniker::FreeVar;
use std::rc::Rc;

pub use self::value::Value;

/// A lambda parameter. Identity is by the unique variable, not by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Parameter {
    pub var: FreeVar<String>,
    pub ty: TypeId,
}

impl Parameter {
    pub fn new(name: &str, ty: TypeId) -> Self {
        Parameter {
            var: FreeVar::fresh_named(name),
            ty,
        }
    }

    pub fn name(&self) -> &str {
        self.var.pretty_name.as_deref().unwrap_or("?")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Convert,
    ConvertChecked,
    Not,
    Negate,
    /// Wrap a lambda as an expression value
    Quote,
    TypeAs,
    ArrayLength,
}

impl UnaryOp {
    /// Operators whose result type is given rather than derived
    pub fn is_conversion(&self) -> bool {
        matches!(self, UnaryOp::Convert | UnaryOp::ConvertChecked | UnaryOp::TypeAs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    And,
    Or,
    AndAlso,
    OrElse,
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Coalesce,
    ArrayIndex,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::And => "And",
            BinaryOp::Or => "Or",
            BinaryOp::AndAlso => "AndAlso",
            BinaryOp::OrElse => "OrElse",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::LessThan => "<",
            BinaryOp::LessThanOrEqual => "<=",
            BinaryOp::GreaterThan => ">",
            BinaryOp::GreaterThanOrEqual => ">=",
            BinaryOp::Coalesce => "??",
            BinaryOp::ArrayIndex => "[]",
        }
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::LessThan
                | BinaryOp::LessThanOrEqual
                | BinaryOp::GreaterThan
                | BinaryOp::GreaterThanOrEqual
        )
    }

    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            BinaryOp::Add
                | BinaryOp::Subtract
                | BinaryOp::Multiply
                | BinaryOp::Divide
                | BinaryOp::Modulo
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Parameter(Parameter),
    /// Literal or captured value with its declared type
    Constant(Value, TypeId),
    /// Field or property access
    Member(RcExpr, Member),
    /// Lambda abstraction and its delegate type
    Lambda(Vec<Parameter>, RcExpr, TypeId),
    Unary(UnaryOp, RcExpr, TypeId),
    /// Operator, operands, optional coalesce conversion lambda, result type
    Binary(BinaryOp, RcExpr, RcExpr, Option<RcExpr>, TypeId),
    Conditional(RcExpr, RcExpr, RcExpr, TypeId),
    /// Method call: optional instance, method, arguments
    Call(Option<RcExpr>, MethodInfo, Vec<RcExpr>),
    /// Construct a record or anonymous record, initialising members
    New(TypeId, Vec<(String, RcExpr)>),
    /// Array of the given array type
    NewArray(TypeId, Vec<RcExpr>),
    /// Runtime type test (operand, tested type, boolean type)
    TypeIs(RcExpr, TypeId, TypeId),
    /// Invoke a delegate valued expression
    Invoke(RcExpr, Vec<RcExpr>, TypeId),
    Default(TypeId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RcExpr {
    pub inner: Rc<Expr>,
}

impl From<Expr> for RcExpr {
    fn from(expr: Expr) -> Self {
        RcExpr {
            inner: Rc::new(expr),
        }
    }
}

impl RcExpr {
    /// Static type of the expression
    pub fn ty(&self) -> TypeId {
        match &*self.inner {
            Expr::Parameter(p) => p.ty,
            Expr::Constant(_, t) => *t,
            Expr::Member(_, m) => m.ty,
            Expr::Lambda(_, _, t) => *t,
            Expr::Unary(_, _, t) => *t,
            Expr::Binary(_, _, _, _, t) => *t,
            Expr::Conditional(_, _, _, t) => *t,
            Expr::Call(_, m, _) => m.ret,
            Expr::New(t, _) => *t,
            Expr::NewArray(t, _) => *t,
            Expr::TypeIs(_, _, t) => *t,
            Expr::Invoke(_, _, t) => *t,
            Expr::Default(t) => *t,
        }
    }

    /// Same node (not merely structurally equal)
    pub fn same(&self, other: &RcExpr) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn is_constant(&self) -> bool {
        match &*self.inner {
            Expr::Constant(_, _) => true,
            Expr::Unary(op, e, _) if op.is_conversion() => e.is_constant(),
            _ => false,
        }
    }

    /// Parameters, body and type of a lambda, looking through `Quote`
    pub fn as_lambda(&self) -> Option<(&[Parameter], &RcExpr, TypeId)> {
        match &*self.inner {
            Expr::Lambda(ps, body, t) => Some((ps.as_slice(), body, *t)),
            Expr::Unary(UnaryOp::Quote, e, _) => e.as_lambda(),
            _ => None,
        }
    }

    /// Innermost non-member expression under a chain of member
    /// accesses, and the member names leading from it
    pub fn member_chain(&self) -> (RcExpr, Vec<String>) {
        let mut names = vec![];
        let mut current = self.clone();
        while let Expr::Member(target, m) = &*current.inner.clone() {
            names.push(m.name.clone());
            current = target.clone();
        }
        names.reverse();
        (current, names)
    }

    /// Child expressions in evaluation order
    pub fn children(&self) -> Vec<&RcExpr> {
        match &*self.inner {
            Expr::Parameter(_) | Expr::Constant(_, _) | Expr::Default(_) => vec![],
            Expr::Member(e, _) | Expr::Unary(_, e, _) | Expr::TypeIs(e, _, _) => vec![e],
            Expr::Lambda(_, body, _) => vec![body],
            Expr::Binary(_, l, r, conversion, _) => {
                let mut children = vec![l, r];
                children.extend(conversion.iter());
                children
            }
            Expr::Conditional(t, a, b, _) => vec![t, a, b],
            Expr::Call(instance, _, args) => instance.iter().chain(args.iter()).collect(),
            Expr::New(_, inits) => inits.iter().map(|(_, e)| e).collect(),
            Expr::NewArray(_, items) => items.iter().collect(),
            Expr::Invoke(f, args, _) => std::iter::once(f).chain(args.iter()).collect(),
        }
    }

    /// Pre-order traversal
    pub fn visit<F: FnMut(&RcExpr)>(&self, f: &mut F) {
        f(self);
        for child in self.children() {
            child.visit(f);
        }
    }

    /// Apply `f` to each child, rebuilding this node with the results.
    /// Node types are preserved; callers that change child types must
    /// recompute types themselves.
    pub fn walk_safe<E, F: FnMut(RcExpr) -> Result<RcExpr, E>>(
        &self,
        f: &mut F,
    ) -> Result<RcExpr, E> {
        Ok(match &*self.inner {
            Expr::Parameter(_) | Expr::Constant(_, _) | Expr::Default(_) => self.clone(),
            Expr::Member(e, m) => RcExpr::from(Expr::Member(f(e.clone())?, m.clone())),
            Expr::Lambda(ps, body, t) => {
                RcExpr::from(Expr::Lambda(ps.clone(), f(body.clone())?, *t))
            }
            Expr::Unary(op, e, t) => RcExpr::from(Expr::Unary(*op, f(e.clone())?, *t)),
            Expr::Binary(op, l, r, conversion, t) => {
                let conversion = match conversion {
                    Some(c) => Some(f(c.clone())?),
                    None => None,
                };
                RcExpr::from(Expr::Binary(*op, f(l.clone())?, f(r.clone())?, conversion, *t))
            }
            Expr::Conditional(c, a, b, t) => RcExpr::from(Expr::Conditional(
                f(c.clone())?,
                f(a.clone())?,
                f(b.clone())?,
                *t,
            )),
            Expr::Call(instance, m, args) => {
                let instance = match instance {
                    Some(i) => Some(f(i.clone())?),
                    None => None,
                };
                RcExpr::from(Expr::Call(
                    instance,
                    m.clone(),
                    args.iter()
                        .map(|x| f(x.clone()))
                        .collect::<Result<Vec<RcExpr>, E>>()?,
                ))
            }
            Expr::New(t, inits) => RcExpr::from(Expr::New(
                *t,
                inits
                    .iter()
                    .map(|(n, x)| Ok((n.clone(), f(x.clone())?)))
                    .collect::<Result<Vec<(String, RcExpr)>, E>>()?,
            )),
            Expr::NewArray(t, items) => RcExpr::from(Expr::NewArray(
                *t,
                items
                    .iter()
                    .map(|x| f(x.clone()))
                    .collect::<Result<Vec<RcExpr>, E>>()?,
            )),
            Expr::TypeIs(e, tested, t) => RcExpr::from(Expr::TypeIs(f(e.clone())?, *tested, *t)),
            Expr::Invoke(g, args, t) => RcExpr::from(Expr::Invoke(
                f(g.clone())?,
                args.iter()
                    .map(|x| f(x.clone()))
                    .collect::<Result<Vec<RcExpr>, E>>()?,
                *t,
            )),
        })
    }

    /// Replace every reference to `var` by `replacement`
    pub fn substitute(&self, var: &FreeVar<String>, replacement: &RcExpr) -> RcExpr {
        match &*self.inner {
            Expr::Parameter(p) if p.var == *var => replacement.clone(),
            _ => match self.walk_safe::<(), _>(&mut |e| Ok(e.substitute(var, replacement))) {
                Ok(e) => e,
                Err(()) => self.clone(),
            },
        }
    }

    /// Number of nodes in the tree
    pub fn size(&self) -> usize {
        let mut count = 0;
        self.visit(&mut |_| count += 1);
        count
    }
}
