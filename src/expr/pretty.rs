//! Render expressions as readable text such as
//! `s => (s.Child.Value == 10)`
use super::{BinaryOp, Expr, RcExpr, UnaryOp};
use crate::common::prettify::{prettify, ToPretty};
use crate::types::TypeRegistry;
use pretty::{DocAllocator, DocBuilder};

/// An expression paired with the registry needed to name its types
pub struct Typed<'t> {
    pub types: &'t TypeRegistry,
    pub expr: &'t RcExpr,
}

impl<'t> ToPretty for Typed<'t> {
    fn pretty<'b, D, A>(&'b self, allocator: &'b D) -> DocBuilder<'b, D, A>
    where
        D: DocAllocator<'b, A>,
        D::Doc: Clone,
        A: Clone,
    {
        doc(self.types, self.expr, allocator)
    }
}

/// Text form of an expression
pub fn text(types: &TypeRegistry, expr: &RcExpr) -> String {
    prettify(&Typed { types, expr })
}

fn list<'b, D, A>(types: &TypeRegistry, xs: &[RcExpr], allocator: &'b D) -> DocBuilder<'b, D, A>
where
    D: DocAllocator<'b, A>,
    D::Doc: Clone,
    A: Clone,
{
    let docs: Vec<_> = xs.iter().map(|x| doc(types, x, allocator)).collect();
    allocator.intersperse(docs, allocator.text(", "))
}

fn doc<'b, D, A>(types: &TypeRegistry, expr: &RcExpr, allocator: &'b D) -> DocBuilder<'b, D, A>
where
    D: DocAllocator<'b, A>,
    D::Doc: Clone,
    A: Clone,
{
    match &*expr.inner {
        Expr::Parameter(p) => allocator.text(p.name().to_string()),
        Expr::Constant(v, _) => allocator.text(v.to_string()),
        Expr::Member(target, m) => doc(types, target, allocator)
            .append(allocator.text("."))
            .append(allocator.text(m.name.clone())),
        Expr::Lambda(ps, body, _) => {
            let names: Vec<String> = ps.iter().map(|p| p.name().to_string()).collect();
            let head = if names.len() == 1 {
                allocator.text(names[0].clone())
            } else {
                allocator.text(format!("({})", names.join(", ")))
            };
            head.append(allocator.text(" => "))
                .append(doc(types, body, allocator))
        }
        Expr::Unary(UnaryOp::Quote, e, _) => doc(types, e, allocator),
        Expr::Unary(UnaryOp::Negate, e, _) => allocator.text("-").append(doc(types, e, allocator)),
        Expr::Unary(UnaryOp::TypeAs, e, t) => allocator
            .text("(")
            .append(doc(types, e, allocator))
            .append(allocator.text(format!(" As {})", types.display(*t)))),
        Expr::Unary(op, e, t) => {
            let suffix = if op.is_conversion() {
                format!(", {})", types.display(*t))
            } else {
                ")".to_string()
            };
            allocator
                .text(format!("{:?}(", op))
                .append(doc(types, e, allocator))
                .append(allocator.text(suffix))
        }
        Expr::Binary(BinaryOp::ArrayIndex, l, r, _, _) => doc(types, l, allocator)
            .append(allocator.text("["))
            .append(doc(types, r, allocator))
            .append(allocator.text("]")),
        Expr::Binary(op, l, r, _, _) => allocator
            .text("(")
            .append(doc(types, l, allocator))
            .append(allocator.text(format!(" {} ", op.symbol())))
            .append(doc(types, r, allocator))
            .append(allocator.text(")")),
        Expr::Conditional(c, a, b, _) => allocator
            .text("IIF(")
            .append(list(types, &[c.clone(), a.clone(), b.clone()], allocator))
            .append(allocator.text(")")),
        Expr::Call(instance, method, args) => {
            // extension style: first argument as receiver
            let (receiver, rest) = match instance {
                Some(i) => (Some(i), &args[..]),
                None => match args.split_first() {
                    Some((first, rest)) => (Some(first), rest),
                    None => (None, &args[..]),
                },
            };
            let head = match receiver {
                Some(r) => doc(types, r, allocator).append(allocator.text(".")),
                None => allocator.text(format!("{}.", method.declaring())),
            };
            head.append(allocator.text(method.name().to_string()))
                .append(allocator.text("("))
                .append(list(types, rest, allocator))
                .append(allocator.text(")"))
        }
        Expr::New(t, inits) => {
            let docs: Vec<_> = inits
                .iter()
                .map(|(n, e)| {
                    allocator
                        .text(format!("{} = ", n))
                        .append(doc(types, e, allocator))
                })
                .collect();
            let head = if types.is_anonymous(*t) {
                allocator.text("new {")
            } else {
                allocator.text(format!("new {}() {{", types.display(*t)))
            };
            head.append(allocator.text(if docs.is_empty() { "" } else { " " }))
                .append(allocator.intersperse(docs, allocator.text(", ")))
                .append(allocator.text(" }"))
        }
        Expr::NewArray(t, items) => allocator
            .text(format!("new {} {{", types.display(*t)))
            .append(list(types, items, allocator))
            .append(allocator.text("}")),
        Expr::TypeIs(e, tested, _) => allocator
            .text("(")
            .append(doc(types, e, allocator))
            .append(allocator.text(format!(" Is {})", types.display(*tested)))),
        Expr::Invoke(f, args, _) => {
            let mut all = vec![f.clone()];
            all.extend(args.iter().cloned());
            allocator
                .text("Invoke(")
                .append(list(types, &all, allocator))
                .append(allocator.text(")"))
        }
        Expr::Default(t) => allocator.text(format!("default({})", types.display(*t))),
    }
}
