//! Basic pretty printing facilities

use pretty::{DocAllocator, DocBuilder, RcAllocator};

pub trait ToPretty {
    fn pretty<'b, D, A>(&'b self, allocator: &'b D) -> DocBuilder<'b, D, A>
    where
        D: DocAllocator<'b, A>,
        D::Doc: Clone,
        A: Clone;
}

/// Render to a single string of at most `width` columns where the
/// document allows line breaks.
pub fn prettify_width<I>(expr: &I, width: usize) -> String
where
    I: ToPretty,
{
    let allocator = RcAllocator;
    let doc = expr.pretty::<_, ()>(&allocator);
    let mut w = Vec::new();
    if doc.1.render(width, &mut w).is_err() {
        return String::new();
    }
    String::from_utf8_lossy(&w).into_owned()
}

/// Render to text for logs, messages and test comparisons
pub fn prettify<I>(expr: &I) -> String
where
    I: ToPretty,
{
    prettify_width(expr, 120)
}
