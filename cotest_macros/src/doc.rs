//! Compact source rendering of `matching!` patterns, for failure messages.

use quote::ToTokens;

/// Render one argument list, like `(1, "a" | "b", _)`.
pub(crate) fn arg_list(tuple: &syn::PatTuple, out: &mut String) {
    out.push('(');
    joined(tuple.elems.iter(), ", ", out);
    out.push(')');
}

fn joined<'p>(pats: impl Iterator<Item = &'p syn::Pat>, separator: &str, out: &mut String) {
    for (index, pat) in pats.enumerate() {
        if index > 0 {
            out.push_str(separator);
        }
        render(pat, out);
    }
}

fn render(pat: &syn::Pat, out: &mut String) {
    match pat {
        syn::Pat::Lit(lit) => out.push_str(&lit.lit.to_token_stream().to_string()),
        syn::Pat::Ident(ident) => {
            if ident.by_ref.is_some() {
                out.push_str("ref ");
            }
            if ident.mutability.is_some() {
                out.push_str("mut ");
            }
            out.push_str(&ident.ident.to_string());
            if let Some((_, subpat)) = &ident.subpat {
                out.push_str(" @ ");
                render(subpat, out);
            }
        }
        syn::Pat::Wild(_) => out.push('_'),
        syn::Pat::Rest(_) => out.push_str(".."),
        syn::Pat::Or(or) => joined(or.cases.iter(), " | ", out),
        syn::Pat::Tuple(tuple) => arg_list(tuple, out),
        syn::Pat::Paren(paren) => {
            out.push('(');
            render(&paren.pat, out);
            out.push(')');
        }
        syn::Pat::Path(path) => last_segment(&path.path, out),
        syn::Pat::TupleStruct(tuple_struct) => {
            last_segment(&tuple_struct.path, out);
            out.push('(');
            joined(tuple_struct.elems.iter(), ", ", out);
            out.push(')');
        }
        // fields are left out
        syn::Pat::Struct(pat_struct) => {
            last_segment(&pat_struct.path, out);
            out.push_str(" {}");
        }
        syn::Pat::Slice(slice) => {
            out.push('[');
            joined(slice.elems.iter(), ", ", out);
            out.push(']');
        }
        syn::Pat::Reference(reference) => {
            out.push('&');
            if reference.mutability.is_some() {
                out.push_str("mut ");
            }
            render(&reference.pat, out);
        }
        syn::Pat::Range(range) => {
            if let Some(start) = &range.start {
                range_bound(start, out);
            }
            out.push_str(match range.limits {
                syn::RangeLimits::HalfOpen(_) => "..",
                syn::RangeLimits::Closed(_) => "..=",
            });
            if let Some(end) = &range.end {
                range_bound(end, out);
            }
        }
        other => out.push_str(&other.to_token_stream().to_string()),
    }
}

fn range_bound(expr: &syn::Expr, out: &mut String) {
    match expr {
        syn::Expr::Lit(lit) => out.push_str(&lit.lit.to_token_stream().to_string()),
        syn::Expr::Path(path) => last_segment(&path.path, out),
        syn::Expr::Unary(syn::ExprUnary {
            op: syn::UnOp::Neg(_),
            expr,
            ..
        }) => {
            out.push('-');
            range_bound(expr, out);
        }
        _ => out.push_str("?expr?"),
    }
}

/// `Option::None` reads as `None`.
fn last_segment(path: &syn::Path, out: &mut String) {
    if let Some(segment) = path.segments.last() {
        out.push_str(&segment.ident.to_string());
    }
}
