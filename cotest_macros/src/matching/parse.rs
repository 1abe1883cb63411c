use super::{ArgPattern, MatchingInput};

use syn::parse::ParseStream;
use syn::spanned::Spanned;
use syn::Token;

impl syn::parse::Parse for MatchingInput {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut arg_patterns = if input.is_empty() {
            vec![]
        } else {
            parse_arg_patterns(input)?
        };

        let guard = if input.peek(Token![if]) {
            spell_out_single_list(&mut arg_patterns)?;
            let if_token: Token![if] = input.parse()?;
            Some((if_token, input.parse::<syn::Expr>()?))
        } else {
            None
        };

        if !input.is_empty() {
            return Err(syn::Error::new(input.span(), "Excessive tokens"));
        }

        Ok(MatchingInput {
            arg_patterns,
            guard,
        })
    }
}

/// Either `a, b | c, ..` (one argument list) or `(a, b) | (c, d)` (alternative lists).
fn parse_arg_patterns(input: ParseStream) -> syn::Result<Vec<ArgPattern>> {
    let (first, more) = parse_cases(input)?;

    if !more.is_empty() && matches!(first, syn::Pat::Tuple(_) | syn::Pat::Paren(_)) {
        return std::iter::once(first)
            .chain(more)
            .map(into_arg_list)
            .collect();
    }

    let mut elems = syn::punctuated::Punctuated::new();
    elems.push(join_cases(first, more));

    while input.peek(Token![,]) {
        elems.push_punct(input.parse()?);
        let (first, more) = parse_cases(input)?;
        elems.push(join_cases(first, more));
    }

    Ok(vec![ArgPattern {
        tuple: syn::PatTuple {
            attrs: vec![],
            paren_token: Default::default(),
            elems,
        },
    }])
}

/// One pattern, and the cases following it after `|`.
fn parse_cases(input: ParseStream) -> syn::Result<(syn::Pat, Vec<syn::Pat>)> {
    let first = syn::Pat::parse_single(input)?;
    let mut more = vec![];

    while input.peek(Token![|]) {
        let _: Token![|] = input.parse()?;
        more.push(syn::Pat::parse_single(input)?);
    }

    Ok((first, more))
}

fn join_cases(first: syn::Pat, more: Vec<syn::Pat>) -> syn::Pat {
    if more.is_empty() {
        return first;
    }

    syn::Pat::Or(syn::PatOr {
        attrs: vec![],
        leading_vert: None,
        cases: std::iter::once(first).chain(more).collect(),
    })
}

/// With a guard, a lone argument list has to be written out: `(a, b) if ..`.
fn spell_out_single_list(arg_patterns: &mut Vec<ArgPattern>) -> syn::Result<()> {
    if arg_patterns.len() != 1 {
        return Ok(());
    }

    let mut elems = arg_patterns.remove(0).tuple.elems;
    if elems.len() != 1 {
        return Err(syn::Error::new(elems.span(), "Too many elements"));
    }

    if let Some(pat) = elems.pop() {
        arg_patterns.push(into_arg_list(pat.into_value())?);
    }
    Ok(())
}

fn into_arg_list(pat: syn::Pat) -> syn::Result<ArgPattern> {
    let tuple = match pat {
        syn::Pat::Tuple(tuple) => tuple,
        syn::Pat::Paren(paren) => syn::PatTuple {
            attrs: paren.attrs,
            paren_token: paren.paren_token,
            elems: std::iter::once(*paren.pat).collect(),
        },
        other => return Err(syn::Error::new(other.span(), "Expected tuple")),
    };

    Ok(ArgPattern { tuple })
}
