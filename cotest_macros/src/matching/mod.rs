use crate::doc;

use quote::quote;

mod parse;

pub struct MatchingInput {
    arg_patterns: Vec<ArgPattern>,
    guard: Option<(syn::token::If, syn::Expr)>,
}

/// One alternative of the argument list, always in tuple form.
struct ArgPattern {
    tuple: syn::PatTuple,
}

struct Arg {
    ident: syn::Ident,
    kind: ArgKind,
}

/// How an argument is presented to the pattern.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
enum ArgKind {
    Plain,
    Str,
    Slice,
}

pub fn generate(input: MatchingInput) -> proc_macro2::TokenStream {
    if input.arg_patterns.is_empty() {
        return quote! {
            &|_m| {
                _m.func(|()| true);
                _m.pat_debug("()", file!(), line!());
            }
        };
    }

    let args = analyze_args(&input.arg_patterns);
    let pat_debug = generate_pat_debug(&input);

    let alternatives = input.arg_patterns.into_iter().map(|ArgPattern { tuple }| {
        if tuple.elems.len() == 1 {
            let single = tuple.elems.into_iter();
            quote! { #(#single)* }
        } else {
            quote! { #tuple }
        }
    });
    let guard = input
        .guard
        .map(|(if_token, expr)| quote! { #if_token #expr });

    // Inputs are always a tuple, even with one argument.
    let idents = args.iter().map(|arg| &arg.ident);
    let inputs_pat = quote! { (#(#idents,)*) };

    let scrutinees = args.iter().map(|arg| {
        let ident = &arg.ident;
        match arg.kind {
            ArgKind::Str => quote! { ::cotest::private::as_str_ref(#ident) },
            ArgKind::Slice => quote! { ::cotest::private::as_slice(#ident) },
            ArgKind::Plain => quote! { #ident },
        }
    });
    let scrutinee = if args.len() == 1 {
        quote! { #(#scrutinees)* }
    } else {
        quote! { (#(#scrutinees),*) }
    };

    quote! {
        &|_m| {
            _m.func(
                |#inputs_pat| match #scrutinee {
                    #(#alternatives)|* #guard => true,
                    _ => false
                },
            );
            _m.pat_debug(#pat_debug, file!(), line!());
        }
    }
}

/// One argument per element of the first alternative.
fn analyze_args(patterns: &[ArgPattern]) -> Vec<Arg> {
    let Some(first) = patterns.first() else {
        return vec![];
    };

    (0..first.tuple.elems.len())
        .map(|index| Arg {
            ident: quote::format_ident!("a{}", index),
            kind: guess_arg_kind(index, patterns),
        })
        .collect()
}

/// String literals and slice patterns need the argument converted first.
///
/// Alternatives that disagree leave the argument as it is.
fn guess_arg_kind(index: usize, patterns: &[ArgPattern]) -> ArgKind {
    fn kind_of(pat: Option<&syn::Pat>) -> ArgKind {
        match pat {
            Some(syn::Pat::Lit(syn::ExprLit {
                lit: syn::Lit::Str(_),
                ..
            })) => ArgKind::Str,
            Some(syn::Pat::Slice(_)) => ArgKind::Slice,
            _ => ArgKind::Plain,
        }
    }

    let mut guess = ArgKind::Plain;

    for pattern in patterns {
        match (guess, kind_of(pattern.tuple.elems.iter().nth(index))) {
            (_, ArgKind::Plain) => {}
            (ArgKind::Plain, next) => guess = next,
            (prev, next) if prev == next => {}
            _ => return ArgKind::Plain,
        }
    }

    guess
}

fn generate_pat_debug(input: &MatchingInput) -> syn::LitStr {
    let mut debug = String::new();

    if input.arg_patterns.is_empty() {
        debug.push_str("()");
    }

    for (index, arg_pattern) in input.arg_patterns.iter().enumerate() {
        if index > 0 {
            debug.push_str(" | ");
        }
        doc::arg_list(&arg_pattern.tuple, &mut debug);
    }

    if input.guard.is_some() {
        debug.push_str(" if {guard}");
    }

    syn::LitStr::new(&debug, proc_macro2::Span::call_site())
}
