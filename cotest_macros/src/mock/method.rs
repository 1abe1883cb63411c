use quote::quote;
use syn::spanned::Spanned;
use syn::visit_mut::VisitMut;

pub struct MockMethod<'t> {
    pub method: &'t syn::TraitItemFn,
    pub mock_fn_ident: syn::Ident,
    pub args: Vec<MockArg<'t>>,
    pub output_ty: syn::Type,
}

pub struct MockArg<'t> {
    /// Renamed argument, `a0`, `a1` and so on.
    pub ident: syn::Ident,
    pub ty: &'t syn::Type,
}

impl<'t> MockMethod<'t> {
    /// The argument types as a tuple type, `(A,)` for a single argument.
    pub fn inputs_tuple_ty(&self) -> proc_macro2::TokenStream {
        let types = self.args.iter().map(|arg| arg.ty);
        quote! { (#(#types,)*) }
    }

    /// The renamed arguments as a tuple pattern or expression.
    pub fn inputs_tuple(&self) -> proc_macro2::TokenStream {
        let idents = self.args.iter().map(|arg| &arg.ident);
        quote! { (#(#idents,)*) }
    }

    pub fn fn_params(&self) -> impl Iterator<Item = proc_macro2::TokenStream> + '_ {
        self.args.iter().map(|MockArg { ident, ty }| quote! { #ident: #ty })
    }
}

pub fn extract_methods(item_trait: &syn::ItemTrait) -> syn::Result<Vec<MockMethod<'_>>> {
    if !item_trait.generics.params.is_empty() {
        return Err(syn::Error::new(
            item_trait.generics.span(),
            "Generic traits cannot be mocked",
        ));
    }
    if let Some(unsafety) = &item_trait.unsafety {
        return Err(syn::Error::new(
            unsafety.span(),
            "Unsafe traits cannot be mocked",
        ));
    }

    item_trait
        .items
        .iter()
        .map(|item| match item {
            syn::TraitItem::Fn(method) => analyze(method),
            other => Err(syn::Error::new(
                other.span(),
                "Only methods are supported in mocked traits",
            )),
        })
        .collect()
}

fn analyze(method: &syn::TraitItemFn) -> syn::Result<MockMethod<'_>> {
    let sig = &method.sig;

    if let Some(asyncness) = &sig.asyncness {
        return Err(syn::Error::new(
            asyncness.span(),
            "Async methods cannot be mocked",
        ));
    }
    if let Some(unsafety) = &sig.unsafety {
        return Err(syn::Error::new(unsafety.span(), "Unsafe methods cannot be mocked"));
    }
    if !sig.generics.params.is_empty() {
        return Err(syn::Error::new(
            sig.generics.span(),
            "Generic methods cannot be mocked",
        ));
    }

    match sig.receiver() {
        Some(syn::Receiver {
            reference: Some((_, None)),
            mutability: None,
            colon_token: None,
            ..
        }) => {}
        _ => {
            return Err(syn::Error::new(
                sig.span(),
                "Mocked methods must take `&self`",
            ))
        }
    }

    let mut args = vec![];
    for fn_arg in sig.inputs.iter() {
        let syn::FnArg::Typed(pat_type) = fn_arg else {
            continue;
        };
        if contains_lifetime(pat_type.ty.as_ref().clone()) {
            return Err(syn::Error::new(
                pat_type.ty.span(),
                "Borrowed arguments cannot be mocked, use an owned type",
            ));
        }

        args.push(MockArg {
            ident: quote::format_ident!("a{}", args.len()),
            ty: pat_type.ty.as_ref(),
        });
    }

    let output_ty = match &sig.output {
        syn::ReturnType::Default => syn::parse_quote! { () },
        syn::ReturnType::Type(_, ty) => {
            if contains_lifetime(ty.as_ref().clone()) {
                return Err(syn::Error::new(
                    ty.span(),
                    "Borrowed outputs cannot be mocked, use an owned type",
                ));
            }
            ty.as_ref().clone()
        }
    };

    Ok(MockMethod {
        method,
        mock_fn_ident: sig.ident.clone(),
        args,
        output_ty,
    })
}

/// Whether a type borrows anything, elided references included.
fn contains_lifetime(mut ty: syn::Type) -> bool {
    struct Visitor {
        contains: bool,
    }
    impl VisitMut for Visitor {
        fn visit_lifetime_mut(&mut self, lifetime: &mut syn::Lifetime) {
            self.contains = true;
            syn::visit_mut::visit_lifetime_mut(self, lifetime);
        }

        fn visit_type_reference_mut(&mut self, reference: &mut syn::TypeReference) {
            self.contains = true;
            syn::visit_mut::visit_type_reference_mut(self, reference);
        }
    }

    let mut visitor = Visitor { contains: false };
    visitor.visit_type_mut(&mut ty);
    visitor.contains
}
