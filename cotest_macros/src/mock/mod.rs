use quote::quote;

mod attr;
mod method;

pub use attr::Attr;
use method::MockMethod;

pub fn generate(attr: Attr, item_trait: syn::ItemTrait) -> syn::Result<proc_macro2::TokenStream> {
    let methods = method::extract_methods(&item_trait)?;

    let prefix = &attr.prefix;
    let vis = &item_trait.vis;
    let trait_ident = &item_trait.ident;
    let api_ident = attr.api_ident(&item_trait);
    let api_doc = syn::LitStr::new(
        &format!("MockFn markers for the methods of [{trait_ident}]."),
        proc_macro2::Span::call_site(),
    );

    let mock_fn_structs = methods.iter().map(def_mock_fn_struct);
    let mock_fn_impls = methods
        .iter()
        .map(|method| def_mock_fn_impl(method, &item_trait, &api_ident, prefix));
    let method_impls = methods
        .iter()
        .map(|method| def_method_impl(method, &api_ident, prefix));

    Ok(quote! {
        #item_trait

        #[doc = #api_doc]
        #[allow(non_snake_case)]
        #vis mod #api_ident {
            #(#mock_fn_structs)*
        }

        #(#mock_fn_impls)*

        impl #trait_ident for #prefix::MockObject {
            #(#method_impls)*
        }
    })
}

fn def_mock_fn_struct(method: &MockMethod) -> proc_macro2::TokenStream {
    let mock_fn_ident = &method.mock_fn_ident;
    let doc_attrs = method
        .method
        .attrs
        .iter()
        .filter(|attribute| attribute.path().is_ident("doc"));

    quote! {
        #(#doc_attrs)*
        #[allow(non_camel_case_types)]
        #[derive(Clone, Copy)]
        pub struct #mock_fn_ident;
    }
}

fn def_mock_fn_impl(
    method: &MockMethod,
    item_trait: &syn::ItemTrait,
    api_ident: &syn::Ident,
    prefix: &syn::Path,
) -> proc_macro2::TokenStream {
    let mock_fn_ident = &method.mock_fn_ident;
    let inputs_tuple_ty = method.inputs_tuple_ty();
    let output_ty = &method.output_ty;
    let name = syn::LitStr::new(
        &format!("{}::{}", item_trait.ident, mock_fn_ident),
        proc_macro2::Span::call_site(),
    );

    let debug_inputs_body = if method.args.is_empty() {
        quote! {
            #prefix::private::format_inputs(&[])
        }
    } else {
        let inputs_tuple = method.inputs_tuple();
        let arg_debugs = method.args.iter().map(|arg| {
            let ident = &arg.ident;
            quote! { #ident.cotest_try_debug() }
        });

        quote! {
            use #prefix::private::{NoDebug, ProperDebug};
            let #inputs_tuple = inputs;
            #prefix::private::format_inputs(&[#(#arg_debugs),*])
        }
    };

    quote! {
        impl #prefix::MockFn for #api_ident::#mock_fn_ident {
            type Inputs = #inputs_tuple_ty;
            type Output = #output_ty;
            const NAME: &'static str = #name;

            #[allow(unused_variables)]
            fn debug_inputs(inputs: &Self::Inputs) -> String {
                #debug_inputs_body
            }

            fn default_output() -> Option<Self::Output> {
                #[allow(unused_imports)]
                use #prefix::private::{NoDefault, ProperDefault};
                (&#prefix::private::DefaultOf::<#output_ty>::new()).cotest_try_default()
            }
        }
    }
}

fn def_method_impl(
    method: &MockMethod,
    api_ident: &syn::Ident,
    prefix: &syn::Path,
) -> proc_macro2::TokenStream {
    let sig = &method.method.sig;
    let method_ident = &sig.ident;
    let mock_fn_ident = &method.mock_fn_ident;
    let fn_params = method.fn_params();
    let output = &sig.output;
    let inputs_tuple = method.inputs_tuple();

    quote! {
        #[track_caller]
        fn #method_ident(&self, #(#fn_params),*) #output {
            #prefix::private::eval::<#api_ident::#mock_fn_ident>(self, #inputs_tuple)
        }
    }
}
