//! The cotest procedural macros.

#![forbid(unsafe_code)]

mod doc;
mod matching;
mod mock;

extern crate proc_macro;

/// Generate `MockFn` markers for a trait and implement it for `cotest::MockObject`.
///
/// Re-exported by `cotest`, it is documented there.
#[proc_macro_attribute]
pub fn mock(
    attr: proc_macro::TokenStream,
    input: proc_macro::TokenStream,
) -> proc_macro::TokenStream {
    let attr = syn::parse_macro_input!(attr as mock::Attr);
    let item_trait = syn::parse_macro_input!(input as syn::ItemTrait);

    let output = match mock::generate(attr, item_trait) {
        Ok(stream) => stream,
        Err(err) => err.to_compile_error(),
    };

    proc_macro::TokenStream::from(output)
}

///
/// The `matching` macro.
/// Re-exported by `cotest`, it is documented there.
///
#[proc_macro]
pub fn matching(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let input = syn::parse_macro_input!(input as matching::MatchingInput);

    let output = matching::generate(input);

    proc_macro::TokenStream::from(output)
}
