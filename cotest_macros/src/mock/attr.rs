/// Parsed `mock` attribute
pub struct Attr {
    /// Cotest's prefix, e.g. `::cotest`
    pub prefix: syn::Path,
    /// Module to put the MockFn markers in
    api: Option<syn::Ident>,
}

impl Attr {
    /// The marker module, `{Trait}Mock` unless named explicitly.
    pub fn api_ident(&self, item_trait: &syn::ItemTrait) -> syn::Ident {
        match &self.api {
            Some(ident) => ident.clone(),
            None => quote::format_ident!("{}Mock", item_trait.ident),
        }
    }
}

impl syn::parse::Parse for Attr {
    fn parse(input: syn::parse::ParseStream) -> syn::Result<Self> {
        let mut prefix: Option<syn::Path> = None;
        let mut api = None;

        while !input.is_empty() {
            let keyword: syn::Ident = input.parse()?;
            let _: syn::token::Eq = input.parse()?;
            match keyword.to_string().as_str() {
                "api" => {
                    api = Some(input.parse()?);
                }
                "prefix" => {
                    prefix = Some(input.parse()?);
                }
                _ => return Err(syn::Error::new(keyword.span(), "Unrecognized keyword")),
            };

            if input.peek(syn::token::Comma) {
                let _: syn::token::Comma = input.parse()?;
            } else {
                break;
            }
        }

        if !input.is_empty() {
            return Err(syn::Error::new(input.span(), "Excessive tokens"));
        }

        Ok(Self {
            prefix: prefix.unwrap_or_else(|| syn::parse_quote! { ::cotest }),
            api,
        })
    }
}
