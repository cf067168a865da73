//! `#[derive(Page)]` for pagetree.
//!
//! ```rust,ignore
//! #[derive(Default, Page)]
//! #[page(component(Page = page, Content = content), props(PageProps = page_props))]
//! #[page(init = init, middlewares = middlewares)]
//! struct Index {
//!     #[route("GET /about About us")]
//!     about: About,
//! }
//! ```
//!
//! Struct-level `#[page(...)]` entries:
//!
//! | Entry | Registers |
//! |---|---|
//! | `component(Name = method, ..)` | components, keyed by name |
//! | `props(NameProps = method, ..)` | props resolvers; names end in `Props` |
//! | `init = method` | build-time hook |
//! | `page_config = method` | per-request component selector |
//! | `middlewares = method` | middleware provider |
//! | `handler = method` | full request handler |
//!
//! A bare method name refers to an inherent method (`page` is `Self::page`);
//! a path with several segments is used as written. Fields marked
//! `#[route("...")]` become child pages.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::parse::{Parse, ParseStream};
use syn::punctuated::Punctuated;
use syn::{
    parenthesized, parse_macro_input, Data, DeriveInput, Fields, Ident, LitStr, Path,
    Result as SynResult, Token,
};

struct Entry {
    name: Ident,
    method: Path,
}

impl Parse for Entry {
    fn parse(input: ParseStream) -> SynResult<Self> {
        let name: Ident = input.parse()?;
        input.parse::<Token![=]>()?;
        let method: Path = input.parse()?;
        Ok(Entry { name, method })
    }
}

enum PageItem {
    Components(Vec<Entry>),
    Props(Vec<Entry>),
    Hook { kind: Ident, method: Path },
}

impl Parse for PageItem {
    fn parse(input: ParseStream) -> SynResult<Self> {
        let kind: Ident = input.parse()?;
        if input.peek(syn::token::Paren) {
            let content;
            parenthesized!(content in input);
            let entries: Vec<Entry> = Punctuated::<Entry, Token![,]>::parse_terminated(&content)?
                .into_iter()
                .collect();
            return match kind.to_string().as_str() {
                "component" => Ok(PageItem::Components(entries)),
                "props" => {
                    for entry in &entries {
                        if !entry.name.to_string().ends_with("Props") {
                            return Err(syn::Error::new(
                                entry.name.span(),
                                "props resolver names must be `Props` or `<Component>Props`",
                            ));
                        }
                    }
                    Ok(PageItem::Props(entries))
                }
                other => Err(syn::Error::new(
                    kind.span(),
                    format!("unexpected section {}", other),
                )),
            };
        }
        input.parse::<Token![=]>()?;
        let method: Path = input.parse()?;
        match kind.to_string().as_str() {
            "init" | "page_config" | "middlewares" | "handler" => Ok(PageItem::Hook { kind, method }),
            other => Err(syn::Error::new(
                kind.span(),
                format!("unexpected capability {}", other),
            )),
        }
    }
}

struct PageAttr {
    items: Vec<PageItem>,
}

impl Parse for PageAttr {
    fn parse(input: ParseStream) -> SynResult<Self> {
        let items = Punctuated::<PageItem, Token![,]>::parse_terminated(input)?;
        Ok(PageAttr {
            items: items.into_iter().collect(),
        })
    }
}

fn method_expr(method: &Path) -> TokenStream2 {
    match method.get_ident() {
        Some(ident) => quote! { Self::#ident },
        None => quote! { #method },
    }
}

fn expand(input: &DeriveInput) -> SynResult<TokenStream2> {
    let name = &input.ident;
    let fields = match &input.data {
        Data::Struct(data) => &data.fields,
        _ => {
            return Err(syn::Error::new(
                name.span(),
                "ParseError: Page can only be derived for structs",
            ))
        }
    };

    let mut children = Vec::new();
    match fields {
        Fields::Named(named) => {
            for field in &named.named {
                let Some(attr) = field.attrs.iter().find(|a| a.path().is_ident("route")) else {
                    continue;
                };
                let route: LitStr = attr.parse_args()?;
                let ty = &field.ty;
                let field_name = field
                    .ident
                    .as_ref()
                    .map(|i| i.to_string())
                    .unwrap_or_default();
                children.push(quote! {
                    d.child::<#ty>(#field_name, #route);
                });
            }
        }
        Fields::Unit => {}
        Fields::Unnamed(unnamed) => {
            if unnamed
                .unnamed
                .iter()
                .any(|f| f.attrs.iter().any(|a| a.path().is_ident("route")))
            {
                return Err(syn::Error::new(
                    name.span(),
                    "ParseError: child pages must be named fields",
                ));
            }
        }
    }

    let mut capabilities = Vec::new();
    for attr in input.attrs.iter().filter(|a| a.path().is_ident("page")) {
        let parsed: PageAttr = attr.parse_args()?;
        for item in parsed.items {
            match item {
                PageItem::Components(entries) => {
                    for Entry { name, method } in entries {
                        let key = name.to_string();
                        let method = method_expr(&method);
                        capabilities.push(quote! { d.component(#key, #method); });
                    }
                }
                PageItem::Props(entries) => {
                    for Entry { name, method } in entries {
                        let key = name.to_string();
                        let method = method_expr(&method);
                        capabilities.push(quote! { d.props(#key, #method); });
                    }
                }
                PageItem::Hook { kind, method } => {
                    let method = method_expr(&method);
                    capabilities.push(quote! { d.#kind(#method); });
                }
            }
        }
    }

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    Ok(quote! {
        impl #impl_generics ::pagetree::Page for #name #ty_generics #where_clause {
            fn describe(d: &mut ::pagetree::Descriptor<Self>) {
                #(#children)*
                #(#capabilities)*
            }
        }
    })
}

#[proc_macro_derive(Page, attributes(page, route))]
pub fn derive_page(item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);
    match expand(&input) {
        Ok(tokens) => TokenStream::from(tokens),
        Err(err) => TokenStream::from(err.to_compile_error()),
    }
}
