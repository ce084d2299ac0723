//! Shaped derive macro implementation.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Attribute, DeriveInput, Field, LitStr, Path};

use crate::utils::{check_rules, doc_string, rename_field, skip_paren_group};

/// Container-level options.
#[derive(Default)]
struct ShapeOptions {
    name: Option<String>,
    description: Option<String>,
    self_validate: bool,
    krate: Option<Path>,
    rename_all: Option<String>,
}

/// Field-level options.
#[derive(Default)]
struct FieldOptions {
    rename: Option<String>,
    rules: String,
    omit_empty: bool,
    skip: bool,
    description: Option<String>,
}

struct FieldSpec<'a> {
    field: &'a Field,
    external: String,
    options: FieldOptions,
}

/// Implementation for `#[derive(Shaped)]`
pub fn derive_shaped_impl(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let ident = &input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "`Shaped` cannot be derived for generic types",
        ));
    }

    let fields = match &input.data {
        syn::Data::Struct(data) => match &data.fields {
            syn::Fields::Named(named) => &named.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    ident,
                    "`Shaped` can only be derived for structs with named fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                ident,
                "`Shaped` can only be derived for structs",
            ))
        }
    };

    let options = parse_shape_options(&input.attrs)?;
    let krate = options
        .krate
        .clone()
        .unwrap_or_else(|| syn::parse_quote!(::structai::validate));

    let mut specs = Vec::new();
    for field in fields {
        let field_options = parse_field_options(&field.attrs)?;
        if field_options.skip {
            continue;
        }
        let Some(field_ident) = field.ident.as_ref() else {
            continue;
        };
        let external = match &field_options.rename {
            Some(rename) => rename.clone(),
            None => rename_field(&field_ident.to_string(), options.rename_all.as_deref()),
        };
        specs.push(FieldSpec {
            field,
            external,
            options: field_options,
        });
    }

    let external_names: Vec<&str> = specs.iter().map(|s| s.external.as_str()).collect();
    for spec in &specs {
        if let Err(message) = check_rules(&spec.options.rules, &external_names) {
            return Err(syn::Error::new_spanned(spec.field, message));
        }
    }

    let shape_name = options.name.clone().unwrap_or_else(|| ident.to_string());
    let description = options
        .description
        .clone()
        .or_else(|| doc_string(&input.attrs))
        .map(|d| quote!(.description(#d)));

    let field_builders = specs.iter().map(|spec| {
        let external = &spec.external;
        let ty = &spec.field.ty;
        let rules = &spec.options.rules;
        let omit_empty = spec.options.omit_empty.then(|| quote!(.omit_empty()));
        let description = spec
            .options
            .description
            .clone()
            .or_else(|| doc_string(&spec.field.attrs))
            .map(|d| quote!(.description(#d)));
        quote! {
            .add(
                #krate::FieldBuilder::new(
                    #external,
                    <#ty as #krate::FieldTyped>::field_type(),
                )
                .rules(#rules)
                #omit_empty
                #description
            )
        }
    });

    let self_validating = options
        .self_validate
        .then(|| quote!(.self_validating::<#ident>()));

    Ok(quote! {
        impl #krate::Shaped for #ident {
            fn shape() -> ::std::sync::Arc<#krate::Shape> {
                static SHAPE: ::std::sync::OnceLock<::std::sync::Arc<#krate::Shape>> =
                    ::std::sync::OnceLock::new();
                SHAPE
                    .get_or_init(|| {
                        let builder = #krate::Shape::builder(#shape_name)
                            #description
                            #(#field_builders)*
                            #self_validating;
                        match builder.build() {
                            ::std::result::Result::Ok(shape) => ::std::sync::Arc::new(shape),
                            ::std::result::Result::Err(err) => {
                                panic!("invalid shape declaration on `{}`: {}", #shape_name, err)
                            }
                        }
                    })
                    .clone()
            }
        }

        impl #krate::FieldTyped for #ident {
            fn field_type() -> #krate::FieldType {
                #krate::FieldType::Struct(<Self as #krate::Shaped>::shape())
            }
        }
    })
}

fn parse_shape_options(attrs: &[Attribute]) -> syn::Result<ShapeOptions> {
    let mut options = ShapeOptions::default();
    for attr in attrs {
        if attr.path().is_ident("shape") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("name") {
                    let lit: LitStr = meta.value()?.parse()?;
                    options.name = Some(lit.value());
                } else if meta.path.is_ident("description") {
                    let lit: LitStr = meta.value()?.parse()?;
                    options.description = Some(lit.value());
                } else if meta.path.is_ident("validate") {
                    options.self_validate = true;
                } else if meta.path.is_ident("crate") {
                    let lit: LitStr = meta.value()?.parse()?;
                    options.krate = Some(lit.parse()?);
                } else {
                    return Err(meta.error("unknown `shape` attribute"));
                }
                Ok(())
            })?;
        } else if attr.path().is_ident("serde") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename_all") && meta.input.peek(syn::Token![=]) {
                    let lit: LitStr = meta.value()?.parse()?;
                    options.rename_all = Some(lit.value());
                } else {
                    skip_serde_meta(&meta)?;
                }
                Ok(())
            })?;
        }
    }
    Ok(options)
}

fn parse_field_options(attrs: &[Attribute]) -> syn::Result<FieldOptions> {
    let mut options = FieldOptions::default();
    // `#[shape(rename)]` wins over `#[serde(rename)]` regardless of order
    let mut serde_rename = None;
    for attr in attrs {
        if attr.path().is_ident("shape") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename") {
                    let lit: LitStr = meta.value()?.parse()?;
                    options.rename = Some(lit.value());
                } else if meta.path.is_ident("rules") {
                    let lit: LitStr = meta.value()?.parse()?;
                    options.rules = lit.value();
                } else if meta.path.is_ident("omit_empty") {
                    options.omit_empty = true;
                } else if meta.path.is_ident("skip") {
                    options.skip = true;
                } else if meta.path.is_ident("description") {
                    let lit: LitStr = meta.value()?.parse()?;
                    options.description = Some(lit.value());
                } else {
                    return Err(meta.error("unknown `shape` field attribute"));
                }
                Ok(())
            })?;
        } else if attr.path().is_ident("serde") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename") && meta.input.peek(syn::Token![=]) {
                    let lit: LitStr = meta.value()?.parse()?;
                    serde_rename = Some(lit.value());
                } else if meta.path.is_ident("skip") || meta.path.is_ident("skip_deserializing") {
                    options.skip = true;
                } else {
                    skip_serde_meta(&meta)?;
                }
                Ok(())
            })?;
        }
    }
    if options.rename.is_none() {
        options.rename = serde_rename;
    }
    Ok(options)
}

/// Consume a serde option this macro does not interpret.
fn skip_serde_meta(meta: &syn::meta::ParseNestedMeta<'_>) -> syn::Result<()> {
    if meta.input.peek(syn::Token![=]) {
        let _: syn::Expr = meta.value()?.parse()?;
    } else if meta.input.peek(syn::token::Paren) {
        skip_paren_group(meta.input)?;
    }
    Ok(())
}
