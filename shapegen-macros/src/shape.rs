//! Shape derive macro implementation.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Data, DataEnum, DeriveInput, Fields};

use crate::utils::{doc_comment, parse_shape_attrs};

/// Implementation for `#[derive(Shape)]`
pub fn derive_shape_impl(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let body = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(_) => record_descriptor(input, &data.fields)?,
            _ => {
                return Err(syn::Error::new_spanned(
                    ident,
                    "Shape can only be derived for structs with named fields",
                ))
            }
        },
        Data::Enum(data) => enumeration_descriptor(data)?,
        Data::Union(_) => {
            return Err(syn::Error::new_spanned(
                ident,
                "Shape cannot be derived for unions",
            ))
        }
    };

    Ok(quote! {
        impl #impl_generics ::shapegen_output::Shape for #ident #ty_generics #where_clause {
            fn descriptor() -> ::shapegen_output::TypeDescriptor {
                #body
            }
        }
    })
}

fn quote_option(value: Option<String>) -> TokenStream2 {
    match value {
        Some(s) => quote!(::std::option::Option::Some(::std::string::String::from(#s))),
        None => quote!(::std::option::Option::None),
    }
}

fn record_descriptor(input: &DeriveInput, struct_fields: &Fields) -> syn::Result<TokenStream2> {
    let type_attrs = parse_shape_attrs(&input.attrs)?;
    let name = type_attrs.name.unwrap_or_else(|| input.ident.to_string());
    let description = quote_option(type_attrs.description.or_else(|| doc_comment(&input.attrs)));

    let mut fields = Vec::new();
    for field in struct_fields {
        let attrs = parse_shape_attrs(&field.attrs)?;
        if attrs.skip {
            continue;
        }
        let Some(field_ident) = &field.ident else {
            return Err(syn::Error::new_spanned(field, "expected a named field"));
        };
        let field_name = attrs.rename.unwrap_or_else(|| field_ident.to_string());
        let field_description = quote_option(attrs.description.or_else(|| doc_comment(&field.attrs)));
        let ty = &field.ty;

        fields.push(quote! {
            (
                ::std::string::String::from(#field_name),
                ::shapegen_output::FieldSpec {
                    descriptor: <#ty as ::shapegen_output::Shape>::descriptor(),
                    description: #field_description,
                    required: <#ty as ::shapegen_output::Shape>::required(),
                },
            )
        });
    }

    Ok(quote! {
        ::shapegen_output::TypeDescriptor::Record(::shapegen_output::RecordSpec {
            name: ::std::option::Option::Some(::std::string::String::from(#name)),
            description: #description,
            fields: ::std::vec![#(#fields),*],
        })
    })
}

fn enumeration_descriptor(data: &DataEnum) -> syn::Result<TokenStream2> {
    let mut names = Vec::new();
    for variant in &data.variants {
        if !matches!(variant.fields, Fields::Unit) {
            return Err(syn::Error::new_spanned(
                variant,
                "Shape can only be derived for enums with unit variants",
            ));
        }
        let attrs = parse_shape_attrs(&variant.attrs)?;
        names.push(attrs.rename.unwrap_or_else(|| variant.ident.to_string()));
    }

    Ok(quote! {
        ::shapegen_output::TypeDescriptor::Enumeration {
            allowed: ::std::vec![
                #(::shapegen_output::Literal::Str(::std::string::String::from(#names))),*
            ],
        }
    })
}
