//! Utility functions for proc macro implementations.

use syn::{Attribute, Expr, Lit, LitStr, Meta};

/// Doc comment lines joined with spaces, or `None` if there are none.
pub fn doc_comment(attrs: &[Attribute]) -> Option<String> {
    let doc = attrs
        .iter()
        .filter(|a| a.path().is_ident("doc"))
        .filter_map(|a| {
            if let Meta::NameValue(nv) = &a.meta {
                if let Expr::Lit(lit) = &nv.value {
                    if let Lit::Str(s) = &lit.lit {
                        return Some(s.value().trim().to_string());
                    }
                }
            }
            None
        })
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if doc.is_empty() {
        None
    } else {
        Some(doc)
    }
}

/// Options read from `#[shape(...)]` attributes.
#[derive(Default)]
pub struct ShapeAttrs {
    pub name: Option<String>,
    pub description: Option<String>,
    pub rename: Option<String>,
    pub skip: bool,
}

/// Parse every `#[shape(...)]` attribute in `attrs`.
pub fn parse_shape_attrs(attrs: &[Attribute]) -> syn::Result<ShapeAttrs> {
    let mut out = ShapeAttrs::default();
    for attr in attrs {
        if !attr.path().is_ident("shape") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                let lit: LitStr = meta.value()?.parse()?;
                out.name = Some(lit.value());
            } else if meta.path.is_ident("description") {
                let lit: LitStr = meta.value()?.parse()?;
                out.description = Some(lit.value());
            } else if meta.path.is_ident("rename") {
                let lit: LitStr = meta.value()?.parse()?;
                out.rename = Some(lit.value());
            } else if meta.path.is_ident("skip") {
                out.skip = true;
            } else {
                return Err(meta.error("unknown `shape` attribute"));
            }
            Ok(())
        })?;
    }
    Ok(out)
}
