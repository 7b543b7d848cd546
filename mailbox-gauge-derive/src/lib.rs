// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

//! Derive macros for mailbox-gauge
//!
//! ## Labels Derive Macro
//!
//! `#[derive(Labels)]` implements `mailbox_gauge::Labels` for a struct with
//! named fields. Every field becomes one attribute named after the field, with
//! its value converted through `Into<mailbox_gauge::Value>` from a clone of the
//! field.
//!
//! ### Field attributes
//!
//! - `#[label(rename = "name")]` uses `name` instead of the field name.
//! - `#[label(skip)]` leaves the field out of the label set.
//!
//! ### Usage
//!
//! ```rust,ignore
//! use mailbox_gauge::Labels;
//!
//! #[derive(Labels)]
//! struct MailboxLabels {
//!     address: String,
//!     #[label(rename = "actortype")]
//!     actor_type: &'static str,
//!     #[label(skip)]
//!     spawned_at: std::time::Instant,
//! }
//! ```
//!
//! This is equivalent to manually writing:
//!
//! ```rust,ignore
//! impl mailbox_gauge::Labels for MailboxLabels {
//!     fn labels(&self) -> mailbox_gauge::LabelSet {
//!         mailbox_gauge::LabelSet::new([
//!             mailbox_gauge::Attribute::new("address", self.address.clone()),
//!             mailbox_gauge::Attribute::new("actortype", self.actor_type.clone()),
//!         ])
//!     }
//! }
//! ```

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Field, Fields, LitStr};

/// Derive macro for implementing the `Labels` trait.
///
/// # Limitations
///
/// - Only works on structs with named fields
/// - Each non-skipped field type must be `Clone` and convertible into `Value`
#[proc_macro_derive(Labels, attributes(label))]
pub fn derive_labels(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let expanded = match derive_labels_impl(input) {
        Ok(tokens) => tokens,
        Err(err) => err.to_compile_error(),
    };

    TokenStream::from(expanded)
}

fn derive_labels_impl(input: DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    name,
                    "Labels derive macro requires a struct with named fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                name,
                "Labels derive macro can only be used on structs",
            ))
        }
    };

    let mut attributes = Vec::new();
    for field in fields {
        let options = LabelOptions::parse(field)?;
        if options.skip {
            continue;
        }
        let ident = field
            .ident
            .as_ref()
            .ok_or_else(|| syn::Error::new_spanned(field, "expected a named field"))?;
        let key = options
            .rename
            .unwrap_or_else(|| ident.to_string().trim_start_matches("r#").to_string());

        attributes.push(quote! {
            ::mailbox_gauge::Attribute::new(
                #key,
                ::core::clone::Clone::clone(&self.#ident),
            )
        });
    }

    Ok(quote! {
        impl #impl_generics ::mailbox_gauge::Labels for #name #ty_generics #where_clause {
            fn labels(&self) -> ::mailbox_gauge::LabelSet {
                ::mailbox_gauge::LabelSet::new([#(#attributes),*])
            }
        }
    })
}

#[derive(Default)]
struct LabelOptions {
    rename: Option<String>,
    skip: bool,
}

impl LabelOptions {
    fn parse(field: &Field) -> syn::Result<Self> {
        let mut options = LabelOptions::default();
        for attr in field.attrs.iter().filter(|a| a.path().is_ident("label")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("skip") {
                    options.skip = true;
                    Ok(())
                } else if meta.path.is_ident("rename") {
                    let value: LitStr = meta.value()?.parse()?;
                    options.rename = Some(value.value());
                    Ok(())
                } else {
                    Err(meta.error("unsupported label attribute, expected `rename` or `skip`"))
                }
            })?;
        }
        Ok(options)
    }
}
