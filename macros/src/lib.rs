extern crate proc_macro;
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{Data, DataStruct, DeriveInput, Fields, Index, parse_macro_input};

fn struct_data(input: DeriveInput, derive: &str) -> Result<(syn::Ident, DataStruct), TokenStream> {
    match input.data {
        Data::Struct(data) => Ok((input.ident, data)),
        _ => Err(syn::Error::new_spanned(
            input.ident,
            format!("{derive} only supports structs"),
        )
        .to_compile_error()
        .into()),
    }
}

/// Derives `crate::storage::encdec::Encode` by encoding every field in declaration order.
#[proc_macro_derive(Encode)]
pub fn encode_derive(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let (name, data) = match struct_data(input, "Encode") {
        Ok(x) => x,
        Err(e) => return e,
    };

    let appends = match &data.fields {
        Fields::Named(fields) => fields
            .named
            .iter()
            .map(|f| {
                let ident = &f.ident;
                quote! { encoder = encoder.append(&self.#ident); }
            })
            .collect::<Vec<_>>(),
        Fields::Unnamed(fields) => (0..fields.unnamed.len())
            .map(|i| {
                let index = Index::from(i);
                quote! { encoder = encoder.append(&self.#index); }
            })
            .collect(),
        Fields::Unit => vec![],
    };

    quote! {
        impl crate::storage::encdec::Encode for #name {
            #[allow(unused_mut)]
            fn encode(&self) -> Vec<u8> {
                let mut encoder = crate::storage::encdec::EncodeBuilder::new();
                #(#appends)*
                encoder.build()
            }
        }
    }
    .into()
}

/// Derives `crate::storage::encdec::Decode`, the inverse of the `Encode` derive.
#[proc_macro_derive(Decode)]
pub fn decode_derive(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let (name, data) = match struct_data(input, "Decode") {
        Ok(x) => x,
        Err(e) => return e,
    };

    let (pattern, bindings) = field_bindings(&data.fields);
    let decodes = decode_fields(&data.fields, &bindings);

    quote! {
        impl crate::storage::encdec::Decode for #name {
            #[allow(unused_mut)]
            fn decode(bytes: &[u8]) -> crate::storage::encdec::DecodingResult<'_, Self> {
                let mut bytes = bytes;
                #(#decodes)*
                Ok((Self #pattern, bytes))
            }
        }
    }
    .into()
}

/// Builds the construction pattern for a set of fields along with the local binding names used
/// for each field.
fn field_bindings(fields: &Fields) -> (TokenStream2, Vec<syn::Ident>) {
    match fields {
        Fields::Named(named) => {
            let idents: Vec<_> = named
                .named
                .iter()
                .filter_map(|f| f.ident.clone())
                .collect();

            (quote! { { #(#idents),* } }, idents)
        }
        Fields::Unnamed(unnamed) => {
            let idents: Vec<_> = (0..unnamed.unnamed.len())
                .map(|i| format_ident!("field{}", i))
                .collect();

            (quote! { ( #(#idents),* ) }, idents)
        }
        Fields::Unit => (quote! {}, vec![]),
    }
}

fn decode_fields(fields: &Fields, bindings: &[syn::Ident]) -> Vec<TokenStream2> {
    fields
        .iter()
        .zip(bindings)
        .map(|(field, binding)| {
            let ty = &field.ty;

            quote! {
                let (#binding, rest) = <#ty as crate::storage::encdec::Decode>::decode(bytes)?;
                bytes = rest;
            }
        })
        .collect()
}
