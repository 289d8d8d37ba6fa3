mod decode_column;
mod decode_table;

use decode_column::Kind;
use decode_table::{TableMetadata, decode_table};
use proc_macro::TokenStream;
use quote::{ToTokens, quote};
use syn::{ItemStruct, parse_macro_input};

#[proc_macro_derive(Entity, attributes(tiller))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let item = parse_macro_input!(input as ItemStruct);
    match decode_table(item) {
        Ok(table) => encode_entity(&table).into(),
        Err(e) => e.to_compile_error().into(),
    }
}

fn encode_entity(table: &TableMetadata) -> proc_macro2::TokenStream {
    let ident = &table.item.ident;
    let type_name = ident.to_string();
    let table_name = match &table.name {
        Some(v) => quote!(Some(#v)),
        None => quote!(None),
    };
    let fields = table.columns.iter().map(|c| {
        let field = c.ident.to_string();
        let column = &c.name;
        let primary_key = c.primary_key;
        let ty = match c.kind {
            Kind::Integer => quote!(::tiller::FieldType::Integer),
            Kind::Text => quote!(::tiller::FieldType::Text),
            Kind::Other => {
                let written = c.ty.to_token_stream().to_string();
                quote!(::tiller::FieldType::Other(#written))
            }
        };
        quote! {
            ::tiller::FieldMetadata {
                field: #field,
                column: #column,
                ty: #ty,
                primary_key: #primary_key,
            }
        }
    });
    let mapped = table.columns.iter().filter(|c| c.mapped());
    let read = mapped.clone().map(|c| {
        let column = &c.name;
        let field = &c.ident;
        quote! {
            #column => Some(::tiller::AsValue::as_value(::std::clone::Clone::clone(&self.#field)))
        }
    });
    let write = mapped.map(|c| {
        let column = &c.name;
        let field = &c.ident;
        let ty = &c.ty;
        quote! {
            #column => self.#field = <#ty as ::tiller::AsValue>::try_from_value(value)?
        }
    });
    quote! {
        impl ::tiller::Entity for #ident {
            fn metadata() -> &'static ::tiller::EntityMetadata {
                static METADATA: ::tiller::EntityMetadata = ::tiller::EntityMetadata {
                    type_name: #type_name,
                    table: #table_name,
                    fields: &[#(#fields),*],
                };
                &METADATA
            }

            #[allow(unreachable_patterns)]
            fn column_value(&self, column: &str) -> Option<::tiller::Value> {
                match column {
                    #(#read,)*
                    _ => None,
                }
            }

            #[allow(unreachable_patterns, unreachable_code)]
            fn set_column(
                &mut self,
                column: &str,
                value: ::tiller::Value,
            ) -> ::tiller::anyhow::Result<()> {
                match column {
                    #(#write,)*
                    _ => {
                        return Err(::tiller::anyhow::Error::msg(format!(
                            "Column `{}` is not mapped by `{}`",
                            column, #type_name
                        )));
                    }
                }
                Ok(())
            }
        }
    }
}
