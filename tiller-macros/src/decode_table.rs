use crate::decode_column::{ColumnMetadata, decode_column};
use quote::ToTokens;
use syn::{Error, Fields, ItemStruct, LitStr, Result, parse::ParseBuffer, spanned::Spanned};

pub(crate) struct TableMetadata {
    pub(crate) item: ItemStruct,
    /// `None` when the struct does not declare one, the resolver reports it.
    pub(crate) name: Option<String>,
    pub(crate) columns: Vec<ColumnMetadata>,
}

pub(crate) fn decode_table(item: ItemStruct) -> Result<TableMetadata> {
    if !item.generics.params.is_empty() {
        return Err(Error::new(
            item.generics.span(),
            "Entity cannot be derived for generic structs",
        ));
    }
    let Fields::Named(fields) = &item.fields else {
        return Err(Error::new(
            item.fields.span(),
            "Entity can only be derived for structs with named fields",
        ));
    };
    let columns = fields
        .named
        .iter()
        .map(decode_column)
        .filter_map(Result::transpose)
        .collect::<Result<Vec<_>>>()?;
    let mut name = None;
    for attr in &item.attrs {
        let meta = &attr.meta;
        if !meta.path().is_ident("tiller") {
            continue;
        }
        let list = meta.require_list().map_err(|e| {
            Error::new(
                e.span(),
                "Error while parsing `tiller`, use it like: `#[tiller(attribute = value, ..)]`",
            )
        })?;
        list.parse_nested_meta(|arg| {
            if arg.path.is_ident("table") {
                let Ok(value) = arg.value().and_then(ParseBuffer::parse::<LitStr>) else {
                    return Err(arg.error(
                        "Error while parsing `table`, use it like: `#[tiller(table = \"my_table\")]`",
                    ));
                };
                name = Some(value.value());
            } else {
                return Err(arg.error(format!(
                    "Unknown attribute `{}` inside tiller macro",
                    arg.path.to_token_stream()
                )));
            }
            Ok(())
        })?;
    }
    Ok(TableMetadata {
        item,
        name,
        columns,
    })
}
