use quote::ToTokens;
use syn::{Error, Field, Ident, LitStr, Result, Type, parse::ParseBuffer, spanned::Spanned};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Kind {
    Integer,
    Text,
    Other,
}

pub(crate) struct ColumnMetadata {
    pub(crate) ident: Ident,
    pub(crate) ty: Type,
    pub(crate) kind: Kind,
    pub(crate) name: String,
    pub(crate) primary_key: bool,
}

impl ColumnMetadata {
    pub(crate) fn mapped(&self) -> bool {
        self.kind != Kind::Other
    }
}

fn decode_kind(ty: &Type) -> Kind {
    let Type::Path(path) = ty else {
        return Kind::Other;
    };
    if path.qself.is_some() {
        return Kind::Other;
    }
    let Some(last) = path.path.segments.last() else {
        return Kind::Other;
    };
    if !last.arguments.is_empty() {
        return Kind::Other;
    }
    match last.ident.to_string().as_str() {
        "i16" | "i32" | "i64" => Kind::Integer,
        "String" => Kind::Text,
        _ => Kind::Other,
    }
}

/// Field metadata, `None` for fields marked `#[tiller(ignore)]`.
pub(crate) fn decode_column(field: &Field) -> Result<Option<ColumnMetadata>> {
    let Some(ident) = field.ident.clone() else {
        return Err(Error::new(field.span(), "Entity fields must be named"));
    };
    let mut name = ident.to_string();
    if name.starts_with('_') {
        name.remove(0);
    }
    let mut metadata = ColumnMetadata {
        ident,
        ty: field.ty.clone(),
        kind: decode_kind(&field.ty),
        name,
        primary_key: false,
    };
    let mut ignore = false;
    for attr in &field.attrs {
        let meta = &attr.meta;
        if !meta.path().is_ident("tiller") {
            continue;
        }
        let list = meta.require_list().map_err(|e| {
            Error::new(
                e.span(),
                "Error while parsing `tiller`, use it like: `#[tiller(attribute = value, ...)]`",
            )
        })?;
        list.parse_nested_meta(|arg| {
            if arg.path.is_ident("column") {
                let Ok(v) = arg.value().and_then(ParseBuffer::parse::<LitStr>) else {
                    return Err(arg.error(
                        "Error while parsing `column`, use it like: `#[tiller(column = \"my_column\")]`",
                    ));
                };
                metadata.name = v.value();
            } else if arg.path.is_ident("primary_key") {
                // value() is Err for Meta::Path
                let Err(..) = arg.value() else {
                    return Err(arg.error(
                        "Error while parsing `primary_key`, use it like: `#[tiller(primary_key)]`",
                    ));
                };
                metadata.primary_key = true;
            } else if arg.path.is_ident("ignore") {
                let Err(..) = arg.value() else {
                    return Err(
                        arg.error("Error while parsing `ignore`, use it like: `#[tiller(ignore)]`")
                    );
                };
                ignore = true;
            } else {
                return Err(arg.error(format!(
                    "Unknown attribute `{}` inside tiller macro",
                    arg.path.to_token_stream()
                )));
            }
            Ok(())
        })?;
    }
    Ok(if ignore { None } else { Some(metadata) })
}
