use proc_macro::TokenStream;
use quote::quote;
use syn::{
    Data, DeriveInput, Field, Fields, GenericArgument, LitStr, PathArguments, Type,
    parse_macro_input,
};

#[proc_macro_derive(NodeType, attributes(node, unique, node_ref))]
pub fn derive_node_type(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => TokenStream::from(tokens),
        Err(err) => TokenStream::from(err.to_compile_error()),
    }
}

enum Shape {
    Plain,
    Optional,
}

struct NodeRefAttr {
    target: String,
    edge: Option<Type>,
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let struct_name = &input.ident;
    let type_name = node_name(input)?.unwrap_or_else(|| struct_name.to_string());

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => fields.named.iter().collect::<Vec<_>>(),
            _ => {
                return Err(syn::Error::new_spanned(
                    struct_name,
                    "NodeType can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                struct_name,
                "NodeType can only be derived for structs",
            ));
        }
    };

    let mut properties = Vec::new();
    let mut inserts = Vec::new();

    for field in fields {
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let name = ident.to_string();
        let (shape, inner) = unwrap_option(&field.ty);
        let unique = field.attrs.iter().any(|a| a.path().is_ident("unique"));
        let node_ref = node_ref_attr(field)?;

        let property = match (&node_ref, scalar_kind(inner)) {
            (Some(NodeRefAttr { target, edge }), _) => {
                if !is_relation_type(inner) {
                    return Err(syn::Error::new_spanned(
                        &field.ty,
                        "#[node_ref] fields must be RelationValue or Vec<RelationValue>",
                    ));
                }
                if unique {
                    return Err(syn::Error::new_spanned(
                        ident,
                        "#[unique] is not supported on #[node_ref] fields",
                    ));
                }
                let edge = match edge {
                    Some(edge) => quote! {
                        .with_edge(<#edge as kv_graph::NodeType>::schema())
                    },
                    None => quote! {},
                };
                quote! { kv_graph::PropertySchema::node_ref(#target) #edge }
            }
            (None, Some(kind)) => {
                let unique = if unique { quote! { .unique() } } else { quote! {} };
                quote! { kv_graph::PropertySchema::#kind() #unique }
            }
            (None, None) => {
                // 只支持标量和关系字段
                let error_msg = format!(
                    "Field '{}' has type '{}' which is not supported. Use String, a numeric type, or RelationValue with #[node_ref].",
                    name,
                    quote!(#inner)
                );
                return Err(syn::Error::new_spanned(&field.ty, error_msg));
            }
        };
        // 生成属性声明
        properties.push(quote! { .with(#name, #property) });

        // Option 字段为 None 时跳过
        inserts.push(match shape {
            Shape::Plain => quote! {
                record.insert(#name.to_string(), kv_graph::Value::from(self.#ident));
            },
            Shape::Optional => quote! {
                if let Some(value) = self.#ident {
                    record.insert(#name.to_string(), kv_graph::Value::from(value));
                }
            },
        });
    }

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics kv_graph::NodeType for #struct_name #ty_generics #where_clause {
            fn type_name() -> &'static str {
                #type_name
            }

            fn schema() -> kv_graph::NodeTypeSchema {
                kv_graph::NodeTypeSchema::new()
                    #(#properties)*
            }

            fn into_record(self) -> kv_graph::Record {
                let mut record = kv_graph::Record::new();
                #(#inserts)*
                record
            }
        }
    })
}

// 解析 #[node(name = "...")]
fn node_name(input: &DeriveInput) -> syn::Result<Option<String>> {
    let mut name = None;
    for attr in input.attrs.iter().filter(|a| a.path().is_ident("node")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                let value: LitStr = meta.value()?.parse()?;
                if value.value().contains('.') {
                    return Err(meta.error("node type names cannot contain '.'"));
                }
                name = Some(value.value());
                Ok(())
            } else {
                Err(meta.error("unsupported node attribute"))
            }
        })?;
    }
    Ok(name)
}

// 解析 #[node_ref(target = "...", edge = "EdgeType")]
fn node_ref_attr(field: &Field) -> syn::Result<Option<NodeRefAttr>> {
    let Some(attr) = field.attrs.iter().find(|a| a.path().is_ident("node_ref")) else {
        return Ok(None);
    };
    let mut target = None;
    let mut edge = None;
    attr.parse_nested_meta(|meta| {
        if meta.path.is_ident("target") {
            let value: LitStr = meta.value()?.parse()?;
            target = Some(value.value());
            Ok(())
        } else if meta.path.is_ident("edge") {
            let value: LitStr = meta.value()?.parse()?;
            edge = Some(value.parse::<Type>()?);
            Ok(())
        } else {
            Err(meta.error("unsupported node_ref attribute"))
        }
    })?;
    let Some(target) = target else {
        return Err(syn::Error::new_spanned(attr, "#[node_ref] requires target = \"...\""));
    };
    Ok(Some(NodeRefAttr { target, edge }))
}

fn unwrap_option(ty: &Type) -> (Shape, &Type) {
    match single_generic(ty, "Option") {
        Some(inner) => (Shape::Optional, inner),
        None => (Shape::Plain, ty),
    }
}

fn single_generic<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    let Type::Path(path) = ty else {
        return None;
    };
    let segment = path.path.segments.last()?;
    if segment.ident != wrapper {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first()? {
        GenericArgument::Type(inner) => Some(inner),
        _ => None,
    }
}

fn last_ident(ty: &Type) -> Option<String> {
    let Type::Path(path) = ty else {
        return None;
    };
    Some(path.path.segments.last()?.ident.to_string())
}

fn is_relation_type(ty: &Type) -> bool {
    let ty = single_generic(ty, "Vec").unwrap_or(ty);
    last_ident(ty).as_deref() == Some("RelationValue")
}

// 按类型路径的最后一段推断属性类型
fn scalar_kind(ty: &Type) -> Option<proc_macro2::Ident> {
    let kind = match last_ident(ty)?.as_str() {
        "String" => "string",
        "i8" | "i16" | "i32" | "i64" | "u8" | "u16" | "u32" => "int",
        "f32" | "f64" => "float",
        _ => return None,
    };
    Some(proc_macro2::Ident::new(kind, proc_macro2::Span::call_site()))
}
