use crate::utils::{apply_derives, ensure_required_fields};
use proc_macro::TokenStream;
use quote::{ToTokens, quote};
use syn::punctuated::Punctuated;
use syn::spanned::Spanned;
use syn::{
    Item, ItemStruct, Result, Token, Type, parse::Parse, parse::ParseStream, parse_macro_input,
};

/// #[aggregate] 宏实现
/// - 补充并前置字段：`id: IdType`, `version: usize`, `uncommitted: UncommittedEvents<Event>`
/// - 合并派生：Debug, Clone, Default
/// - 实现 `::sourcing_domain::entity::Entity` 与 `::sourcing_domain::aggregate::EventSourced`
/// - 参数：`#[aggregate(id = IdType, event = EventType)]`，`event` 必填，`id` 默认 `String`
pub(crate) fn expand(attr: TokenStream, item: TokenStream) -> TokenStream {
    let cfg = parse_macro_input!(attr as AggregateAttrConfig);
    let input = parse_macro_input!(item as Item);

    let mut st = match input {
        Item::Struct(s) => s,
        other => {
            return syn::Error::new(other.span(), "#[aggregate] only on struct")
                .to_compile_error()
                .into();
        }
    };

    let Some(event_ty) = cfg.event_ty else {
        return syn::Error::new(
            proc_macro2::Span::call_site(),
            "#[aggregate] requires `event = EventType`",
        )
        .to_compile_error()
        .into();
    };

    let fields_named = match &mut st.fields {
        syn::Fields::Named(f) => f,
        _ => {
            return syn::Error::new(st.span(), "only supports named-field struct")
                .to_compile_error()
                .into();
        }
    };

    let id_type = cfg.id_ty.unwrap_or_else(|| syn::parse_quote! { String });
    let usize_ty: Type = syn::parse_quote! { usize };
    let uncommitted_ty: Type =
        syn::parse_quote! { ::sourcing_domain::aggregate::UncommittedEvents<#event_ty> };

    ensure_required_fields(
        fields_named,
        &[
            ("id", &id_type),
            ("version", &usize_ty),
            ("uncommitted", &uncommitted_ty),
        ],
        true,
    );

    let required: Vec<syn::Path> = vec![
        syn::parse_quote!(Debug),
        syn::parse_quote!(Clone),
        syn::parse_quote!(Default),
    ];
    apply_derives(&mut st.attrs, required);

    let out_struct = ItemStruct { ..st };

    let ident = &out_struct.ident;
    let generics = out_struct.generics.clone();
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let expanded = quote! {
        #out_struct

        impl #impl_generics ::sourcing_domain::entity::Entity for #ident #ty_generics #where_clause {
            type Id = #id_type;

            fn new(aggregate_id: Self::Id) -> Self {
                Self { id: aggregate_id, version: 0, ..Default::default() }
            }

            fn id(&self) -> &Self::Id { &self.id }

            fn version(&self) -> usize { self.version }
        }

        impl #impl_generics ::sourcing_domain::aggregate::EventSourced for #ident #ty_generics #where_clause {
            type Event = #event_ty;

            fn uncommitted(&self) -> &#uncommitted_ty { &self.uncommitted }

            fn uncommitted_mut(&mut self) -> &mut #uncommitted_ty { &mut self.uncommitted }

            fn version_mut(&mut self) -> &mut usize { &mut self.version }
        }
    };

    TokenStream::from(expanded)
}

// -------- parsing --------

struct AggregateAttrConfig {
    id_ty: Option<Type>,
    event_ty: Option<Type>,
}

impl Parse for AggregateAttrConfig {
    fn parse(input: ParseStream) -> Result<Self> {
        let mut id_ty: Option<Type> = None;
        let mut event_ty: Option<Type> = None;

        if input.is_empty() {
            return Ok(Self { id_ty, event_ty });
        }

        let pairs: Punctuated<syn::ExprAssign, Token![,]> =
            Punctuated::<syn::ExprAssign, Token![,]>::parse_terminated(input)?;

        for assign in pairs.into_iter() {
            let key_ident = match *assign.left {
                syn::Expr::Path(p) if p.path.segments.len() == 1 => {
                    p.path.segments[0].ident.clone()
                }
                other => return Err(syn::Error::new(other.span(), "invalid attribute key")),
            };
            let slot = match key_ident.to_string().as_str() {
                "id" => &mut id_ty,
                "event" => &mut event_ty,
                _ => {
                    return Err(syn::Error::new(
                        key_ident.span(),
                        "unknown key; expected 'id' | 'event'",
                    ));
                }
            };
            if slot.is_some() {
                return Err(syn::Error::new(
                    key_ident.span(),
                    format!("duplicate key '{key_ident}' in attribute"),
                ));
            }
            *slot = Some(syn::parse2(assign.right.to_token_stream())?);
        }

        Ok(Self { id_ty, event_ty })
    }
}
