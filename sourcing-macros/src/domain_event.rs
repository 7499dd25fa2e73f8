use crate::utils::{apply_derives, ensure_required_fields};
use proc_macro::TokenStream;
use quote::{ToTokens, quote};
use std::collections::{HashMap, HashSet};
use syn::punctuated::Punctuated;
use syn::spanned::Spanned;
use syn::{Expr, Ident, Item, Result, Token, Type, parse::Parse, parse::ParseStream, parse_macro_input};

/// #[domain_event] 宏实现
/// - 仅支持具名字段变体：`Variant { .. }`
/// - 确保每个变体具备 `id: String`；溯源变体另有 `aggregate_id: String`
/// - 生成 `::sourcing_domain::domain_event::DomainEvent` 实现
/// - 枚举级：`#[domain_event(version = N)]`，默认版本 1
/// - 变体级：`#[event(event_type = "...", event_version = N, sourcing = false)]`
pub(crate) fn expand(attr: TokenStream, item: TokenStream) -> TokenStream {
    let cfg = parse_macro_input!(attr as EventAttrConfig);
    let mut input = parse_macro_input!(item as Item);

    let enum_item = match &mut input {
        Item::Enum(e) => e,
        other => {
            return syn::Error::new(
                other.span(),
                "#[domain_event] can only be used on enum types",
            )
            .to_compile_error()
            .into();
        }
    };

    let version_lit = cfg.version.unwrap_or_else(|| syn::parse_quote! { 1 });

    let required: Vec<syn::Path> = vec![
        syn::parse_quote!(Debug),
        syn::parse_quote!(Clone),
        syn::parse_quote!(PartialEq),
        syn::parse_quote!(serde::Serialize),
        syn::parse_quote!(serde::Deserialize),
    ];
    apply_derives(&mut enum_item.attrs, required);

    let string_ty: Type = syn::parse_quote! { String };
    let mut variant_types: HashMap<String, syn::LitStr> = HashMap::new();
    let mut variant_versions: HashMap<String, syn::LitInt> = HashMap::new();
    let mut non_sourcing: HashSet<String> = HashSet::new();

    for v in &mut enum_item.variants {
        let syn::Fields::Named(fields_named) = &mut v.fields else {
            return syn::Error::new(
                v.span(),
                "#[domain_event] supports only named-field enum variants, e.g., Variant { x: T }",
            )
            .to_compile_error()
            .into();
        };

        let mut retained_attrs = Vec::new();
        let mut variant_cfg = VariantEventAttrConfig::default();

        for attr in v.attrs.iter() {
            if attr.path().is_ident("event") {
                if let Err(err) = variant_cfg.merge(attr) {
                    return err.to_compile_error().into();
                }
            } else {
                retained_attrs.push(attr.clone());
            }
        }
        v.attrs = retained_attrs;

        let key = v.ident.to_string();
        let sourcing = variant_cfg.sourcing.unwrap_or(true);

        if sourcing {
            ensure_required_fields(
                fields_named,
                &[("id", &string_ty), ("aggregate_id", &string_ty)],
                false,
            );
        } else {
            ensure_required_fields(fields_named, &[("id", &string_ty)], false);
            non_sourcing.insert(key.clone());
        }

        if let Some(lit) = variant_cfg.ty {
            variant_types.insert(key.clone(), lit);
        }
        if let Some(lit) = variant_cfg.version {
            variant_versions.insert(key, lit);
        }
    }

    let enum_ident = &enum_item.ident;
    let enum_name_string = enum_ident.to_string();

    let type_match_arms = enum_item.variants.iter().map(|v| {
        let v_ident = &v.ident;
        let key = v_ident.to_string();
        if let Some(lit) = variant_types.get(&key) {
            quote! { Self::#v_ident { .. } => #lit }
        } else {
            let combined = format!("{}.{}", enum_name_string, key);
            let lit = syn::LitStr::new(&combined, v_ident.span());
            quote! { Self::#v_ident { .. } => #lit }
        }
    });

    let id_match_arms = enum_item.variants.iter().map(|v| {
        let v_ident = &v.ident;
        quote! { Self::#v_ident { id, .. } => id.as_str() }
    });

    let ver_match_arms = enum_item.variants.iter().map(|v| {
        let v_ident = &v.ident;
        match variant_versions.get(&v_ident.to_string()) {
            Some(lit) => quote! { Self::#v_ident { .. } => #lit },
            None => quote! { Self::#v_ident { .. } => #version_lit },
        }
    });

    let sourcing_match_arms = enum_item.variants.iter().map(|v| {
        let v_ident = &v.ident;
        if non_sourcing.contains(&v_ident.to_string()) {
            quote! { Self::#v_ident { .. } => ::std::option::Option::None }
        } else {
            quote! { Self::#v_ident { aggregate_id, .. } => ::std::option::Option::Some(aggregate_id.as_str()) }
        }
    });

    let out = quote! {
        #enum_item

        impl ::sourcing_domain::domain_event::DomainEvent for #enum_ident {
            fn event_id(&self) -> &str { match self { #( #id_match_arms, )* } }
            fn event_type(&self) -> &str { match self { #( #type_match_arms, )* } }
            fn event_version(&self) -> usize { match self { #( #ver_match_arms, )* } }
            fn sourcing_id(&self) -> ::std::option::Option<&str> { match self { #( #sourcing_match_arms, )* } }
        }
    };

    TokenStream::from(out)
}

// -------- parsing --------

#[derive(Default)]
struct VariantEventAttrConfig {
    ty: Option<syn::LitStr>,
    version: Option<syn::LitInt>,
    sourcing: Option<bool>,
}

impl VariantEventAttrConfig {
    fn merge(&mut self, attr: &syn::Attribute) -> Result<()> {
        let syn::Meta::List(_) = &attr.meta else {
            return Err(syn::Error::new(attr.span(), "expected #[event(...)]"));
        };

        let pairs = attr.parse_args_with(Punctuated::<VariantEventAttrKv, Token![,]>::parse_terminated)?;

        for kv in pairs {
            let key = kv.key.to_string();
            let duplicate = || syn::Error::new(kv.key.span(), format!("duplicate key '{key}' in attribute"));

            match (key.as_str(), kv.value) {
                ("event_type", Expr::Lit(syn::ExprLit { lit: syn::Lit::Str(lit), .. })) => {
                    if self.ty.replace(lit).is_some() {
                        return Err(duplicate());
                    }
                }
                ("event_version", Expr::Lit(syn::ExprLit { lit: syn::Lit::Int(lit), .. })) => {
                    if self.version.replace(lit).is_some() {
                        return Err(duplicate());
                    }
                }
                ("sourcing", Expr::Lit(syn::ExprLit { lit: syn::Lit::Bool(lit), .. })) => {
                    if self.sourcing.replace(lit.value()).is_some() {
                        return Err(duplicate());
                    }
                }
                ("event_type" | "event_version" | "sourcing", other) => {
                    return Err(syn::Error::new(
                        other.span(),
                        format!("unexpected literal kind for '{key}'"),
                    ));
                }
                _ => {
                    return Err(syn::Error::new(
                        kv.key.span(),
                        "unknown key; expected 'event_type' | 'event_version' | 'sourcing'",
                    ));
                }
            }
        }

        Ok(())
    }
}

struct VariantEventAttrKv {
    key: Ident,
    #[allow(dead_code)]
    eq: Token![=],
    value: Expr,
}

impl Parse for VariantEventAttrKv {
    fn parse(input: ParseStream) -> Result<Self> {
        Ok(Self {
            key: input.parse()?,
            eq: input.parse()?,
            value: input.parse()?,
        })
    }
}

// 枚举级配置：默认版本号
struct EventAttrConfig {
    version: Option<syn::LitInt>,
}

impl Parse for EventAttrConfig {
    fn parse(input: ParseStream) -> Result<Self> {
        let mut version: Option<syn::LitInt> = None;

        if input.is_empty() {
            return Ok(Self { version });
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
            match key_ident.to_string().as_str() {
                "version" => {
                    if version.is_some() {
                        return Err(syn::Error::new(
                            key_ident.span(),
                            "duplicate key 'version' in attribute",
                        ));
                    }
                    let lit: syn::LitInt = syn::parse2(assign.right.to_token_stream())?;
                    version = Some(lit);
                }
                _ => {
                    return Err(syn::Error::new(
                        key_ident.span(),
                        "unknown key; expected 'version'",
                    ));
                }
            }
        }

        Ok(Self { version })
    }
}
