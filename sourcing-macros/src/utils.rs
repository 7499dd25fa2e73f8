use proc_macro2::Span;
use quote::ToTokens;
use syn::{Attribute, Field, FieldsNamed, Ident, Token, Type, punctuated::Punctuated};

// 提取非 derive 属性与已有 derive 列表
pub(crate) fn split_derives(attrs: &[Attribute]) -> (Vec<Attribute>, Vec<syn::Path>) {
    let mut retained = Vec::new();
    let mut existing = Vec::new();
    for attr in attrs.iter() {
        if attr.path().is_ident("derive") {
            if let Ok(list) =
                attr.parse_args_with(Punctuated::<syn::Path, Token![,]>::parse_terminated)
            {
                existing.extend(list);
            }
        } else {
            retained.push(attr.clone());
        }
    }
    (retained, existing)
}

// 合并默认与已有 derive（去重，优先保留 required）
pub(crate) fn merge_derives(existing: Vec<syn::Path>, required: Vec<syn::Path>) -> Attribute {
    let mut seen = std::collections::HashSet::<String>::new();
    let mut final_list: Vec<syn::Path> = Vec::new();
    for p in required.into_iter().chain(existing) {
        if seen.insert(derive_key(&p)) {
            final_list.push(p);
        }
    }
    syn::parse_quote!(#[derive(#(#final_list),*)])
}

// 归一化 derive 的 key，避免 Serialize/serde::Serialize 重复
pub(crate) fn derive_key(p: &syn::Path) -> String {
    if let Some(last) = p.segments.last() {
        let last_ident = last.ident.to_string();
        match last_ident.as_str() {
            "Serialize" | "Deserialize" => format!("serde::{}", last_ident),
            _ => last_ident,
        }
    } else {
        p.to_token_stream().to_string()
    }
}

// 直接在 attrs 上应用默认派生合并
pub(crate) fn apply_derives(attrs: &mut Vec<Attribute>, required: Vec<syn::Path>) {
    let (retained, existing) = split_derives(attrs);
    let merged = merge_derives(existing, required);
    *attrs = std::iter::once(merged).chain(retained).collect();
}

pub(crate) fn has_field_named(named: &Punctuated<Field, Token![,]>, name: &str) -> bool {
    named
        .iter()
        .any(|f| f.ident.as_ref().map(|i| i == name).unwrap_or(false))
}

/// 确保具名字段结构体/变体包含所需字段
/// - required: (字段名, 字段类型) 列表，按给定顺序处理
/// - reposition_existing: 为 true 时已存在的字段也移至最前（聚合需要）；
///   为 false 时仅在缺失时补充到最前，保留既有顺序（事件需要）。
pub(crate) fn ensure_required_fields(
    fields_named: &mut FieldsNamed,
    required: &[(&str, &Type)],
    reposition_existing: bool,
) {
    let old_named = fields_named.named.clone();
    let mut new_named: Punctuated<Field, Token![,]> = Punctuated::new();

    for (name, ty) in required.iter() {
        let existing = old_named
            .iter()
            .find(|f| f.ident.as_ref().map(|i| i == *name).unwrap_or(false));

        match existing {
            Some(f) if reposition_existing => new_named.push(f.clone()),
            Some(_) => {}
            None => {
                let ident = Ident::new(name, Span::call_site());
                new_named.push(syn::parse_quote! { #ident: #ty });
            }
        }
    }

    for f in old_named.into_iter() {
        let is_required = f
            .ident
            .as_ref()
            .map(|i| required.iter().any(|(n, _)| i == n))
            .unwrap_or(false);
        if !(reposition_existing && is_required) {
            new_named.push(f);
        }
    }

    fields_named.named = new_named;
}
