//! 聚合与领域事件的样板代码宏
//!
//! 生成的代码通过 `::sourcing_domain` 路径引用领域层，并派生 `serde::Serialize`/`serde::Deserialize`，
//! 使用方需同时依赖 `sourcing-domain` 与 `serde`。
//!
use proc_macro::TokenStream;

mod aggregate;
mod domain_event;
mod entity_id;
mod utils;

/// 聚合宏
///
/// ```ignore
/// #[aggregate(id = NoteId, event = NoteEvent)]
/// struct Note {
///     title: String,
/// }
/// ```
///
/// 注入 `id`/`version`/`uncommitted` 三个字段，实现 `Entity` 与 `EventSourced`；
/// 使用方只需再实现 `Aggregate`（`TYPE` 与 `apply`）。
#[proc_macro_attribute]
pub fn aggregate(attr: TokenStream, item: TokenStream) -> TokenStream {
    aggregate::expand(attr, item)
}

/// 领域事件宏
///
/// 每个变体注入 `id: String`；除非标记 `#[event(sourcing = false)]`，
/// 变体还会注入 `aggregate_id: String` 并作为溯源事件返回该标识。
#[proc_macro_attribute]
pub fn domain_event(attr: TokenStream, item: TokenStream) -> TokenStream {
    domain_event::expand(attr, item)
}

/// 聚合标识宏，用于 `struct NoteId(String);` 形式的包装类型
#[proc_macro_attribute]
pub fn entity_id(attr: TokenStream, item: TokenStream) -> TokenStream {
    entity_id::expand(attr, item)
}
