//! 类型编码（Type Code）
//!
//! 线上载荷只携带整型类型码，本模块维护类型码与稳定类型名之间的双向映射：
//! - 编码时：事件/命令类型名 → 类型码；
//! - 解码时：类型码 → 类型名，再由调用方按该类型反序列化载荷。
//!
//! 查找失败视为 `UnresolvableType*` 错误，只影响当前这一条消息。
//!
use crate::error::{DomainError, DomainResult};
use std::collections::HashMap;

/// 类型码提供者
pub trait TypeCodeProvider: Send + Sync {
    /// 类型名 → 类型码
    fn type_code(&self, type_name: &str) -> DomainResult<i32>;

    /// 类型码 → 类型名
    fn type_name(&self, type_code: i32) -> DomainResult<&str>;
}

/// 基于双向映射表的类型码注册表
#[derive(Debug, Clone, Default)]
pub struct TypeCodeRegistry {
    by_code: HashMap<i32, String>,
    by_name: HashMap<String, i32>,
}

impl TypeCodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册一组映射，类型码或类型名重复时报错
    ///
    /// ```
    /// use sourcing_domain::type_code::{TypeCodeProvider, TypeCodeRegistry};
    ///
    /// let codes = TypeCodeRegistry::new()
    ///     .register(100, "NoteEvent.Created")?
    ///     .register(101, "NoteEvent.TitleChanged")?;
    /// assert_eq!(codes.type_code("NoteEvent.TitleChanged")?, 101);
    /// assert_eq!(codes.type_name(100)?, "NoteEvent.Created");
    /// # Ok::<(), sourcing_domain::error::DomainError>(())
    /// ```
    pub fn register(mut self, type_code: i32, type_name: impl Into<String>) -> DomainResult<Self> {
        let type_name = type_name.into();
        if self.by_code.contains_key(&type_code) || self.by_name.contains_key(&type_name) {
            return Err(DomainError::DuplicateTypeCode {
                code: type_code,
                name: type_name,
            });
        }

        self.by_name.insert(type_name.clone(), type_code);
        self.by_code.insert(type_code, type_name);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }
}

impl TypeCodeProvider for TypeCodeRegistry {
    fn type_code(&self, type_name: &str) -> DomainResult<i32> {
        self.by_name
            .get(type_name)
            .copied()
            .ok_or_else(|| DomainError::UnresolvableTypeName {
                name: type_name.to_string(),
            })
    }

    fn type_name(&self, type_code: i32) -> DomainResult<&str> {
        self.by_code
            .get(&type_code)
            .map(String::as_str)
            .ok_or(DomainError::UnresolvableTypeCode { code: type_code })
    }
}
