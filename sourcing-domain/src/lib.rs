//! 事件溯源执行核心的领域层（sourcing-domain）
//!
//! 提供命令/事件处理流水线中与传输、存储无关的核心构件：
//! - 聚合（`aggregate`）与实体（`entity`）建模：版本、未提交事件缓冲与按事件重放重建；
//! - 领域事件（`domain_event`）与事件流（`EventStream`）；
//! - 类型编码（`type_code`）：线上类型码与事件/命令类型名的双向映射；
//! - 提交日志与仓储协议（`persist`）及内存实现；
//! - 入站关联登记表（`inbound`）：保证每条入站消息至多确认一次；
//! - 事件子系统（`eventing`）：总线、处理器与顺序事件分发器。
//!
//! 典型用法：
//! 1. 使用 `#[aggregate]` / `#[domain_event]` 定义聚合与事件，实现 `Aggregate::apply`；
//! 2. 为事件注册类型码（`TypeCodeRegistry`），选择 `CommitLog` 实现；
//! 3. 通过 `EventSourcedRepository` 按提交日志重放聚合；
//! 4. 使用 `SequentialEventDispatcher` 按到达顺序分发已提交的事件流。
//!
pub mod aggregate;
pub mod domain_event;
pub mod entity;
pub mod error;
pub mod eventing;
pub mod inbound;
pub mod persist;
pub mod type_code;

// 允许在本 crate 内部通过 ::sourcing_domain 进行自引用，
// 以便过程宏在本 crate 的单元测试中也能解析到 ::sourcing_domain 路径。
extern crate self as sourcing_domain;
