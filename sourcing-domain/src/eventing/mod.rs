//! 事件子系统（eventing）
//!
//! 已提交事件流的发布/订阅与处理：
//! - `EventBus`：统一发布/订阅接口，`InMemoryEventBus` 为内存实现；
//! - `EventHandler`：按事件类型名消费事件；
//! - `SequentialEventDispatcher`：按到达顺序逐流、逐事件调用处理器，
//!   通过入站关联登记表保证每条投递至多确认一次。
//!
//! 该模块不绑定具体传输实现，可对接任意消息系统。
//!
pub mod bus;
pub mod bus_inmemory;
pub mod dispatcher;
pub mod handler;

pub use bus::EventBus;
pub use bus_inmemory::InMemoryEventBus;
pub use dispatcher::{
    DispatchMode, DispatchOutcome, DispatchReceipt, DispatcherHandle, EventDispatcherConfig,
    SequentialEventDispatcher,
};
pub use handler::{EventHandler, HandledEventType};
