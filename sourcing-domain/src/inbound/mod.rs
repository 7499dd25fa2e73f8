//! 入站消息关联（inbound）
//!
//! 传输层以至少一次语义投递消息；这里按关联ID登记每条在途消息的确认句柄，
//! 处理完成时原子取回句柄并确认，重复投递在登记时即被识别。
//!
mod ack;
mod registry;

pub use ack::AckHandle;
pub use registry::{InboundCorrelationRegistry, Registration};
