use serde::de::DeserializeOwned;

/// 应用层命令（Command）
///
/// 表达“意图”的写操作请求，执行结果只以 `CommandResult` 的状态体现。
/// 载荷以 JSON 形式在线上传输，按 `NAME` 注册的类型码路由到对应处理器。
///
/// 关联常量：
/// - `NAME`：命令的稳定名称，用于类型码映射、日志与路由。避免依赖 `type_name::<T>()`。
pub trait Command: DeserializeOwned + Send + Sync + 'static {
    /// 命令的稳定名称（建议常量字符串，不随重构变化）
    const NAME: &'static str;
}
