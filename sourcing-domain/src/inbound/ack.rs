/// 传输层确认句柄
///
/// 以 `Box<Self>` 消费自身，同一句柄无法被确认两次。
pub trait AckHandle: Send + Sync + 'static {
    fn acknowledge(self: Box<Self>);
}

impl<F> AckHandle for F
where
    F: FnOnce() + Send + Sync + 'static,
{
    fn acknowledge(self: Box<Self>) {
        (*self)()
    }
}
