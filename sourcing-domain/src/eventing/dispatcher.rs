//! 顺序事件分发器（SequentialEventDispatcher）
//!
//! 接收传输层投递的已提交事件流，按到达顺序交给单个工作任务：
//! - 投递先在入站关联登记表中登记，重复投递立即确认且不再处理；
//! - 流内事件逐个解析类型码，依次调用匹配的处理器（同一事件的多个处理器也串行）；
//! - 整条流处理完成后解析登记并确认一次；
//! - 第 k 个事件失败时停止，释放登记但不确认，等待传输层重投。
//!
use super::handler::HandledEventType;
use super::EventHandler;
use crate::domain_event::EventEnvelope;
use crate::inbound::{AckHandle, InboundCorrelationRegistry, Registration};
use crate::persist::SerializedEventStream;
use crate::type_code::TypeCodeProvider;
use bon::Builder;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

// 导入由 bon::Builder 生成的 typestate 模块与状态转换别名
use self::sequential_event_dispatcher_builder::{IsUnset, SetRegistry, State as BuilderState};

type Correlations = InboundCorrelationRegistry<Box<dyn AckHandle>>;

#[derive(Builder)]
pub struct SequentialEventDispatcher {
    type_codes: Arc<dyn TypeCodeProvider>,
    #[builder(default)]
    correlations: Arc<Correlations>,
    #[builder(setters(vis = "pub(crate)"))]
    registry: HandlerRegistry,
    #[builder(default)]
    config: EventDispatcherConfig,
}

impl<S: BuilderState> SequentialEventDispatcherBuilder<S> {
    pub fn event_handlers(
        self,
        handlers: Vec<Arc<dyn EventHandler>>,
    ) -> SequentialEventDispatcherBuilder<SetRegistry<S>>
    where
        <S as BuilderState>::Registry: IsUnset,
    {
        self.registry(HandlerRegistry::new(handlers))
    }
}

impl SequentialEventDispatcher {
    /// 启动工作任务，返回用于投递、关闭与等待的句柄
    pub fn start(self: Arc<Self>) -> DispatcherHandle {
        let token = CancellationToken::new();
        let (tx, rx) = mpsc::channel(self.config.queue_capacity.max(1));

        info!(mode = ?self.config.mode, "event dispatcher started");

        let worker = tokio::spawn(Self::worker_loop(self.clone(), rx, token.clone()));

        DispatcherHandle {
            correlations: self.correlations.clone(),
            tx,
            token,
            tasks: vec![worker],
        }
    }

    pub fn correlations(&self) -> &Arc<InboundCorrelationRegistry<Box<dyn AckHandle>>> {
        &self.correlations
    }

    async fn worker_loop(
        self: Arc<Self>,
        mut rx: mpsc::Receiver<Delivery>,
        token: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    break;
                }
                maybe_delivery = rx.recv() => {
                    let Some(delivery) = maybe_delivery else { break };

                    match self.config.mode {
                        DispatchMode::Sequential => self.process(delivery).await,
                        DispatchMode::Concurrent => {
                            let this = self.clone();
                            tokio::spawn(async move { this.process(delivery).await });
                        }
                    }
                }
            }
        }

        // 未处理的投递释放登记，允许重投
        rx.close();
        while let Ok(delivery) = rx.try_recv() {
            self.correlations.try_resolve(&delivery.key);
            let _ = delivery.reply.send(DispatchOutcome::Abandoned);
        }

        info!("event dispatcher stopped");
    }

    #[tracing::instrument(
        name = "dispatch_stream",
        skip_all,
        fields(
            correlation_id = %delivery.stream.correlation_id(),
            aggregate_id = %delivery.stream.aggregate_id(),
        )
    )]
    async fn process(&self, delivery: Delivery) {
        let Delivery { stream, key, reply } = delivery;

        let outcome = match self.handle_stream(&stream).await {
            Ok(()) => {
                if let Some(ack) = self.correlations.try_resolve(&key) {
                    ack.acknowledge();
                }
                debug!(events = stream.events().len(), "event stream processed");
                DispatchOutcome::Processed
            }
            Err((event_index, reason)) => {
                warn!(event_index, reason = %reason, "event stream failed, left for redelivery");
                // 释放登记但不确认
                drop(self.correlations.try_resolve(&key));
                DispatchOutcome::Failed {
                    event_index,
                    reason,
                }
            }
        };

        let _ = reply.send(outcome);
    }

    async fn handle_stream(&self, stream: &SerializedEventStream) -> Result<(), (usize, String)> {
        for (index, event) in stream.events().iter().enumerate() {
            let event_type = self
                .type_codes
                .type_name(event.type_code())
                .map_err(|e| (index, e.to_string()))?;

            let envelope = EventEnvelope::new(stream, index, event_type, event.clone());

            for handler in self.registry.matching(event_type) {
                handler.handle(&envelope).await.map_err(|err| {
                    (
                        index,
                        format!("handler [{}] failed: {err:#}", handler.handler_name()),
                    )
                })?;
            }
        }

        Ok(())
    }
}

#[derive(Clone, Default)]
struct HandlerRegistry {
    by_type: HashMap<String, Vec<Arc<dyn EventHandler>>>,
    all: Vec<Arc<dyn EventHandler>>,
}

impl HandlerRegistry {
    fn new(handlers: Vec<Arc<dyn EventHandler>>) -> Self {
        let mut by_type: HashMap<String, Vec<Arc<dyn EventHandler>>> = HashMap::new();
        let mut all: Vec<Arc<dyn EventHandler>> = Vec::new();

        for h in handlers {
            match h.handled_event_type() {
                HandledEventType::All => all.push(h),
                HandledEventType::One(t) => {
                    by_type.entry(t).or_default().push(h);
                }
                HandledEventType::Many(ts) => {
                    for t in ts {
                        by_type.entry(t).or_default().push(h.clone());
                    }
                }
            }
        }

        Self { by_type, all }
    }

    fn matching(&self, event_type: &str) -> Vec<Arc<dyn EventHandler>> {
        let mut merged: Vec<Arc<dyn EventHandler>> = Vec::new();
        if let Some(list) = self.by_type.get(event_type) {
            merged.extend(list.iter().cloned());
        }
        merged.extend(self.all.iter().cloned());
        merged
    }
}

/// 投递处理方式
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DispatchMode {
    /// 逐条处理，前一条流完成后才开始下一条
    #[default]
    Sequential,
    /// 每条流独立处理，只保证流内顺序
    Concurrent,
}

/// 分发器配置
#[derive(Clone, Copy, Debug)]
pub struct EventDispatcherConfig {
    pub mode: DispatchMode,
    /// 待处理投递队列容量（满时 `dispatch` 等待）
    pub queue_capacity: usize,
}

impl Default for EventDispatcherConfig {
    fn default() -> Self {
        Self {
            mode: DispatchMode::Sequential,
            queue_capacity: 1024,
        }
    }
}

struct Delivery {
    stream: SerializedEventStream,
    key: String,
    reply: oneshot::Sender<DispatchOutcome>,
}

/// 一次投递的处理结果
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// 全部事件处理完成并已确认
    Processed,
    /// 重复投递，已立即确认
    Duplicate,
    /// 第 `event_index` 个事件处理失败，未确认
    Failed { event_index: usize, reason: String },
    /// 分发器已停止，未处理也未确认
    Abandoned,
}

/// 投递回执
pub struct DispatchReceipt {
    rx: oneshot::Receiver<DispatchOutcome>,
}

impl DispatchReceipt {
    fn ready(outcome: DispatchOutcome) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(outcome);
        Self { rx }
    }

    /// 等待处理结果
    pub async fn wait(self) -> DispatchOutcome {
        self.rx.await.unwrap_or(DispatchOutcome::Abandoned)
    }
}

/// 分发器运行句柄
pub struct DispatcherHandle {
    correlations: Arc<Correlations>,
    tx: mpsc::Sender<Delivery>,
    token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl DispatcherHandle {
    /// 投递一条事件流；不等待处理完成
    pub async fn dispatch(
        &self,
        stream: SerializedEventStream,
        ack: Box<dyn AckHandle>,
    ) -> DispatchReceipt {
        let key = stream.delivery_key();

        if let Registration::Duplicate(ack) = self.correlations.try_register(key.clone(), ack) {
            debug!(key = %key, "duplicate event stream delivery acknowledged");
            ack.acknowledge();
            return DispatchReceipt::ready(DispatchOutcome::Duplicate);
        }

        let (reply, rx) = oneshot::channel();
        let delivery = Delivery {
            stream,
            key: key.clone(),
            reply,
        };

        if self.tx.send(delivery).await.is_err() {
            warn!(key = %key, "event dispatcher stopped, delivery abandoned");
            self.correlations.try_resolve(&key);
            return DispatchReceipt::ready(DispatchOutcome::Abandoned);
        }

        DispatchReceipt { rx }
    }

    pub fn shutdown(&self) {
        self.token.cancel();
    }

    pub async fn join(mut self) {
        let tasks = std::mem::take(&mut self.tasks);

        for t in tasks {
            let _ = t.await;
        }
    }
}

impl Drop for DispatcherHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
