use anyhow::Result;
use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use sourcing_application::command::Command;
use sourcing_application::command_handler::CommandHandler;
use sourcing_application::error::AppResult;
use sourcing_application::{
    CommandConsumer, CommandExecutionContext, CommandMessage, CommandResult, CommandResultSender,
    DefaultCommandExecutor,
};
use sourcing_domain::aggregate::Aggregate;
use sourcing_domain::domain_event::EventEnvelope;
use sourcing_domain::entity::Entity;
use sourcing_domain::error::{DomainError, DomainResult};
use sourcing_domain::eventing::{
    EventBus, EventHandler, HandledEventType, InMemoryEventBus, SequentialEventDispatcher,
};
use sourcing_domain::inbound::AckHandle;
use sourcing_domain::persist::{AggregateRepositoryExt, EventSourcedRepository, InMemoryCommitLog};
use sourcing_domain::type_code::{TypeCodeProvider, TypeCodeRegistry};
use sourcing_macros::{aggregate, domain_event, entity_id};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use ulid::Ulid;

#[entity_id]
struct AccountId(String);

#[domain_event]
enum AccountEvent {
    Opened { owner: String },
    Deposited { amount: i64 },
    Withdrawn { amount: i64 },
}

#[aggregate(id = AccountId, event = AccountEvent)]
struct Account {
    owner: String,
    balance: i64,
}

impl Aggregate for Account {
    const TYPE: &'static str = "account";

    fn apply(&mut self, event: &Self::Event) {
        match event {
            AccountEvent::Opened { owner, .. } => self.owner = owner.clone(),
            AccountEvent::Deposited { amount, .. } => self.balance += amount,
            AccountEvent::Withdrawn { amount, .. } => self.balance -= amount,
        }
    }
}

impl Account {
    fn open(id: AccountId, owner: &str) -> DomainResult<Self> {
        let mut account = Account::new(id);
        let event = AccountEvent::Opened {
            id: Ulid::new().to_string(),
            aggregate_id: account.id().to_string(),
            owner: owner.to_string(),
        };
        account.record(event)?;
        Ok(account)
    }

    fn deposit(&mut self, amount: i64) -> DomainResult<()> {
        ensure_positive(amount)?;
        self.record(AccountEvent::Deposited {
            id: Ulid::new().to_string(),
            aggregate_id: self.id().to_string(),
            amount,
        })
    }

    fn withdraw(&mut self, amount: i64) -> DomainResult<()> {
        ensure_positive(amount)?;
        if self.balance < amount {
            return Err(DomainError::InvalidCommand {
                reason: format!("insufficient funds: balance={}, amount={amount}", self.balance),
            });
        }
        self.record(AccountEvent::Withdrawn {
            id: Ulid::new().to_string(),
            aggregate_id: self.id().to_string(),
            amount,
        })
    }

    fn record(&mut self, event: AccountEvent) -> DomainResult<()> {
        self.apply(&event);
        self.raise(event)
    }
}

fn ensure_positive(amount: i64) -> DomainResult<()> {
    if amount <= 0 {
        return Err(DomainError::InvalidCommand {
            reason: format!("amount must be positive, got {amount}"),
        });
    }
    Ok(())
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAccount {
    account_id: String,
    owner: String,
}

impl Command for OpenAccount {
    const NAME: &'static str = "OpenAccount";
}

#[derive(Debug, Serialize, Deserialize)]
struct Deposit {
    account_id: String,
    amount: i64,
}

impl Command for Deposit {
    const NAME: &'static str = "Deposit";
}

#[derive(Debug, Serialize, Deserialize)]
struct Withdraw {
    account_id: String,
    amount: i64,
}

impl Command for Withdraw {
    const NAME: &'static str = "Withdraw";
}

struct OpenAccountHandler;

#[async_trait]
impl CommandHandler<OpenAccount> for OpenAccountHandler {
    async fn handle(&self, ctx: &mut CommandExecutionContext, cmd: &OpenAccount) -> AppResult<()> {
        let id = AccountId::new(cmd.account_id.clone());
        if ctx.get_or_default::<Account>(&id).await?.is_some() {
            return Err(DomainError::InvalidCommand {
                reason: format!("account [{id}] already opened"),
            }
            .into());
        }
        ctx.add(Account::open(id, &cmd.owner)?)
    }
}

struct DepositHandler;

#[async_trait]
impl CommandHandler<Deposit> for DepositHandler {
    async fn handle(&self, ctx: &mut CommandExecutionContext, cmd: &Deposit) -> AppResult<()> {
        let account = ctx
            .get::<Account>(&AccountId::new(cmd.account_id.clone()))
            .await?;
        Ok(account.deposit(cmd.amount)?)
    }
}

struct WithdrawHandler;

#[async_trait]
impl CommandHandler<Withdraw> for WithdrawHandler {
    async fn handle(&self, ctx: &mut CommandExecutionContext, cmd: &Withdraw) -> AppResult<()> {
        let account = ctx
            .get::<Account>(&AccountId::new(cmd.account_id.clone()))
            .await?;
        Ok(account.withdraw(cmd.amount)?)
    }
}

/// 余额读模型
#[derive(Default)]
struct BalanceProjection {
    balances: Mutex<HashMap<String, i64>>,
}

#[async_trait]
impl EventHandler for BalanceProjection {
    fn handler_name(&self) -> &str {
        "balance-projection"
    }

    fn handled_event_type(&self) -> HandledEventType {
        HandledEventType::All
    }

    async fn handle(&self, envelope: &EventEnvelope) -> anyhow::Result<()> {
        let delta = match envelope.decode::<AccountEvent>()? {
            AccountEvent::Opened { .. } => 0,
            AccountEvent::Deposited { amount, .. } => amount,
            AccountEvent::Withdrawn { amount, .. } => -amount,
        };

        let mut balances = self
            .balances
            .lock()
            .map_err(|_| anyhow::anyhow!("balance projection poisoned"))?;
        *balances
            .entry(envelope.metadata.aggregate_id().to_string())
            .or_default() += delta;
        Ok(())
    }
}

/// 把命令结果写入日志，代替真实的回复通道
struct LoggingResultSender;

#[async_trait]
impl CommandResultSender for LoggingResultSender {
    async fn send(&self, result: &CommandResult, reply_topic: Option<&str>) -> AppResult<()> {
        info!(
            command_id = %result.command_id,
            status = ?result.status,
            reply_topic = reply_topic.unwrap_or("-"),
            message = result.message.as_deref().unwrap_or(""),
            "command result sent"
        );
        Ok(())
    }
}

fn command_ack(command_id: &str) -> Box<dyn AckHandle> {
    let command_id = command_id.to_string();
    Box::new(move || info!(%command_id, "command acknowledged"))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let event_codes: Arc<dyn TypeCodeProvider> = Arc::new(
        TypeCodeRegistry::new()
            .register(100, "AccountEvent.Opened")?
            .register(101, "AccountEvent.Deposited")?
            .register(102, "AccountEvent.Withdrawn")?,
    );
    let command_codes: Arc<dyn TypeCodeProvider> = Arc::new(
        TypeCodeRegistry::new()
            .register(1, OpenAccount::NAME)?
            .register(2, Deposit::NAME)?
            .register(3, Withdraw::NAME)?,
    );

    let log = Arc::new(InMemoryCommitLog::new());
    let repo = Arc::new(
        EventSourcedRepository::builder()
            .commit_log(log.clone())
            .type_codes(event_codes.clone())
            .build(),
    );
    let bus = Arc::new(InMemoryEventBus::new(256));

    // 事件侧：总线 → 顺序分发器 → 余额投影
    let projection = Arc::new(BalanceProjection::default());
    let dispatcher = Arc::new(
        SequentialEventDispatcher::builder()
            .type_codes(event_codes.clone())
            .event_handlers(vec![projection.clone()])
            .build(),
    )
    .start();

    let mut subscription = bus.subscribe().await;
    let pump = tokio::spawn(async move {
        while let Some(delivered) = subscription.next().await {
            let stream = match delivered {
                Ok(stream) => stream,
                Err(err) => {
                    warn!(error = %err, "event bus delivery failed");
                    continue;
                }
            };
            let key = stream.delivery_key();
            let ack: Box<dyn AckHandle> = {
                let key = key.clone();
                Box::new(move || info!(delivery = %key, "event stream acknowledged"))
            };
            let outcome = dispatcher.dispatch(stream, ack).await.wait().await;
            info!(delivery = %key, ?outcome, "event stream dispatched");
        }
        dispatcher
    });

    // 命令侧：消费者 → 执行器 → 提交日志 + 总线
    let executor = DefaultCommandExecutor::builder()
        .repository(repo.clone())
        .commit_log(log.clone())
        .command_codes(command_codes.clone())
        .event_bus(bus.clone())
        .build();
    executor.register::<OpenAccount, _>(Arc::new(OpenAccountHandler))?;
    executor.register::<Deposit, _>(Arc::new(DepositHandler))?;
    executor.register::<Withdraw, _>(Arc::new(WithdrawHandler))?;

    let consumer = CommandConsumer::builder()
        .executor(Arc::new(executor))
        .result_sender(Arc::new(LoggingResultSender))
        .build();

    let reply = Some("account-replies".to_string());
    let open = CommandMessage::from_command(
        Ulid::new().to_string(),
        &OpenAccount {
            account_id: "acc-1".into(),
            owner: "alice".into(),
        },
        command_codes.as_ref(),
        reply.clone(),
    )?;
    let deposit = CommandMessage::from_command(
        Ulid::new().to_string(),
        &Deposit {
            account_id: "acc-1".into(),
            amount: 1500,
        },
        command_codes.as_ref(),
        reply.clone(),
    )?;
    let overdraw = CommandMessage::from_command(
        Ulid::new().to_string(),
        &Withdraw {
            account_id: "acc-1".into(),
            amount: 5000,
        },
        command_codes.as_ref(),
        reply.clone(),
    )?;
    let withdraw = CommandMessage::from_command(
        Ulid::new().to_string(),
        &Withdraw {
            account_id: "acc-1".into(),
            amount: 200,
        },
        command_codes.as_ref(),
        reply,
    )?;

    if let Some(task) = consumer.handle(open.clone(), command_ack(&open.command_id)) {
        task.await?;
    }

    // 存款命令被投递两次：处理中的重复投递直接丢弃
    let first = consumer.handle(deposit.clone(), command_ack(&deposit.command_id));
    let second = consumer.handle(deposit.clone(), command_ack(&deposit.command_id));
    if second.is_none() {
        info!(command_id = %deposit.command_id, "duplicate delivery dropped");
    }
    if let Some(task) = first {
        task.await?;
    }

    for message in [overdraw, withdraw] {
        let ack = command_ack(&message.command_id);
        if let Some(task) = consumer.handle(message, ack) {
            task.await?;
        }
    }

    // 关闭命令侧后总线随之关闭，分发器处理完积压的事件流即可停止
    drop(consumer);
    drop(bus);
    let dispatcher = pump.await?;
    dispatcher.shutdown();
    dispatcher.join().await;

    let account: Account = repo
        .get(&AccountId::new("acc-1".to_string()))
        .await?
        .ok_or_else(|| anyhow::anyhow!("account acc-1 not committed"))?;
    info!(
        account_id = %account.id(),
        owner = %account.owner,
        balance = account.balance,
        version = account.version(),
        "account reloaded from commit log"
    );

    let projected = projection
        .balances
        .lock()
        .map_err(|_| anyhow::anyhow!("balance projection poisoned"))?
        .get("acc-1")
        .copied();
    info!(balance = ?projected, "balance projection");

    Ok(())
}
