//! Shared fixtures: an accounts-and-orders domain and a store directory
//! that engines are started over.

#![allow(dead_code)]

pub use cairn_core::{
    ChannelMode, Codec, EngineConfig, ModelType, Payload, QueryExt, RepositoryExt,
};
pub use cairn_engine::{
    ActionError, Engine, EngineError, EngineState, EventStream, LocalEventBus,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub owner: String,
    pub balance: i64,
}

impl Payload for Account {
    const TYPE_NAME: &'static str = "bank.Account";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub account: u64,
    pub item: String,
    pub quantity: u32,
    /// Free-form labels; flattened maps only round-trip through JSON
    #[serde(flatten)]
    pub labels: BTreeMap<String, String>,
}

impl Payload for Order {
    const TYPE_NAME: &'static str = "shop.Order";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateAccount {
    pub id: u64,
    pub owner: String,
}

impl Payload for CreateAccount {
    const TYPE_NAME: &'static str = "bank.CreateAccount";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deposit {
    pub id: u64,
    pub amount: i64,
}

impl Payload for Deposit {
    const TYPE_NAME: &'static str = "bank.Deposit";
}

/// Debits before checking the balance, so a rejection has work to undo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Withdraw {
    pub id: u64,
    pub amount: i64,
}

impl Payload for Withdraw {
    const TYPE_NAME: &'static str = "bank.Withdraw";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceOrder {
    pub id: u64,
    pub account: u64,
    pub item: String,
    pub quantity: u32,
    #[serde(flatten)]
    pub labels: BTreeMap<String, String>,
}

impl Payload for PlaceOrder {
    const TYPE_NAME: &'static str = "shop.PlaceOrder";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountCreated {
    pub id: u64,
}

impl Payload for AccountCreated {
    const TYPE_NAME: &'static str = "bank.AccountCreated";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPlaced {
    pub id: u64,
}

impl Payload for OrderPlaced {
    const TYPE_NAME: &'static str = "shop.OrderPlaced";
}

/// Journaling defaults for specs: no fsync per batch
pub fn config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.journaling.channel = ChannelMode::Buffered;
    config
}

pub fn register(engine: &Engine) {
    let mut domain = engine.domain();
    domain
        .entity::<Account>()
        .entity::<Order>()
        .transaction_action(|cmd: &CreateAccount, ctx| {
            ctx.repo().store(
                cmd.id,
                Account {
                    owner: cmd.owner.clone(),
                    balance: 0,
                },
            )?;
            ctx.emit(AccountCreated { id: cmd.id });
            Ok(())
        })
        .transaction_action(|cmd: &Deposit, ctx| {
            let account = ctx
                .repo()
                .get_mut::<Account>(cmd.id)?
                .ok_or_else(|| ActionError::rejected(format!("no account {}", cmd.id)))?;
            account.balance += cmd.amount;
            Ok(())
        })
        .transaction_action(|cmd: &Withdraw, ctx| {
            let account = ctx
                .repo()
                .get_mut::<Account>(cmd.id)?
                .ok_or_else(|| ActionError::rejected(format!("no account {}", cmd.id)))?;
            account.balance -= cmd.amount;
            if account.balance < 0 {
                return Err(ActionError::rejected("insufficient funds"));
            }
            Ok(())
        })
        .transaction_action(|cmd: &PlaceOrder, ctx| {
            if ctx.repo().get::<Account>(cmd.account)?.is_none() {
                return Err(ActionError::rejected(format!("no account {}", cmd.account)));
            }
            ctx.repo().store(
                cmd.id,
                Order {
                    account: cmd.account,
                    item: cmd.item.clone(),
                    quantity: cmd.quantity,
                    labels: cmd.labels.clone(),
                },
            )?;
            ctx.emit(OrderPlaced { id: cmd.id });
            Ok(())
        });
}

pub fn create_account(id: u64) -> CreateAccount {
    CreateAccount {
        id,
        owner: format!("owner-{id}"),
    }
}

pub fn place_order(id: u64, account: u64) -> PlaceOrder {
    PlaceOrder {
        id,
        account,
        item: format!("item-{}", id % 7),
        quantity: (id % 5) as u32 + 1,
        labels: BTreeMap::from([("channel".to_string(), "web".to_string())]),
    }
}

/// A journal directory that outlives the engines started over it
pub struct Store {
    dir: TempDir,
    bus: Arc<LocalEventBus>,
}

impl Store {
    pub fn empty() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
            bus: Arc::new(LocalEventBus::new()),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// An engine with the domain registered, not yet started
    pub fn engine(&self, config: EngineConfig) -> Engine {
        let engine = Engine::with_event_bus(self.path(), config, self.bus.clone()).unwrap();
        register(&engine);
        engine
    }

    /// Register the domain and start an engine; events go to this store's bus
    pub fn start(&self, config: EngineConfig) -> Engine {
        let engine = self.engine(config);
        engine.startup().unwrap();
        engine
    }

    pub fn subscribe<E: Payload>(&self) -> EventStream<E> {
        self.bus.subscribe::<E>()
    }

    /// Published files whose name starts with `prefix`, sorted by name
    pub fn files(&self, prefix: &str) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = fs::read_dir(self.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| {
                p.file_name()
                    .is_some_and(|n| n.to_string_lossy().starts_with(prefix))
            })
            .collect();
        files.sort();
        files
    }

    /// Copy every file of `other` into this store
    pub fn copy_from(&self, other: &Store) {
        for entry in fs::read_dir(other.path()).unwrap() {
            let path = entry.unwrap().path();
            fs::copy(&path, self.path().join(path.file_name().unwrap())).unwrap();
        }
    }

    /// The single published file with `prefix`
    pub fn only(&self, prefix: &str) -> PathBuf {
        let files = self.files(prefix);
        assert_eq!(files.len(), 1, "expected one {prefix} file, found {files:?}");
        files[0].clone()
    }
}

pub fn file_len(path: &Path) -> u64 {
    fs::metadata(path).unwrap().len()
}

/// Keep the first `len` bytes of `path`
pub fn truncate(path: &Path, len: u64) {
    OpenOptions::new()
        .write(true)
        .open(path)
        .unwrap()
        .set_len(len)
        .unwrap();
}

pub fn balance(engine: &Engine, id: u64) -> Option<i64> {
    engine.query(|repo| repo.find::<Account>(id).map(|a| a.balance))
}

pub fn accounts(engine: &Engine) -> usize {
    engine.query(|repo| repo.count::<Account>())
}

pub fn orders(engine: &Engine) -> usize {
    engine.query(|repo| repo.count::<Order>())
}
