use cucumber::World;
use log::*;
use reconciliation_engine::{
    order_objects::ConfirmationResult,
    MemoryMailer,
    ReconciliationApi,
    ReconciliationError,
    SqliteDatabase,
};

use crate::support::{prepare_test_env, random_db_path};

#[derive(Default, Debug, World)]
pub struct StorefrontWorld {
    pub system: Option<CheckoutSystem>,
    pub last_result: Option<Result<ConfirmationResult, ReconciliationError>>,
}

#[derive(Debug)]
pub struct CheckoutSystem {
    pub db_path: String,
    pub api: ReconciliationApi<SqliteDatabase, MemoryMailer>,
    pub mailer: MemoryMailer,
}

impl StorefrontWorld {
    pub async fn system(&mut self) -> &CheckoutSystem {
        if self.system.is_none() {
            self.system = Some(CheckoutSystem::new().await);
        }
        self.system.as_ref().expect("Checkout system not initialised")
    }

    pub fn api(&self) -> &ReconciliationApi<SqliteDatabase, MemoryMailer> {
        &self.system.as_ref().expect("Checkout system not initialised").api
    }

    pub fn mailer(&self) -> &MemoryMailer {
        &self.system.as_ref().expect("Checkout system not initialised").mailer
    }
}

impl CheckoutSystem {
    pub async fn new() -> Self {
        let url = random_db_path();
        let db = prepare_test_env(&url).await;
        debug!("🚀️ Created database: {url}");
        let mailer = MemoryMailer::new();
        let api = ReconciliationApi::new(db, mailer.clone(), Default::default());
        Self { db_path: url, api, mailer }
    }
}
