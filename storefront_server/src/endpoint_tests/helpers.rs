use actix_http::Request;
use actix_web::{
    body::MessageBody,
    dev::{Service, ServiceResponse},
    http::StatusCode,
    test,
};
use gateway_tools::{calculate_signature, PaymentOutcome, TransactionMetadata, VerifiedTransaction};
use log::debug;
use pay_common::Cents;
use reconciliation_engine::{
    events::EventProducers,
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    MemoryMailer,
    OrderApi,
    ReconciliationApi,
    SqliteDatabase,
};

pub const WEBHOOK_SECRET: &str = "sk_test_storefront_webhook_secret";
pub const SIGNATURE_HEADER: &str = "x-paystack-signature";

/// A migrated throwaway database plus the collaborators the handlers need.
pub struct TestContext {
    pub db: SqliteDatabase,
    pub mailer: MemoryMailer,
}

impl TestContext {
    pub async fn new() -> Self {
        let db = prepare_test_env(&random_db_path()).await;
        Self { db, mailer: MemoryMailer::new() }
    }

    pub fn reconciliation_api(&self) -> ReconciliationApi<SqliteDatabase, MemoryMailer> {
        ReconciliationApi::new(self.db.clone(), self.mailer.clone(), EventProducers::default())
    }

    pub fn order_api(&self) -> OrderApi<SqliteDatabase> {
        OrderApi::new(self.db.clone(), EventProducers::default())
    }
}

/// Sends a request and returns the status and body, whether the response came from a handler or from a middleware
/// that rejected the request.
pub async fn send<S, B>(service: &S, req: Request) -> (StatusCode, String)
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    debug!("Making request");
    match test::try_call_service(service, req).await {
        Ok(res) => {
            let status = res.status();
            let body = test::read_body(res).await;
            (status, String::from_utf8_lossy(&body).into_owned())
        },
        Err(e) => {
            let res = e.error_response();
            let status = res.status();
            let body = res.into_body().try_into_bytes().unwrap_or_default();
            (status, String::from_utf8_lossy(&body).into_owned())
        },
    }
}

pub fn sign(body: &str) -> String {
    calculate_signature(WEBHOOK_SECRET, body.as_bytes())
}

/// What the gateway says about a successful R500.00 payment for `order_id`.
pub fn verified(order_id: &str, reference: &str, outcome: PaymentOutcome) -> VerifiedTransaction {
    VerifiedTransaction {
        outcome,
        reference: reference.to_string(),
        amount: Cents::from_major(500),
        currency: Some("ZAR".into()),
        customer_email: Some("payer@example.com".into()),
        gateway_message: Some("Approved".into()),
        metadata: TransactionMetadata {
            order_id: Some(order_id.to_string()),
            user_id: Some("user-7".into()),
            customer_email: None,
            extra: Default::default(),
        },
    }
}

pub fn charge_success_event(order_id: Option<&str>, reference: &str) -> String {
    let metadata = match order_id {
        Some(id) => serde_json::json!({ "order_id": id, "user_id": "user-7" }),
        None => serde_json::json!({ "user_id": "user-7" }),
    };
    serde_json::json!({
        "event": "charge.success",
        "data": {
            "id": 302961,
            "domain": "live",
            "status": "success",
            "reference": reference,
            "amount": 50000,
            "currency": "ZAR",
            "paid_at": "2024-06-01T10:15:00.000Z",
            "gateway_response": "Approved",
            "customer": { "email": "payer@example.com" },
            "metadata": metadata
        }
    })
    .to_string()
}
