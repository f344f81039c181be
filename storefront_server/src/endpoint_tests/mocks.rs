use gateway_tools::{GatewayApiError, TransactionVerifier, VerifiedTransaction};
use mockall::mock;

mock! {
    pub Verifier {}
    impl TransactionVerifier for Verifier {
        async fn verify_transaction(&self, reference: &str) -> Result<VerifiedTransaction, GatewayApiError>;
    }
}
