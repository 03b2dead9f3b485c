pub mod memory;
pub mod metrics;
pub mod paystack;
pub mod reconciler;
pub mod repository;
pub mod transactions;

pub use memory::{InMemoryProductStore, InMemoryTransactionStore};
pub use metrics::{get_metrics, init_metrics};
pub use paystack::{GatewayError, PaymentGateway, PaystackClient};
pub use reconciler::{ReconcilePolicy, Reconciler};
pub use repository::{
    MongoProductStore, MongoTransactionStore, ProductStore, StoreError, TransactionStore,
};
pub use transactions::{CheckoutSettings, TransactionError, TransactionService};
