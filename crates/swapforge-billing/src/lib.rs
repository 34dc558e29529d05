pub mod ledger;
pub mod plan;

pub use ledger::{apply_whitelist_on_login, check_and_debit, credit, refund_if_not_refunded, renew_if_due, DebitOutcome};
pub use plan::{Plan, PlanCatalog, WhitelistPolicy};
