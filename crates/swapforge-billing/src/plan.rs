/// A subscription plan's monthly credit allowance. Plan/pricing tables
/// themselves stay out of scope for this core; `PlanCatalog` is the seam a
/// production deployment wires to its real plan table.
#[derive(Debug, Clone, Copy)]
pub struct Plan {
    pub monthly_credits: i64,
}

pub trait PlanCatalog: Send + Sync {
    fn get_plan(&self, plan_id: &str) -> Option<Plan>;
}

/// Resolves whether an email is covered by the trial whitelist and, if so,
/// the credit floor it should be topped up to. Out of scope as a full
/// policy implementation; this is the boundary the ledger calls into.
pub trait WhitelistPolicy: Send + Sync {
    fn floor_credits(&self, email: &str) -> Option<i64>;
}
