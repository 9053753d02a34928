//! Prometheus metrics for the policy pool

use rust_decimal::prelude::ToPrimitive;

use parapool_common::Wad;

use crate::pool::PoolSnapshot;

/// Policy lifecycle counters and ledger gauges
pub struct PoolMetrics {
    pub policies_created: prometheus::IntCounter,
    /// Labelled by outcome: `claim`, `no_claim`, `expired`
    pub policies_settled: prometheus::IntCounterVec,
    pub policies_active: prometheus::IntGauge,
    pub insolvency_remedies: prometheus::IntCounter,
    pub tranche_total_supply: prometheus::GaugeVec,
    pub tranche_scr: prometheus::GaugeVec,
    pub tranche_pool_loan: prometheus::GaugeVec,
    pub pure_premiums: prometheus::Gauge,
    pub won_pure_premiums: prometheus::Gauge,
    pub idle_cash: prometheus::Gauge,
    pub investment_value: prometheus::Gauge,
}

fn as_f64(value: Wad) -> f64 {
    value.raw().to_f64().unwrap_or_default()
}

impl PoolMetrics {
    pub fn new() -> prometheus::Result<Self> {
        Ok(Self {
            policies_created: prometheus::IntCounter::new(
                "parapool_policies_created_total",
                "Total policies created",
            )?,
            policies_settled: prometheus::IntCounterVec::new(
                prometheus::Opts::new("parapool_policies_settled_total", "Total policies settled"),
                &["outcome"],
            )?,
            policies_active: prometheus::IntGauge::new(
                "parapool_policies_active",
                "Policies currently holding collateral",
            )?,
            insolvency_remedies: prometheus::IntCounter::new(
                "parapool_insolvency_remedies_total",
                "Shortfalls covered by the insolvency hook",
            )?,
            tranche_total_supply: prometheus::GaugeVec::new(
                prometheus::Opts::new("parapool_tranche_total_supply", "Tranche capital"),
                &["tranche"],
            )?,
            tranche_scr: prometheus::GaugeVec::new(
                prometheus::Opts::new("parapool_tranche_scr", "Tranche locked collateral"),
                &["tranche"],
            )?,
            tranche_pool_loan: prometheus::GaugeVec::new(
                prometheus::Opts::new("parapool_tranche_pool_loan", "Debt owed by the pool to the tranche"),
                &["tranche"],
            )?,
            pure_premiums: prometheus::Gauge::new(
                "parapool_pure_premiums",
                "Pure premium of active policies",
            )?,
            won_pure_premiums: prometheus::Gauge::new(
                "parapool_won_pure_premiums",
                "Realized, withdrawable premium",
            )?,
            idle_cash: prometheus::Gauge::new("parapool_idle_cash", "Cash held by the pool account")?,
            investment_value: prometheus::Gauge::new(
                "parapool_investment_value",
                "Value held by the asset manager",
            )?,
        })
    }

    pub fn register(&self, registry: &prometheus::Registry) -> prometheus::Result<()> {
        registry.register(Box::new(self.policies_created.clone()))?;
        registry.register(Box::new(self.policies_settled.clone()))?;
        registry.register(Box::new(self.policies_active.clone()))?;
        registry.register(Box::new(self.insolvency_remedies.clone()))?;
        registry.register(Box::new(self.tranche_total_supply.clone()))?;
        registry.register(Box::new(self.tranche_scr.clone()))?;
        registry.register(Box::new(self.tranche_pool_loan.clone()))?;
        registry.register(Box::new(self.pure_premiums.clone()))?;
        registry.register(Box::new(self.won_pure_premiums.clone()))?;
        registry.register(Box::new(self.idle_cash.clone()))?;
        registry.register(Box::new(self.investment_value.clone()))?;
        Ok(())
    }

    /// Refresh every gauge from `snapshot`
    pub fn observe(&self, snapshot: &PoolSnapshot) {
        for tranche in &snapshot.tranches {
            let label = tranche.name.as_str();
            self.tranche_total_supply
                .with_label_values(&[label])
                .set(as_f64(tranche.total_supply));
            self.tranche_scr.with_label_values(&[label]).set(as_f64(tranche.scr));
            self.tranche_pool_loan
                .with_label_values(&[label])
                .set(as_f64(tranche.pool_loan));
        }
        self.policies_active.set(snapshot.active_policies as i64);
        self.pure_premiums.set(as_f64(snapshot.ledger.pure_premiums()));
        self.won_pure_premiums
            .set(as_f64(snapshot.ledger.won_pure_premiums()));
        self.idle_cash.set(as_f64(snapshot.idle_cash));
        self.investment_value.set(as_f64(snapshot.investment_value));
    }
}
