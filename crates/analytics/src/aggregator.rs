//! Read-only aggregation over historical RTO events.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use common::{CompanyId, Money};
use domain::ReturnStatus;
use rto::services::CourierRegistry;
use serde::Serialize;
use store::{RtoFilter, RtoStore};

use crate::error::Result;

/// Headline numbers for a company's returns.
#[derive(Debug, Clone, Serialize)]
pub struct RtoSummary {
    pub total_events: u64,
    pub active: u64,
    pub restocked: u64,
    pub cancelled: u64,
    pub total_charges: Money,
    /// Share of closed, non-cancelled returns that ended in restock.
    pub restock_rate_pct: f64,
}

/// One day's trigger count.
#[derive(Debug, Clone, Serialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub count: u64,
}

/// Per-courier aggregate.
#[derive(Debug, Clone, Serialize)]
pub struct CourierStat {
    pub count: u64,
    pub charges: Money,
}

/// Full analytics payload, purely derived from stored events.
#[derive(Debug, Clone, Serialize)]
pub struct RtoAnalytics {
    pub summary: RtoSummary,
    /// Event counts per return status.
    pub stats: BTreeMap<String, u64>,
    /// Daily trigger counts, oldest first.
    pub trend: Vec<TrendPoint>,
    /// Counts and charges per canonical courier name.
    pub by_courier: BTreeMap<String, CourierStat>,
    /// Event counts per trigger reason.
    pub by_reason: BTreeMap<String, u64>,
    pub recommendations: Vec<String>,
}

/// Aggregates historical RTO events into reporting views.
///
/// No mutation: everything is folded from the store's filtered listing,
/// with courier identifiers canonicalized through the registry.
pub struct RtoAnalyticsAggregator {
    store: Arc<dyn RtoStore>,
    couriers: Arc<CourierRegistry>,
}

impl RtoAnalyticsAggregator {
    /// Creates a new aggregator.
    pub fn new(store: Arc<dyn RtoStore>, couriers: Arc<CourierRegistry>) -> Self {
        Self { store, couriers }
    }

    /// Computes analytics for a company over the filtered window.
    #[tracing::instrument(skip(self, filter))]
    pub async fn get_analytics(
        &self,
        company_id: CompanyId,
        filter: &RtoFilter,
    ) -> Result<RtoAnalytics> {
        let events = self.store.rto_events_for_company(company_id, filter).await?;

        let mut stats: BTreeMap<String, u64> = BTreeMap::new();
        let mut by_reason: BTreeMap<String, u64> = BTreeMap::new();
        let mut by_courier: BTreeMap<String, CourierStat> = BTreeMap::new();
        let mut daily: BTreeMap<NaiveDate, u64> = BTreeMap::new();

        let mut active = 0u64;
        let mut restocked = 0u64;
        let mut cancelled = 0u64;
        let mut closed_not_cancelled = 0u64;
        let mut total_charges = Money::zero();

        for event in &events {
            *stats
                .entry(event.return_status().as_str().to_string())
                .or_default() += 1;
            *by_reason
                .entry(event.rto_reason().as_str().to_string())
                .or_default() += 1;
            *daily.entry(event.created_at().date_naive()).or_default() += 1;

            if event.charges_deducted() {
                total_charges = total_charges + event.rto_charge();
            }

            match event.return_status() {
                status if !status.is_terminal() => active += 1,
                ReturnStatus::Cancelled => cancelled += 1,
                ReturnStatus::Restocked => {
                    restocked += 1;
                    closed_not_cancelled += 1;
                }
                _ => closed_not_cancelled += 1,
            }

            let carrier = match self.store.shipment(event.shipment_id()).await? {
                Some(shipment) => self.couriers.canonical_name(&shipment.carrier),
                None => "unknown".to_string(),
            };
            let entry = by_courier.entry(carrier).or_insert(CourierStat {
                count: 0,
                charges: Money::zero(),
            });
            entry.count += 1;
            if event.charges_deducted() {
                entry.charges = entry.charges + event.rto_charge();
            }
        }

        let total_events = events.len() as u64;
        let restock_rate_pct = if closed_not_cancelled > 0 {
            restocked as f64 / closed_not_cancelled as f64 * 100.0
        } else {
            0.0
        };

        let summary = RtoSummary {
            total_events,
            active,
            restocked,
            cancelled,
            total_charges,
            restock_rate_pct,
        };
        let recommendations = recommend(&summary, &by_reason, &by_courier);

        Ok(RtoAnalytics {
            summary,
            stats,
            trend: daily
                .into_iter()
                .map(|(date, count)| TrendPoint { date, count })
                .collect(),
            by_courier,
            by_reason,
            recommendations,
        })
    }
}

/// Rule-based suggestions derived from the aggregates.
fn recommend(
    summary: &RtoSummary,
    by_reason: &BTreeMap<String, u64>,
    by_courier: &BTreeMap<String, CourierStat>,
) -> Vec<String> {
    let mut recommendations = Vec::new();
    let total = summary.total_events;
    if total < 5 {
        return recommendations;
    }

    if let Some(address_issues) = by_reason.get("address_issue")
        && *address_issues as f64 / total as f64 > 0.3
    {
        recommendations.push(
            "Over 30% of returns stem from address issues; enable address validation at checkout."
                .to_string(),
        );
    }

    if let Some((carrier, stat)) = by_courier
        .iter()
        .max_by_key(|(_, stat)| stat.count)
        && stat.count as f64 / total as f64 > 0.5
    {
        recommendations.push(format!(
            "Courier '{carrier}' accounts for the majority of returns; review its serviceability on these lanes."
        ));
    }

    let closed = total - summary.active - summary.cancelled;
    if closed > 0 && summary.restock_rate_pct < 50.0 {
        recommendations.push(
            "Less than half of inspected returns are restockable; review packaging and handling."
                .to_string(),
        );
    }

    recommendations
}
