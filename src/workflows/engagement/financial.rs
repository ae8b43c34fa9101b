//! Derives a proposal's financial totals from its service lines and
//! credits. The four derived fields on a proposal are never edited by
//! hand; every line or credit mutation re-runs this computation.

use super::domain::{Credit, CreditValue, Money, ProposalId, ServiceLine};
use super::error::EngagementError;
use super::store::StoreState;

/// Snapshot of the derived figures for one proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinancialBreakdown {
    pub subtotal: Money,
    pub credits_total: Money,
    pub after_credits: Money,
    pub tax_amount: Money,
    pub total: Money,
}

impl FinancialBreakdown {
    /// Pure computation over a data snapshot. Credits exceeding the
    /// subtotal are a data error surfaced to the caller, never clamped.
    pub fn compute(
        lines: &[ServiceLine],
        credits: &[Credit],
        tax_rate_bps: u32,
    ) -> Result<Self, EngagementError> {
        let subtotal: Money = lines.iter().map(ServiceLine::line_total).sum();

        let credits_total: Money = credits
            .iter()
            .map(|credit| match credit.value {
                CreditValue::Dollar(amount) => amount,
                CreditValue::PercentBps(bps) => subtotal.at_bps(bps),
            })
            .sum();

        let after_credits = subtotal - credits_total;
        if after_credits < Money::ZERO {
            return Err(EngagementError::validation(format!(
                "credits {credits_total} exceed subtotal {subtotal}"
            )));
        }

        let tax_amount = after_credits.at_bps(tax_rate_bps);
        Ok(Self {
            subtotal,
            credits_total,
            after_credits,
            tax_amount,
            total: after_credits + tax_amount,
        })
    }
}

/// Recompute and persist a proposal's derived financial fields. Idempotent;
/// no side effect beyond the four fields.
pub(crate) fn recalculate(
    state: &mut StoreState,
    proposal_id: ProposalId,
) -> Result<FinancialBreakdown, EngagementError> {
    let lines = state.service_lines_for(proposal_id);
    let credits = state.credits_for(proposal_id);
    let tax_rate_bps = state.proposal(proposal_id)?.tax_rate_bps;

    let breakdown = FinancialBreakdown::compute(&lines, &credits, tax_rate_bps)?;

    let proposal = state.proposal_mut(proposal_id)?;
    proposal.subtotal = breakdown.subtotal;
    proposal.tax_amount = breakdown.tax_amount;
    proposal.total = breakdown.total;
    Ok(breakdown)
}
