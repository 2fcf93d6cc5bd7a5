//! Withdrawal lifecycle engine
//!
//! Coins leave the balance at submission; every path out of the
//! lifecycle either pays out (`Completed`) or puts the coins back with
//! a refund entry committed in the same batch as the status change.

use crate::{config::WithdrawalConfig, transitions, Error, Result};
use chrono::{Duration, Utc};
use coin_ledger::{
    CoinLedger, EntryDraft, EntryKind, ReferenceKind, RequestMeta, SideRecord, StatusChange,
    WithdrawalRequest, WithdrawalStatus,
};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use uuid::Uuid;

/// Withdrawal lifecycle engine
///
/// Transitions on one request serialize on a per-request lock; the
/// request lock is always taken before the account lock inside the
/// ledger, never after.
pub struct WithdrawalEngine {
    ledger: Arc<CoinLedger>,
    config: WithdrawalConfig,
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl WithdrawalEngine {
    /// Create engine over a shared ledger
    pub fn new(ledger: Arc<CoinLedger>, config: WithdrawalConfig) -> Self {
        Self {
            ledger,
            config,
            locks: DashMap::new(),
        }
    }

    fn lock_for(&self, request_id: Uuid) -> Arc<Mutex<()>> {
        self.locks.entry(request_id).or_default().clone()
    }

    /// Submit a withdrawal, debiting its coin cost atomically
    ///
    /// If the debit fails (insufficient balance), no request record is
    /// created.
    pub fn submit(
        &self,
        account_id: Uuid,
        robux_amount: i64,
        gamepass_link: impl Into<String>,
        meta: Option<RequestMeta>,
    ) -> Result<WithdrawalRequest> {
        if robux_amount < self.config.min_robux {
            return Err(Error::BelowMinimum {
                minimum: self.config.min_robux,
                requested: robux_amount,
            });
        }

        let coin_cost = robux_amount
            .checked_mul(self.config.coins_per_robux)
            .ok_or_else(|| {
                Error::Other(format!("withdrawal amount {} out of range", robux_amount))
            })?;
        let now = Utc::now();
        let request = WithdrawalRequest {
            request_id: Uuid::now_v7(),
            account_id,
            robux_amount,
            coin_cost,
            gamepass_link: gamepass_link.into(),
            status: WithdrawalStatus::Pending,
            status_history: vec![StatusChange {
                status: WithdrawalStatus::Pending,
                actor: None,
                reason: None,
                timestamp: now,
            }],
            processed_by: None,
            processed_at: None,
            rejection_reason: None,
            estimated_completion: now + Duration::hours(self.config.sla_hours),
            meta: meta.clone(),
            created_at: now,
            updated_at: now,
        };

        let mut draft = EntryDraft::new(account_id, EntryKind::WithdrawalDebit, -coin_cost)
            .with_reference(ReferenceKind::Withdrawal, request.request_id.to_string())
            .with_description(format!("Withdrawal of {} robux", robux_amount));
        if let Some(meta) = meta {
            draft = draft.with_meta(meta);
        }

        self.ledger
            .apply(draft, Some(SideRecord::Withdrawal(&request)))?;

        tracing::info!(
            request_id = %request.request_id,
            account_id = %account_id,
            robux_amount,
            coin_cost,
            "Withdrawal submitted"
        );

        Ok(request)
    }

    /// Move a request to a new status
    ///
    /// Refunding transitions commit the refund entry and the updated
    /// request in one batch; either both land or neither does.
    pub fn advance(
        &self,
        request_id: Uuid,
        to: WithdrawalStatus,
        actor: Option<Uuid>,
        reason: Option<String>,
    ) -> Result<WithdrawalRequest> {
        let lock = self.lock_for(request_id);
        let _guard = lock.lock();

        let mut request = self.ledger.get_withdrawal(request_id)?;
        let from = request.status;
        if !transitions::withdrawal_allowed(from, to) {
            return Err(Error::InvalidTransition {
                from: from.to_string(),
                to: to.to_string(),
            });
        }

        let now = Utc::now();
        request.status = to;
        request.status_history.push(StatusChange {
            status: to,
            actor,
            reason: reason.clone(),
            timestamp: now,
        });
        request.updated_at = now;
        if to == WithdrawalStatus::Processing {
            request.processed_by = actor;
        }
        if to.is_terminal() {
            request.processed_at = Some(now);
        }
        if to == WithdrawalStatus::Rejected {
            request.rejection_reason = reason;
        }

        if transitions::withdrawal_refunds(to) {
            let draft = EntryDraft::new(request.account_id, EntryKind::Refund, request.coin_cost)
                .with_reference(ReferenceKind::Withdrawal, request_id.to_string())
                .with_description(format!("Refund for {} withdrawal", to));
            self.ledger
                .apply(draft, Some(SideRecord::Withdrawal(&request)))?;
        } else {
            self.ledger.put_withdrawal(&request)?;
        }

        tracing::info!(
            request_id = %request_id,
            account_id = %request.account_id,
            from = %from,
            to = %to,
            "Withdrawal status changed"
        );

        Ok(request)
    }

    /// Get a request by ID
    pub fn get(&self, request_id: Uuid) -> Result<WithdrawalRequest> {
        Ok(self.ledger.get_withdrawal(request_id)?)
    }
}
