//! Purchase lifecycle engine
//!
//! Mirrors the withdrawal lifecycle; the debit is the level-discounted
//! final cost, computed from the account's tier at submission time.

use crate::{transitions, Error, Result};
use chrono::Utc;
use coin_ledger::{
    CoinLedger, DeliveryTarget, EntryDraft, EntryKind, ItemDescriptor, PurchaseRequest,
    PurchaseStatus, ReferenceKind, RequestMeta, SideRecord, StatusChange,
};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use uuid::Uuid;

/// Purchase lifecycle engine
pub struct PurchaseEngine {
    ledger: Arc<CoinLedger>,
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl PurchaseEngine {
    /// Create engine over a shared ledger
    pub fn new(ledger: Arc<CoinLedger>) -> Self {
        Self {
            ledger,
            locks: DashMap::new(),
        }
    }

    fn lock_for(&self, request_id: Uuid) -> Arc<Mutex<()>> {
        self.locks.entry(request_id).or_default().clone()
    }

    /// Submit a purchase, debiting the discounted cost atomically
    ///
    /// The discount is the account's tier discount at submission; later
    /// level changes do not reprice an open request.
    pub fn submit(
        &self,
        account_id: Uuid,
        item: ItemDescriptor,
        delivery: DeliveryTarget,
        meta: Option<RequestMeta>,
    ) -> Result<PurchaseRequest> {
        if item.coin_cost <= 0 {
            return Err(Error::Other(format!(
                "item cost must be positive, got {}",
                item.coin_cost
            )));
        }

        let account = self.ledger.get_account(account_id)?;
        let discount = account.level.discount_percent();
        let final_cost = item
            .coin_cost
            .checked_mul(100 - discount)
            .map(|v| v / 100)
            .ok_or_else(|| Error::Other(format!("item cost {} out of range", item.coin_cost)))?;

        let now = Utc::now();
        let request = PurchaseRequest {
            request_id: Uuid::now_v7(),
            account_id,
            item,
            discount_applied: discount,
            final_cost,
            delivery,
            status: PurchaseStatus::Pending,
            status_history: vec![StatusChange {
                status: PurchaseStatus::Pending,
                actor: None,
                reason: None,
                timestamp: now,
            }],
            processed_by: None,
            processed_at: None,
            admin_notes: None,
            fulfilled: false,
            delivered_item_id: None,
            meta: meta.clone(),
            created_at: now,
            updated_at: now,
        };

        let mut draft = EntryDraft::new(account_id, EntryKind::PurchaseDebit, -final_cost)
            .with_reference(ReferenceKind::Purchase, request.request_id.to_string())
            .with_description(format!("Purchase: {}", request.item.name));
        if let Some(meta) = meta {
            draft = draft.with_meta(meta);
        }

        self.ledger
            .apply(draft, Some(SideRecord::Purchase(&request)))?;

        tracing::info!(
            request_id = %request.request_id,
            account_id = %account_id,
            item = %request.item.name,
            final_cost,
            discount,
            "Purchase submitted"
        );

        Ok(request)
    }

    /// Move a request to a new status
    ///
    /// Completion marks the request fulfilled and records the delivered
    /// item; failing or cancelling refunds the final cost in the same
    /// batch as the status change.
    pub fn advance(
        &self,
        request_id: Uuid,
        to: PurchaseStatus,
        actor: Option<Uuid>,
        note: Option<String>,
        delivered_item_id: Option<String>,
    ) -> Result<PurchaseRequest> {
        let lock = self.lock_for(request_id);
        let _guard = lock.lock();

        let mut request = self.ledger.get_purchase(request_id)?;
        let from = request.status;
        if !transitions::purchase_allowed(from, to) {
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
            reason: note.clone(),
            timestamp: now,
        });
        request.updated_at = now;
        if let Some(note) = note {
            request.admin_notes = Some(note);
        }
        if to == PurchaseStatus::Processing {
            request.processed_by = actor;
        }
        if to.is_terminal() {
            request.processed_at = Some(now);
        }
        if to == PurchaseStatus::Completed {
            request.fulfilled = true;
            request.delivered_item_id = delivered_item_id;
        }

        if transitions::purchase_refunds(to) {
            let draft = EntryDraft::new(request.account_id, EntryKind::Refund, request.final_cost)
                .with_reference(ReferenceKind::Purchase, request_id.to_string())
                .with_description(format!("Refund for {} purchase", to));
            self.ledger
                .apply(draft, Some(SideRecord::Purchase(&request)))?;
        } else {
            self.ledger.put_purchase(&request)?;
        }

        tracing::info!(
            request_id = %request_id,
            account_id = %request.account_id,
            from = %from,
            to = %to,
            "Purchase status changed"
        );

        Ok(request)
    }

    /// Get a request by ID
    pub fn get(&self, request_id: Uuid) -> Result<PurchaseRequest> {
        Ok(self.ledger.get_purchase(request_id)?)
    }
}
