//! Transport-agnostic service facade
//!
//! One `RewardService` owns the ledger and the three engines and
//! exposes every user-facing operation as a plain method. HTTP, RPC or
//! bot frontends layer on top without touching engine internals.

use crate::{
    config::Config,
    links::{LinkEngine, LinkIssuance, LinkStats, RedemptionResult},
    purchase::PurchaseEngine,
    withdrawal::WithdrawalEngine,
    Error, Result,
};
use coin_ledger::{
    Account, CoinLedger, DeliveryTarget, EntryDraft, EntryFilter, EntryKind, ItemDescriptor,
    LedgerEntry, PurchaseRequest, PurchaseStatus, ReferenceKind, RequestMeta, WithdrawalRequest,
    WithdrawalStatus,
};
use std::sync::Arc;
use uuid::Uuid;

/// Outcome of a gift transfer
#[derive(Debug, Clone)]
pub struct GiftTransfer {
    /// Transfer ID shared by both ledger entries
    pub gift_id: Uuid,
    /// Sender state after the debit
    pub sender: Account,
    /// Receiver state after the credit
    pub receiver: Account,
}

/// Facade over the ledger and the reward, withdrawal and purchase
/// engines
pub struct RewardService {
    ledger: Arc<CoinLedger>,
    links: LinkEngine,
    withdrawals: WithdrawalEngine,
    purchases: PurchaseEngine,
}

impl RewardService {
    /// Open the underlying ledger and wire up the engines
    pub fn open(config: Config) -> Result<Self> {
        let ledger = Arc::new(CoinLedger::open(config.ledger.clone())?);
        let links = LinkEngine::new(ledger.clone(), config.links.clone(), &config.codes);
        let withdrawals = WithdrawalEngine::new(ledger.clone(), config.withdrawal.clone());
        let purchases = PurchaseEngine::new(ledger.clone());

        Ok(Self {
            ledger,
            links,
            withdrawals,
            purchases,
        })
    }

    /// Underlying ledger handle
    pub fn ledger(&self) -> &Arc<CoinLedger> {
        &self.ledger
    }

    // Accounts

    /// Create a fresh account
    pub fn create_account(&self, account_id: Uuid) -> Result<Account> {
        Ok(self.ledger.create_account(account_id)?)
    }

    /// Get account state
    pub fn get_account(&self, account_id: Uuid) -> Result<Account> {
        Ok(self.ledger.get_account(account_id)?)
    }

    // Links and codes

    /// Issue a link, consuming one unit of today's quota
    pub fn generate_link(&self, account_id: Uuid) -> Result<LinkIssuance> {
        self.links.request_link(account_id)
    }

    /// Redeem a code for coins
    pub fn redeem_code(
        &self,
        account_id: Uuid,
        code: &str,
        meta: Option<RequestMeta>,
    ) -> Result<RedemptionResult> {
        self.links.redeem(account_id, code, meta)
    }

    /// Link statistics for an account
    pub fn link_stats(&self, account_id: Uuid) -> Result<LinkStats> {
        self.links.stats(account_id)
    }

    // Withdrawals

    /// Submit a withdrawal request
    pub fn submit_withdrawal(
        &self,
        account_id: Uuid,
        robux_amount: i64,
        gamepass_link: impl Into<String>,
        meta: Option<RequestMeta>,
    ) -> Result<WithdrawalRequest> {
        self.withdrawals
            .submit(account_id, robux_amount, gamepass_link, meta)
    }

    /// Move a withdrawal to a new status
    pub fn advance_withdrawal(
        &self,
        request_id: Uuid,
        to: WithdrawalStatus,
        actor: Option<Uuid>,
        reason: Option<String>,
    ) -> Result<WithdrawalRequest> {
        self.withdrawals.advance(request_id, to, actor, reason)
    }

    /// Get a withdrawal request
    pub fn get_withdrawal(&self, request_id: Uuid) -> Result<WithdrawalRequest> {
        self.withdrawals.get(request_id)
    }

    // Purchases

    /// Submit a purchase request
    pub fn submit_purchase(
        &self,
        account_id: Uuid,
        item: ItemDescriptor,
        delivery: DeliveryTarget,
        meta: Option<RequestMeta>,
    ) -> Result<PurchaseRequest> {
        self.purchases.submit(account_id, item, delivery, meta)
    }

    /// Move a purchase to a new status
    pub fn advance_purchase(
        &self,
        request_id: Uuid,
        to: PurchaseStatus,
        actor: Option<Uuid>,
        note: Option<String>,
        delivered_item_id: Option<String>,
    ) -> Result<PurchaseRequest> {
        self.purchases
            .advance(request_id, to, actor, note, delivered_item_id)
    }

    /// Get a purchase request
    pub fn get_purchase(&self, request_id: Uuid) -> Result<PurchaseRequest> {
        self.purchases.get(request_id)
    }

    // Transfers and adjustments

    /// Gift coins from one account to another
    ///
    /// Two single-account applies sharing one gift ID: the sender debit
    /// carries the balance check, the receiver credit cannot fail on
    /// funds. If the credit still fails, the debit is compensated with a
    /// refund so no coins vanish.
    pub fn gift(
        &self,
        sender_id: Uuid,
        receiver_id: Uuid,
        amount: i64,
        meta: Option<RequestMeta>,
    ) -> Result<GiftTransfer> {
        if amount <= 0 {
            return Err(Error::Other(format!(
                "gift amount must be positive, got {}",
                amount
            )));
        }
        if sender_id == receiver_id {
            return Err(Error::Other("cannot gift to yourself".to_string()));
        }

        // Fail before debiting when the receiver does not exist
        self.ledger.get_account(receiver_id)?;

        let gift_id = Uuid::now_v7();

        let mut debit = EntryDraft::new(sender_id, EntryKind::GiftSent, -amount)
            .with_reference(ReferenceKind::Account, receiver_id.to_string())
            .with_description(format!("Gift to {}", receiver_id));
        if let Some(meta) = meta.clone() {
            debit = debit.with_meta(meta);
        }
        let sender = self.ledger.apply(debit, None)?.account;

        let mut credit = EntryDraft::new(receiver_id, EntryKind::GiftReceived, amount)
            .with_reference(ReferenceKind::Account, sender_id.to_string())
            .with_description(format!("Gift from {}", sender_id));
        if let Some(meta) = meta {
            credit = credit.with_meta(meta);
        }
        let receiver = match self.ledger.apply(credit, None) {
            Ok(applied) => applied.account,
            Err(e) => {
                tracing::error!(
                    gift_id = %gift_id,
                    sender_id = %sender_id,
                    receiver_id = %receiver_id,
                    error = %e,
                    "Gift credit failed, compensating sender"
                );
                let refund = EntryDraft::new(sender_id, EntryKind::Refund, amount)
                    .with_reference(ReferenceKind::Gift, gift_id.to_string())
                    .with_description("Gift reversal".to_string());
                self.ledger.apply(refund, None)?;
                return Err(e.into());
            }
        };

        tracing::info!(
            gift_id = %gift_id,
            sender_id = %sender_id,
            receiver_id = %receiver_id,
            amount,
            "Gift transferred"
        );

        Ok(GiftTransfer {
            gift_id,
            sender,
            receiver,
        })
    }

    /// Manual balance adjustment by an administrator
    ///
    /// Positive amounts credit, negative debit; neither side moves the
    /// rolling earned/spent totals.
    pub fn admin_adjust(
        &self,
        account_id: Uuid,
        amount: i64,
        actor: Uuid,
        reason: impl Into<String>,
    ) -> Result<Account> {
        let kind = if amount > 0 {
            EntryKind::AdminCredit
        } else {
            EntryKind::AdminDebit
        };
        let draft = EntryDraft::new(account_id, kind, amount)
            .with_reference(ReferenceKind::Account, actor.to_string())
            .with_description(reason);

        let applied = self.ledger.apply(draft, None)?;

        tracing::info!(
            account_id = %account_id,
            actor = %actor,
            amount,
            "Admin adjustment applied"
        );

        Ok(applied.account)
    }

    // Queries

    /// Account entry history, timestamp ascending
    pub fn history(&self, account_id: Uuid, filter: &EntryFilter) -> Result<Vec<LedgerEntry>> {
        Ok(self.ledger.entries_for_account(account_id, filter)?)
    }

    /// Check the reconciliation invariant for one account
    pub fn check_reconciliation(&self, account_id: Uuid) -> Result<bool> {
        Ok(self.ledger.check_reconciliation(account_id)?)
    }
}
