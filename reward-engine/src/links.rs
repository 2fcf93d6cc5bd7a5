//! Reward issuance engine
//!
//! Daily link-quota gate, one-time code redemption with the level
//! discount, and the level-upgrade check. Link issuance and reward are
//! decoupled: generating a link grants no coins, coins arrive through
//! code redemption.

use crate::{
    config::{CodeDef, LinkConfig},
    level, Error, Result,
};
use chrono::{DateTime, Utc};
use coin_ledger::{CoinLedger, EntryDraft, EntryKind, Level, ReferenceKind, RequestMeta};
use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Outcome of a link issuance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkIssuance {
    /// Link to visit
    pub link: String,
    /// Issuances left today
    pub remaining: u32,
}

/// Outcome of a successful code redemption
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedemptionResult {
    /// Coins credited (after the level discount)
    pub reward: i64,
    /// Balance after the credit
    pub new_balance: i64,
    /// Tier after the upgrade check
    pub level: Level,
    /// Discount applied, in whole percent
    pub discount_applied: i64,
}

/// Link statistics for one account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkStats {
    /// Links issued today (0 if the quota has rolled over)
    pub links_today: u32,
    /// Issuances left today
    pub remaining: u32,
    /// Lifetime completed links
    pub completed_links: u64,
    /// Last issuance time
    pub last_link_date: Option<DateTime<Utc>>,
}

/// Reward issuance engine
pub struct LinkEngine {
    ledger: Arc<CoinLedger>,
    config: LinkConfig,
    /// Issued code set: code -> reward coins
    codes: HashMap<String, i64>,
}

impl LinkEngine {
    /// Create engine over a shared ledger
    ///
    /// Codes without an explicit reward pay the configured base reward.
    pub fn new(ledger: Arc<CoinLedger>, config: LinkConfig, codes: &[CodeDef]) -> Self {
        let codes = codes
            .iter()
            .map(|def| (def.code.clone(), def.reward.unwrap_or(config.base_reward)))
            .collect();
        Self {
            ledger,
            config,
            codes,
        }
    }

    /// Issue a link from the pool, consuming one unit of today's quota
    ///
    /// The lazy day-roll reset and the quota check-then-increment run as
    /// one locked account update, so two concurrent "new day" requests
    /// cannot both reset and both pass.
    pub fn request_link(&self, account_id: Uuid) -> Result<LinkIssuance> {
        let limit = self.config.daily_limit;

        let account = self.ledger.update_account(account_id, |account| {
            let today = Utc::now().date_naive();
            if account.last_link_date.map(|d| d.date_naive()) != Some(today) {
                account.links_today = 0;
            }
            if account.links_today >= limit {
                return Err(Error::QuotaExceeded {
                    used: account.links_today,
                    limit,
                });
            }
            account.links_today += 1;
            account.last_link_date = Some(Utc::now());
            Ok(())
        })?;

        let link = self
            .config
            .pool
            .choose(&mut rand::thread_rng())
            .ok_or_else(|| Error::Config("link pool is empty".to_string()))?
            .clone();

        tracing::info!(
            account_id = %account_id,
            links_today = account.links_today,
            "Link issued"
        );

        Ok(LinkIssuance {
            link,
            remaining: limit.saturating_sub(account.links_today),
        })
    }

    /// Redeem a code for coins
    ///
    /// The (account, code) uniqueness is enforced by the ledger at write
    /// time; a racing duplicate fails with `AlreadyRedeemed` instead of
    /// double-crediting.
    pub fn redeem(
        &self,
        account_id: Uuid,
        code: &str,
        meta: Option<RequestMeta>,
    ) -> Result<RedemptionResult> {
        let base_reward = *self
            .codes
            .get(code)
            .ok_or_else(|| Error::InvalidCode(code.to_string()))?;

        let account = self.ledger.get_account(account_id)?;
        let discount = account.level.discount_percent();
        let reward = base_reward
            .checked_mul(100 - discount)
            .map(|v| v / 100)
            .ok_or_else(|| Error::Other(format!("code reward {} out of range", base_reward)))?;

        let mut draft = EntryDraft::new(account_id, EntryKind::CodeRedeemed, reward)
            .with_code(code)
            .with_reference(ReferenceKind::Code, code)
            .with_description(format!("Code redemption: {}", code));
        if let Some(meta) = meta {
            draft = draft.with_meta(meta);
        }

        let applied = self.ledger.apply(draft, None)?;

        let old_level = account.level;
        let account = self.ledger.update_account::<Error, _>(account_id, |account| {
            account.completed_links += 1;
            account.level = level::upgraded(account.level, account.completed_links);
            Ok(())
        })?;

        if account.level != old_level {
            tracing::info!(
                account_id = %account_id,
                from = %old_level,
                to = %account.level,
                completed_links = account.completed_links,
                "Level upgraded"
            );
        }

        tracing::info!(
            account_id = %account_id,
            code = code,
            reward,
            discount,
            new_balance = applied.account.coins,
            "Code redeemed"
        );

        Ok(RedemptionResult {
            reward,
            new_balance: applied.account.coins,
            level: account.level,
            discount_applied: discount,
        })
    }

    /// Link statistics, with the quota presented as already rolled over
    /// when the last issuance was on an earlier day
    pub fn stats(&self, account_id: Uuid) -> Result<LinkStats> {
        let account = self.ledger.get_account(account_id)?;

        let today = Utc::now().date_naive();
        let links_today = match account.last_link_date {
            Some(d) if d.date_naive() == today => account.links_today,
            _ => 0,
        };

        Ok(LinkStats {
            links_today,
            remaining: self.config.daily_limit.saturating_sub(links_today),
            completed_links: account.completed_links,
            last_link_date: account.last_link_date,
        })
    }
}
