use crate::database::with_timeout;
use crate::entities::{PaymentStatus, payment_entity as payments, user_entity as users};
use crate::error::AppResult;
use crate::models::*;
use crate::utils::normalize_email;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, QueryFilter, QueryOrder, Set, TransactionTrait, UpdateResult,
};

/// What a verified webhook event did to storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    Granted {
        user_id: i64,
        expires_at: DateTime<Utc>,
    },
    /// A completed Payment for this transaction already exists.
    AlreadyProcessed,
    RecordedFailure {
        user_id: i64,
        premium_retained: bool,
    },
    UserNotFound,
    Ignored,
}

/// Applies verified payment events to the ledger and the user's entitlement.
/// The only writer of `is_premium` / `premium_expires_at` besides the expiry
/// sweep.
#[derive(Clone)]
pub struct PaymentEventService {
    pool: DatabaseConnection,
    timeout_secs: u64,
}

impl PaymentEventService {
    pub fn new(pool: DatabaseConnection, timeout_secs: u64) -> Self {
        Self { pool, timeout_secs }
    }

    /// Runs under the storage timeout. On expiry the open transaction is
    /// dropped and rolled back, so nothing is half-written.
    pub async fn apply(&self, event: PaymentEvent, now: DateTime<Utc>) -> AppResult<EventOutcome> {
        with_timeout(self.timeout_secs, self.dispatch(event, now)).await
    }

    async fn dispatch(&self, event: PaymentEvent, now: DateTime<Utc>) -> AppResult<EventOutcome> {
        match event {
            PaymentEvent::Succeeded(outcome) => self.record_success(outcome, now).await,
            PaymentEvent::Failed(outcome) => self.record_failure(outcome, "failed", now).await,
            PaymentEvent::Canceled(outcome) => self.record_failure(outcome, "canceled", now).await,
            PaymentEvent::Ignored {
                event_id,
                event_type,
            } => {
                log::debug!("Ignoring webhook event {event_id} of type {event_type}");
                Ok(EventOutcome::Ignored)
            }
        }
    }

    async fn record_success(
        &self,
        outcome: IntentOutcome,
        now: DateTime<Utc>,
    ) -> AppResult<EventOutcome> {
        let metadata = &outcome.metadata;
        let expected = metadata.plan.price_cents(metadata.user_type);
        if outcome.amount != expected {
            // 金额在创建 intent 时已校验，这里只记录
            log::warn!(
                "Payment {} amount {} differs from the {} price {} for {}",
                outcome.transaction_id,
                outcome.amount,
                metadata.plan,
                expected,
                metadata.user_type
            );
        }

        let txn = self.pool.begin().await?;

        let Some(user) = find_user(&txn, metadata).await? else {
            log::warn!(
                "Payment {} succeeded for unknown user_id={} email={}",
                outcome.transaction_id,
                metadata.user_id,
                metadata.email
            );
            return Ok(EventOutcome::UserNotFound);
        };
        let user_id = user.id;

        let base = match user.premium_expires_at {
            Some(existing) if existing > now => existing,
            _ => now,
        };
        let grant_end = now + metadata.plan.duration();
        let expires_at = base.max(grant_end);

        let record = payments::ActiveModel {
            user_id: Set(user_id),
            transaction_id: Set(outcome.transaction_id.clone()),
            amount: Set(outcome.amount),
            currency: Set(outcome.currency.to_ascii_lowercase()),
            status: Set(PaymentStatus::Completed),
            plan: Set(metadata.plan),
            user_type: Set(metadata.user_type),
            granted_until: Set(Some(expires_at)),
            failure_message: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        let inserted = payments::Entity::insert(record)
            .on_conflict(
                OnConflict::column(payments::Column::TransactionId)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&txn)
            .await?;

        if inserted == 0 {
            // 同一 intent 先失败后重试成功：仅允许 failed -> completed
            let promoted: UpdateResult = payments::Entity::update_many()
                .col_expr(
                    payments::Column::Status,
                    Expr::value(PaymentStatus::Completed),
                )
                .col_expr(payments::Column::GrantedUntil, Expr::value(Some(expires_at)))
                .col_expr(payments::Column::FailureMessage, Expr::value(None::<String>))
                .col_expr(payments::Column::Amount, Expr::value(outcome.amount))
                .col_expr(payments::Column::UpdatedAt, Expr::value(now))
                .filter(payments::Column::TransactionId.eq(outcome.transaction_id.as_str()))
                .filter(payments::Column::Status.eq(PaymentStatus::Failed))
                .exec(&txn)
                .await?;

            if promoted.rows_affected == 0 {
                txn.rollback().await?;
                log::info!(
                    "Payment {} already processed (event {})",
                    outcome.transaction_id,
                    outcome.event_id
                );
                return Ok(EventOutcome::AlreadyProcessed);
            }
        }

        let mut am = user.into_active_model();
        am.is_premium = Set(true);
        am.premium_expires_at = Set(Some(expires_at));
        am.updated_at = Set(now);
        am.update(&txn).await?;

        txn.commit().await?;

        log::info!(
            "Premium granted to user_id={user_id} until {expires_at} via {} ({})",
            outcome.transaction_id,
            metadata.plan
        );
        Ok(EventOutcome::Granted {
            user_id,
            expires_at,
        })
    }

    async fn record_failure(
        &self,
        outcome: IntentOutcome,
        kind: &str,
        now: DateTime<Utc>,
    ) -> AppResult<EventOutcome> {
        let metadata = &outcome.metadata;
        let txn = self.pool.begin().await?;

        let Some(user) = find_user(&txn, metadata).await? else {
            log::warn!(
                "Payment {} {kind} for unknown user_id={} email={}",
                outcome.transaction_id,
                metadata.user_id,
                metadata.email
            );
            return Ok(EventOutcome::UserNotFound);
        };
        let user_id = user.id;

        let failure_message = outcome
            .failure_message
            .clone()
            .or_else(|| (kind == "canceled").then(|| "Payment canceled".to_string()));
        let record = payments::ActiveModel {
            user_id: Set(user_id),
            transaction_id: Set(outcome.transaction_id.clone()),
            amount: Set(outcome.amount),
            currency: Set(outcome.currency.to_ascii_lowercase()),
            status: Set(PaymentStatus::Failed),
            plan: Set(metadata.plan),
            user_type: Set(metadata.user_type),
            granted_until: Set(None),
            failure_message: Set(failure_message),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        // 已有 completed 记录时不降级
        payments::Entity::insert(record)
            .on_conflict(
                OnConflict::column(payments::Column::TransactionId)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&txn)
            .await?;

        let active_until = latest_active_grant(&txn, user_id, now).await?;
        let premium_retained = active_until.is_some();
        if user.is_premium != premium_retained || user.premium_expires_at != active_until {
            let mut am = user.into_active_model();
            am.is_premium = Set(premium_retained);
            am.premium_expires_at = Set(active_until);
            am.updated_at = Set(now);
            am.update(&txn).await?;
        }

        txn.commit().await?;

        log::info!(
            "Payment {} {kind} for user_id={user_id}; premium retained: {premium_retained}",
            outcome.transaction_id
        );
        Ok(EventOutcome::RecordedFailure {
            user_id,
            premium_retained,
        })
    }
}

/// Metadata user id first, then the normalized email.
async fn find_user<C: ConnectionTrait>(
    db: &C,
    metadata: &IntentMetadata,
) -> AppResult<Option<users::Model>> {
    if let Some(user) = users::Entity::find_by_id(metadata.user_id).one(db).await? {
        return Ok(Some(user));
    }
    let user = users::Entity::find()
        .filter(users::Column::Email.eq(normalize_email(&metadata.email)))
        .one(db)
        .await?;
    Ok(user)
}

/// Furthest future expiry among the user's completed payments.
async fn latest_active_grant<C: ConnectionTrait>(
    db: &C,
    user_id: i64,
    now: DateTime<Utc>,
) -> AppResult<Option<DateTime<Utc>>> {
    let latest = payments::Entity::find()
        .filter(payments::Column::UserId.eq(user_id))
        .filter(payments::Column::Status.eq(PaymentStatus::Completed))
        .filter(payments::Column::GrantedUntil.gt(now))
        .order_by_desc(payments::Column::GrantedUntil)
        .one(db)
        .await?;
    Ok(latest.and_then(|p| p.granted_until))
}
