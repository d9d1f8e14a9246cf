use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use sea_orm::sea_query::LockType;
use uuid::Uuid;

use crate::{
    audit,
    dto::checkout::TransactionList,
    entity::transactions::{ActiveModel as TransactionActive, Column as TxCol, Entity as Transactions},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_artisan},
    models::{STATUS_PENDING, STATUS_SENT, Transaction},
    response::{ApiResponse, Meta},
    routes::params::SalesQuery,
    state::AppState,
};

fn validate_status(status: &str) -> AppResult<()> {
    match status {
        STATUS_PENDING | STATUS_SENT => Ok(()),
        other => Err(AppError::BadRequest(format!("unknown status '{other}'"))),
    }
}

/// Only the selling artisan ships a sale; admins have no override here.
fn ensure_seller(user: &AuthUser, artisan_id: Uuid) -> AppResult<()> {
    if user.user_id != artisan_id {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

pub async fn list_sales(
    state: &AppState,
    user: &AuthUser,
    query: SalesQuery,
) -> AppResult<ApiResponse<TransactionList>> {
    ensure_artisan(user)?;
    let (page, limit, offset) = query.pagination().normalize();

    let mut condition = Condition::all().add(TxCol::ArtisanId.eq(user.user_id));
    if let Some(status) = query.status.as_deref().filter(|s| !s.is_empty()) {
        validate_status(status)?;
        condition = condition.add(TxCol::Status.eq(status));
    }

    let finder = Transactions::find()
        .filter(condition)
        .order_by_desc(TxCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Transaction::from)
        .collect();

    Ok(ApiResponse::paginated(
        "Sales",
        TransactionList { items },
        page,
        limit,
        total,
    ))
}

pub async fn mark_as_sent(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Transaction>> {
    ensure_artisan(user)?;
    let txn = state.orm.begin().await?;

    let existing = Transactions::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;
    ensure_seller(user, existing.artisan_id)?;

    if existing.status == STATUS_SENT {
        return Err(AppError::BadRequest("Transaction already marked as sent".into()));
    }

    let mut active: TransactionActive = existing.into();
    active.status = Set(STATUS_SENT.into());
    active.sent_at = Set(Some(Utc::now().into()));
    let updated = active.update(&txn).await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        user.user_id,
        "transaction_sent",
        "transactions",
        serde_json::json!({ "transaction_id": updated.id, "reference": updated.reference }),
    )
    .await;

    Ok(ApiResponse::success(
        "Transaction marked as sent",
        Transaction::from(updated),
        Some(Meta::empty()),
    ))
}
