//! Checkout: converts a user's cart into committed transactions.
//!
//! The whole commit runs in one database transaction. Cart rows and their
//! products are locked `FOR UPDATE` (products in id order), every line is
//! validated before anything is written, and stock is decremented with a
//! guarded update so it can never go negative. Any failure drops the
//! transaction, which rolls everything back.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::{Expr, LockType};
use std::collections::HashMap;
use uuid::Uuid;
use validator::Validate;

use crate::{
    audit,
    dto::{
        cart::CartList,
        checkout::{CheckoutRequest, CheckoutResult, TransactionList},
    },
    entity::{
        cart_items::{Column as CartCol, Entity as CartItems},
        products::{Column as ProdCol, Entity as Products},
        transactions::{ActiveModel as TransactionActive, Column as TxCol, Entity as Transactions},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{STATUS_PENDING, Transaction},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    services::cart_service::{build_cart_list, load_cart_lines},
    state::AppState,
};

/// A cart line joined with the locked state of its product.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutLine {
    pub product_id: Uuid,
    pub artisan_id: Uuid,
    pub product_name: String,
    pub unit_price: i64,
    pub quantity: i32,
    pub stock: i32,
}

impl CheckoutLine {
    fn line_total(&self) -> Option<i64> {
        self.unit_price.checked_mul(i64::from(self.quantity))
    }
}

#[derive(Debug, PartialEq)]
pub struct CheckoutPlan {
    pub lines: Vec<CheckoutLine>,
    pub total_amount: i64,
}

/// Validates every line against stock before anything is written.
pub fn plan_checkout(lines: Vec<CheckoutLine>) -> AppResult<CheckoutPlan> {
    if lines.is_empty() {
        return Err(AppError::Checkout("Cart is empty".into()));
    }

    let mut total_amount: i64 = 0;
    for line in &lines {
        if line.quantity <= 0 {
            return Err(AppError::Checkout("Cart has invalid quantity".into()));
        }
        if line.stock < line.quantity {
            return Err(AppError::Checkout(format!(
                "Insufficient stock for {}",
                line.product_name
            )));
        }
        total_amount = line
            .line_total()
            .and_then(|t| total_amount.checked_add(t))
            .ok_or_else(|| AppError::Checkout("Order total is too large".into()))?;
    }

    Ok(CheckoutPlan {
        lines,
        total_amount,
    })
}

/// Shared by all transactions of one checkout, e.g. `CHK-20261018-1a2b3c4d`.
pub fn build_reference(checkout_id: Uuid) -> String {
    let date = Utc::now().format("%Y%m%d");
    let suffix = checkout_id.simple().to_string();
    format!("CHK-{}-{}", date, &suffix[..8])
}

pub async fn checkout_summary(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<CartList>> {
    let lines = load_cart_lines(&state.orm, user.user_id).await?;
    Ok(ApiResponse::success(
        "Checkout",
        build_cart_list(lines)?,
        Some(Meta::empty()),
    ))
}

pub async fn process_checkout(
    state: &AppState,
    user: &AuthUser,
    payload: CheckoutRequest,
) -> AppResult<ApiResponse<CheckoutResult>> {
    payload.validate()?;

    let txn = state.orm.begin().await?;
    let result = match commit_checkout(&txn, user, &payload).await {
        Ok(result) => result,
        Err(err) => {
            // Dropping the transaction would also roll back; do it explicitly to log the outcome.
            if let Err(rollback_err) = txn.rollback().await {
                tracing::warn!(error = %rollback_err, "checkout rollback failed");
            }
            tracing::info!(user_id = %user.user_id, error = %err, "checkout rejected");
            return Err(generic_checkout_error(err));
        }
    };
    txn.commit().await.map_err(|err| generic_checkout_error(err.into()))?;

    tracing::info!(
        user_id = %user.user_id,
        reference = %result.reference,
        lines = result.transactions.len(),
        total = result.total_amount,
        "checkout committed"
    );
    audit::record(
        &state.pool,
        user.user_id,
        "checkout",
        "transactions",
        serde_json::json!({ "reference": result.reference, "total_amount": result.total_amount }),
    )
    .await;

    Ok(ApiResponse::success(
        "Checkout successful!",
        result,
        Some(Meta::empty()),
    ))
}

/// Infrastructure failures are reported to the buyer without internals.
fn generic_checkout_error(err: AppError) -> AppError {
    match err {
        AppError::DbError(_) | AppError::OrmError(_) | AppError::Internal(_) => {
            tracing::error!(error = ?err, "checkout failed");
            AppError::Checkout("Checkout failed, please try again".into())
        }
        other => other,
    }
}

async fn commit_checkout(
    txn: &DatabaseTransaction,
    user: &AuthUser,
    buyer: &CheckoutRequest,
) -> AppResult<CheckoutResult> {
    let cart = CartItems::find()
        .filter(CartCol::UserId.eq(user.user_id))
        .order_by_asc(CartCol::CreatedAt)
        .lock(LockType::Update)
        .all(txn)
        .await?;

    let product_ids: Vec<Uuid> = cart.iter().map(|item| item.product_id).collect();
    let products: HashMap<Uuid, _> = if product_ids.is_empty() {
        HashMap::new()
    } else {
        Products::find()
            .filter(ProdCol::Id.is_in(product_ids))
            .order_by_asc(ProdCol::Id)
            .lock(LockType::Update)
            .all(txn)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect()
    };

    let lines = cart
        .iter()
        .map(|item| -> AppResult<CheckoutLine> {
            let product = products.get(&item.product_id).ok_or(AppError::NotFound)?;
            Ok(CheckoutLine {
                product_id: product.id,
                artisan_id: product.artisan_id,
                product_name: product.name.clone(),
                unit_price: product.price,
                quantity: item.quantity,
                stock: product.stock,
            })
        })
        .collect::<AppResult<Vec<_>>>()?;

    let plan = plan_checkout(lines)?;
    let reference = build_reference(Uuid::new_v4());
    let mut transactions = Vec::with_capacity(plan.lines.len());

    for line in &plan.lines {
        let updated = Products::update_many()
            .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).sub(line.quantity))
            .col_expr(ProdCol::UpdatedAt, Expr::current_timestamp().into())
            .filter(ProdCol::Id.eq(line.product_id))
            .filter(ProdCol::Stock.gte(line.quantity))
            .exec(txn)
            .await?;
        if updated.rows_affected != 1 {
            return Err(AppError::Checkout(format!(
                "Insufficient stock for {}",
                line.product_name
            )));
        }

        let row = TransactionActive {
            id: Set(Uuid::new_v4()),
            reference: Set(reference.clone()),
            buyer_id: Set(user.user_id),
            artisan_id: Set(line.artisan_id),
            product_id: Set(Some(line.product_id)),
            product_name: Set(line.product_name.clone()),
            quantity: Set(line.quantity),
            unit_price: Set(line.unit_price),
            total_price: Set(line.unit_price * i64::from(line.quantity)),
            buyer_name: Set(buyer.name.trim().to_string()),
            buyer_email: Set(buyer.email.trim().to_string()),
            buyer_phone: Set(buyer.phone.clone()),
            shipping_address: Set(buyer.address.trim().to_string()),
            status: Set(STATUS_PENDING.into()),
            sent_at: Set(None),
            created_at: NotSet,
        }
        .insert(txn)
        .await?;
        transactions.push(Transaction::from(row));
    }

    CartItems::delete_many()
        .filter(CartCol::UserId.eq(user.user_id))
        .exec(txn)
        .await?;

    Ok(CheckoutResult {
        reference,
        total_amount: plan.total_amount,
        transactions,
    })
}

pub async fn list_purchases(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<TransactionList>> {
    let (page, limit, offset) = pagination.normalize();
    let finder = Transactions::find()
        .filter(TxCol::BuyerId.eq(user.user_id))
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
        "Purchases",
        TransactionList { items },
        page,
        limit,
        total,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(name: &str, price: i64, quantity: i32, stock: i32) -> CheckoutLine {
        CheckoutLine {
            product_id: Uuid::new_v4(),
            artisan_id: Uuid::new_v4(),
            product_name: name.into(),
            unit_price: price,
            quantity,
            stock,
        }
    }

    #[test]
    fn empty_cart_is_rejected() {
        let err = plan_checkout(vec![]).unwrap_err();
        assert_eq!(err.to_string(), "Cart is empty");
    }

    #[test]
    fn totals_every_line() {
        let plan = plan_checkout(vec![line("Mug", 1500, 2, 5), line("Scarf", 4000, 1, 1)]).unwrap();
        assert_eq!(plan.total_amount, 7000);
        assert_eq!(plan.lines.len(), 2);
    }

    #[test]
    fn one_short_line_fails_the_whole_checkout() {
        let err = plan_checkout(vec![line("Mug", 1500, 2, 5), line("Scarf", 4000, 3, 2)])
            .unwrap_err();
        assert!(matches!(&err, AppError::Checkout(msg) if msg == "Insufficient stock for Scarf"));
    }

    #[test]
    fn non_positive_quantities_are_rejected() {
        let err = plan_checkout(vec![line("Mug", 1500, 0, 5)]).unwrap_err();
        assert!(matches!(err, AppError::Checkout(_)));
    }

    #[test]
    fn overflowing_totals_are_rejected() {
        let err = plan_checkout(vec![line("Gold", i64::MAX, 2, 5)]).unwrap_err();
        assert_eq!(err.to_string(), "Order total is too large");
    }

    #[test]
    fn reference_has_date_and_short_id() {
        let reference = build_reference(Uuid::new_v4());
        let parts: Vec<&str> = reference.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "CHK");
        assert_eq!(parts[1].len(), 8);
        assert_eq!(parts[2].len(), 8);
    }

    #[test]
    fn infrastructure_errors_become_generic_checkout_errors() {
        let err = generic_checkout_error(AppError::Internal(anyhow::anyhow!("pool timed out")));
        assert_eq!(err.to_string(), "Checkout failed, please try again");

        let err = generic_checkout_error(AppError::Checkout("Cart is empty".into()));
        assert_eq!(err.to_string(), "Cart is empty");
    }
}
