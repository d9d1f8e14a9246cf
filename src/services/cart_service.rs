use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait, ActiveModelTrait,
};
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::{Expr, OnConflict};
use uuid::Uuid;
use validator::Validate;

use crate::{
    audit,
    dto::cart::{AddToCartRequest, CartItemDto, CartList, UpdateCartRequest},
    entity::{
        cart_items::{self, ActiveModel as CartActive, Column as CartCol, Entity as CartItems},
        products::{self, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{CartItem, Product},
    response::{ApiResponse, Meta},
    state::AppState,
};

/// Cart rows of one user joined with their products, newest first.
pub(crate) async fn load_cart_lines<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
) -> AppResult<Vec<(cart_items::Model, products::Model)>> {
    let rows = CartItems::find()
        .filter(CartCol::UserId.eq(user_id))
        .order_by_desc(CartCol::CreatedAt)
        .find_also_related(Products)
        .all(conn)
        .await?;

    // The foreign key cascades on product delete, so a missing product is a vanished row.
    Ok(rows
        .into_iter()
        .filter_map(|(item, product)| product.map(|p| (item, p)))
        .collect())
}

pub(crate) fn build_cart_list(
    lines: Vec<(cart_items::Model, products::Model)>,
) -> AppResult<CartList> {
    let mut items = Vec::with_capacity(lines.len());
    let mut total: i64 = 0;
    for (item, product) in lines {
        let line_total = product
            .price
            .checked_mul(i64::from(item.quantity))
            .ok_or_else(cart_too_large)?;
        total = total.checked_add(line_total).ok_or_else(cart_too_large)?;
        items.push(CartItemDto {
            id: item.id,
            line_total,
            quantity: item.quantity,
            product: Product::from(product),
        });
    }
    Ok(CartList { items, total })
}

fn cart_too_large() -> AppError {
    AppError::BadRequest("Cart total is too large".into())
}

/// Rejects quantities the product cannot currently cover.
fn ensure_in_stock(product: &products::Model, quantity: i32) -> AppResult<()> {
    if quantity > product.stock {
        return Err(AppError::BadRequest(format!(
            "Only {} of {} left in stock",
            product.stock, product.name
        )));
    }
    Ok(())
}

pub async fn list_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<CartList>> {
    let lines = load_cart_lines(&state.orm, user.user_id).await?;
    let count = lines.len() as i64;
    Ok(ApiResponse::success(
        "OK",
        build_cart_list(lines)?,
        Some(Meta::new(1, count, count)),
    ))
}

pub async fn add_to_cart(
    state: &AppState,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartItem>> {
    payload.validate()?;

    let txn = state.orm.begin().await?;
    let product = match Products::find_by_id(payload.product_id).one(&txn).await? {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    let existing = CartItems::find()
        .filter(
            Condition::all()
                .add(CartCol::UserId.eq(user.user_id))
                .add(CartCol::ProductId.eq(payload.product_id)),
        )
        .one(&txn)
        .await?
        .map(|item| item.quantity)
        .unwrap_or(0);
    let merged = existing
        .checked_add(payload.quantity)
        .ok_or_else(|| AppError::BadRequest("Quantity is too large".into()))?;
    ensure_in_stock(&product, merged)?;

    // Merge into an existing line for the same product instead of adding a second row.
    let cart_item = CartItems::insert(CartActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        product_id: Set(payload.product_id),
        quantity: Set(payload.quantity),
        created_at: NotSet,
    })
    .on_conflict(
        OnConflict::columns([CartCol::UserId, CartCol::ProductId])
            .value(
                CartCol::Quantity,
                Expr::col((CartItems, CartCol::Quantity)).add(payload.quantity),
            )
            .to_owned(),
    )
    .exec_with_returning(&txn)
    .await?;
    txn.commit().await?;

    tracing::debug!(user_id = %user.user_id, product_id = %payload.product_id, quantity = cart_item.quantity, "cart line merged");
    audit::record(
        &state.pool,
        user.user_id,
        "cart_add",
        "cart_items",
        serde_json::json!({ "product_id": payload.product_id, "quantity": payload.quantity }),
    )
    .await;

    Ok(ApiResponse::success(
        "Product added to cart!",
        CartItem::from(cart_item),
        None,
    ))
}

pub async fn update_cart_item(
    state: &AppState,
    user: &AuthUser,
    item_id: Uuid,
    payload: UpdateCartRequest,
) -> AppResult<ApiResponse<CartItem>> {
    payload.validate()?;

    let found = CartItems::find()
        .filter(
            Condition::all()
                .add(CartCol::Id.eq(item_id))
                .add(CartCol::UserId.eq(user.user_id)),
        )
        .find_also_related(Products)
        .one(&state.orm)
        .await?;
    let (item, product) = match found {
        Some((item, Some(product))) => (item, product),
        _ => return Err(AppError::NotFound),
    };
    ensure_in_stock(&product, payload.quantity)?;

    let mut active: CartActive = item.into();
    active.quantity = Set(payload.quantity);
    let item = active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        user.user_id,
        "cart_update",
        "cart_items",
        serde_json::json!({ "cart_item_id": item.id, "quantity": item.quantity }),
    )
    .await;

    Ok(ApiResponse::success(
        "Cart updated successfully",
        CartItem::from(item),
        Some(Meta::empty()),
    ))
}

pub async fn remove_from_cart(
    state: &AppState,
    user: &AuthUser,
    item_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = CartItems::delete_many()
        .filter(CartCol::Id.eq(item_id))
        .filter(CartCol::UserId.eq(user.user_id))
        .exec(&state.orm)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    audit::record(
        &state.pool,
        user.user_id,
        "cart_remove",
        "cart_items",
        serde_json::json!({ "cart_item_id": item_id }),
    )
    .await;

    Ok(ApiResponse::done("Product removed from cart!"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn product(price: i64, stock: i32) -> products::Model {
        products::Model {
            id: Uuid::new_v4(),
            artisan_id: Uuid::new_v4(),
            category_id: None,
            name: "Walnut Bowl".into(),
            description: None,
            price,
            stock,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    fn line(product: &products::Model, quantity: i32) -> cart_items::Model {
        cart_items::Model {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            product_id: product.id,
            quantity,
            created_at: Utc::now().into(),
        }
    }

    #[test]
    fn cart_total_sums_line_totals() {
        let bowl = product(2500, 10);
        let spoon = product(400, 10);
        let list = build_cart_list(vec![(line(&bowl, 2), bowl.clone()), (line(&spoon, 3), spoon.clone())])
            .unwrap();
        assert_eq!(list.items.len(), 2);
        assert_eq!(list.items[0].line_total, 5000);
        assert_eq!(list.total, 6200);
    }

    #[test]
    fn cart_total_overflow_is_rejected() {
        let gold = product(i64::MAX / 2 + 1, 10);
        let err = build_cart_list(vec![(line(&gold, 2), gold.clone())]).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(msg) if msg == "Cart total is too large"));

        let half = product(i64::MAX / 2, 10);
        let err = build_cart_list(vec![(line(&half, 1), half.clone()), (line(&half, 1), half.clone()), (line(&half, 1), half.clone())])
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn stock_check_allows_exact_stock() {
        let bowl = product(2500, 3);
        assert!(ensure_in_stock(&bowl, 3).is_ok());
        assert!(matches!(ensure_in_stock(&bowl, 4), Err(AppError::BadRequest(_))));
    }
}
