mod common;

use artisan_market::{
    dto::cart::{AddToCartRequest, UpdateCartRequest},
    entity::{CartItems, cart_items},
    error::AppError,
    services::cart_service,
};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

#[tokio::test]
async fn adding_the_same_product_merges_quantities() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };

    let artisan = common::create_user(&state, "artisan").await?;
    let customer = common::create_user(&state, "customer").await?;
    let spoon = common::create_product(&state, &artisan, "Spoon", 1800, 6).await?;

    let first = cart_service::add_to_cart(&state, &customer, AddToCartRequest { product_id: spoon.id, quantity: 2 })
        .await?
        .data
        .unwrap();
    let second = cart_service::add_to_cart(&state, &customer, AddToCartRequest { product_id: spoon.id, quantity: 3 })
        .await?
        .data
        .unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(second.quantity, 5);

    let rows = CartItems::find()
        .filter(cart_items::Column::UserId.eq(customer.user_id))
        .all(&state.orm)
        .await?;
    assert_eq!(rows.len(), 1);

    // 5 in cart, 6 in stock.
    let over = cart_service::add_to_cart(&state, &customer, AddToCartRequest { product_id: spoon.id, quantity: 2 })
        .await;
    assert!(matches!(over, Err(AppError::BadRequest(_))));

    let list = cart_service::list_cart(&state, &customer).await?.data.unwrap();
    assert_eq!(list.total, 9000);

    Ok(())
}

#[tokio::test]
async fn cart_items_are_private_to_their_owner() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };

    let artisan = common::create_user(&state, "artisan").await?;
    let owner = common::create_user(&state, "customer").await?;
    let stranger = common::create_user(&state, "customer").await?;
    let scarf = common::create_product(&state, &artisan, "Scarf", 4500, 10).await?;

    let item = cart_service::add_to_cart(&state, &owner, AddToCartRequest { product_id: scarf.id, quantity: 1 })
        .await?
        .data
        .unwrap();

    let update = cart_service::update_cart_item(&state, &stranger, item.id, UpdateCartRequest { quantity: 4 })
        .await;
    assert!(matches!(update, Err(AppError::NotFound)));
    let remove = cart_service::remove_from_cart(&state, &stranger, item.id).await;
    assert!(matches!(remove, Err(AppError::NotFound)));

    let updated = cart_service::update_cart_item(&state, &owner, item.id, UpdateCartRequest { quantity: 4 })
        .await?
        .data
        .unwrap();
    assert_eq!(updated.quantity, 4);

    let zero = cart_service::update_cart_item(&state, &owner, item.id, UpdateCartRequest { quantity: 0 })
        .await;
    assert!(matches!(zero, Err(AppError::Validation(_))));

    cart_service::remove_from_cart(&state, &owner, item.id).await?;
    let list = cart_service::list_cart(&state, &owner).await?.data.unwrap();
    assert!(list.items.is_empty());

    Ok(())
}

#[tokio::test]
async fn unknown_products_cannot_be_added() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };

    let customer = common::create_user(&state, "customer").await?;
    let result = cart_service::add_to_cart(
        &state,
        &customer,
        AddToCartRequest {
            product_id: Uuid::new_v4(),
            quantity: 1,
        },
    )
    .await;
    assert!(matches!(result, Err(AppError::NotFound)));

    Ok(())
}
