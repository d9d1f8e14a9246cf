mod common;

use artisan_market::{
    dto::{cart::AddToCartRequest, checkout::CheckoutRequest},
    entity::{CartItems, Products, Transactions, cart_items, transactions},
    error::AppError,
    routes::params::{Pagination, SalesQuery},
    services::{cart_service, checkout_service, dashboard_service},
};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};

fn buyer() -> CheckoutRequest {
    CheckoutRequest {
        name: "Test Buyer".into(),
        email: "buyer@example.test".into(),
        phone: None,
        address: "1 Market Street".into(),
    }
}

// Flow: customer fills the cart -> checkout -> artisan sees and ships the sale.
#[tokio::test]
async fn checkout_decrements_stock_records_transactions_and_clears_cart() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };

    let artisan = common::create_user(&state, "artisan").await?;
    let customer = common::create_user(&state, "customer").await?;
    let mug = common::create_product(&state, &artisan, "Mug", 1500, 10).await?;
    let scarf = common::create_product(&state, &artisan, "Scarf", 4000, 2).await?;

    for (product_id, quantity) in [(mug.id, 2), (scarf.id, 2)] {
        cart_service::add_to_cart(&state, &customer, AddToCartRequest { product_id, quantity })
            .await?;
    }

    let summary = checkout_service::checkout_summary(&state, &customer).await?;
    assert_eq!(summary.data.unwrap().total, 11000);

    let result = checkout_service::process_checkout(&state, &customer, buyer())
        .await?
        .data
        .unwrap();
    assert_eq!(result.total_amount, 11000);
    assert_eq!(result.transactions.len(), 2);
    assert!(result.transactions.iter().all(|t| t.reference == result.reference));
    assert!(result.transactions.iter().all(|t| t.status == "pending"));

    let mug_after = Products::find_by_id(mug.id).one(&state.orm).await?.unwrap();
    let scarf_after = Products::find_by_id(scarf.id).one(&state.orm).await?.unwrap();
    assert_eq!(mug_after.stock, 8);
    assert_eq!(scarf_after.stock, 0);

    let remaining = CartItems::find()
        .filter(cart_items::Column::UserId.eq(customer.user_id))
        .count(&state.orm)
        .await?;
    assert_eq!(remaining, 0);

    let purchases = checkout_service::list_purchases(&state, &customer, Pagination::default()).await?;
    assert_eq!(purchases.meta.unwrap().total, Some(2));

    // The seller ships one line.
    let sales = dashboard_service::list_sales(
        &state,
        &artisan,
        SalesQuery {
            status: Some("pending".into()),
            ..Default::default()
        },
    )
    .await?;
    let sale = sales.data.unwrap().items.into_iter().next().expect("a pending sale");

    let sent = dashboard_service::mark_as_sent(&state, &artisan, sale.id).await?;
    let sent = sent.data.unwrap();
    assert_eq!(sent.status, "sent");
    assert!(sent.sent_at.is_some());

    let again = dashboard_service::mark_as_sent(&state, &artisan, sale.id).await;
    assert!(matches!(again, Err(AppError::BadRequest(_))));

    // The buyer is not the seller.
    let other = common::create_user(&state, "artisan").await?;
    let forbidden = dashboard_service::mark_as_sent(&state, &other, result.transactions[0].id).await;
    assert!(matches!(forbidden, Err(AppError::Forbidden)));

    // Admins manage the catalog but do not ship on behalf of a seller.
    let admin = common::create_user(&state, "admin").await?;
    let pending = result
        .transactions
        .iter()
        .find(|t| t.id != sale.id)
        .expect("a second line");
    let by_admin = dashboard_service::mark_as_sent(&state, &admin, pending.id).await;
    assert!(matches!(by_admin, Err(AppError::Forbidden)));

    Ok(())
}

#[tokio::test]
async fn insufficient_stock_rolls_back_everything() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };

    let artisan = common::create_user(&state, "artisan").await?;
    let customer = common::create_user(&state, "customer").await?;
    let bowl = common::create_product(&state, &artisan, "Bowl", 5600, 5).await?;
    let vase = common::create_product(&state, &artisan, "Vase", 9000, 3).await?;

    cart_service::add_to_cart(&state, &customer, AddToCartRequest { product_id: bowl.id, quantity: 2 })
        .await?;
    cart_service::add_to_cart(&state, &customer, AddToCartRequest { product_id: vase.id, quantity: 3 })
        .await?;

    // Another buyer takes part of the vase stock after our cart was filled.
    let rival = common::create_user(&state, "customer").await?;
    cart_service::add_to_cart(&state, &rival, AddToCartRequest { product_id: vase.id, quantity: 1 })
        .await?;
    checkout_service::process_checkout(&state, &rival, buyer()).await?;

    let err = checkout_service::process_checkout(&state, &customer, buyer())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Insufficient stock for Vase");

    let bowl_after = Products::find_by_id(bowl.id).one(&state.orm).await?.unwrap();
    assert_eq!(bowl_after.stock, 5, "earlier lines must not be decremented");

    let cart = CartItems::find()
        .filter(cart_items::Column::UserId.eq(customer.user_id))
        .count(&state.orm)
        .await?;
    assert_eq!(cart, 2, "cart is kept on failure");

    let recorded = Transactions::find()
        .filter(transactions::Column::BuyerId.eq(customer.user_id))
        .count(&state.orm)
        .await?;
    assert_eq!(recorded, 0);

    Ok(())
}

#[tokio::test]
async fn empty_cart_cannot_be_checked_out() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };

    let customer = common::create_user(&state, "customer").await?;
    let err = checkout_service::process_checkout(&state, &customer, buyer())
        .await
        .unwrap_err();
    assert!(matches!(&err, AppError::Checkout(msg) if msg == "Cart is empty"));

    let mut invalid = buyer();
    invalid.email = "not-an-email".into();
    let err = checkout_service::process_checkout(&state, &customer, invalid)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    Ok(())
}

#[tokio::test]
async fn concurrent_checkouts_cannot_oversell_the_last_item() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };

    let artisan = common::create_user(&state, "artisan").await?;
    let lamp = common::create_product(&state, &artisan, "Lamp", 7200, 1).await?;

    let first = common::create_user(&state, "customer").await?;
    let second = common::create_user(&state, "customer").await?;
    for customer in [&first, &second] {
        cart_service::add_to_cart(&state, customer, AddToCartRequest { product_id: lamp.id, quantity: 1 })
            .await?;
    }

    let (a, b) = tokio::join!(
        checkout_service::process_checkout(&state, &first, buyer()),
        checkout_service::process_checkout(&state, &second, buyer()),
    );
    let outcomes = [a, b];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    let failure = outcomes.into_iter().find_map(Result::err).expect("one checkout fails");
    assert!(matches!(&failure, AppError::Checkout(msg) if msg == "Insufficient stock for Lamp"));

    let lamp_after = Products::find_by_id(lamp.id).one(&state.orm).await?.unwrap();
    assert_eq!(lamp_after.stock, 0);

    let sold = Transactions::find()
        .filter(transactions::Column::ProductId.eq(lamp.id))
        .count(&state.orm)
        .await?;
    assert_eq!(sold, 1);

    Ok(())
}
