mod common;

use artisan_market::{
    dto::{
        products::{CreateProductRequest, UpdateProductRequest},
        reviews::CreateReviewRequest,
    },
    error::AppError,
    routes::params::{ProductQuery, ProductSort},
    services::{catalog_service, review_service},
};
use uuid::Uuid;

fn new_product(name: &str, images: usize) -> CreateProductRequest {
    CreateProductRequest {
        name: name.into(),
        description: Some("Hand made".into()),
        price: 3200,
        stock: 4,
        category_id: None,
        images: (0..images).map(|i| format!("product_images/{name}_{i}.webp")).collect(),
    }
}

#[tokio::test]
async fn artisans_manage_their_own_products() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };

    let artisan = common::create_user(&state, "artisan").await?;
    let rival = common::create_user(&state, "artisan").await?;
    let customer = common::create_user(&state, "customer").await?;

    let denied = catalog_service::create_product(&state, &customer, new_product("Jug", 0)).await;
    assert!(matches!(denied, Err(AppError::Forbidden)));

    let product = catalog_service::create_product(&state, &artisan, new_product("Jug", 6))
        .await?
        .data
        .unwrap();
    assert_eq!(product.artisan_id, artisan.user_id);

    let detail = catalog_service::get_product(&state, product.id).await?.data.unwrap();
    assert_eq!(detail.images.len(), catalog_service::MAX_IMAGES);
    assert_eq!(detail.total_reviews, 0);
    assert!(detail.average_rating.is_none());

    let patch = || UpdateProductRequest {
        name: Some("Tall Jug".into()),
        description: None,
        price: Some(3500),
        stock: None,
        category_id: None,
        images: vec!["product_images/extra.webp".into()],
    };

    let forbidden = catalog_service::update_product(&state, &rival, product.id, patch()).await;
    assert!(matches!(forbidden, Err(AppError::Forbidden)));

    let updated = catalog_service::update_product(&state, &artisan, product.id, patch())
        .await?
        .data
        .unwrap();
    assert_eq!(updated.name, "Tall Jug");
    assert_eq!(updated.price, 3500);
    assert_eq!(updated.stock, 4);

    // Already at the limit, so the extra image is dropped.
    let detail = catalog_service::get_product(&state, product.id).await?.data.unwrap();
    assert_eq!(detail.images.len(), catalog_service::MAX_IMAGES);

    let image_id = detail.images[0].id;
    let wrong_product = catalog_service::delete_product_image(&state, &artisan, Uuid::new_v4(), image_id).await;
    assert!(matches!(wrong_product, Err(AppError::NotFound)));
    catalog_service::delete_product_image(&state, &artisan, product.id, image_id).await?;
    let detail = catalog_service::get_product(&state, product.id).await?.data.unwrap();
    assert_eq!(detail.images.len(), catalog_service::MAX_IMAGES - 1);

    let forbidden = catalog_service::delete_product(&state, &rival, product.id).await;
    assert!(matches!(forbidden, Err(AppError::Forbidden)));
    catalog_service::delete_product(&state, &artisan, product.id).await?;
    let gone = catalog_service::get_product(&state, product.id).await;
    assert!(matches!(gone, Err(AppError::NotFound)));

    Ok(())
}

#[tokio::test]
async fn search_filters_by_term_and_category() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };

    let artisan = common::create_user(&state, "artisan").await?;
    let category = common::create_category(&state, "Glass").await?;
    let marker = Uuid::new_v4().simple().to_string();

    let mut cheap = new_product(&format!("Glass cup {marker}"), 0);
    cheap.category_id = Some(category);
    cheap.price = 900;
    let mut pricey = new_product(&format!("Glass vase {marker}"), 0);
    pricey.category_id = Some(category);
    pricey.price = 12000;
    let uncategorised = new_product(&format!("Clay cup {marker}"), 0);

    for payload in [cheap, pricey, uncategorised] {
        catalog_service::create_product(&state, &artisan, payload).await?;
    }

    let by_term = catalog_service::list_products(
        &state,
        ProductQuery {
            q: Some(marker.to_uppercase()),
            sort: Some(ProductSort::PriceDesc),
            ..Default::default()
        },
    )
    .await?;
    assert_eq!(by_term.meta.as_ref().unwrap().total, Some(3));
    let prices: Vec<i64> = by_term.data.unwrap().items.iter().map(|p| p.price).collect();
    assert_eq!(prices, vec![12000, 3200, 900]);

    let by_category = catalog_service::list_products(
        &state,
        ProductQuery {
            q: Some(marker.clone()),
            categories: Some(category.to_string()),
            max_price: Some(1000),
            ..Default::default()
        },
    )
    .await?;
    let items = by_category.data.unwrap().items;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].price, 900);

    Ok(())
}

#[tokio::test]
async fn product_detail_reports_average_rating() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };

    let artisan = common::create_user(&state, "artisan").await?;
    let product = common::create_product(&state, &artisan, "Rated Plate", 2000, 3).await?;

    for rating in [5, 4] {
        let reviewer = common::create_user(&state, "customer").await?;
        review_service::create_review(
            &state,
            &reviewer,
            CreateReviewRequest {
                product_id: product.id,
                rating,
                review: Some("Lovely".into()),
            },
        )
        .await?;
    }

    let detail = catalog_service::get_product(&state, product.id).await?.data.unwrap();
    assert_eq!(detail.total_reviews, 2);
    assert_eq!(detail.average_rating, Some(4.5));
    assert_eq!(detail.reviews.len(), 2);
    assert!(detail.reviews.iter().all(|r| !r.user_name.is_empty()));

    let top = catalog_service::top_rated_products(&state).await?.data.unwrap();
    assert!(top.len() <= catalog_service::TOP_RATED_LIMIT as usize);

    Ok(())
}
