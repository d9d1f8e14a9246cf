use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use uuid::Uuid;
use validator::Validate;

use crate::{
    audit,
    dto::products::{
        CategoryList, CreateCategoryRequest, CreateProductRequest, ProductDetail, ProductList,
        RatedProduct, ReviewWithAuthor, UpdateProductRequest,
    },
    entity::{
        categories::{ActiveModel as CategoryActive, Column as CategoryCol, Entity as Categories},
        product_images::{ActiveModel as ImageActive, Column as ImageCol, Entity as ProductImages},
        products::{ActiveModel as ProductActive, Column as ProdCol, Entity as Products, Model as ProductModel},
        reviews::{Column as ReviewCol, Entity as Reviews},
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin, ensure_artisan, ensure_owner},
    models::{Category, Product, ProductImage},
    response::{ApiResponse, Meta},
    routes::params::{ProductQuery, ProductSort},
    services::rating,
    state::AppState,
};

pub const MAX_IMAGES: usize = 4;
pub const TOP_RATED_LIMIT: i64 = 3;

/// How many of `requested` new images fit next to `current` existing ones.
pub fn image_capacity(current: u64, requested: usize) -> usize {
    let free = (MAX_IMAGES as u64).saturating_sub(current) as usize;
    requested.min(free)
}

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all();

    if let Some(search) = query.q.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        condition = condition.add(
            Condition::any()
                .add(Expr::col(ProdCol::Name).ilike(pattern.clone()))
                .add(Expr::col(ProdCol::Description).ilike(pattern)),
        );
    }

    let categories = query.category_ids();
    if !categories.is_empty() {
        condition = condition.add(ProdCol::CategoryId.is_in(categories));
    }

    if let Some(min_price) = query.min_price {
        condition = condition.add(ProdCol::Price.gte(min_price));
    }

    if let Some(max_price) = query.max_price {
        condition = condition.add(ProdCol::Price.lte(max_price));
    }

    let finder = Products::find().filter(condition);
    let finder = match query.sort.unwrap_or_default() {
        ProductSort::Newest => finder.order_by_desc(ProdCol::CreatedAt),
        ProductSort::PriceAsc => finder.order_by_asc(ProdCol::Price),
        ProductSort::PriceDesc => finder.order_by_desc(ProdCol::Price),
        ProductSort::Name => finder.order_by_asc(ProdCol::Name),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Product::from)
        .collect();

    Ok(ApiResponse::paginated(
        "Products",
        ProductList { items },
        page,
        limit,
        total,
    ))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<ProductDetail>> {
    let product = find_product(&state.orm, id).await?;

    let images = ProductImages::find()
        .filter(ImageCol::ProductId.eq(id))
        .order_by_asc(ImageCol::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(ProductImage::from)
        .collect();

    let reviews = Reviews::find()
        .filter(ReviewCol::ProductId.eq(id))
        .order_by_desc(ReviewCol::CreatedAt)
        .find_also_related(Users)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|(review, author)| ReviewWithAuthor {
            id: review.id,
            user_id: review.user_id,
            user_name: author.map(|u| u.name).unwrap_or_default(),
            rating: review.rating,
            review: review.review,
            created_at: review.created_at.with_timezone(&Utc),
        })
        .collect();

    let (average_rating, total_reviews) = rating::rating_summary(&state.pool, id).await?;

    Ok(ApiResponse::success(
        "Product",
        ProductDetail {
            product: Product::from(product),
            images,
            reviews,
            average_rating,
            total_reviews,
        },
        None,
    ))
}

pub async fn top_rated_products(state: &AppState) -> AppResult<ApiResponse<Vec<RatedProduct>>> {
    let items = rating::top_rated(&state.pool, TOP_RATED_LIMIT).await?;
    Ok(ApiResponse::success("Top rated products", items, Some(Meta::empty())))
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_artisan(user)?;
    payload.validate()?;
    if let Some(category_id) = payload.category_id {
        ensure_category_exists(&state.orm, category_id).await?;
    }

    let txn = state.orm.begin().await?;
    let product = ProductActive {
        id: Set(Uuid::new_v4()),
        artisan_id: Set(user.user_id),
        category_id: Set(payload.category_id),
        name: Set(payload.name),
        description: Set(payload.description),
        price: Set(payload.price),
        stock: Set(payload.stock),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let kept = image_capacity(0, payload.images.len());
    attach_images(&txn, product.id, &payload.images[..kept]).await?;
    txn.commit().await?;

    tracing::info!(product_id = %product.id, artisan_id = %user.user_id, "product created");
    audit::record(
        &state.pool,
        user.user_id,
        "product_create",
        "products",
        serde_json::json!({ "product_id": product.id, "images": kept }),
    )
    .await;

    Ok(ApiResponse::success(
        "Product created",
        Product::from(product),
        Some(Meta::empty()),
    ))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    payload.validate()?;
    let existing = find_product(&state.orm, id).await?;
    ensure_owner(user, existing.artisan_id)?;
    if let Some(category_id) = payload.category_id {
        ensure_category_exists(&state.orm, category_id).await?;
    }

    let txn = state.orm.begin().await?;
    let mut active: ProductActive = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(name);
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    if let Some(price) = payload.price {
        active.price = Set(price);
    }
    if let Some(stock) = payload.stock {
        active.stock = Set(stock);
    }
    if let Some(category_id) = payload.category_id {
        active.category_id = Set(Some(category_id));
    }
    active.updated_at = Set(Utc::now().into());
    let product = active.update(&txn).await?;

    if !payload.images.is_empty() {
        let current = ProductImages::find()
            .filter(ImageCol::ProductId.eq(id))
            .count(&txn)
            .await?;
        let kept = image_capacity(current, payload.images.len());
        if kept < payload.images.len() {
            tracing::debug!(product_id = %id, current, dropped = payload.images.len() - kept, "image limit reached");
        }
        attach_images(&txn, id, &payload.images[..kept]).await?;
    }
    txn.commit().await?;

    audit::record(
        &state.pool,
        user.user_id,
        "product_update",
        "products",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Updated",
        Product::from(product),
        Some(Meta::empty()),
    ))
}

pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let existing = find_product(&state.orm, id).await?;
    ensure_owner(user, existing.artisan_id)?;

    let result = Products::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    audit::record(
        &state.pool,
        user.user_id,
        "product_delete",
        "products",
        serde_json::json!({ "product_id": id }),
    )
    .await;

    Ok(ApiResponse::done("Product deleted successfully."))
}

pub async fn delete_product_image(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    image_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let product = find_product(&state.orm, product_id).await?;
    ensure_owner(user, product.artisan_id)?;

    let result = ProductImages::delete_many()
        .filter(ImageCol::Id.eq(image_id))
        .filter(ImageCol::ProductId.eq(product_id))
        .exec(&state.orm)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    audit::record(
        &state.pool,
        user.user_id,
        "product_image_delete",
        "product_images",
        serde_json::json!({ "product_id": product_id, "image_id": image_id }),
    )
    .await;

    Ok(ApiResponse::done("Image deleted successfully."))
}

pub async fn list_categories(state: &AppState) -> AppResult<ApiResponse<CategoryList>> {
    let items = Categories::find()
        .order_by_asc(CategoryCol::Name)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Category::from)
        .collect();
    Ok(ApiResponse::success("Categories", CategoryList { items }, Some(Meta::empty())))
}

pub async fn create_category(
    state: &AppState,
    user: &AuthUser,
    payload: CreateCategoryRequest,
) -> AppResult<ApiResponse<Category>> {
    ensure_admin(user)?;
    payload.validate()?;
    let name = payload.name.trim().to_string();

    let exist = Categories::find()
        .filter(CategoryCol::Name.eq(name.as_str()))
        .one(&state.orm)
        .await?;
    if exist.is_some() {
        return Err(AppError::BadRequest("Category already exists".into()));
    }

    let category = CategoryActive {
        id: Set(Uuid::new_v4()),
        name: Set(name),
        description: Set(payload.description),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    audit::record(
        &state.pool,
        user.user_id,
        "category_create",
        "categories",
        serde_json::json!({ "category_id": category.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Category created",
        Category::from(category),
        Some(Meta::empty()),
    ))
}

pub(crate) async fn find_product<C: ConnectionTrait>(conn: &C, id: Uuid) -> AppResult<ProductModel> {
    Products::find_by_id(id)
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)
}

async fn ensure_category_exists<C: ConnectionTrait>(conn: &C, id: Uuid) -> AppResult<()> {
    match Categories::find_by_id(id).one(conn).await? {
        Some(_) => Ok(()),
        None => Err(AppError::BadRequest("category not found".into())),
    }
}

async fn attach_images<C: ConnectionTrait>(conn: &C, product_id: Uuid, paths: &[String]) -> AppResult<()> {
    for path in paths.iter().map(|p| p.trim()).filter(|p| !p.is_empty()) {
        ImageActive {
            id: Set(Uuid::new_v4()),
            product_id: Set(product_id),
            path: Set(path.to_string()),
            created_at: NotSet,
        }
        .insert(conn)
        .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_capacity_never_exceeds_limit() {
        assert_eq!(image_capacity(0, 2), 2);
        assert_eq!(image_capacity(0, 9), MAX_IMAGES);
        assert_eq!(image_capacity(3, 5), 1);
        assert_eq!(image_capacity(4, 1), 0);
        assert_eq!(image_capacity(7, 1), 0);
    }
}
