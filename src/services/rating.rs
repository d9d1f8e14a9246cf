//! Review aggregates computed in SQL.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    db::DbPool,
    dto::products::RatedProduct,
    error::AppResult,
    models::Product,
};

#[derive(Debug, FromRow)]
struct RatingSummaryRow {
    average_rating: Option<f64>,
    total_reviews: i64,
}

#[derive(Debug, FromRow)]
struct RatedProductRow {
    id: Uuid,
    artisan_id: Uuid,
    category_id: Option<Uuid>,
    name: String,
    description: Option<String>,
    price: i64,
    stock: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    average_rating: Option<f64>,
    total_reviews: i64,
}

impl From<RatedProductRow> for RatedProduct {
    fn from(row: RatedProductRow) -> Self {
        RatedProduct {
            product: Product {
                id: row.id,
                artisan_id: row.artisan_id,
                category_id: row.category_id,
                name: row.name,
                description: row.description,
                price: row.price,
                stock: row.stock,
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
            average_rating: row.average_rating,
            total_reviews: row.total_reviews,
        }
    }
}

/// Average rating (None without reviews) and review count for one product.
pub async fn rating_summary(pool: &DbPool, product_id: Uuid) -> AppResult<(Option<f64>, i64)> {
    let row = sqlx::query_as::<_, RatingSummaryRow>(
        r#"
        SELECT AVG(rating)::float8 AS average_rating, COUNT(*) AS total_reviews
        FROM reviews
        WHERE product_id = $1
        "#,
    )
    .bind(product_id)
    .fetch_one(pool)
    .await?;

    Ok((row.average_rating, row.total_reviews))
}

/// Products ordered by average rating; unrated products come last.
pub async fn top_rated(pool: &DbPool, limit: i64) -> AppResult<Vec<RatedProduct>> {
    let rows = sqlx::query_as::<_, RatedProductRow>(
        r#"
        SELECT p.id, p.artisan_id, p.category_id, p.name, p.description, p.price, p.stock,
               p.created_at, p.updated_at,
               AVG(r.rating)::float8 AS average_rating,
               COUNT(r.id) AS total_reviews
        FROM products p
        LEFT JOIN reviews r ON r.product_id = p.id
        GROUP BY p.id
        ORDER BY average_rating DESC NULLS LAST, total_reviews DESC, p.created_at DESC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(RatedProduct::from).collect())
}
