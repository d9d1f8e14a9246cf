use artisan_market::{
    config::AppConfig,
    db::{DbPool, create_pool, run_migrations},
    services::auth_service::hash_password,
    state::AppState,
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url, 2).await?;
    let state = AppState::new(pool);
    // Ensure migrations are applied.
    run_migrations(&state.orm).await?;

    let admin_id = ensure_user(&state.pool, "Admin", "admin@example.com", "admin12345", "admin").await?;
    let artisan_id = ensure_user(&state.pool, "Ada Potter", "artisan@example.com", "artisan123", "artisan").await?;
    let customer_id = ensure_user(&state.pool, "Carl Customer", "customer@example.com", "customer123", "customer").await?;
    let categories = seed_categories(&state.pool).await?;
    seed_products(&state.pool, artisan_id, &categories).await?;

    println!(
        "Seed completed. Admin ID: {admin_id}, Artisan ID: {artisan_id}, Customer ID: {customer_id}"
    );
    Ok(())
}

async fn ensure_user(
    pool: &DbPool,
    name: &str,
    email: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let password_hash = hash_password(password).map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let (user_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, name, email, password_hash, role)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(email)
    .bind(password_hash)
    .bind(role)
    .fetch_one(pool)
    .await?;

    println!("Ensured user {email} (role={role})");
    Ok(user_id)
}

async fn seed_categories(pool: &DbPool) -> anyhow::Result<Vec<Uuid>> {
    let categories = [
        ("Ceramics", "Hand thrown pottery"),
        ("Textiles", "Woven and knitted goods"),
        ("Woodwork", "Carved and turned wood"),
    ];

    let mut ids = Vec::with_capacity(categories.len());
    for (name, description) in categories {
        let (id,): (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO categories (id, name, description)
            VALUES ($1, $2, $3)
            ON CONFLICT (name) DO UPDATE SET description = EXCLUDED.description
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(description)
        .fetch_one(pool)
        .await?;
        ids.push(id);
    }

    println!("Seeded categories");
    Ok(ids)
}

async fn seed_products(pool: &DbPool, artisan_id: Uuid, categories: &[Uuid]) -> anyhow::Result<()> {
    let existing: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products WHERE artisan_id = $1")
        .bind(artisan_id)
        .fetch_one(pool)
        .await?;
    if existing.0 > 0 {
        println!("Products already seeded");
        return Ok(());
    }

    let products = [
        ("Stoneware Mug", "Glazed mug, 350ml", 2400_i64, 30, 0),
        ("Serving Bowl", "Wide bowl with speckled glaze", 5600, 12, 0),
        ("Wool Scarf", "Hand knitted merino scarf", 4500, 20, 1),
        ("Walnut Spoon", "Carved walnut cooking spoon", 1800, 50, 2),
    ];

    for (name, desc, price, stock, category) in products {
        sqlx::query(
            r#"
            INSERT INTO products (id, artisan_id, category_id, name, description, price, stock)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(artisan_id)
        .bind(categories.get(category).copied())
        .bind(name)
        .bind(desc)
        .bind(price)
        .bind(stock)
        .execute(pool)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}
