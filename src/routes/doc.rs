use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{LoginRequest, LoginResponse, RegisterRequest},
        cart::{AddToCartRequest, CartItemDto, CartList, UpdateCartRequest},
        checkout::{CheckoutRequest, CheckoutResult, TransactionList},
        products::{
            CategoryList, CreateCategoryRequest, CreateProductRequest, ProductDetail, ProductList,
            RatedProduct, ReviewWithAuthor, UpdateProductRequest,
        },
        reviews::{CreateReviewRequest, ReviewList, UpdateReviewRequest},
    },
    models::{CartItem, Category, Product, ProductImage, Review, Transaction, User},
    response::{ApiResponse, Meta},
    routes::{
        auth, cart, categories, checkout, dashboard, health, params, products, reviews,
    },
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        health::readiness,
        auth::login,
        auth::register,
        categories::list_categories,
        categories::create_category,
        products::list_products,
        products::top_rated_products,
        products::get_product,
        products::create_product,
        products::update_product,
        products::delete_product,
        products::delete_product_image,
        products::list_product_reviews,
        cart::cart_list,
        cart::add_to_cart,
        cart::update_cart_item,
        cart::remove_from_cart,
        checkout::checkout_summary,
        checkout::process_checkout,
        checkout::list_purchases,
        dashboard::list_sales,
        dashboard::mark_as_sent,
        reviews::create_review,
        reviews::update_review,
        reviews::delete_review
    ),
    components(
        schemas(
            User,
            Category,
            Product,
            ProductImage,
            CartItem,
            Review,
            Transaction,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            AddToCartRequest,
            UpdateCartRequest,
            CartItemDto,
            CartList,
            CheckoutRequest,
            CheckoutResult,
            TransactionList,
            CreateProductRequest,
            UpdateProductRequest,
            ProductList,
            ProductDetail,
            RatedProduct,
            ReviewWithAuthor,
            CreateCategoryRequest,
            CategoryList,
            CreateReviewRequest,
            UpdateReviewRequest,
            ReviewList,
            params::Pagination,
            params::ProductSort,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<CartList>,
            ApiResponse<CheckoutResult>,
            ApiResponse<TransactionList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness and readiness"),
        (name = "Auth", description = "Registration and login"),
        (name = "Categories", description = "Product categories"),
        (name = "Products", description = "Catalog endpoints"),
        (name = "Cart", description = "Per-user shopping cart"),
        (name = "Checkout", description = "Checkout and purchase history"),
        (name = "Dashboard", description = "Artisan sales"),
        (name = "Reviews", description = "Product reviews"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
