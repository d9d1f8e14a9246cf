pub mod auth_service;
pub mod cart_service;
pub mod catalog_service;
pub mod checkout_service;
pub mod dashboard_service;
pub mod rating;
pub mod review_service;
