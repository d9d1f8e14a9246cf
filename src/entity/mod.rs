pub mod cart_items;
pub mod categories;
pub mod product_images;
pub mod products;
pub mod reviews;
pub mod transactions;
pub mod users;

pub use cart_items::Entity as CartItems;
pub use categories::Entity as Categories;
pub use product_images::Entity as ProductImages;
pub use products::Entity as Products;
pub use reviews::Entity as Reviews;
pub use transactions::Entity as Transactions;
pub use users::Entity as Users;
