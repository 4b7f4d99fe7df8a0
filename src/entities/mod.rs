/// Storefront entities module
pub mod cart_item;
pub mod checkout_session;
pub mod order;
pub mod order_item;
pub mod product;

// Re-export entities
pub use cart_item::{Entity as CartItem, Model as CartItemModel};
pub use checkout_session::{
    CheckoutStatus, Entity as CheckoutSession, LineSnapshot, Model as CheckoutSessionModel,
};
pub use order::{Entity as Order, Model as OrderModel, PaymentStatus};
pub use order_item::{Entity as OrderItem, Model as OrderItemModel};
pub use product::{Entity as Product, Model as ProductModel};
