pub mod carts;
pub mod catalog;
pub mod checkout;
pub mod orders;
pub mod reconciliation;

pub use carts::{AddToCartInput, CartItemView, CartService, CartSummary, UpdateQuantityInput};
pub use catalog::CatalogService;
pub use checkout::{CheckoutService, CheckoutSessionCreated};
pub use orders::{OrderItemView, OrderService, OrderView};
pub use reconciliation::{CheckoutStatusView, ReconciliationService};
