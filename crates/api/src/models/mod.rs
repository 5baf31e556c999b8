//! Domain models for the shop.
//!
//! These types represent validated domain objects, separate from the
//! database row types in [`crate::db`].

pub mod address;
pub mod cart;
pub mod order;
pub mod product;
pub mod session;
pub mod user;

pub use address::{Address, AddressError, AddressFields, AddressInput};
pub use cart::{Cart, CartLine};
pub use order::{Order, OrderLine, SnapshotLine};
pub use product::Product;
pub use session::{CurrentUser, SessionClaims};
pub use user::{User, UserCredentials, Username, UsernameError};
