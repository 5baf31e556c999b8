//! Business logic services.
//!
//! # Services
//!
//! - `auth` - Registration, password login, sessions and the admin flag
//! - `two_factor` - TOTP enrollment and removal
//! - `cart` - Per-user cart
//! - `addresses` - Find-or-create shipping addresses
//! - `checkout` - Atomic order placement
//! - `orders` - Order reads and admin status updates
//!
//! Services borrow the pool for the duration of a request and are built in
//! handlers, e.g. `CartService::new(state.pool())`.

pub mod addresses;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod orders;
pub mod two_factor;
