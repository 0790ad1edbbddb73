//! Session-related types.

/// Session keys.
pub mod keys {
    /// Opaque token that ties a browser session to its carts.
    pub const CART_TOKEN: &str = "cart_token";
}
