//! Shared cart/wishlist counters.
//!
//! One [`Store`] is created by the caller and passed to whoever needs it. Every change
//! goes through [`Store::dispatch`], and each action replaces a whole slice.

/// Named slices held by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slice {
    Cart,
    Wishlist,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreAction {
    SetCartLength(usize),
    SetWishlistLength(usize),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Store {
    cart_length: usize,
    wishlist_length: usize,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies `action` and returns the slice it touched.
    pub fn dispatch(&mut self, action: StoreAction) -> Slice {
        match action {
            StoreAction::SetCartLength(length) => {
                self.cart_length = length;
                Slice::Cart
            }
            StoreAction::SetWishlistLength(length) => {
                self.wishlist_length = length;
                Slice::Wishlist
            }
        }
    }

    pub fn cart_length(&self) -> usize {
        self.cart_length
    }

    pub fn wishlist_length(&self) -> usize {
        self.wishlist_length
    }
}
