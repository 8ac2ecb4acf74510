//! Client-side faceted filtering of a product listing.
//!
//! Facets combine with AND, selections inside a facet combine with OR, and an empty
//! selection leaves the facet unconstrained. Source order is always preserved.

use std::collections::BTreeSet;

use super::models::Product;

/// Inclusive price bounds applied to the effective price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
}

impl PriceRange {
    pub const UNBOUNDED: PriceRange = PriceRange {
        min: 0.0,
        max: f64::INFINITY,
    };

    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn is_unbounded(&self) -> bool {
        *self == Self::UNBOUNDED
    }

    pub fn contains(&self, price: f64) -> bool {
        price >= self.min && price <= self.max
    }
}

impl Default for PriceRange {
    fn default() -> Self {
        Self::UNBOUNDED
    }
}

/// Current selection across all facets.
///
/// Only [`FilterState::update`] mutates it, so partial changes from different
/// controls never clobber each other.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterState {
    price_range: PriceRange,
    categories: BTreeSet<String>,
    genders: BTreeSet<String>,
    ratings: BTreeSet<u8>,
    discounts: BTreeSet<u8>,
}

/// Partial change to a [`FilterState`]; `None` leaves the facet as it is.
#[derive(Debug, Clone, Default)]
pub struct FilterPatch {
    pub price_range: Option<PriceRange>,
    pub categories: Option<BTreeSet<String>>,
    pub genders: Option<BTreeSet<String>>,
    pub ratings: Option<BTreeSet<u8>>,
    pub discounts: Option<BTreeSet<u8>>,
}

impl FilterPatch {
    pub fn price_range(mut self, min: f64, max: f64) -> Self {
        self.price_range = Some(PriceRange::new(min, max));
        self
    }

    pub fn categories<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn genders<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.genders = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn ratings(mut self, buckets: impl IntoIterator<Item = u8>) -> Self {
        self.ratings = Some(buckets.into_iter().collect());
        self
    }

    pub fn discounts(mut self, thresholds: impl IntoIterator<Item = u8>) -> Self {
        self.discounts = Some(thresholds.into_iter().collect());
        self
    }
}

impl FilterState {
    pub fn update(&mut self, patch: FilterPatch) {
        if let Some(range) = patch.price_range {
            self.price_range = range;
        }
        if let Some(categories) = patch.categories {
            self.categories = categories;
        }
        if let Some(genders) = patch.genders {
            self.genders = genders;
        }
        if let Some(ratings) = patch.ratings {
            self.ratings = ratings;
        }
        if let Some(discounts) = patch.discounts {
            self.discounts = discounts;
        }
    }

    pub fn price_range(&self) -> PriceRange {
        self.price_range
    }

    pub fn categories(&self) -> &BTreeSet<String> {
        &self.categories
    }

    pub fn genders(&self) -> &BTreeSet<String> {
        &self.genders
    }

    pub fn ratings(&self) -> &BTreeSet<u8> {
        &self.ratings
    }

    pub fn discounts(&self) -> &BTreeSet<u8> {
        &self.discounts
    }

    pub fn is_empty(&self) -> bool {
        self.price_range.is_unbounded()
            && self.categories.is_empty()
            && self.genders.is_empty()
            && self.ratings.is_empty()
            && self.discounts.is_empty()
    }

    pub fn matches(&self, product: &Product) -> bool {
        self.matches_price(product)
            && matches_set(&self.categories, product.category.as_deref())
            && matches_set(&self.genders, product.gender.as_deref())
            && self.matches_rating(product)
            && self.matches_discount(product)
    }

    fn matches_price(&self, product: &Product) -> bool {
        if self.price_range.is_unbounded() {
            return true;
        }
        product
            .effective_price()
            .is_some_and(|price| self.price_range.contains(price))
    }

    fn matches_rating(&self, product: &Product) -> bool {
        if self.ratings.is_empty() {
            return true;
        }
        product
            .rating
            .filter(|rating| rating.is_finite() && *rating >= 0.0)
            .is_some_and(|rating| self.ratings.contains(&(rating.floor() as u8)))
    }

    fn matches_discount(&self, product: &Product) -> bool {
        if self.discounts.is_empty() {
            return true;
        }
        let Some(percent) = discount_percent(product) else {
            return false;
        };
        self.discounts
            .iter()
            .any(|threshold| percent >= f64::from(*threshold))
    }
}

fn matches_set(selected: &BTreeSet<String>, value: Option<&str>) -> bool {
    if selected.is_empty() {
        return true;
    }
    value.is_some_and(|value| selected.contains(value))
}

/// Percentage off the list price of the primary size-variant.
///
/// `None` when the product has no size data or no positive list price. A size-variant
/// without a discount price is 0% off.
pub fn discount_percent(product: &Product) -> Option<f64> {
    let size = product.primary_size_variant()?;
    let price = size.price.filter(|price| *price > 0.0)?;
    let discounted = size.discount_price.unwrap_or(price);
    Some((price - discounted) * 100.0 / price)
}

/// Products matching every facet of `state`, in source order.
pub fn apply_filters(products: &[Product], state: &FilterState) -> Vec<Product> {
    products
        .iter()
        .filter(|product| state.matches(product))
        .cloned()
        .collect()
}
