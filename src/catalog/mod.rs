pub mod filter;
pub mod models;
pub mod reviews;

pub use filter::{FilterPatch, FilterState, PriceRange, apply_filters, discount_percent};
pub use models::{Product, ProductPage, ProductSummary, SizeVariant, Variant};
pub use reviews::{NewReview, Review, average_rating, reviews_for_variant};
