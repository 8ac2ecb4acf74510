use serde::{Deserialize, Serialize};

/// Display names longer than this are cut and suffixed with "...".
pub const TITLE_DISPLAY_LEN: usize = 30;

/// Smallest purchasable unit of a product.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SizeVariant {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub discount_price: Option<f64>,
}

/// Color/style grouping of a product.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub size_variants: Vec<SizeVariant>,
}

/// Product as returned by the catalog endpoint.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default, alias = "averageRating")]
    pub rating: Option<f64>,
    #[serde(default)]
    pub variants: Vec<Variant>,
}

impl Product {
    /// First size-variant of the first variant. Prices never aggregate across variants.
    pub fn primary_size_variant(&self) -> Option<&SizeVariant> {
        self.variants.first()?.size_variants.first()
    }

    /// Discount price when present, list price otherwise.
    pub fn effective_price(&self) -> Option<f64> {
        let size = self.primary_size_variant()?;
        size.discount_price.or(size.price)
    }

    pub fn image(&self) -> Option<&str> {
        self.variants.first()?.images.first().map(String::as_str)
    }

    pub fn summary(&self) -> ProductSummary {
        ProductSummary {
            id: self.id.clone(),
            title: truncate_title(&self.title),
            image: self.image().map(str::to_string),
            price: self.effective_price(),
            category: self.category.clone(),
            gender: self.gender.clone(),
            rating: self.rating.unwrap_or(0.0).clamp(0.0, 5.0),
        }
    }
}

/// Read-only projection rendered by product listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductSummary {
    pub id: String,
    pub title: String,
    pub image: Option<String>,
    pub price: Option<f64>,
    pub category: Option<String>,
    pub gender: Option<String>,
    pub rating: f64,
}

/// One page of `GET /products/get`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPage {
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub current_page: u32,
}

impl ProductPage {
    pub fn has_next(&self) -> bool {
        self.current_page < self.total_pages
    }
}

pub fn truncate_title(title: &str) -> String {
    if title.chars().count() <= TITLE_DISPLAY_LEN {
        return title.to_string();
    }
    let cut: String = title.chars().take(TITLE_DISPLAY_LEN).collect();
    format!("{}...", cut.trim_end())
}
