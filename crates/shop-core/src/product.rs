//! # Product Types
//!
//! Catalog types for the storefront's downloadable goods.
//! Products are owned by the catalog/admin side; the order pipeline only
//! reads them back when materializing an order.

use crate::locale::Locale;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Fixed set of product categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductCategory {
    Brushes,
    Stickers,
    Templates,
    Planners,
}

impl ProductCategory {
    /// Database/text representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductCategory::Brushes => "BRUSHES",
            ProductCategory::Stickers => "STICKERS",
            ProductCategory::Templates => "TEMPLATES",
            ProductCategory::Planners => "PLANNERS",
        }
    }
}

impl std::str::FromStr for ProductCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "BRUSHES" => Ok(ProductCategory::Brushes),
            "STICKERS" => Ok(ProductCategory::Stickers),
            "TEMPLATES" => Ok(ProductCategory::Templates),
            "PLANNERS" => Ok(ProductCategory::Planners),
            other => Err(format!("unknown product category: {}", other)),
        }
    }
}

/// A downloadable product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Catalog identifier
    pub id: String,

    /// Display name
    pub name: String,

    /// Current list price in dollars
    pub price: Decimal,

    /// English description
    pub description: String,

    /// French description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_fr: Option<String>,

    pub category: ProductCategory,

    /// Storage path of the downloadable archive
    pub zip_file_path: String,

    /// Storage paths of preview images
    #[serde(default)]
    pub image_paths: Vec<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Create a product with the required fields
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        price: Decimal,
        category: ProductCategory,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            price,
            description: String::new(),
            description_fr: None,
            category,
            zip_file_path: String::new(),
            image_paths: Vec::new(),
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Builder: set English and optional French description
    pub fn with_description(mut self, en: impl Into<String>, fr: Option<String>) -> Self {
        self.description = en.into();
        self.description_fr = fr;
        self
    }

    /// Builder: set the archive path
    pub fn with_zip(mut self, path: impl Into<String>) -> Self {
        self.zip_file_path = path.into();
        self
    }

    /// Description in the requested locale, English when no translation exists
    pub fn localized_description(&self, locale: Locale) -> &str {
        match (locale, self.description_fr.as_deref()) {
            (Locale::Fr, Some(fr)) if !fr.is_empty() => fr,
            _ => &self.description,
        }
    }
}
