//! Product resource: wire DTOs, the model and the mapper between them.

use relay::{HttpClient, NormalizedError};
use serde::{Deserialize, Serialize};

use crate::{CrudClient, Mapper, Result};

/// Product as sent by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDto {
    /// Identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Free-text description.
    pub description: String,
    /// Price in cents.
    pub price_cents: i64,
    /// Category slug.
    pub category: String,
    /// Units in stock.
    pub stock_quantity: u32,
    /// Picture URL.
    #[serde(default)]
    pub image_url: String,
    /// Creation timestamp, as sent by the server.
    pub created_at: String,
    /// Last update timestamp, as sent by the server.
    pub updated_at: String,
}

/// Product handed to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Free-text description.
    pub description: String,
    /// Price in currency units.
    pub price: f64,
    /// Price rendered as `$X.YY`.
    pub formatted_price: String,
    /// Category slug.
    pub category: String,
    /// Units in stock.
    pub stock_quantity: u32,
    /// Whether any stock is left.
    pub in_stock: bool,
    /// Picture URL.
    pub image_url: String,
    /// Creation timestamp, as sent by the server.
    pub created_at: String,
    /// Last update timestamp, as sent by the server.
    pub updated_at: String,
}

/// Fields accepted when creating or updating a product.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDraft {
    /// Display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Free-text description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Price in currency units.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    /// Category slug.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Units in stock.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock_quantity: Option<u32>,
    /// Picture URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// Wire form of a [`ProductDraft`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDraftDto {
    /// Display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Free-text description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Price in cents.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_cents: Option<i64>,
    /// Category slug.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Units in stock.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock_quantity: Option<u32>,
    /// Picture URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// Maps [`ProductDto`] to [`Product`] and [`ProductDraft`] to [`ProductDraftDto`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ProductMapper;

impl Mapper for ProductMapper {
    type Model = Product;
    type Dto = ProductDto;
    type Draft = ProductDraft;
    type DraftDto = ProductDraftDto;

    #[allow(clippy::cast_precision_loss)]
    fn from_dto(&self, dto: ProductDto) -> Product {
        let price = dto.price_cents as f64 / 100.0;
        Product {
            formatted_price: format!("${price:.2}"),
            in_stock: dto.stock_quantity > 0,
            id: dto.id,
            name: dto.name,
            description: dto.description,
            price,
            category: dto.category,
            stock_quantity: dto.stock_quantity,
            image_url: dto.image_url,
            created_at: dto.created_at,
            updated_at: dto.updated_at,
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn to_dto(&self, draft: &ProductDraft) -> ProductDraftDto {
        ProductDraftDto {
            name: draft.name.clone(),
            description: draft.description.clone(),
            price_cents: draft.price.map(|price| (price * 100.0).round() as i64),
            category: draft.category.clone(),
            stock_quantity: draft.stock_quantity,
            image_url: draft.image_url.clone(),
        }
    }
}

/// CRUD client specialised for products.
pub type ProductClient<C = relay::Pipeline> = CrudClient<ProductMapper, C>;

impl<C> CrudClient<ProductMapper, C>
where
    C: HttpClient<Error = NormalizedError>,
{
    /// Products in a category.
    pub async fn by_category(&self, category: &str) -> Result<Vec<Product>> {
        self.get_all_with([("category", category)].as_slice()).await
    }

    /// Products matching a free-text query.
    pub async fn search(&self, query: &str) -> Result<Vec<Product>> {
        self.get_all_with([("search", query)].as_slice()).await
    }

    /// Products with stock left.
    pub async fn in_stock(&self) -> Result<Vec<Product>> {
        self.get_all_with([("inStock", "true")].as_slice()).await
    }
}
