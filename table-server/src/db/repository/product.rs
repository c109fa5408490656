//! Product Repository

use surrealdb::engine::local::Db;
use surrealdb::{RecordId, Surreal};

use super::{BaseRepository, RepoError, RepoResult};
use crate::db::models::ProductRow;
use shared::ProductCreate;

const TABLE: &str = "product";

#[derive(Clone)]
pub struct ProductRepository {
    base: BaseRepository,
}

impl ProductRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    /// Find all active products
    pub async fn find_all(&self) -> RepoResult<Vec<ProductRow>> {
        let products: Vec<ProductRow> = self
            .base
            .db()
            .query("SELECT * FROM product WHERE is_active = true ORDER BY name")
            .await?
            .take(0)?;
        Ok(products)
    }

    /// Find product by id
    pub async fn find_by_id(&self, id: &RecordId) -> RepoResult<Option<ProductRow>> {
        let product: Option<ProductRow> = self.base.db().select(id.clone()).await?;
        Ok(product)
    }

    /// 按 id 集合批量查找 (购物车水合用)
    pub async fn find_by_ids(&self, ids: Vec<RecordId>) -> RepoResult<Vec<ProductRow>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let products: Vec<ProductRow> = self
            .base
            .db()
            .query("SELECT * FROM product WHERE id IN $ids")
            .bind(("ids", ids))
            .await?
            .take(0)?;
        Ok(products)
    }

    /// Create a new product
    pub async fn create(&self, data: ProductCreate) -> RepoResult<ProductRow> {
        let product = ProductRow {
            id: None,
            name: data.name,
            price: data.price,
            is_active: true,
        };
        let created: Option<ProductRow> = self.base.db().create(TABLE).content(product).await?;
        created.ok_or_else(|| RepoError::Database("Failed to create product".to_string()))
    }
}
