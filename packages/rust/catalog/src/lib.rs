//! Product metadata catalog backed by libSQL.
//!
//! The chat path only reads through the [`ProductCatalog`] trait; writes
//! happen offline via `manualchat catalog import`. Both the chat service and
//! the importer open the database with [`Catalog::open`], which creates the
//! file if it is missing. `manualchat catalog list` uses
//! [`Catalog::open_readonly`] and reports a missing file instead.

mod migrations;

use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, Database, Row, params};
use tracing::instrument;

use manualchat_shared::{
    Brand, ManualChatError, ManualRef, Product, ProductRef, ProductType, Result,
};

// ---------------------------------------------------------------------------
// Lookup seam
// ---------------------------------------------------------------------------

/// Looks up product metadata by `(id, type)`.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// `Ok(None)` means the product does not exist; that is not an error.
    async fn find_product(&self, product: &ProductRef) -> Result<Option<Product>>;
}

// ---------------------------------------------------------------------------
// libSQL catalog
// ---------------------------------------------------------------------------

/// Catalog handle wrapping a libSQL database.
pub struct Catalog {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

fn storage_err(e: impl std::fmt::Display) -> ManualChatError {
    ManualChatError::Storage(e.to_string())
}

impl Catalog {
    /// Open or create a catalog at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| ManualChatError::io(parent, e))?;
            }
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;
        let conn = db.connect().map_err(storage_err)?;

        let catalog = Self {
            db,
            conn,
            readonly: false,
        };
        catalog.run_migrations().await?;
        Ok(catalog)
    }

    /// Open an existing catalog for lookups only.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ManualChatError::Storage(format!(
                "catalog database not found at {}",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;
        let conn = db.connect().map_err(storage_err)?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    ManualChatError::Storage(format!(
                        "migration v{} failed: {e}",
                        migration.version
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Current schema version, or 0 before the first migration.
    async fn schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => match rows.next().await {
                Ok(Some(row)) => row.get::<u32>(0).unwrap_or(0),
                _ => 0,
            },
            Err(_) => 0,
        }
    }

    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(ManualChatError::Storage(
                "catalog is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Product operations
    // -----------------------------------------------------------------------

    /// Insert or replace a product by `(id, product_type)`.
    pub async fn upsert_product(&self, product: &Product) -> Result<()> {
        self.check_writable()?;
        let manuals: Vec<&str> = product.manuals.iter().map(|m| m.title.as_str()).collect();

        self.conn
            .execute(
                "INSERT INTO products (id, product_type, name, model, brand, category,
                    specifications_json, features_json, applications_json,
                    safety_features_json, manuals_json, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                 ON CONFLICT(id, product_type) DO UPDATE SET
                   name = excluded.name,
                   model = excluded.model,
                   brand = excluded.brand,
                   category = excluded.category,
                   specifications_json = excluded.specifications_json,
                   features_json = excluded.features_json,
                   applications_json = excluded.applications_json,
                   safety_features_json = excluded.safety_features_json,
                   manuals_json = excluded.manuals_json,
                   updated_at = excluded.updated_at",
                params![
                    product.id.as_str(),
                    product.product_type.as_str(),
                    product.name.as_str(),
                    product.model.as_str(),
                    product.brand.name.as_str(),
                    product.category.as_str(),
                    to_json(&product.specifications)?,
                    to_json(&product.features)?,
                    to_json(&product.applications)?,
                    to_json(&product.safety_features)?,
                    to_json(&manuals)?,
                    Utc::now().to_rfc3339(),
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    /// Upsert every product; returns how many were written.
    pub async fn import_products(&self, products: &[Product]) -> Result<usize> {
        for product in products {
            self.upsert_product(product).await?;
        }
        tracing::info!(count = products.len(), "imported products");
        Ok(products.len())
    }

    /// Fetch one product.
    pub async fn get_product(&self, id: &str, product_type: ProductType) -> Result<Option<Product>> {
        let mut rows = self
            .conn
            .query(
                &format!("{SELECT_PRODUCT} WHERE id = ?1 AND product_type = ?2"),
                params![id, product_type.as_str()],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_product(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(storage_err(e)),
        }
    }

    /// All products ordered by type then name.
    pub async fn list_products(&self) -> Result<Vec<Product>> {
        let mut rows = self
            .conn
            .query(
                &format!("{SELECT_PRODUCT} ORDER BY product_type, name"),
                params![],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_product(&row)?);
        }
        Ok(results)
    }
}

#[async_trait]
impl ProductCatalog for Catalog {
    #[instrument(skip_all, fields(id = %product.id, product_type = %product.product_type))]
    async fn find_product(&self, product: &ProductRef) -> Result<Option<Product>> {
        self.get_product(&product.id, product.product_type).await
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

const SELECT_PRODUCT: &str = "SELECT id, product_type, name, model, brand, category,
    specifications_json, features_json, applications_json, safety_features_json, manuals_json
    FROM products";

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(storage_err)
}

fn json_list(row: &Row, idx: i32) -> Result<Vec<String>> {
    let raw = row.get::<String>(idx).map_err(storage_err)?;
    serde_json::from_str(&raw)
        .map_err(|e| ManualChatError::Storage(format!("column {idx} is not a JSON list: {e}")))
}

fn row_to_product(row: &Row) -> Result<Product> {
    let product_type: ProductType = row.get::<String>(1).map_err(storage_err)?.parse()?;

    Ok(Product {
        id: row.get::<String>(0).map_err(storage_err)?,
        product_type,
        name: row.get::<String>(2).map_err(storage_err)?,
        model: row.get::<String>(3).map_err(storage_err)?,
        brand: Brand {
            name: row.get::<String>(4).map_err(storage_err)?,
        },
        category: row.get::<String>(5).map_err(storage_err)?,
        specifications: json_list(row, 6)?,
        features: json_list(row, 7)?,
        applications: json_list(row, 8)?,
        safety_features: json_list(row, 9)?,
        manuals: json_list(row, 10)?
            .into_iter()
            .map(|title| ManualRef { title })
            .collect(),
    })
}

// ---------------------------------------------------------------------------
// Import files
// ---------------------------------------------------------------------------

/// Parse a JSON array of products, the format `catalog import` reads.
pub fn parse_products(json: &str) -> Result<Vec<Product>> {
    serde_json::from_str(json)
        .map_err(|e| ManualChatError::validation(format!("invalid product list: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    async fn test_catalog() -> (Catalog, std::path::PathBuf) {
        let tmp = std::env::temp_dir().join(format!("mc_catalog_{}.db", Uuid::now_v7()));
        let catalog = Catalog::open(&tmp).await.expect("open test db");
        (catalog, tmp)
    }

    fn slider() -> Product {
        Product {
            id: "m-600".into(),
            product_type: ProductType::Motor,
            name: "Slider 600".into(),
            model: "SL600".into(),
            brand: Brand {
                name: "Acme".into(),
            },
            category: "Sliding gate motor".into(),
            specifications: vec!["230V".into(), "600kg max".into()],
            features: vec!["Soft start".into()],
            applications: vec!["Residential".into()],
            safety_features: vec!["Obstacle detection".into()],
            manuals: vec![ManualRef {
                title: "Installation guide".into(),
            }],
        }
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let (catalog, _) = test_catalog().await;
        assert_eq!(catalog.schema_version().await, 1);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("mc_catalog_{}.db", Uuid::now_v7()));
        let first = Catalog::open(&tmp).await.expect("first open");
        drop(first);
        let second = Catalog::open(&tmp).await.expect("second open");
        assert_eq!(second.schema_version().await, 1);
    }

    #[tokio::test]
    async fn upsert_and_find() {
        let (catalog, _) = test_catalog().await;
        catalog.upsert_product(&slider()).await.unwrap();

        let found = catalog
            .find_product(&ProductRef {
                id: "m-600".into(),
                product_type: ProductType::Motor,
            })
            .await
            .unwrap();
        assert_eq!(found, Some(slider()));
    }

    #[tokio::test]
    async fn type_is_part_of_the_key() {
        let (catalog, _) = test_catalog().await;
        catalog.upsert_product(&slider()).await.unwrap();

        let wrong_type = catalog
            .find_product(&ProductRef {
                id: "m-600".into(),
                product_type: ProductType::Gate,
            })
            .await
            .unwrap();
        assert!(wrong_type.is_none());
    }

    #[tokio::test]
    async fn upsert_replaces() {
        let (catalog, _) = test_catalog().await;
        catalog.upsert_product(&slider()).await.unwrap();

        let mut updated = slider();
        updated.features.push("Battery backup".into());
        catalog.upsert_product(&updated).await.unwrap();

        let all = catalog.list_products().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].features, vec!["Soft start", "Battery backup"]);
    }

    #[tokio::test]
    async fn readonly_rejects_writes() {
        let (catalog, path) = test_catalog().await;
        catalog.upsert_product(&slider()).await.unwrap();
        drop(catalog);

        let ro = Catalog::open_readonly(&path).await.unwrap();
        assert!(ro.upsert_product(&slider()).await.is_err());
        assert_eq!(ro.list_products().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn readonly_requires_existing_file() {
        let tmp = std::env::temp_dir().join(format!("mc_catalog_missing_{}.db", Uuid::now_v7()));
        assert!(Catalog::open_readonly(&tmp).await.is_err());
    }

    #[tokio::test]
    async fn import_from_json() {
        let json = r#"[
            {"id": "d-1", "productType": "door", "name": "Roll-up door"},
            {"id": "c-1", "productType": "controlSystem", "name": "Controller",
             "manuals": [{"title": "Wiring"}]}
        ]"#;
        let products = parse_products(json).unwrap();

        let (catalog, _) = test_catalog().await;
        assert_eq!(catalog.import_products(&products).await.unwrap(), 2);

        let all = catalog.list_products().await.unwrap();
        let types: Vec<_> = all.iter().map(|p| p.product_type).collect();
        assert_eq!(types, vec![ProductType::ControlSystem, ProductType::Door]);
        assert_eq!(all[0].manuals[0].title, "Wiring");
    }

    #[test]
    fn parse_rejects_unknown_type() {
        let err = parse_products(r#"[{"id": "x", "productType": "window", "name": "W"}]"#)
            .unwrap_err();
        assert!(matches!(err, ManualChatError::Validation { .. }));
    }
}
