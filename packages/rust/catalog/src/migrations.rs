//! SQL migration definitions for the product catalog database.
//!
//! Migrations are applied in order on database open.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: products keyed by (id, product_type)",
        sql: r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- List-valued columns hold JSON arrays of strings.
CREATE TABLE IF NOT EXISTS products (
    id                   TEXT NOT NULL,
    product_type         TEXT NOT NULL,
    name                 TEXT NOT NULL,
    model                TEXT NOT NULL DEFAULT '',
    brand                TEXT NOT NULL DEFAULT '',
    category             TEXT NOT NULL DEFAULT '',
    specifications_json  TEXT NOT NULL DEFAULT '[]',
    features_json        TEXT NOT NULL DEFAULT '[]',
    applications_json    TEXT NOT NULL DEFAULT '[]',
    safety_features_json TEXT NOT NULL DEFAULT '[]',
    manuals_json         TEXT NOT NULL DEFAULT '[]',
    updated_at           TEXT NOT NULL,
    PRIMARY KEY (id, product_type)
);

CREATE INDEX IF NOT EXISTS idx_products_type ON products(product_type);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
