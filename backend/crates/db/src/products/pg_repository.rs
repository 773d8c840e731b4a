use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Postgres, Row, Transaction};

use crate::products::models::{
    needs_history, Product, ProductApplied, ProductSnapshot, ProductStock, ProductStockHistory,
};
use crate::products::repositories::ProductRepository;
use datahub_common::error::{DatahubError, DatahubResult};

#[derive(Clone)]
pub struct PgProductRepository {
    pool: PgPool,
}

impl PgProductRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn map_stock(row: PgRow) -> ProductStock {
        ProductStock {
            product_id: row.get("product_id"),
            branch_id: row.get("branch_id"),
            price: row.get("price"),
            min_quantity: row.get("min_quantity"),
            max_quantity: row.get("max_quantity"),
            quantity_in_stock: row.get("quantity_in_stock"),
            reorder_count: row.get("reorder_count"),
            reorder_cost: row.get("reorder_cost"),
            archived: row.get("archived"),
            created_at_upstream: row.get("created_at_upstream"),
            updated_at_upstream: row.get("updated_at_upstream"),
        }
    }

    async fn locked_stock(
        tx: &mut Transaction<'_, Postgres>,
        product_id: &str,
        branch_id: &str,
    ) -> DatahubResult<Option<ProductStock>> {
        let row = sqlx::query(
            "select product_id, branch_id, price, min_quantity, max_quantity, quantity_in_stock,
                    reorder_count, reorder_cost, archived, created_at_upstream, updated_at_upstream
             from ph_product_stock
             where product_id = $1 and branch_id = $2
             for update",
        )
        .bind(product_id)
        .bind(branch_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| DatahubError::Database(e.to_string()))?;

        Ok(row.map(Self::map_stock))
    }

    async fn upsert_product(
        tx: &mut Transaction<'_, Postgres>,
        p: &Product,
    ) -> DatahubResult<bool> {
        let result = sqlx::query(
            "insert into ph_products as t
             (product_id, parent_id, name, brand_id, brand_name, category_id, category_name, code,
              barcode, type_raw, measurement_qty, measurement_unit, archived,
              created_at_upstream, updated_at_upstream)
             values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
             on conflict (product_id) do update set
               parent_id = excluded.parent_id,
               name = excluded.name,
               brand_id = excluded.brand_id,
               brand_name = excluded.brand_name,
               category_id = excluded.category_id,
               category_name = excluded.category_name,
               code = excluded.code,
               barcode = excluded.barcode,
               type_raw = excluded.type_raw,
               measurement_qty = excluded.measurement_qty,
               measurement_unit = excluded.measurement_unit,
               archived = excluded.archived,
               created_at_upstream = excluded.created_at_upstream,
               updated_at_upstream = excluded.updated_at_upstream,
               updated_at = now()
             where t.updated_at_upstream is null
                or excluded.updated_at_upstream > t.updated_at_upstream",
        )
        .bind(&p.product_id)
        .bind(&p.parent_id)
        .bind(&p.name)
        .bind(&p.brand_id)
        .bind(&p.brand_name)
        .bind(&p.category_id)
        .bind(&p.category_name)
        .bind(&p.code)
        .bind(&p.barcode)
        .bind(&p.type_raw)
        .bind(p.measurement_qty)
        .bind(&p.measurement_unit)
        .bind(p.archived)
        .bind(p.created_at_upstream)
        .bind(p.updated_at_upstream)
        .execute(&mut **tx)
        .await
        .map_err(|e| DatahubError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn upsert_stock(
        tx: &mut Transaction<'_, Postgres>,
        s: &ProductStock,
    ) -> DatahubResult<bool> {
        let result = sqlx::query(
            "insert into ph_product_stock as t
             (product_id, branch_id, price, min_quantity, max_quantity, quantity_in_stock,
              reorder_count, reorder_cost, archived, created_at_upstream, updated_at_upstream,
              last_synced_at)
             values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, now())
             on conflict (product_id, branch_id) do update set
               price = excluded.price,
               min_quantity = excluded.min_quantity,
               max_quantity = excluded.max_quantity,
               quantity_in_stock = excluded.quantity_in_stock,
               reorder_count = excluded.reorder_count,
               reorder_cost = excluded.reorder_cost,
               archived = excluded.archived,
               created_at_upstream = excluded.created_at_upstream,
               updated_at_upstream = excluded.updated_at_upstream,
               last_synced_at = now()
             where t.updated_at_upstream is null
                or excluded.updated_at_upstream > t.updated_at_upstream",
        )
        .bind(&s.product_id)
        .bind(&s.branch_id)
        .bind(s.price)
        .bind(s.min_quantity)
        .bind(s.max_quantity)
        .bind(s.quantity_in_stock)
        .bind(s.reorder_count)
        .bind(s.reorder_cost)
        .bind(s.archived)
        .bind(s.created_at_upstream)
        .bind(s.updated_at_upstream)
        .execute(&mut **tx)
        .await
        .map_err(|e| DatahubError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_history(
        tx: &mut Transaction<'_, Postgres>,
        h: &ProductStockHistory,
    ) -> DatahubResult<()> {
        sqlx::query(
            "insert into ph_product_stock_history
             (id, product_id, branch_id, snapshot_time, quantity_in_stock, price, source)
             values ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(h.id)
        .bind(&h.product_id)
        .bind(&h.branch_id)
        .bind(h.snapshot_time)
        .bind(h.quantity_in_stock)
        .bind(h.price)
        .bind(&h.source)
        .execute(&mut **tx)
        .await
        .map_err(|e| DatahubError::Database(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl ProductRepository for PgProductRepository {
    async fn apply_snapshot(
        &self,
        snapshot: &ProductSnapshot,
        snapshot_time: DateTime<Utc>,
    ) -> DatahubResult<ProductApplied> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DatahubError::Database(e.to_string()))?;

        let previous =
            Self::locked_stock(&mut tx, &snapshot.stock.product_id, &snapshot.stock.branch_id)
                .await?;
        let product_written = Self::upsert_product(&mut tx, &snapshot.product).await?;
        let stock_written = Self::upsert_stock(&mut tx, &snapshot.stock).await?;

        let history_written = stock_written && needs_history(previous.as_ref(), &snapshot.stock);
        if history_written {
            let history = ProductStockHistory::from_stock(&snapshot.stock, snapshot_time);
            Self::insert_history(&mut tx, &history).await?;
        }

        tx.commit()
            .await
            .map_err(|e| DatahubError::Database(e.to_string()))?;

        Ok(ProductApplied {
            product_written,
            stock_written,
            history_written,
        })
    }
}
