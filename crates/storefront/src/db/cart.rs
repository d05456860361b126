//! Cart and wishlist repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use kaaya_core::{ProductId, UserId};

use super::RepositoryError;
use crate::models::{CartLine, WishlistEntry};

#[derive(Debug, sqlx::FromRow)]
struct CartRow {
    product_id: i32,
    quantity: i32,
    added_at: DateTime<Utc>,
}

impl From<CartRow> for CartLine {
    fn from(row: CartRow) -> Self {
        Self {
            product_id: ProductId::new(row.product_id),
            quantity: row.quantity,
            added_at: row.added_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct WishlistRow {
    product_id: i32,
    added_at: DateTime<Utc>,
}

impl From<WishlistRow> for WishlistEntry {
    fn from(row: WishlistRow) -> Self {
        Self {
            product_id: ProductId::new(row.product_id),
            added_at: row.added_at,
        }
    }
}

/// Map a foreign-key violation (unknown product) to `Conflict`.
fn unknown_reference(e: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_foreign_key_violation()
    {
        return RepositoryError::Conflict("unknown product".to_owned());
    }
    RepositoryError::Database(e)
}

/// Repository for per-user cart and wishlist rows.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Cart lines in the order they were added.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lines(&self, user_id: UserId) -> Result<Vec<CartLine>, RepositoryError> {
        let rows = sqlx::query_as::<_, CartRow>(
            r"
            SELECT product_id, quantity, added_at
            FROM kaaya.cart_item
            WHERE user_id = $1
            ORDER BY added_at, product_id
            ",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(CartLine::from).collect())
    }

    /// Add units of a product, merging with an existing line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the user or product does not exist.
    pub async fn add(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<CartLine, RepositoryError> {
        let row = sqlx::query_as::<_, CartRow>(
            r"
            INSERT INTO kaaya.cart_item (user_id, product_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, product_id)
                DO UPDATE SET quantity = kaaya.cart_item.quantity + EXCLUDED.quantity
            RETURNING product_id, quantity, added_at
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(quantity)
        .fetch_one(self.pool)
        .await
        .map_err(unknown_reference)?;

        Ok(row.into())
    }

    /// Overwrite the quantity of an existing line. Returns `false` if the
    /// product is not in the cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn set_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE kaaya.cart_item SET quantity = $3 WHERE user_id = $1 AND product_id = $2",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(quantity)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Remove one line. Returns `false` if it was not there.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn remove(&self, user_id: UserId, product_id: ProductId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM kaaya.cart_item WHERE user_id = $1 AND product_id = $2")
            .bind(user_id)
            .bind(product_id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn clear(&self, user_id: UserId) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM kaaya.cart_item WHERE user_id = $1")
            .bind(user_id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Wishlist entries, most recent first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn wishlist(&self, user_id: UserId) -> Result<Vec<WishlistEntry>, RepositoryError> {
        let rows = sqlx::query_as::<_, WishlistRow>(
            r"
            SELECT product_id, added_at
            FROM kaaya.wishlist_item
            WHERE user_id = $1
            ORDER BY added_at DESC, product_id
            ",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(WishlistEntry::from).collect())
    }

    /// Add a product to the wishlist. Adding twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the user or product does not exist.
    pub async fn add_to_wishlist(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO kaaya.wishlist_item (user_id, product_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, product_id) DO NOTHING
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .execute(self.pool)
        .await
        .map_err(unknown_reference)?;

        Ok(())
    }

    /// Remove a product from the wishlist. Returns `false` if it was not there.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn remove_from_wishlist(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("DELETE FROM kaaya.wishlist_item WHERE user_id = $1 AND product_id = $2")
                .bind(user_id)
                .bind(product_id)
                .execute(self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }
}
