use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use std::{num::NonZeroU32, sync::Arc};
use uuid::Uuid;

use crate::{
    error::{StoreError, StoreResult},
    models::{
        CartItem, CartKey, CartLine, CreateProductRequest, NewUser, Product, RemoveOutcome, Role,
        UpdateProductRequest, UpdateUserRequest, User, UserRecord,
    },
};

/// CartStore Trait
///
/// Persistence contract for cart lines keyed by `(user_id, product_id)`.
/// Every mutating method is a single atomic step against the backing store: the
/// cart engine never reads a line and then writes it back, so two requests on the
/// same key serialize here and nowhere else.
///
/// **Send + Sync + async_trait** keep `Arc<dyn CartStore>` shareable across
/// axum's tasks.
#[async_trait]
pub trait CartStore: Send + Sync {
    async fn get(&self, key: CartKey) -> StoreResult<Option<CartLine>>;

    /// Creates the line with `quantity = delta`, or adds `delta` to an existing line.
    async fn upsert_increment(&self, key: CartKey, delta: NonZeroU32) -> StoreResult<CartLine>;

    /// Takes one unit out of the line. Decrements when more than one unit is
    /// held, deletes the line when the last unit goes, and returns `None` when
    /// there is no line at all. All of it happens in one transaction.
    async fn remove_one(&self, key: CartKey) -> StoreResult<Option<RemoveOutcome>>;

    /// Deletes the line if its quantity has reached zero or below.
    async fn delete_if_zero_or_below(&self, key: CartKey) -> StoreResult<bool>;

    /// Removes every line the user holds; returns how many went.
    async fn delete_all(&self, user_id: Uuid) -> StoreResult<u64>;

    /// All of the user's lines joined with their products.
    async fn list(&self, user_id: Uuid) -> StoreResult<Vec<CartItem>>;
}

/// ProductCatalog Trait
///
/// The product collaborator. The cart only needs `get_product`; the rest backs the
/// role-gated catalogue routes.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn get_product(&self, id: Uuid) -> StoreResult<Option<Product>>;
    async fn list_products(&self) -> StoreResult<Vec<Product>>;
    async fn find_product_by_title(&self, title: &str) -> StoreResult<Option<Product>>;
    async fn create_product(&self, req: CreateProductRequest) -> StoreResult<Product>;
    async fn update_product(
        &self,
        id: Uuid,
        req: UpdateProductRequest,
    ) -> StoreResult<Option<Product>>;
    async fn delete_product(&self, id: Uuid) -> StoreResult<bool>;
}

/// UserDirectory Trait
///
/// Account lookup for login plus the superuser account management.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>>;
    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<UserRecord>>;
    /// Every account, ordered by email.
    async fn list_users(&self) -> StoreResult<Vec<User>>;
    /// Returns `None` when the email is already taken.
    async fn create_user(&self, new_user: NewUser) -> StoreResult<Option<User>>;
    /// Partial update. `StoreError::Duplicate` when the new email belongs to
    /// another account; `None` when the user does not exist.
    async fn update_user(&self, id: Uuid, req: UpdateUserRequest) -> StoreResult<Option<User>>;
    async fn update_role(&self, id: Uuid, role: Role) -> StoreResult<Option<User>>;
    async fn update_password(&self, id: Uuid, password_hash: String) -> StoreResult<bool>;
    /// Deleting an account also drops its cart lines.
    async fn delete_user(&self, id: Uuid) -> StoreResult<bool>;
}

pub type CartStoreState = Arc<dyn CartStore>;
pub type CatalogState = Arc<dyn ProductCatalog>;
pub type UserDirectoryState = Arc<dyn UserDirectory>;

// --- Postgres ---

/// PostgresRepository
///
/// Implements all three contracts over one connection pool. The uniqueness of
/// `(user_id, product_id)` in `cart_lines` is what makes the increment upsert
/// well-defined.
#[derive(Clone)]
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Row shape of the cart/product join; mapped into `CartItem`.
#[derive(FromRow)]
struct CartItemRow {
    user_id: Uuid,
    product_id: Uuid,
    quantity: i32,
    title: String,
    description: String,
    price: f64,
    rating: f64,
    created_at: DateTime<Utc>,
}

impl From<CartItemRow> for CartItem {
    fn from(row: CartItemRow) -> Self {
        CartItem {
            user_id: row.user_id,
            product_id: row.product_id,
            quantity: row.quantity,
            product: Product {
                id: row.product_id,
                title: row.title,
                description: row.description,
                price: row.price,
                rating: row.rating,
                created_at: row.created_at,
            },
        }
    }
}

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    role: String,
    password_hash: String,
}

impl TryFrom<UserRow> for UserRecord {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = row.role.parse::<Role>().map_err(StoreError::Unavailable)?;
        Ok(UserRecord {
            user: User {
                id: row.id,
                name: row.name,
                email: row.email,
                role,
            },
            password_hash: row.password_hash,
        })
    }
}

/// Account row without the password hash, for listings and updates.
#[derive(FromRow)]
struct PublicUserRow {
    id: Uuid,
    name: String,
    email: String,
    role: String,
}

impl TryFrom<PublicUserRow> for User {
    type Error = StoreError;

    fn try_from(row: PublicUserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.id,
            name: row.name,
            email: row.email,
            role: row.role.parse::<Role>().map_err(StoreError::Unavailable)?,
        })
    }
}

fn to_i32(delta: NonZeroU32) -> StoreResult<i32> {
    i32::try_from(delta.get())
        .map_err(|_| StoreError::Unavailable(format!("increment {delta} out of range")))
}

#[async_trait]
impl CartStore for PostgresRepository {
    async fn get(&self, key: CartKey) -> StoreResult<Option<CartLine>> {
        let line = sqlx::query_as::<_, CartLine>(
            "SELECT user_id, product_id, quantity FROM cart_lines WHERE user_id = $1 AND product_id = $2",
        )
        .bind(key.user_id)
        .bind(key.product_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(line)
    }

    /// upsert_increment
    ///
    /// One `INSERT .. ON CONFLICT DO UPDATE` statement: Postgres takes the row lock
    /// for the conflicting key, so concurrent increments on the same line queue up
    /// instead of overwriting each other. A product deleted under our feet surfaces
    /// as `StoreError::MissingReference`.
    async fn upsert_increment(&self, key: CartKey, delta: NonZeroU32) -> StoreResult<CartLine> {
        let line = sqlx::query_as::<_, CartLine>(
            r#"
            INSERT INTO cart_lines (user_id, product_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, product_id)
            DO UPDATE SET quantity = cart_lines.quantity + EXCLUDED.quantity
            RETURNING user_id, product_id, quantity
            "#,
        )
        .bind(key.user_id)
        .bind(key.product_id)
        .bind(to_i32(delta)?)
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::classify)?;
        Ok(line)
    }

    /// remove_one
    ///
    /// Locks the line with `FOR UPDATE` inside a transaction, then either
    /// decrements or deletes it. If the request is dropped before `commit`, the
    /// transaction rolls back and the line is untouched.
    async fn remove_one(&self, key: CartKey) -> StoreResult<Option<RemoveOutcome>> {
        let mut tx = self.pool.begin().await?;

        let quantity: Option<i32> = sqlx::query_scalar(
            "SELECT quantity FROM cart_lines WHERE user_id = $1 AND product_id = $2 FOR UPDATE",
        )
        .bind(key.user_id)
        .bind(key.product_id)
        .fetch_optional(&mut *tx)
        .await?;

        let outcome = match quantity {
            None => {
                tx.rollback().await?;
                return Ok(None);
            }
            Some(q) if q > 1 => {
                let line = sqlx::query_as::<_, CartLine>(
                    r#"
                    UPDATE cart_lines SET quantity = quantity - 1
                    WHERE user_id = $1 AND product_id = $2
                    RETURNING user_id, product_id, quantity
                    "#,
                )
                .bind(key.user_id)
                .bind(key.product_id)
                .fetch_one(&mut *tx)
                .await?;
                RemoveOutcome::Decremented(line)
            }
            Some(_) => {
                sqlx::query("DELETE FROM cart_lines WHERE user_id = $1 AND product_id = $2")
                    .bind(key.user_id)
                    .bind(key.product_id)
                    .execute(&mut *tx)
                    .await?;
                RemoveOutcome::Removed
            }
        };

        tx.commit().await?;
        Ok(Some(outcome))
    }

    async fn delete_if_zero_or_below(&self, key: CartKey) -> StoreResult<bool> {
        let result = sqlx::query(
            "DELETE FROM cart_lines WHERE user_id = $1 AND product_id = $2 AND quantity <= 0",
        )
        .bind(key.user_id)
        .bind(key.product_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_all(&self, user_id: Uuid) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM cart_lines WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn list(&self, user_id: Uuid) -> StoreResult<Vec<CartItem>> {
        let rows = sqlx::query_as::<_, CartItemRow>(
            r#"
            SELECT c.user_id, c.product_id, c.quantity,
                   p.title, p.description, p.price, p.rating, p.created_at
            FROM cart_lines c
            JOIN products p ON p.id = c.product_id
            WHERE c.user_id = $1
            ORDER BY p.title ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(CartItem::from).collect())
    }
}

const PRODUCT_COLUMNS: &str = "id, title, description, price, rating, created_at";

#[async_trait]
impl ProductCatalog for PostgresRepository {
    async fn get_product(&self, id: Uuid) -> StoreResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(product)
    }

    async fn list_products(&self) -> StoreResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(products)
    }

    async fn find_product_by_title(&self, title: &str) -> StoreResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE title = $1 LIMIT 1"
        ))
        .bind(title)
        .fetch_optional(&self.pool)
        .await?;
        Ok(product)
    }

    async fn create_product(&self, req: CreateProductRequest) -> StoreResult<Product> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "INSERT INTO products (id, title, description, price, rating, created_at) \
             VALUES ($1, $2, $3, $4, $5, NOW()) RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(req.title)
        .bind(req.description)
        .bind(req.price)
        .bind(req.rating)
        .fetch_one(&self.pool)
        .await?;
        Ok(product)
    }

    /// update_product
    ///
    /// `COALESCE` keeps the stored value for every field left out of the request.
    async fn update_product(
        &self,
        id: Uuid,
        req: UpdateProductRequest,
    ) -> StoreResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            r#"
            UPDATE products
            SET title = COALESCE($2, title),
                description = COALESCE($3, description),
                price = COALESCE($4, price),
                rating = COALESCE($5, rating)
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(req.title)
        .bind(req.description)
        .bind(req.price)
        .bind(req.rating)
        .fetch_optional(&self.pool)
        .await?;
        Ok(product)
    }

    async fn delete_product(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl UserDirectory for PostgresRepository {
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, name, email, role, password_hash FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        row.map(UserRecord::try_from).transpose()
    }

    /// create_user
    ///
    /// `ON CONFLICT DO NOTHING` on the unique email: no row back means the address
    /// was already registered.
    async fn create_user(&self, new_user: NewUser) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (id, name, email, password_hash, role)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (email) DO NOTHING
            RETURNING id, name, email, role, password_hash
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new_user.name)
        .bind(new_user.email)
        .bind(new_user.password_hash)
        .bind(new_user.role.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row
            .map(UserRecord::try_from)
            .transpose()?
            .map(|record| record.user))
    }

    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<UserRecord>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, name, email, role, password_hash FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(UserRecord::try_from).transpose()
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let rows = sqlx::query_as::<_, PublicUserRow>(
            "SELECT id, name, email, role FROM users ORDER BY email ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(User::try_from).collect()
    }

    async fn update_user(&self, id: Uuid, req: UpdateUserRequest) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, PublicUserRow>(
            r#"
            UPDATE users
            SET name = COALESCE($2, name),
                email = COALESCE($3, email)
            WHERE id = $1
            RETURNING id, name, email, role
            "#,
        )
        .bind(id)
        .bind(req.name)
        .bind(req.email)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::classify)?;
        row.map(User::try_from).transpose()
    }

    async fn update_role(&self, id: Uuid, role: Role) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, PublicUserRow>(
            "UPDATE users SET role = $2 WHERE id = $1 RETURNING id, name, email, role",
        )
        .bind(id)
        .bind(role.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(User::try_from).transpose()
    }

    async fn update_password(&self, id: Uuid, password_hash: String) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
