use async_trait::async_trait;
use chrono::Utc;
use std::{
    collections::HashMap,
    num::NonZeroU32,
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicBool, Ordering},
    },
};
use uuid::Uuid;

use crate::{
    error::{StoreError, StoreResult},
    models::{
        CartItem, CartKey, CartLine, CreateProductRequest, NewUser, Product, RemoveOutcome, Role,
        UpdateProductRequest, UpdateUserRequest, User, UserRecord,
    },
    repository::{CartStore, ProductCatalog, UserDirectory},
};

#[derive(Default)]
struct Tables {
    lines: HashMap<CartKey, i32>,
    products: HashMap<Uuid, Product>,
    users: HashMap<Uuid, UserRecord>,
}

/// InMemoryRepository
///
/// Process-local implementation of the store contracts, used by the test suite
/// and by local runs without `DATABASE_URL`. Each trait method performs its whole
/// read-modify-write under one lock acquisition, which gives it the same
/// per-operation atomicity the Postgres statements have.
///
/// `set_unavailable(true)` makes every call fail, to exercise the 500 path.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    tables: Arc<Mutex<Tables>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Seeds a product directly, bypassing the catalogue routes.
    pub fn insert_product(&self, title: &str, price: f64) -> StoreResult<Product> {
        let product = Product {
            id: Uuid::new_v4(),
            title: title.to_string(),
            description: format!("{title} description"),
            price,
            rating: 0.0,
            created_at: Utc::now(),
        };
        self.lock()?
            .products
            .insert(product.id, product.clone());
        Ok(product)
    }

    /// Every stored cart line, across all users.
    pub fn all_lines(&self) -> StoreResult<Vec<CartLine>> {
        let tables = self.lock()?;
        Ok(tables
            .lines
            .iter()
            .map(|(key, quantity)| line(*key, *quantity))
            .collect())
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Tables>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store switched off".into()));
        }
        self.tables
            .lock()
            .map_err(|_| StoreError::Unavailable("in-memory store lock poisoned".into()))
    }
}

fn line(key: CartKey, quantity: i32) -> CartLine {
    CartLine {
        user_id: key.user_id,
        product_id: key.product_id,
        quantity,
    }
}

#[async_trait]
impl CartStore for InMemoryRepository {
    async fn get(&self, key: CartKey) -> StoreResult<Option<CartLine>> {
        let tables = self.lock()?;
        Ok(tables.lines.get(&key).map(|quantity| line(key, *quantity)))
    }

    async fn upsert_increment(&self, key: CartKey, delta: NonZeroU32) -> StoreResult<CartLine> {
        let delta = i32::try_from(delta.get())
            .map_err(|_| StoreError::Unavailable(format!("increment {delta} out of range")))?;
        let mut tables = self.lock()?;
        // Mirrors the foreign key on `cart_lines.product_id`.
        if !tables.products.contains_key(&key.product_id) {
            return Err(StoreError::MissingReference);
        }
        let current = tables.lines.get(&key).copied().unwrap_or(0);
        let quantity = current
            .checked_add(delta)
            .ok_or_else(|| StoreError::Unavailable(format!("quantity overflow on {key:?}")))?;
        tables.lines.insert(key, quantity);
        Ok(line(key, quantity))
    }

    async fn remove_one(&self, key: CartKey) -> StoreResult<Option<RemoveOutcome>> {
        let mut tables = self.lock()?;
        let Some(quantity) = tables.lines.get_mut(&key) else {
            return Ok(None);
        };

        *quantity -= 1;
        if *quantity > 0 {
            return Ok(Some(RemoveOutcome::Decremented(line(key, *quantity))));
        }
        tables.lines.remove(&key);
        Ok(Some(RemoveOutcome::Removed))
    }

    async fn delete_if_zero_or_below(&self, key: CartKey) -> StoreResult<bool> {
        let mut tables = self.lock()?;
        match tables.lines.get(&key) {
            Some(quantity) if *quantity <= 0 => Ok(tables.lines.remove(&key).is_some()),
            _ => Ok(false),
        }
    }

    async fn delete_all(&self, user_id: Uuid) -> StoreResult<u64> {
        let mut tables = self.lock()?;
        let before = tables.lines.len();
        tables.lines.retain(|key, _| key.user_id != user_id);
        Ok((before - tables.lines.len()) as u64)
    }

    async fn list(&self, user_id: Uuid) -> StoreResult<Vec<CartItem>> {
        let tables = self.lock()?;
        let mut items: Vec<CartItem> = tables
            .lines
            .iter()
            .filter(|(key, _)| key.user_id == user_id)
            .filter_map(|(key, quantity)| {
                tables.products.get(&key.product_id).map(|product| CartItem {
                    user_id: key.user_id,
                    product_id: key.product_id,
                    quantity: *quantity,
                    product: product.clone(),
                })
            })
            .collect();
        items.sort_by(|a, b| a.product.title.cmp(&b.product.title));
        Ok(items)
    }
}

#[async_trait]
impl ProductCatalog for InMemoryRepository {
    async fn get_product(&self, id: Uuid) -> StoreResult<Option<Product>> {
        Ok(self.lock()?.products.get(&id).cloned())
    }

    async fn list_products(&self) -> StoreResult<Vec<Product>> {
        let mut products: Vec<Product> = self.lock()?.products.values().cloned().collect();
        products.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(products)
    }

    async fn find_product_by_title(&self, title: &str) -> StoreResult<Option<Product>> {
        Ok(self
            .lock()?
            .products
            .values()
            .find(|product| product.title == title)
            .cloned())
    }

    async fn create_product(&self, req: CreateProductRequest) -> StoreResult<Product> {
        let product = Product {
            id: Uuid::new_v4(),
            title: req.title,
            description: req.description,
            price: req.price,
            rating: req.rating,
            created_at: Utc::now(),
        };
        self.lock()?
            .products
            .insert(product.id, product.clone());
        Ok(product)
    }

    async fn update_product(
        &self,
        id: Uuid,
        req: UpdateProductRequest,
    ) -> StoreResult<Option<Product>> {
        let mut tables = self.lock()?;
        let Some(product) = tables.products.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(title) = req.title {
            product.title = title;
        }
        if let Some(description) = req.description {
            product.description = description;
        }
        if let Some(price) = req.price {
            product.price = price;
        }
        if let Some(rating) = req.rating {
            product.rating = rating;
        }
        Ok(Some(product.clone()))
    }

    /// Mirrors the `ON DELETE CASCADE` on `cart_lines.product_id`.
    async fn delete_product(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.lock()?;
        let existed = tables.products.remove(&id).is_some();
        tables.lines.retain(|key, _| key.product_id != id);
        Ok(existed)
    }
}

#[async_trait]
impl UserDirectory for InMemoryRepository {
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>> {
        Ok(self
            .lock()?
            .users
            .values()
            .find(|record| record.user.email == email)
            .cloned())
    }

    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<UserRecord>> {
        Ok(self.lock()?.users.get(&id).cloned())
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let mut users: Vec<User> = self
            .lock()?
            .users
            .values()
            .map(|record| record.user.clone())
            .collect();
        users.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(users)
    }

    async fn create_user(&self, new_user: NewUser) -> StoreResult<Option<User>> {
        let mut tables = self.lock()?;
        if email_taken(&tables, &new_user.email, None) {
            return Ok(None);
        }
        let user = User {
            id: Uuid::new_v4(),
            name: new_user.name,
            email: new_user.email,
            role: new_user.role,
        };
        tables.users.insert(
            user.id,
            UserRecord {
                user: user.clone(),
                password_hash: new_user.password_hash,
            },
        );
        Ok(Some(user))
    }

    async fn update_user(&self, id: Uuid, req: UpdateUserRequest) -> StoreResult<Option<User>> {
        let mut tables = self.lock()?;
        let email_clash = req
            .email
            .as_deref()
            .is_some_and(|email| email_taken(&tables, email, Some(id)));
        if email_clash {
            return Err(StoreError::Duplicate);
        }
        let Some(record) = tables.users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = req.name {
            record.user.name = name;
        }
        if let Some(email) = req.email {
            record.user.email = email;
        }
        Ok(Some(record.user.clone()))
    }

    async fn update_role(&self, id: Uuid, role: Role) -> StoreResult<Option<User>> {
        let mut tables = self.lock()?;
        Ok(tables.users.get_mut(&id).map(|record| {
            record.user.role = role;
            record.user.clone()
        }))
    }

    async fn update_password(&self, id: Uuid, password_hash: String) -> StoreResult<bool> {
        let mut tables = self.lock()?;
        match tables.users.get_mut(&id) {
            Some(record) => {
                record.password_hash = password_hash;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Mirrors the `ON DELETE CASCADE` on `cart_lines.user_id`.
    async fn delete_user(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.lock()?;
        let existed = tables.users.remove(&id).is_some();
        tables.lines.retain(|key, _| key.user_id != id);
        Ok(existed)
    }
}

fn email_taken(tables: &Tables, email: &str, except: Option<Uuid>) -> bool {
    tables
        .users
        .values()
        .any(|record| record.user.email == email && Some(record.user.id) != except)
}
