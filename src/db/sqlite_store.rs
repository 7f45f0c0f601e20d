use super::records::{
    format_timestamp, stored_now, CartItemRecord, CartRecord, ProductChanges, ProductRecord,
    UserRecord,
};
#[cfg(test)]
use super::NewUser;
use super::{
    increment_quantity, sample_products, validate_price, validate_quantity, Cart, CartDetail,
    CartItem, CartLine, DateRange, NewProduct, Product, ProductActivity, ProductFilter,
    ProductPatch, Store, User,
};
use crate::errors::StoreError;
use crate::schema::{cart_items, carts, products, users};
use chrono::{DateTime, Utc};
use diesel::connection::SimpleConnection;
use diesel::dsl::count_star;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool, PooledConnection};
#[cfg(test)]
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sqlite::SqliteConnection;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS products (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    description TEXT NOT NULL,
    price BIGINT NOT NULL,
    image_url TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT,
    email TEXT UNIQUE,
    image TEXT
);
CREATE TABLE IF NOT EXISTS carts (
    id TEXT PRIMARY KEY NOT NULL,
    user_id TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS cart_items (
    id TEXT PRIMARY KEY NOT NULL,
    cart_id TEXT NOT NULL,
    product_id TEXT NOT NULL,
    quantity BIGINT NOT NULL,
    UNIQUE (cart_id, product_id)
);
CREATE INDEX IF NOT EXISTS idx_carts_user_id ON carts (user_id);
CREATE INDEX IF NOT EXISTS idx_cart_items_product_id ON cart_items (product_id);
"#;

#[derive(Debug)]
struct BusyTimeout;

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for BusyTimeout {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        conn.batch_execute("PRAGMA busy_timeout = 5000;")
            .map_err(diesel::r2d2::Error::QueryError)
    }
}

/// Pool of SQLite connections
#[derive(Clone, Debug)]
pub struct Database {
    pool: Arc<Pool<ConnectionManager<SqliteConnection>>>,
}

impl Database {
    pub fn new(db_path: &str) -> Result<Self, StoreError> {
        let manager = ConnectionManager::<SqliteConnection>::new(db_path);
        let pool = Pool::builder()
            .connection_customizer(Box::new(BusyTimeout))
            .build(manager)?;

        Ok(Database {
            pool: Arc::new(pool),
        })
    }

    pub fn get_conn(
        &self,
    ) -> Result<PooledConnection<ConnectionManager<SqliteConnection>>, StoreError> {
        Ok(self.pool.get()?)
    }
}

fn touch_cart(conn: &mut SqliteConnection, cart_id: &str) -> Result<(), StoreError> {
    diesel::update(carts::table.find(cart_id))
        .set(carts::updated_at.eq(format_timestamp(stored_now())))
        .execute(conn)?;
    Ok(())
}

/// Attaches lines and owners to cart rows, keeping the row order
fn load_details(
    conn: &mut SqliteConnection,
    records: Vec<CartRecord>,
) -> Result<Vec<CartDetail>, StoreError> {
    if records.is_empty() {
        return Ok(Vec::new());
    }

    let cart_ids: Vec<String> = records.iter().map(|c| c.id.clone()).collect();
    let rows: Vec<(CartItemRecord, ProductRecord)> = cart_items::table
        .inner_join(products::table)
        .filter(cart_items::cart_id.eq_any(cart_ids))
        .load(conn)?;

    let mut lines: HashMap<String, Vec<CartLine>> = HashMap::new();
    for (item, product) in rows {
        let product = Product::try_from(product)?;
        lines
            .entry(item.cart_id.clone())
            .or_default()
            .push(CartLine {
                item: CartItem::from(item),
                product,
            });
    }

    let user_ids: Vec<String> = records.iter().filter_map(|c| c.user_id.clone()).collect();
    let owners: HashMap<String, User> = if user_ids.is_empty() {
        HashMap::new()
    } else {
        users::table
            .filter(users::id.eq_any(user_ids))
            .load::<UserRecord>(conn)?
            .into_iter()
            .map(|record| (record.id.clone(), User::from(record)))
            .collect()
    };

    records
        .into_iter()
        .map(|record| {
            let user = record
                .user_id
                .as_ref()
                .and_then(|uid| owners.get(uid).cloned());
            let items = lines.remove(&record.id).unwrap_or_default();
            Ok(CartDetail {
                cart: Cart::try_from(record)?,
                items,
                user,
            })
        })
        .collect()
}

/// Store backed by a SQLite file through diesel
#[derive(Clone, Debug)]
pub struct SqliteStore {
    database: Database,
}

impl SqliteStore {
    /// Opens the database file and creates missing tables
    pub fn open(db_path: &str) -> Result<Self, StoreError> {
        let database = Database::new(db_path)?;
        let mut conn = database.get_conn()?;
        conn.batch_execute(CREATE_TABLES)?;
        debug!("Schema ready in {}", db_path);
        Ok(SqliteStore { database })
    }

    /// Inserts the sample catalog when no product exists; returns the inserted count
    pub fn seed_if_empty(&self) -> Result<usize, StoreError> {
        let mut conn = self.database.get_conn()?;
        let existing: i64 = products::table.select(count_star()).first(&mut conn)?;
        if existing > 0 {
            return Ok(0);
        }

        let records: Vec<ProductRecord> = sample_products(stored_now())
            .iter()
            .map(ProductRecord::from)
            .collect();
        let inserted = conn.transaction::<_, StoreError, _>(|conn| {
            let mut inserted = 0;
            for record in &records {
                inserted += diesel::insert_into(products::table)
                    .values(record)
                    .execute(conn)?;
            }
            Ok(inserted)
        })?;
        info!("Seeded {} sample products", inserted);
        Ok(inserted)
    }
}

impl Store for SqliteStore {
    fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.database.get_conn()?;
        conn.batch_execute("SELECT 1;")?;
        Ok(())
    }

    fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, StoreError> {
        let mut conn = self.database.get_conn()?;
        let mut query = products::table.into_boxed();
        if let Some(term) = &filter.search {
            let pattern = format!("%{}%", term);
            query = query.filter(
                products::name
                    .like(pattern.clone())
                    .or(products::description.like(pattern)),
            );
        }
        if let Some(min) = filter.min_price {
            query = query.filter(products::price.ge(min));
        }
        if let Some(max) = filter.max_price {
            query = query.filter(products::price.le(max));
        }

        query
            .order((products::created_at.desc(), products::id.asc()))
            .limit(filter.limit as i64)
            .offset(filter.offset as i64)
            .load::<ProductRecord>(&mut conn)?
            .into_iter()
            .map(Product::try_from)
            .collect()
    }

    fn get_product(&self, id: &str) -> Result<Option<Product>, StoreError> {
        let mut conn = self.database.get_conn()?;
        products::table
            .find(id)
            .first::<ProductRecord>(&mut conn)
            .optional()?
            .map(Product::try_from)
            .transpose()
    }

    fn create_product(&self, product: NewProduct) -> Result<Product, StoreError> {
        validate_price(product.price)?;
        let now = stored_now();
        let created = Product {
            id: Uuid::new_v4().to_string(),
            name: product.name,
            description: product.description,
            price: product.price,
            image_url: product.image_url,
            created_at: now,
            updated_at: now,
        };
        let mut conn = self.database.get_conn()?;
        diesel::insert_into(products::table)
            .values(&ProductRecord::from(&created))
            .execute(&mut conn)?;
        Ok(created)
    }

    fn update_product(&self, id: &str, patch: ProductPatch) -> Result<Product, StoreError> {
        if let Some(price) = patch.price {
            validate_price(price)?;
        }
        let changes = ProductChanges {
            name: patch.name,
            description: patch.description,
            price: patch.price,
            image_url: patch.image_url,
            updated_at: format_timestamp(stored_now()),
        };

        let mut conn = self.database.get_conn()?;
        let updated = diesel::update(products::table.find(id))
            .set(&changes)
            .execute(&mut conn)?;
        if updated == 0 {
            return Err(StoreError::not_found("Product", id));
        }
        let record = products::table.find(id).first::<ProductRecord>(&mut conn)?;
        Product::try_from(record)
    }

    fn delete_product(&self, id: &str) -> Result<(), StoreError> {
        let mut conn = self.database.get_conn()?;
        conn.transaction::<_, StoreError, _>(|conn| {
            diesel::delete(cart_items::table.filter(cart_items::product_id.eq(id)))
                .execute(conn)?;
            let deleted = diesel::delete(products::table.find(id)).execute(conn)?;
            if deleted == 0 {
                return Err(StoreError::not_found("Product", id));
            }
            Ok(())
        })
    }

    fn count_products(&self, range: &DateRange) -> Result<usize, StoreError> {
        let mut conn = self.database.get_conn()?;
        let mut query = products::table.select(count_star()).into_boxed();
        if let Some(from) = range.from {
            query = query.filter(products::created_at.ge(format_timestamp(from)));
        }
        if let Some(to) = range.to {
            query = query.filter(products::created_at.le(format_timestamp(to)));
        }
        let count: i64 = query.first(&mut conn)?;
        Ok(count as usize)
    }

    fn product_activity(&self, range: &DateRange) -> Result<Vec<ProductActivity>, StoreError> {
        let mut conn = self.database.get_conn()?;
        let mut query = products::table.into_boxed();
        if let Some(from) = range.from {
            query = query.filter(products::created_at.ge(format_timestamp(from)));
        }
        if let Some(to) = range.to {
            query = query.filter(products::created_at.le(format_timestamp(to)));
        }
        let records = query
            .order((products::created_at.desc(), products::id.asc()))
            .load::<ProductRecord>(&mut conn)?;

        let product_ids: Vec<String> = records.iter().map(|p| p.id.clone()).collect();
        let mut items: HashMap<String, Vec<CartItem>> = HashMap::new();
        for item in cart_items::table
            .filter(cart_items::product_id.eq_any(product_ids))
            .load::<CartItemRecord>(&mut conn)?
        {
            items
                .entry(item.product_id.clone())
                .or_default()
                .push(CartItem::from(item));
        }

        records
            .into_iter()
            .map(|record| {
                let items = items.remove(&record.id).unwrap_or_default();
                Ok(ProductActivity {
                    product: Product::try_from(record)?,
                    items,
                })
            })
            .collect()
    }

    fn get_cart(&self, id: &str) -> Result<Option<Cart>, StoreError> {
        let mut conn = self.database.get_conn()?;
        carts::table
            .find(id)
            .first::<CartRecord>(&mut conn)
            .optional()?
            .map(Cart::try_from)
            .transpose()
    }

    fn find_user_cart(&self, user_id: &str) -> Result<Option<Cart>, StoreError> {
        let mut conn = self.database.get_conn()?;
        carts::table
            .filter(carts::user_id.eq(user_id))
            .order(carts::updated_at.desc())
            .first::<CartRecord>(&mut conn)
            .optional()?
            .map(Cart::try_from)
            .transpose()
    }

    fn create_cart(&self, user_id: Option<&str>) -> Result<Cart, StoreError> {
        let now = stored_now();
        let cart = Cart {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.map(str::to_string),
            created_at: now,
            updated_at: now,
        };
        let mut conn = self.database.get_conn()?;
        diesel::insert_into(carts::table)
            .values(&CartRecord::from(&cart))
            .execute(&mut conn)?;
        Ok(cart)
    }

    fn cart_detail(&self, id: &str) -> Result<Option<CartDetail>, StoreError> {
        let mut conn = self.database.get_conn()?;
        let Some(record) = carts::table
            .find(id)
            .first::<CartRecord>(&mut conn)
            .optional()?
        else {
            return Ok(None);
        };
        Ok(load_details(&mut conn, vec![record])?.pop())
    }

    fn cart_details(&self, range: &DateRange) -> Result<Vec<CartDetail>, StoreError> {
        let mut conn = self.database.get_conn()?;
        let mut query = carts::table.into_boxed();
        if let Some(from) = range.from {
            query = query.filter(carts::created_at.ge(format_timestamp(from)));
        }
        if let Some(to) = range.to {
            query = query.filter(carts::created_at.le(format_timestamp(to)));
        }
        let records = query
            .order((carts::created_at.desc(), carts::id.asc()))
            .load::<CartRecord>(&mut conn)?;
        load_details(&mut conn, records)
    }

    fn user_cart_details(&self, user_id: &str) -> Result<Vec<CartDetail>, StoreError> {
        let mut conn = self.database.get_conn()?;
        let records = carts::table
            .filter(carts::user_id.eq(user_id))
            .load::<CartRecord>(&mut conn)?;
        load_details(&mut conn, records)
    }

    fn stale_cart_details(&self, cutoff: DateTime<Utc>) -> Result<Vec<CartDetail>, StoreError> {
        let mut conn = self.database.get_conn()?;
        let records = carts::table
            .filter(carts::updated_at.lt(format_timestamp(cutoff)))
            .load::<CartRecord>(&mut conn)?;
        Ok(load_details(&mut conn, records)?
            .into_iter()
            .filter(|detail| !detail.items.is_empty())
            .collect())
    }

    fn add_item(
        &self,
        cart_id: &str,
        product_id: &str,
        quantity: i64,
    ) -> Result<CartLine, StoreError> {
        validate_quantity(quantity)?;
        let mut conn = self.database.get_conn()?;
        conn.transaction::<_, StoreError, _>(|conn| {
            carts::table
                .find(cart_id)
                .first::<CartRecord>(conn)
                .optional()?
                .ok_or_else(|| StoreError::not_found("Cart", cart_id))?;
            let product = products::table
                .find(product_id)
                .first::<ProductRecord>(conn)
                .optional()?
                .ok_or_else(|| StoreError::not_found("Product", product_id))?;

            let existing = cart_items::table
                .filter(cart_items::cart_id.eq(cart_id))
                .filter(cart_items::product_id.eq(product_id))
                .first::<CartItemRecord>(conn)
                .optional()?;
            let item = match existing {
                Some(mut record) => {
                    record.quantity = increment_quantity(record.quantity, quantity)?;
                    diesel::update(cart_items::table.find(&record.id))
                        .set(cart_items::quantity.eq(record.quantity))
                        .execute(conn)?;
                    record
                }
                None => {
                    let record = CartItemRecord {
                        id: Uuid::new_v4().to_string(),
                        cart_id: cart_id.to_string(),
                        product_id: product_id.to_string(),
                        quantity,
                    };
                    diesel::insert_into(cart_items::table)
                        .values(&record)
                        .execute(conn)?;
                    record
                }
            };
            touch_cart(conn, cart_id)?;

            Ok(CartLine {
                item: CartItem::from(item),
                product: Product::try_from(product)?,
            })
        })
    }

    fn set_item_quantity(
        &self,
        cart_id: &str,
        product_id: &str,
        quantity: i64,
    ) -> Result<usize, StoreError> {
        validate_quantity(quantity)?;
        let mut conn = self.database.get_conn()?;
        let updated = diesel::update(
            cart_items::table
                .filter(cart_items::cart_id.eq(cart_id))
                .filter(cart_items::product_id.eq(product_id)),
        )
        .set(cart_items::quantity.eq(quantity))
        .execute(&mut conn)?;
        if updated > 0 {
            touch_cart(&mut conn, cart_id)?;
        }
        Ok(updated)
    }

    fn remove_item(&self, cart_id: &str, product_id: &str) -> Result<usize, StoreError> {
        let mut conn = self.database.get_conn()?;
        let removed = diesel::delete(
            cart_items::table
                .filter(cart_items::cart_id.eq(cart_id))
                .filter(cart_items::product_id.eq(product_id)),
        )
        .execute(&mut conn)?;
        if removed > 0 {
            touch_cart(&mut conn, cart_id)?;
        }
        Ok(removed)
    }

    fn count_carts(&self, range: &DateRange) -> Result<usize, StoreError> {
        let mut conn = self.database.get_conn()?;
        let mut query = carts::table.select(count_star()).into_boxed();
        if let Some(from) = range.from {
            query = query.filter(carts::created_at.ge(format_timestamp(from)));
        }
        if let Some(to) = range.to {
            query = query.filter(carts::created_at.le(format_timestamp(to)));
        }
        let count: i64 = query.first(&mut conn)?;
        Ok(count as usize)
    }

    fn count_cart_items(&self) -> Result<usize, StoreError> {
        let mut conn = self.database.get_conn()?;
        let count: i64 = cart_items::table.select(count_star()).first(&mut conn)?;
        Ok(count as usize)
    }

    fn list_users(&self, limit: usize, offset: usize) -> Result<Vec<User>, StoreError> {
        let mut conn = self.database.get_conn()?;
        Ok(users::table
            .order(users::id.desc())
            .limit(limit as i64)
            .offset(offset as i64)
            .load::<UserRecord>(&mut conn)?
            .into_iter()
            .map(User::from)
            .collect())
    }

    fn find_user(&self, id: Option<&str>, email: Option<&str>) -> Result<Option<User>, StoreError> {
        let mut conn = self.database.get_conn()?;
        let found = match (id, email) {
            (Some(id), _) => users::table
                .find(id)
                .first::<UserRecord>(&mut conn)
                .optional()?,
            (None, Some(email)) => users::table
                .filter(users::email.eq(email))
                .first::<UserRecord>(&mut conn)
                .optional()?,
            (None, None) => None,
        };
        Ok(found.map(User::from))
    }

    #[cfg(test)]
    fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let record = UserRecord {
            id: Uuid::new_v4().to_string(),
            name: user.name,
            email: user.email,
            image: user.image,
        };
        let mut conn = self.database.get_conn()?;
        match diesel::insert_into(users::table)
            .values(&record)
            .execute(&mut conn)
        {
            Ok(_) => Ok(User::from(record)),
            Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                Err(StoreError::Invalid(format!(
                    "email {} is already registered",
                    record.email.unwrap_or_default()
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn count_users(&self) -> Result<usize, StoreError> {
        let mut conn = self.database.get_conn()?;
        let count: i64 = users::table.select(count_star()).first(&mut conn)?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::MAX_LINE_QUANTITY;
    use chrono::Duration;
    use tempfile::TempDir;

    fn open_store() -> (TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shop.db");
        let store = SqliteStore::open(path.to_str().unwrap()).unwrap();
        (dir, store)
    }

    fn set_updated_at(store: &SqliteStore, cart_id: &str, at: DateTime<Utc>) {
        let mut conn = store.database.get_conn().unwrap();
        diesel::update(carts::table.find(cart_id))
            .set(carts::updated_at.eq(format_timestamp(at)))
            .execute(&mut conn)
            .unwrap();
    }

    #[test]
    fn test_seed_runs_once() {
        let (_dir, store) = open_store();
        assert_eq!(store.seed_if_empty().unwrap(), 8);
        assert_eq!(store.seed_if_empty().unwrap(), 0);
        assert_eq!(store.count_products(&DateRange::all()).unwrap(), 8);
        store.ping().unwrap();
    }

    #[test]
    fn test_reopen_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shop.db");
        let path = path.to_str().unwrap();
        SqliteStore::open(path).unwrap().seed_if_empty().unwrap();

        let reopened = SqliteStore::open(path).unwrap();
        assert_eq!(reopened.get_product("8").unwrap().unwrap().name, "Silk Tie");
    }

    #[test]
    fn test_list_products_filters_like_memory_store() {
        let (_dir, store) = open_store();
        store.seed_if_empty().unwrap();
        let filter = ProductFilter {
            search: Some("LEATHER".to_string()),
            max_price: Some(20000),
            ..ProductFilter::default()
        };
        let names: Vec<String> = store
            .list_products(&filter)
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["Leather Belt", "Leather Wallet"]);
    }

    #[test]
    fn test_product_crud() {
        let (_dir, store) = open_store();
        let created = store
            .create_product(NewProduct {
                name: "Canvas Tote".to_string(),
                description: "Everyday bag".to_string(),
                price: 4500,
                image_url: "https://example.com/tote.jpg".to_string(),
            })
            .unwrap();
        assert_eq!(store.get_product(&created.id).unwrap(), Some(created.clone()));

        let updated = store
            .update_product(
                &created.id,
                ProductPatch {
                    name: Some("Canvas Tote XL".to_string()),
                    ..ProductPatch::default()
                },
            )
            .unwrap();
        assert_eq!(updated.name, "Canvas Tote XL");
        assert_eq!(updated.price, 4500);

        store.delete_product(&created.id).unwrap();
        assert!(matches!(
            store.delete_product(&created.id).unwrap_err(),
            StoreError::NotFound { .. }
        ));
        assert!(matches!(
            store
                .update_product("missing", ProductPatch::default())
                .unwrap_err(),
            StoreError::NotFound { .. }
        ));
    }

    #[test]
    fn test_created_rows_read_back_unchanged() {
        let (_dir, store) = open_store();
        store.seed_if_empty().unwrap();
        let cart = store.create_cart(Some("user-1")).unwrap();
        assert_eq!(store.get_cart(&cart.id).unwrap(), Some(cart.clone()));
        assert_eq!(store.find_user_cart("user-1").unwrap(), Some(cart));

        let seeded = store.list_products(&ProductFilter::default()).unwrap();
        assert_eq!(seeded.len(), 8);
        for product in seeded {
            assert_eq!(store.get_product(&product.id).unwrap(), Some(product));
        }
    }

    #[test]
    fn test_line_quantity_cannot_overflow() {
        let (_dir, store) = open_store();
        store.seed_if_empty().unwrap();
        let cart = store.create_cart(None).unwrap();
        store.add_item(&cart.id, "7", MAX_LINE_QUANTITY).unwrap();

        assert!(matches!(
            store.add_item(&cart.id, "7", 1).unwrap_err(),
            StoreError::Invalid(_)
        ));
        assert!(matches!(
            store.add_item(&cart.id, "7", i64::MAX).unwrap_err(),
            StoreError::Invalid(_)
        ));
        assert!(matches!(
            store.set_item_quantity(&cart.id, "7", 1 << 50).unwrap_err(),
            StoreError::Invalid(_)
        ));
        let detail = store.cart_detail(&cart.id).unwrap().unwrap();
        assert_eq!(detail.total_quantity(), MAX_LINE_QUANTITY);
        assert_eq!(detail.total_value(), MAX_LINE_QUANTITY * 89900);
    }

    #[test]
    fn test_cart_lines_and_owner() {
        let (_dir, store) = open_store();
        store.seed_if_empty().unwrap();
        let user = store
            .create_user(NewUser {
                name: Some("Grace".to_string()),
                email: Some("grace@example.com".to_string()),
                image: None,
            })
            .unwrap();
        let cart = store.create_cart(Some(user.id.as_str())).unwrap();
        store.add_item(&cart.id, "4", 1).unwrap();
        let line = store.add_item(&cart.id, "4", 2).unwrap();
        assert_eq!(line.item.quantity, 3);
        store.add_item(&cart.id, "6", 1).unwrap();

        let detail = store.cart_detail(&cart.id).unwrap().unwrap();
        assert_eq!(detail.item_count(), 2);
        assert_eq!(detail.total_value(), 3 * 19900 + 14900);
        assert_eq!(detail.user, Some(user.clone()));
        assert_eq!(store.find_user_cart(&user.id).unwrap().unwrap().id, cart.id);

        assert_eq!(store.set_item_quantity(&cart.id, "6", 5).unwrap(), 1);
        assert_eq!(store.remove_item(&cart.id, "4").unwrap(), 1);
        assert_eq!(store.remove_item(&cart.id, "4").unwrap(), 0);
        let detail = store.cart_detail(&cart.id).unwrap().unwrap();
        assert_eq!(detail.total_quantity(), 5);
        assert_eq!(store.count_cart_items().unwrap(), 1);
    }

    #[test]
    fn test_stale_carts() {
        let (_dir, store) = open_store();
        store.seed_if_empty().unwrap();
        let cutoff = Utc::now() - Duration::hours(24);

        let stale = store.create_cart(None).unwrap();
        store.add_item(&stale.id, "1", 1).unwrap();
        set_updated_at(&store, &stale.id, cutoff - Duration::seconds(1));

        let fresh = store.create_cart(None).unwrap();
        store.add_item(&fresh.id, "1", 1).unwrap();

        let empty = store.create_cart(None).unwrap();
        set_updated_at(&store, &empty.id, cutoff - Duration::days(2));

        let found = store.stale_cart_details(cutoff).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].cart.id, stale.id);
        assert_eq!(found[0].items[0].product.name, "Leather Handbag");
    }

    #[test]
    fn test_product_activity_counts_lines() {
        let (_dir, store) = open_store();
        store.seed_if_empty().unwrap();
        for _ in 0..2 {
            let cart = store.create_cart(None).unwrap();
            store.add_item(&cart.id, "7", 2).unwrap();
        }

        let activity = store.product_activity(&DateRange::all()).unwrap();
        assert_eq!(activity.len(), 8);
        let shoes = activity.iter().find(|a| a.product.id == "7").unwrap();
        assert_eq!(shoes.times_added(), 2);
        assert_eq!(shoes.total_quantity(), 4);
        assert_eq!(shoes.revenue(), 4 * 89900);
    }

    #[test]
    fn test_duplicate_email_is_invalid() {
        let (_dir, store) = open_store();
        let new_user = NewUser {
            email: Some("dup@example.com".to_string()),
            ..NewUser::default()
        };
        store.create_user(new_user.clone()).unwrap();
        assert!(matches!(
            store.create_user(new_user).unwrap_err(),
            StoreError::Invalid(_)
        ));
        assert_eq!(store.count_users().unwrap(), 1);
    }
}
