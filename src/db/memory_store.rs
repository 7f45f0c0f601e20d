#[cfg(test)]
use super::NewUser;
use super::{
    increment_quantity, sample_products, validate_price, validate_quantity, Cart, CartDetail,
    CartItem, CartLine, DateRange, NewProduct, Product, ProductActivity, ProductFilter,
    ProductPatch, Store, User,
};
use crate::errors::StoreError;
use chrono::{DateTime, Utc};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

#[derive(Debug, Default)]
struct Tables {
    products: Vec<Product>,
    carts: Vec<Cart>,
    items: Vec<CartItem>,
    users: Vec<User>,
}

impl Tables {
    fn product(&self, id: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }

    fn detail(&self, cart: &Cart) -> CartDetail {
        let items = self
            .items
            .iter()
            .filter(|item| item.cart_id == cart.id)
            .filter_map(|item| {
                self.product(&item.product_id).map(|product| CartLine {
                    item: item.clone(),
                    product: product.clone(),
                })
            })
            .collect();
        let user = cart
            .user_id
            .as_deref()
            .and_then(|uid| self.users.iter().find(|u| u.id == uid).cloned());
        CartDetail {
            cart: cart.clone(),
            items,
            user,
        }
    }

    fn touch_cart(&mut self, cart_id: &str, at: DateTime<Utc>) {
        if let Some(cart) = self.carts.iter_mut().find(|c| c.id == cart_id) {
            cart.updated_at = at;
        }
    }
}

fn newest_first<T>(rows: &mut [T], created_at: impl Fn(&T) -> (DateTime<Utc>, &str)) {
    rows.sort_by(|a, b| {
        let (a_at, a_id) = created_at(a);
        let (b_at, b_id) = created_at(b);
        b_at.cmp(&a_at).then_with(|| a_id.cmp(b_id))
    });
}


/// In-process store backed by vectors behind a lock
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    /// A store holding the sample catalog under ids "1" to "8"
    pub fn with_sample_catalog() -> Self {
        let store = MemoryStore::new();
        store.write().products = sample_products(Utc::now());
        store
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
impl MemoryStore {
    /// Overrides a cart's last update time
    pub fn set_cart_updated_at(&self, cart_id: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut tables = self.write();
        let cart = tables
            .carts
            .iter_mut()
            .find(|c| c.id == cart_id)
            .ok_or_else(|| StoreError::not_found("Cart", cart_id))?;
        cart.updated_at = at;
        Ok(())
    }

    /// Overrides a product's creation time
    pub fn set_product_created_at(
        &self,
        product_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut tables = self.write();
        let product = tables
            .products
            .iter_mut()
            .find(|p| p.id == product_id)
            .ok_or_else(|| StoreError::not_found("Product", product_id))?;
        product.created_at = at;
        Ok(())
    }
}

impl Store for MemoryStore {
    fn ping(&self) -> Result<(), StoreError> {
        // Readers recover from poisoning, so report it here
        if self.tables.is_poisoned() {
            return Err(StoreError::Invalid(
                "in-memory tables were poisoned by a panicking writer".to_string(),
            ));
        }
        Ok(())
    }

    fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, StoreError> {
        let tables = self.read();
        let mut products: Vec<Product> = tables
            .products
            .iter()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        newest_first(&mut products, |p| (p.created_at, p.id.as_str()));
        Ok(products
            .into_iter()
            .skip(filter.offset)
            .take(filter.limit)
            .collect())
    }

    fn get_product(&self, id: &str) -> Result<Option<Product>, StoreError> {
        Ok(self.read().product(id).cloned())
    }

    fn create_product(&self, product: NewProduct) -> Result<Product, StoreError> {
        validate_price(product.price)?;
        let now = Utc::now();
        let created = Product {
            id: Uuid::new_v4().to_string(),
            name: product.name,
            description: product.description,
            price: product.price,
            image_url: product.image_url,
            created_at: now,
            updated_at: now,
        };
        self.write().products.push(created.clone());
        Ok(created)
    }

    fn update_product(&self, id: &str, patch: ProductPatch) -> Result<Product, StoreError> {
        if let Some(price) = patch.price {
            validate_price(price)?;
        }
        let mut tables = self.write();
        let product = tables
            .products
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| StoreError::not_found("Product", id))?;
        if let Some(name) = patch.name {
            product.name = name;
        }
        if let Some(description) = patch.description {
            product.description = description;
        }
        if let Some(price) = patch.price {
            product.price = price;
        }
        if let Some(image_url) = patch.image_url {
            product.image_url = image_url;
        }
        product.updated_at = Utc::now();
        Ok(product.clone())
    }

    fn delete_product(&self, id: &str) -> Result<(), StoreError> {
        let mut tables = self.write();
        let before = tables.products.len();
        tables.products.retain(|p| p.id != id);
        if tables.products.len() == before {
            return Err(StoreError::not_found("Product", id));
        }
        tables.items.retain(|item| item.product_id != id);
        Ok(())
    }

    fn count_products(&self, range: &DateRange) -> Result<usize, StoreError> {
        Ok(self
            .read()
            .products
            .iter()
            .filter(|p| range.contains(p.created_at))
            .count())
    }

    fn product_activity(&self, range: &DateRange) -> Result<Vec<ProductActivity>, StoreError> {
        let tables = self.read();
        let mut activity: Vec<ProductActivity> = tables
            .products
            .iter()
            .filter(|p| range.contains(p.created_at))
            .map(|product| ProductActivity {
                product: product.clone(),
                items: tables
                    .items
                    .iter()
                    .filter(|item| item.product_id == product.id)
                    .cloned()
                    .collect(),
            })
            .collect();
        newest_first(&mut activity, |a| (a.product.created_at, a.product.id.as_str()));
        Ok(activity)
    }

    fn get_cart(&self, id: &str) -> Result<Option<Cart>, StoreError> {
        Ok(self.read().carts.iter().find(|c| c.id == id).cloned())
    }

    fn find_user_cart(&self, user_id: &str) -> Result<Option<Cart>, StoreError> {
        Ok(self
            .read()
            .carts
            .iter()
            .filter(|c| c.user_id.as_deref() == Some(user_id))
            .max_by_key(|c| c.updated_at)
            .cloned())
    }

    fn create_cart(&self, user_id: Option<&str>) -> Result<Cart, StoreError> {
        let now = Utc::now();
        let cart = Cart {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.map(str::to_string),
            created_at: now,
            updated_at: now,
        };
        self.write().carts.push(cart.clone());
        Ok(cart)
    }

    fn cart_detail(&self, id: &str) -> Result<Option<CartDetail>, StoreError> {
        let tables = self.read();
        Ok(tables
            .carts
            .iter()
            .find(|c| c.id == id)
            .map(|cart| tables.detail(cart)))
    }

    fn cart_details(&self, range: &DateRange) -> Result<Vec<CartDetail>, StoreError> {
        let tables = self.read();
        let mut carts: Vec<CartDetail> = tables
            .carts
            .iter()
            .filter(|c| range.contains(c.created_at))
            .map(|cart| tables.detail(cart))
            .collect();
        newest_first(&mut carts, |d| (d.cart.created_at, d.cart.id.as_str()));
        Ok(carts)
    }

    fn user_cart_details(&self, user_id: &str) -> Result<Vec<CartDetail>, StoreError> {
        let tables = self.read();
        Ok(tables
            .carts
            .iter()
            .filter(|c| c.user_id.as_deref() == Some(user_id))
            .map(|cart| tables.detail(cart))
            .collect())
    }

    fn stale_cart_details(&self, cutoff: DateTime<Utc>) -> Result<Vec<CartDetail>, StoreError> {
        let tables = self.read();
        Ok(tables
            .carts
            .iter()
            .filter(|c| c.updated_at < cutoff)
            .map(|cart| tables.detail(cart))
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
        let mut tables = self.write();
        if !tables.carts.iter().any(|c| c.id == cart_id) {
            return Err(StoreError::not_found("Cart", cart_id));
        }
        let product = tables
            .product(product_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("Product", product_id))?;

        let existing = tables
            .items
            .iter()
            .position(|i| i.cart_id == cart_id && i.product_id == product_id);
        let item = match existing {
            Some(index) => {
                let line = &mut tables.items[index];
                line.quantity = increment_quantity(line.quantity, quantity)?;
                line.clone()
            }
            None => {
                let item = CartItem {
                    id: Uuid::new_v4().to_string(),
                    cart_id: cart_id.to_string(),
                    product_id: product_id.to_string(),
                    quantity,
                };
                tables.items.push(item.clone());
                item
            }
        };
        tables.touch_cart(cart_id, Utc::now());
        Ok(CartLine { item, product })
    }

    fn set_item_quantity(
        &self,
        cart_id: &str,
        product_id: &str,
        quantity: i64,
    ) -> Result<usize, StoreError> {
        validate_quantity(quantity)?;
        let mut tables = self.write();
        let mut updated = 0;
        for item in tables
            .items
            .iter_mut()
            .filter(|i| i.cart_id == cart_id && i.product_id == product_id)
        {
            item.quantity = quantity;
            updated += 1;
        }
        if updated > 0 {
            tables.touch_cart(cart_id, Utc::now());
        }
        Ok(updated)
    }

    fn remove_item(&self, cart_id: &str, product_id: &str) -> Result<usize, StoreError> {
        let mut tables = self.write();
        let before = tables.items.len();
        tables
            .items
            .retain(|i| !(i.cart_id == cart_id && i.product_id == product_id));
        let removed = before - tables.items.len();
        if removed > 0 {
            tables.touch_cart(cart_id, Utc::now());
        }
        Ok(removed)
    }

    fn count_carts(&self, range: &DateRange) -> Result<usize, StoreError> {
        Ok(self
            .read()
            .carts
            .iter()
            .filter(|c| range.contains(c.created_at))
            .count())
    }

    fn count_cart_items(&self) -> Result<usize, StoreError> {
        Ok(self.read().items.len())
    }

    fn list_users(&self, limit: usize, offset: usize) -> Result<Vec<User>, StoreError> {
        let tables = self.read();
        let mut users = tables.users.clone();
        users.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(users.into_iter().skip(offset).take(limit).collect())
    }

    fn find_user(&self, id: Option<&str>, email: Option<&str>) -> Result<Option<User>, StoreError> {
        let tables = self.read();
        let found = match (id, email) {
            (Some(id), _) => tables.users.iter().find(|u| u.id == id),
            (None, Some(email)) => tables
                .users
                .iter()
                .find(|u| u.email.as_deref() == Some(email)),
            (None, None) => None,
        };
        Ok(found.cloned())
    }

    #[cfg(test)]
    fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut tables = self.write();
        if let Some(email) = user.email.as_deref() {
            if tables.users.iter().any(|u| u.email.as_deref() == Some(email)) {
                return Err(StoreError::Invalid(format!(
                    "email {} is already registered",
                    email
                )));
            }
        }
        let created = User {
            id: Uuid::new_v4().to_string(),
            name: user.name,
            email: user.email,
            image: user.image,
        };
        tables.users.push(created.clone());
        Ok(created)
    }

    fn count_users(&self) -> Result<usize, StoreError> {
        Ok(self.read().users.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::MAX_LINE_QUANTITY;
    use chrono::Duration;
    use std::sync::Arc;

    #[test]
    fn test_sample_catalog_is_seeded() {
        let store = MemoryStore::with_sample_catalog();
        let products = store.list_products(&ProductFilter::default()).unwrap();
        assert_eq!(products.len(), 8);
        // newest first
        assert_eq!(products[0].name, "Silk Tie");
        assert_eq!(products[7].id, "1");
        assert_eq!(store.get_product("5").unwrap().unwrap().price, 299900);
    }

    #[test]
    fn test_product_filter_and_paging() {
        let store = MemoryStore::with_sample_catalog();
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

        let page = ProductFilter {
            limit: 3,
            offset: 6,
            ..ProductFilter::default()
        };
        assert_eq!(store.list_products(&page).unwrap().len(), 2);
    }

    #[test]
    fn test_update_and_delete_product() {
        let store = MemoryStore::with_sample_catalog();
        let updated = store
            .update_product(
                "2",
                ProductPatch {
                    price: Some(35000),
                    ..ProductPatch::default()
                },
            )
            .unwrap();
        assert_eq!(updated.price, 35000);
        assert_eq!(updated.name, "Designer Sunglasses");

        let err = store
            .update_product("missing", ProductPatch::default())
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "Product", .. }));

        let cart = store.create_cart(None).unwrap();
        store.add_item(&cart.id, "2", 1).unwrap();
        store.delete_product("2").unwrap();
        assert!(store.get_product("2").unwrap().is_none());
        assert_eq!(store.count_cart_items().unwrap(), 0);
        assert!(store.delete_product("2").is_err());
    }

    #[test]
    fn test_add_item_increments_existing_line() {
        let store = MemoryStore::with_sample_catalog();
        let cart = store.create_cart(Some("user-1")).unwrap();
        store.add_item(&cart.id, "1", 1).unwrap();
        let line = store.add_item(&cart.id, "1", 2).unwrap();
        assert_eq!(line.item.quantity, 3);

        let detail = store.cart_detail(&cart.id).unwrap().unwrap();
        assert_eq!(detail.item_count(), 1);
        assert_eq!(detail.total_value(), 3 * 129900);
        assert!(detail.cart.updated_at >= cart.updated_at);
    }

    #[test]
    fn test_line_quantity_cannot_overflow() {
        let store = MemoryStore::with_sample_catalog();
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
        let detail = store.cart_detail(&cart.id).unwrap().unwrap();
        assert_eq!(detail.total_quantity(), MAX_LINE_QUANTITY);
        assert!(store
            .create_product(NewProduct {
                name: "Yacht".to_string(),
                description: "Large".to_string(),
                price: i64::MAX,
                image_url: String::new(),
            })
            .is_err());
    }

    #[test]
    fn test_ping_reports_poisoned_tables() {
        let store = Arc::new(MemoryStore::with_sample_catalog());
        store.ping().unwrap();

        let writer = store.clone();
        let outcome = std::thread::spawn(move || {
            let _tables = writer.write();
            panic!("writer failed mid-update");
        })
        .join();
        assert!(outcome.is_err());

        assert!(matches!(store.ping().unwrap_err(), StoreError::Invalid(_)));
        assert_eq!(store.count_products(&DateRange::all()).unwrap(), 8);
    }

    #[test]
    fn test_add_item_rejects_unknown_product_and_bad_quantity() {
        let store = MemoryStore::with_sample_catalog();
        let cart = store.create_cart(None).unwrap();
        assert!(matches!(
            store.add_item(&cart.id, "99", 1).unwrap_err(),
            StoreError::NotFound { entity: "Product", .. }
        ));
        assert!(matches!(
            store.add_item(&cart.id, "1", 0).unwrap_err(),
            StoreError::Invalid(_)
        ));
        assert!(matches!(
            store.add_item("nope", "1", 1).unwrap_err(),
            StoreError::NotFound { entity: "Cart", .. }
        ));
    }

    #[test]
    fn test_stale_carts_need_items_and_strictly_older_update() {
        let store = MemoryStore::with_sample_catalog();
        let cutoff = Utc::now() - Duration::hours(24);

        let stale = store.create_cart(None).unwrap();
        store.add_item(&stale.id, "3", 1).unwrap();
        store
            .set_cart_updated_at(&stale.id, cutoff - Duration::seconds(1))
            .unwrap();

        let boundary = store.create_cart(None).unwrap();
        store.add_item(&boundary.id, "3", 1).unwrap();
        store.set_cart_updated_at(&boundary.id, cutoff).unwrap();

        let empty = store.create_cart(None).unwrap();
        store
            .set_cart_updated_at(&empty.id, cutoff - Duration::days(3))
            .unwrap();

        let found = store.stale_cart_details(cutoff).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].cart.id, stale.id);
    }

    #[test]
    fn test_users_lookup() {
        let store = MemoryStore::new();
        let user = store
            .create_user(NewUser {
                name: Some("Ada".to_string()),
                email: Some("ada@example.com".to_string()),
                image: None,
            })
            .unwrap();
        assert_eq!(
            store.find_user(None, Some("ada@example.com")).unwrap(),
            Some(user.clone())
        );
        assert_eq!(store.find_user(Some(user.id.as_str()), None).unwrap(), Some(user));
        assert!(store.find_user(None, None).unwrap().is_none());
        assert!(store
            .create_user(NewUser {
                email: Some("ada@example.com".to_string()),
                ..NewUser::default()
            })
            .is_err());
        assert_eq!(store.count_users().unwrap(), 1);
    }
}
