use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::{NewProduct, Product};

/// In-memory catalog shared by every connection of the server.
///
/// Ids are handed out from a counter starting at 1 and rendered as decimal strings.
#[derive(Clone)]
pub struct ProductStore {
    next_id: Arc<AtomicU64>,
    products: Arc<RwLock<HashMap<String, Product>>>,
}

impl ProductStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: Arc::new(AtomicU64::new(1)),
            products: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Stores `new` under a fresh id. Callers validate first.
    #[must_use]
    pub fn insert(&self, new: NewProduct) -> Product {
        let id = self.next_id.fetch_add(1, Ordering::AcqRel).to_string();
        let product = Product::from_new(id.clone(), new);
        self.products.write().insert(id, product.clone());
        product
    }

    #[inline]
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Product> {
        self.products.read().get(id).cloned()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.products.read().len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ProductStore {
    fn default() -> Self {
        Self::new()
    }
}
