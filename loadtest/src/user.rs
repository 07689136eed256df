//! The simulated product catalog user.

use anyhow::Result;
use catalog_types::{NewProduct, PRODUCTS_PATH};
use hyper::StatusCode;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use serde_json::Value;

use crate::client::{Transport, UserClient};
use crate::scenario::Task;
use crate::statistics::Statistics;

pub const PRODUCT_NAME: &str = "Hardcoded Product";
pub const PRODUCT_PRICE: f64 = 99.99;
pub const PRODUCT_QUANTITY: i64 = 150;

/// Every fetch is reported under this label, whatever the id.
pub const PRODUCT_LABEL: &str = "/products/[id]";

/// One virtual user. Only fetches products it created itself.
pub struct ProductUser<T> {
    client: UserClient<T>,
    known_ids: Vec<String>,
    rng: StdRng,
}

impl<T: Transport> ProductUser<T> {
    pub fn new(client: UserClient<T>, rng: StdRng) -> Self {
        Self {
            client,
            known_ids: Vec::new(),
            rng,
        }
    }

    #[inline]
    pub fn known_ids(&self) -> &[String] {
        &self.known_ids
    }

    #[inline]
    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    #[inline]
    pub fn statistics(&self) -> &Statistics {
        self.client.statistics()
    }

    pub fn into_statistics(self) -> Statistics {
        self.client.into_statistics()
    }

    pub async fn execute(&mut self, task: Task) -> Result<()> {
        match task {
            Task::GetProduct => self.get_product().await,
            Task::CreateProduct => self.create_product().await,
        }
    }

    /// Fetches a random product from those this user created.
    ///
    /// A no-op until the first successful creation.
    pub async fn get_product(&mut self) -> Result<()> {
        let Some(id) = self.known_ids.choose(&mut self.rng) else {
            return Ok(());
        };
        let path = format!("{PRODUCTS_PATH}/{id}");
        self.client.get(&path, Some(PRODUCT_LABEL)).await?;
        Ok(())
    }

    /// Creates the fixed product and remembers its id.
    ///
    /// Only a 201 with a non-empty `id` counts as a success.
    pub async fn create_product(&mut self) -> Result<()> {
        let product = NewProduct::new(PRODUCT_NAME, PRODUCT_PRICE, PRODUCT_QUANTITY);
        let caught = self
            .client
            .post_json_catch(PRODUCTS_PATH, &product, None)
            .await?;
        let status = caught.response().status;
        if status != StatusCode::CREATED {
            caught.failure(format!("Expected 201 Created, got {status}"));
            return Ok(());
        }
        let id = caught.response().json::<Value>().map(|body| created_id(&body));
        match id {
            Ok(Some(id)) => {
                caught.success();
                self.known_ids.push(id);
            }
            Ok(None) => caught.failure("Created product has no id"),
            Err(e) => caught.failure(format!("{e:#}")),
        }
        Ok(())
    }
}

fn created_id(body: &Value) -> Option<String> {
    match body.get("id")? {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Number(id) if id.as_f64() != Some(0.0) => Some(id.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedTransport;
    use hyper::Method;
    use rand::SeedableRng;

    fn user(transport: &ScriptedTransport) -> ProductUser<ScriptedTransport> {
        ProductUser::new(
            UserClient::new("http://catalog", transport.clone()),
            StdRng::seed_from_u64(3),
        )
    }

    #[tokio::test]
    async fn fetch_without_known_ids_sends_nothing() {
        let transport = ScriptedTransport::default();
        let mut user = user(&transport);
        user.get_product().await.unwrap();
        assert!(transport.requests().is_empty());
        assert!(user.statistics().is_empty());
    }

    #[tokio::test]
    async fn create_then_fetch() {
        let transport = ScriptedTransport::default();
        transport.push(201, r#"{"id":"abc","name":"Hardcoded Product"}"#);
        transport.push(200, r#"{"id":"abc"}"#);
        let mut user = user(&transport);

        user.get_product().await.unwrap();
        assert!(transport.requests().is_empty());

        user.create_product().await.unwrap();
        assert_eq!(user.known_ids(), ["abc"]);

        user.get_product().await.unwrap();
        let sent = transport.requests();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].method, Method::GET);
        assert_eq!(sent[1].path, "/products/abc");

        let stats = user.statistics();
        assert_eq!(stats.get(&Method::POST, "/products").unwrap().requests(), 1);
        assert_eq!(stats.get(&Method::GET, PRODUCT_LABEL).unwrap().requests(), 1);
        assert_eq!(stats.total_failures(), 0);
    }

    #[tokio::test]
    async fn create_sends_fixed_payload() {
        let transport = ScriptedTransport::default();
        transport.push(201, r#"{"id":"1"}"#);
        let mut user = user(&transport);
        user.create_product().await.unwrap();

        let sent = transport.requests();
        assert_eq!(sent[0].method, Method::POST);
        assert_eq!(sent[0].path, "/products");
        let body: Value = serde_json::from_slice(&sent[0].body).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"name": "Hardcoded Product", "price": 99.99, "quantity": 150})
        );
    }

    #[tokio::test]
    async fn rejected_create_records_nothing() {
        let transport = ScriptedTransport::default();
        transport.push(400, "{}");
        let mut user = user(&transport);
        user.create_product().await.unwrap();

        assert!(user.known_ids().is_empty());
        let entry = user.statistics().get(&Method::POST, "/products").unwrap();
        assert_eq!(entry.failures(), 1);
        assert_eq!(
            entry.failure_reasons().next(),
            Some(("Expected 201 Created, got 400 Bad Request", 1))
        );
    }

    #[tokio::test]
    async fn created_without_usable_id_is_a_failure() {
        let transport = ScriptedTransport::default();
        transport.push(201, "{}");
        transport.push(201, r#"{"id":""}"#);
        transport.push(201, "not json");
        transport.push(200, r#"{"id":"x"}"#);
        let mut user = user(&transport);
        for _ in 0..4 {
            user.create_product().await.unwrap();
        }
        assert!(user.known_ids().is_empty());
        let entry = user.statistics().get(&Method::POST, "/products").unwrap();
        assert_eq!(entry.requests(), 4);
        assert_eq!(entry.failures(), 4);
    }

    #[tokio::test]
    async fn numeric_id_is_kept_as_text() {
        let transport = ScriptedTransport::default();
        transport.push(201, r#"{"id":7}"#);
        let mut user = user(&transport);
        user.create_product().await.unwrap();
        assert_eq!(user.known_ids(), ["7"]);
    }

    #[tokio::test]
    async fn zero_numeric_id_is_not_kept() {
        let transport = ScriptedTransport::default();
        transport.push(201, r#"{"id":0}"#);
        let mut user = user(&transport);
        user.create_product().await.unwrap();
        assert!(user.known_ids().is_empty());
        let entry = user.statistics().get(&Method::POST, "/products").unwrap();
        assert_eq!(entry.failures(), 1);
    }

    #[tokio::test]
    async fn network_error_propagates_without_recording_an_id() {
        let transport = ScriptedTransport::default();
        transport.push_error("connection reset");
        let mut user = user(&transport);
        assert!(user.create_product().await.is_err());
        assert!(user.known_ids().is_empty());
        assert_eq!(user.statistics().total_failures(), 1);
    }

    #[tokio::test]
    async fn fetches_only_own_ids_under_one_label() {
        let transport = ScriptedTransport::default();
        transport.push(201, r#"{"id":"123"}"#);
        transport.push(201, r#"{"id":"456"}"#);
        let mut user = user(&transport);
        user.create_product().await.unwrap();
        user.create_product().await.unwrap();
        for _ in 0..20 {
            user.get_product().await.unwrap();
        }

        let sent = transport.requests();
        for req in sent.iter().filter(|r| r.method == Method::GET) {
            assert!(req.path == "/products/123" || req.path == "/products/456");
        }
        let stats = user.statistics();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats.get(&Method::GET, PRODUCT_LABEL).unwrap().requests(), 20);
    }

    #[tokio::test]
    async fn users_do_not_share_ids() {
        let transport = ScriptedTransport::default();
        transport.push(201, r#"{"id":"mine"}"#);
        let mut first = user(&transport);
        let mut second = user(&transport);
        first.create_product().await.unwrap();

        second.get_product().await.unwrap();
        assert!(second.known_ids().is_empty());
        assert_eq!(transport.requests().len(), 1);
    }
}
