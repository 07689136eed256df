//! In-memory product catalog served over HTTP/1 with axum.

use std::net::SocketAddr;

use anyhow::Context;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use catalog_types::{ErrorBody, InvalidProduct, NewProduct, ProductStore};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub fn router(store: ProductStore) -> Router {
    Router::new()
        .route("/products", post(post_product))
        .route("/products/:id", get(get_product))
        .with_state(store)
}

pub async fn serve(listener: TcpListener, store: ProductStore) -> anyhow::Result<()> {
    axum::serve(listener, router(store))
        .await
        .context("Server terminated")
}

/// Binds `addr` and serves in the background, returning the bound address.
pub async fn spawn(
    addr: &str,
    store: ProductStore,
) -> anyhow::Result<(SocketAddr, JoinHandle<anyhow::Result<()>>)> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    let local = listener
        .local_addr()
        .context("Failed to read bound address")?;
    let handle = tokio::spawn(serve(listener, store));
    Ok((local, handle))
}

fn invalid(reason: InvalidProduct) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody::new(reason.message())),
    )
        .into_response()
}

async fn post_product(
    State(store): State<ProductStore>,
    payload: Result<Json<NewProduct>, JsonRejection>,
) -> Response {
    let Json(new) = match payload {
        Ok(p) => p,
        Err(rejection) => {
            tracing::debug!(%rejection, "Rejected product payload");
            return invalid(InvalidProduct::MissingFields);
        }
    };
    if let Err(reason) = new.validate() {
        return invalid(reason);
    }
    let product = store.insert(new);
    tracing::trace!(id = %product.id, "Created product");
    (StatusCode::CREATED, Json(product)).into_response()
}

async fn get_product(State(store): State<ProductStore>, Path(id): Path<String>) -> Response {
    match store.get(&id) {
        Some(product) => Json(product).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorBody::new("Product not found")),
        )
            .into_response(),
    }
}
