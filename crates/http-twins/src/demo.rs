//! In-memory book catalogue served as the primary handler behind the
//! mirror layer.

use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: u64,
    pub title: String,
    pub author: String,
}

#[derive(Debug, Deserialize)]
pub struct NewBook {
    pub title: String,
    pub author: String,
}

#[derive(Default)]
struct Catalogue {
    next_id: u64,
    books: Vec<Book>,
}

/// Shared book store. Cheap to clone (Arc).
#[derive(Clone, Default)]
pub struct BookStore {
    inner: Arc<Mutex<Catalogue>>,
}

impl BookStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list(&self) -> Vec<Book> {
        match self.inner.lock() {
            Ok(catalogue) => catalogue.books.clone(),
            Err(poisoned) => poisoned.into_inner().books.clone(),
        }
    }

    pub fn add(&self, new: NewBook) -> Book {
        let mut catalogue = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        catalogue.next_id += 1;
        let book = Book {
            id: catalogue.next_id,
            title: new.title,
            author: new.author,
        };
        catalogue.books.push(book.clone());
        book
    }
}

/// `GET /books` and `POST /books`.
pub fn router(store: BookStore) -> Router {
    Router::new()
        .route("/books", get(list_books).post(create_book))
        .with_state(store)
}

async fn list_books(State(store): State<BookStore>) -> Json<Vec<Book>> {
    Json(store.list())
}

async fn create_book(State(store): State<BookStore>, Json(new): Json<NewBook>) -> Response {
    let book = store.add(new);
    tracing::info!(id = book.id, title = %book.title, "Book created");
    (StatusCode::CREATED, Json(book)).into_response()
}
