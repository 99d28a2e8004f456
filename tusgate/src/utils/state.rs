use std::sync::Arc;

use crate::storage::ContentStore;
use crate::tus::TusServer;

#[derive(Clone)]
pub struct AppState {
    pub tus: Arc<TusServer>,
    pub store: Arc<dyn ContentStore>,
}

impl AppState {
    pub fn new(tus: Arc<TusServer>, store: Arc<dyn ContentStore>) -> Self {
        AppState { tus, store }
    }
}
