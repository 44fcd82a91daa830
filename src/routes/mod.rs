pub mod accounts;
pub mod calendar;
pub mod challenges;
pub mod goals;
pub mod pieces;
pub mod suggestions;
pub mod tasks;

use rocket::Route;
use serde::Serialize;

/// Items of one owner as returned by list views.
#[derive(Debug, Serialize)]
pub struct Listing<T> {
    pub owner: String,
    pub items: Vec<T>,
}

impl<T> Listing<T> {
    pub fn new(owner: &str, items: Vec<T>) -> Self {
        Self {
            owner: owner.to_string(),
            items,
        }
    }
}

/// Body of the GET half of a delete confirmation.
#[derive(Debug, Serialize)]
pub struct DeletePrompt<T> {
    pub question: String,
    pub object: T,
}

pub fn all() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(accounts::routes());
    routes.extend(goals::routes());
    routes.extend(pieces::routes());
    routes.extend(tasks::routes());
    routes.extend(challenges::routes());
    routes.extend(suggestions::routes());
    routes.extend(calendar::routes());
    routes
}
