use serde::Serialize;
use tracing::info;

use crate::{
    alerts::Alert,
    error::AppError,
    state::AppState,
    store::DocRef,
    sync::{ArraySync, MergeStrategy, ScreenScope},
};

pub const DEFAULT_CATEGORIES: [&str; 4] = ["Casual", "Party", "Formal", "Semi-Formal"];

/// Array field on the user document holding the custom categories.
pub const FIELD: &str = "customCategories";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryList {
    pub defaults: Vec<String>,
    pub custom: Vec<String>,
    /// Defaults first, then custom categories in creation order.
    pub all: Vec<String>,
}

impl CategoryList {
    fn new(custom: Vec<String>) -> Self {
        let defaults: Vec<String> = DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect();
        let all = defaults
            .iter()
            .cloned()
            .chain(custom.iter().filter(|c| !is_default(c)).cloned())
            .collect();
        Self {
            defaults,
            custom,
            all,
        }
    }
}

pub fn is_default(name: &str) -> bool {
    DEFAULT_CATEGORIES.contains(&name)
}

/// Categories screen state, loaded from the user document.
pub async fn open(state: &AppState, uid: &str, scope: &ScreenScope) -> Result<ArraySync<String>, AppError> {
    let sync = ArraySync::new(
        state.store.clone(),
        DocRef::user(uid),
        FIELD,
        MergeStrategy::ScalarSet,
        scope,
    )
    .with_alerts(state.alerts.clone())
    .with_failure_alert(Alert::new("Error", "Could not save category."));
    sync.load().await?;
    Ok(sync)
}

pub async fn list(state: &AppState, uid: &str) -> Result<CategoryList, AppError> {
    let scope = ScreenScope::new();
    let sync = open(state, uid, &scope).await?;
    Ok(CategoryList::new(sync.items()))
}

pub async fn create(state: &AppState, uid: &str, name: &str) -> Result<CategoryList, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::validation("Oops", "Please enter a category name."));
    }
    if is_default(name) {
        return Err(already_exists(name));
    }
    let scope = ScreenScope::new();
    let sync = open(state, uid, &scope).await?;
    sync.add(name.to_string()).await?;
    info!(user_id = %uid, category = %name, "category created");
    Ok(CategoryList::new(sync.items()))
}

/// Rename a custom category: remove the old value, add the new one.
pub async fn rename(
    state: &AppState,
    uid: &str,
    current: &str,
    new_name: &str,
) -> Result<CategoryList, AppError> {
    let new_name = new_name.trim();
    if new_name.is_empty() {
        return Err(AppError::validation("Error", "Name required"));
    }
    if is_default(new_name) {
        return Err(already_exists(new_name));
    }
    let scope = ScreenScope::new();
    let sync = open(state, uid, &scope).await?;
    if new_name != current {
        sync.update(&current.to_string(), |_| new_name.to_string())
            .await?;
        info!(user_id = %uid, from = %current, to = %new_name, "category renamed");
    }
    Ok(CategoryList::new(sync.items()))
}

pub async fn delete(state: &AppState, uid: &str, name: &str) -> Result<CategoryList, AppError> {
    let scope = ScreenScope::new();
    let sync = open(state, uid, &scope).await?;
    sync.remove(&name.to_string()).await?;
    info!(user_id = %uid, category = %name, "category deleted");
    Ok(CategoryList::new(sync.items()))
}

fn already_exists(name: &str) -> AppError {
    AppError::validation("Already exists", &format!("\"{name}\" already exists."))
}
