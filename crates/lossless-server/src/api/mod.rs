pub mod audio;
pub mod playlists;
pub mod search;
pub mod songs;
pub mod users;

use lossless_models::PaginatedResponse;
use sea_orm::{DatabaseConnection, EntityTrait, PaginatorTrait, Select};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct PaginationParams {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

impl PaginationParams {
    /// 1-based page and a page size clamped to 1..=100.
    pub fn resolve(&self) -> (u64, u64) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self.per_page.unwrap_or(20).clamp(1, 100);
        (page, per_page)
    }
}

/// Run a paginated select and map each row into its wire type.
pub(crate) async fn paginate<E, T>(
    db: &DatabaseConnection,
    select: Select<E>,
    params: &PaginationParams,
    map: impl Fn(E::Model) -> T,
) -> Result<PaginatedResponse<T>, sea_orm::DbErr>
where
    E: EntityTrait,
    E::Model: Send + Sync + 'static,
{
    let (page, per_page) = params.resolve();
    let paginator = select.paginate(db, per_page);

    let total = paginator.num_items().await?;
    let rows = paginator.fetch_page(page - 1).await?;

    Ok(PaginatedResponse {
        data: rows.into_iter().map(map).collect(),
        total,
        page,
        per_page,
        total_pages: total.div_ceil(per_page),
    })
}
