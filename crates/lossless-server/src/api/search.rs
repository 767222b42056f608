use axum::{
    extract::{Query, State},
    Json,
};
use lossless_models::{Playlist, Song};
use sea_orm::sea_query::{Expr, Func, LikeExpr, SimpleExpr};
use sea_orm::{ColumnTrait, Condition, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::{ApiError, ApiResult};
use lossless_db::entities::{playlist, song};
use lossless_db::AppState;

const DEFAULT_LIMIT: u64 = 20;
const MAX_LIMIT: u64 = 50;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: String,
    pub limit: Option<u64>,
}

impl SearchParams {
    fn limit(&self) -> u64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

/// `%term%` with LIKE wildcards in the user's text escaped, lower-cased.
pub(crate) fn like_pattern(q: &str) -> Result<String, ApiError> {
    let q = q.trim();
    if q.is_empty() {
        return Err(ApiError::Validation("Search query cannot be empty".into()));
    }
    // SECURITY: escape SQL LIKE wildcards to prevent wildcard-abuse DoS
    let escaped = q
        .to_lowercase()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    Ok(format!("%{escaped}%"))
}

/// Case-insensitive `LOWER(col) LIKE pattern ESCAPE '\'`, portable across backends.
fn contains<C: ColumnTrait>(column: C, pattern: &str) -> SimpleExpr {
    Expr::expr(Func::lower(Expr::col(column))).like(LikeExpr::new(pattern).escape('\\'))
}

/// GET /api/songs/search?q=
pub async fn search_songs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<Vec<Song>>> {
    let pattern = like_pattern(&params.q)?;

    let songs = song::Entity::find()
        .filter(
            Condition::any()
                .add(contains(song::Column::Title, &pattern))
                .add(contains(song::Column::Artist, &pattern))
                .add(contains(song::Column::Album, &pattern))
                .add(contains(song::Column::Genre, &pattern)),
        )
        .order_by_desc(song::Column::PlayCount)
        .order_by_desc(song::Column::CreatedAt)
        .limit(params.limit())
        .all(&state.db)
        .await?;

    Ok(Json(songs.into_iter().map(Song::from).collect()))
}

/// GET /api/playlists/search?q= (public playlists only)
pub async fn search_playlists(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<Vec<Playlist>>> {
    let pattern = like_pattern(&params.q)?;

    let playlists = playlist::Entity::find()
        .filter(playlist::Column::IsPublic.eq(true))
        .filter(
            Condition::any()
                .add(contains(playlist::Column::Name, &pattern))
                .add(contains(playlist::Column::Description, &pattern)),
        )
        .order_by_desc(playlist::Column::UpdatedAt)
        .limit(params.limit())
        .all(&state.db)
        .await?;

    Ok(Json(
        playlists.into_iter().map(|p| p.into_summary(None)).collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_wraps_and_lowercases() {
        assert_eq!(like_pattern("Miles").unwrap(), "%miles%");
        assert_eq!(like_pattern("  Kind of Blue ").unwrap(), "%kind of blue%");
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("100%").unwrap(), "%100\\%%");
        assert_eq!(like_pattern("a_b").unwrap(), "%a\\_b%");
        assert_eq!(like_pattern("c:\\x").unwrap(), "%c:\\\\x%");
    }

    #[test]
    fn test_like_pattern_rejects_empty() {
        assert!(matches!(like_pattern("   "), Err(ApiError::Validation(_))));
    }

    #[test]
    fn test_search_limit_clamped() {
        let params = SearchParams {
            q: "x".into(),
            limit: Some(500),
        };
        assert_eq!(params.limit(), MAX_LIMIT);
        let params = SearchParams {
            q: "x".into(),
            limit: None,
        };
        assert_eq!(params.limit(), DEFAULT_LIMIT);
    }
}
