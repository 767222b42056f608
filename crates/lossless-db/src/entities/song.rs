use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "songs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub release_date: Option<String>,
    pub duration_secs: f64,
    /// Storage-relative path of the audio file
    pub file_path: String,
    pub file_size: i64,
    /// Cover filename under `covers/`; `None` means the default cover
    pub cover_art: Option<String>,
    pub format: String,
    pub bitrate: i32,
    pub has_dolby_atmos: bool,
    #[sea_orm(default_value = "0")]
    pub play_count: i64,
    pub added_by: Uuid,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::AddedBy",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Uploader,
    #[sea_orm(has_many = "super::playlist_song::Entity")]
    PlaylistSong,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Uploader.def()
    }
}

impl Related<super::playlist_song::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PlaylistSong.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for lossless_models::Song {
    fn from(m: Model) -> Self {
        let cover_url = lossless_models::cover_url(m.cover_art.as_deref());
        Self {
            id: m.id,
            title: m.title,
            artist: m.artist,
            album: m.album,
            genre: m.genre,
            release_date: m.release_date,
            duration_secs: m.duration_secs,
            format: m.format,
            bitrate: m.bitrate,
            has_dolby_atmos: m.has_dolby_atmos,
            play_count: m.play_count,
            cover_url,
            added_by: m.added_by,
            created_at: m.created_at,
        }
    }
}
