use sea_orm_migration::prelude::*;

use super::m20240101_000002_create_songs::Songs;
use super::m20240101_000003_create_playlists::Playlists;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Entries have their own key: a song may sit in a playlist more than once
        manager
            .create_table(
                Table::create()
                    .table(PlaylistSongs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PlaylistSongs::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PlaylistSongs::PlaylistId).uuid().not_null())
                    .col(ColumnDef::new(PlaylistSongs::SongId).uuid().not_null())
                    .col(
                        ColumnDef::new(PlaylistSongs::Position)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(PlaylistSongs::AddedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_playlist_songs_playlist_id")
                            .from(PlaylistSongs::Table, PlaylistSongs::PlaylistId)
                            .to(Playlists::Table, Playlists::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_playlist_songs_song_id")
                            .from(PlaylistSongs::Table, PlaylistSongs::SongId)
                            .to(Songs::Table, Songs::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_playlist_songs_playlist_position")
                    .table(PlaylistSongs::Table)
                    .col(PlaylistSongs::PlaylistId)
                    .col(PlaylistSongs::Position)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PlaylistSongs::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum PlaylistSongs {
    Table,
    Id,
    PlaylistId,
    SongId,
    Position,
    AddedAt,
}
