use sea_orm_migration::prelude::*;

use super::m20240101_000001_create_users::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Songs::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Songs::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Songs::Title).string_len(512).not_null())
                    .col(ColumnDef::new(Songs::Artist).string_len(512).not_null())
                    .col(ColumnDef::new(Songs::Album).string_len(512).null())
                    .col(ColumnDef::new(Songs::Genre).string_len(128).null())
                    .col(ColumnDef::new(Songs::ReleaseDate).string_len(64).null())
                    .col(
                        ColumnDef::new(Songs::DurationSecs)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(ColumnDef::new(Songs::FilePath).string_len(1024).not_null())
                    .col(
                        ColumnDef::new(Songs::FileSize)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Songs::CoverArt).string_len(255).null())
                    .col(ColumnDef::new(Songs::Format).string_len(16).not_null())
                    .col(
                        ColumnDef::new(Songs::Bitrate)
                            .integer()
                            .not_null()
                            .default(1411),
                    )
                    .col(
                        ColumnDef::new(Songs::HasDolbyAtmos)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Songs::PlayCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Songs::AddedBy).uuid().not_null())
                    .col(
                        ColumnDef::new(Songs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_songs_added_by")
                            .from(Songs::Table, Songs::AddedBy)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_songs_added_by")
                    .table(Songs::Table)
                    .col(Songs::AddedBy)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_songs_title")
                    .table(Songs::Table)
                    .col(Songs::Title)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Songs::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Songs {
    Table,
    Id,
    Title,
    Artist,
    Album,
    Genre,
    ReleaseDate,
    DurationSecs,
    FilePath,
    FileSize,
    CoverArt,
    Format,
    Bitrate,
    HasDolbyAtmos,
    PlayCount,
    AddedBy,
    CreatedAt,
}
