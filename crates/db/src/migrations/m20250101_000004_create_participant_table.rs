//! Create participant table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Participant::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Participant::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Participant::SessionId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Participant::Name).string_len(255).not_null())
                    .col(ColumnDef::new(Participant::Email).string_len(255).not_null())
                    .col(
                        ColumnDef::new(Participant::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_participant_session")
                            .from(Participant::Table, Participant::SessionId)
                            .to(Session::Table, Session::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: (session_id, email) - join arbitration
        manager
            .create_index(
                Index::create()
                    .name("idx_participant_session_email")
                    .table(Participant::Table)
                    .col(Participant::SessionId)
                    .col(Participant::Email)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Participant::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Participant {
    Table,
    Id,
    SessionId,
    Name,
    Email,
    CreatedAt,
}

#[derive(Iden)]
enum Session {
    Table,
    Id,
}
