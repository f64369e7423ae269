//! Create session table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Session::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Session::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Session::HostId).string_len(32).not_null())
                    .col(ColumnDef::new(Session::JoinCode).string_len(16).not_null())
                    .col(ColumnDef::new(Session::Name).string_len(255).not_null())
                    .col(
                        ColumnDef::new(Session::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_session_host")
                            .from(Session::Table, Session::HostId)
                            .to(Host::Table, Host::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: join_code. Session creation retries on violation.
        manager
            .create_index(
                Index::create()
                    .name("idx_session_join_code")
                    .table(Session::Table)
                    .col(Session::JoinCode)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Index: host_id (for listing a host's sessions)
        manager
            .create_index(
                Index::create()
                    .name("idx_session_host_id")
                    .table(Session::Table)
                    .col(Session::HostId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Session::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Session {
    Table,
    Id,
    HostId,
    JoinCode,
    Name,
    CreatedAt,
}

#[derive(Iden)]
enum Host {
    Table,
    Id,
}
