//! Create poll and poll_option tables migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Poll::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Poll::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Poll::Question).text().not_null())
                    .col(
                        ColumnDef::new(Poll::PollType)
                            .string_len(16)
                            .not_null()
                            .default("SINGLE_CHOICE"),
                    )
                    .col(
                        ColumnDef::new(Poll::TargetAudience)
                            .string_len(16)
                            .not_null()
                            .default("ALL"),
                    )
                    .col(
                        ColumnDef::new(Poll::Status)
                            .string_len(16)
                            .not_null()
                            .default("ACTIVE"),
                    )
                    .col(
                        ColumnDef::new(Poll::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Poll::ResultsPublished)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Poll::CreatedBy).string_len(32).not_null())
                    .col(
                        ColumnDef::new(Poll::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: (status, expires_at) for the lazy sweep's conditional update
        manager
            .create_index(
                Index::create()
                    .name("idx_poll_status_expires_at")
                    .table(Poll::Table)
                    .col(Poll::Status)
                    .col(Poll::ExpiresAt)
                    .to_owned(),
            )
            .await?;

        // Index: target_audience for role-filtered listings
        manager
            .create_index(
                Index::create()
                    .name("idx_poll_target_audience")
                    .table(Poll::Table)
                    .col(Poll::TargetAudience)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PollOption::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PollOption::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(PollOption::PollId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PollOption::OptionText)
                            .string_len(256)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PollOption::Votes)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(PollOption::DisplayOrder)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_poll_option_poll")
                            .from(PollOption::Table, PollOption::PollId)
                            .to(Poll::Table, Poll::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: (poll_id, display_order) for ordered ballot reads
        manager
            .create_index(
                Index::create()
                    .name("idx_poll_option_poll_id_order")
                    .table(PollOption::Table)
                    .col(PollOption::PollId)
                    .col(PollOption::DisplayOrder)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PollOption::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Poll::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Poll {
    Table,
    Id,
    Question,
    PollType,
    TargetAudience,
    Status,
    ExpiresAt,
    ResultsPublished,
    CreatedBy,
    CreatedAt,
}

#[derive(Iden)]
enum PollOption {
    Table,
    Id,
    PollId,
    OptionText,
    Votes,
    DisplayOrder,
}
