use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum DirectConversations {
    Table,
    Id,
    ParticipantAId,
    ParticipantBId,
    CreatedAt,
    UpdatedAt,
}

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m20250301_000002_create_direct_conversations_table"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(DirectConversations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DirectConversations::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(DirectConversations::ParticipantAId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DirectConversations::ParticipantBId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DirectConversations::CreatedAt)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DirectConversations::UpdatedAt)
                            .big_integer()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Same-order pairs only; (b, a) is still a separate key
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_direct_conversations_pair")
                    .table(DirectConversations::Table)
                    .col(DirectConversations::ParticipantAId)
                    .col(DirectConversations::ParticipantBId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_direct_conversations_participant_b")
                    .table(DirectConversations::Table)
                    .col(DirectConversations::ParticipantBId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DirectConversations::Table).to_owned())
            .await
    }
}
