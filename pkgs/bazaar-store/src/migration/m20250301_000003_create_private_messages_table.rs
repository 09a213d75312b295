use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum PrivateMessages {
    Table,
    Id,
    ConversationId,
    SenderId,
    Content,
    CreatedAt,
    IsRead,
    IsDeleted,
}

#[derive(DeriveIden)]
enum DirectConversations {
    Table,
    Id,
}

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m20250301_000003_create_private_messages_table"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PrivateMessages::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PrivateMessages::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(PrivateMessages::ConversationId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PrivateMessages::SenderId).string().not_null())
                    .col(ColumnDef::new(PrivateMessages::Content).text().not_null())
                    .col(
                        ColumnDef::new(PrivateMessages::CreatedAt)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PrivateMessages::IsRead)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(PrivateMessages::IsDeleted)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_private_messages_conversation")
                            .from(PrivateMessages::Table, PrivateMessages::ConversationId)
                            .to(DirectConversations::Table, DirectConversations::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_private_messages_conversation_created")
                    .table(PrivateMessages::Table)
                    .col(PrivateMessages::ConversationId)
                    .col(PrivateMessages::CreatedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PrivateMessages::Table).to_owned())
            .await
    }
}
