use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum MessageReadStatus {
    Table,
    ConversationId,
    UserId,
    LastReadAt,
}

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m20250301_000004_create_message_read_status_table"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MessageReadStatus::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MessageReadStatus::ConversationId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(MessageReadStatus::UserId).string().not_null())
                    .col(
                        ColumnDef::new(MessageReadStatus::LastReadAt)
                            .big_integer()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(MessageReadStatus::ConversationId)
                            .col(MessageReadStatus::UserId),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MessageReadStatus::Table).to_owned())
            .await
    }
}
