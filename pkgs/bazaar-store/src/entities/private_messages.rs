//! Private message entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "private_messages")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub content: String,
    pub created_at: i64, // microseconds, server assigned
    pub is_read: bool,
    pub is_deleted: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::direct_conversations::Entity",
        from = "Column::ConversationId",
        to = "super::direct_conversations::Column::Id"
    )]
    DirectConversation,
}

impl Related<super::direct_conversations::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DirectConversation.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
