//! Direct conversation entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "direct_conversations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub participant_a_id: String, // user who opened the conversation
    pub participant_b_id: String,
    pub created_at: i64, // microseconds
    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::private_messages::Entity")]
    PrivateMessages,
}

impl Related<super::private_messages::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PrivateMessages.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
