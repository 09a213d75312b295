//! Sea-ORM migrations for the messaging schema

pub use sea_orm_migration::prelude::*;

mod m20250301_000001_create_profiles_table;
mod m20250301_000002_create_direct_conversations_table;
mod m20250301_000003_create_private_messages_table;
mod m20250301_000004_create_message_read_status_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_create_profiles_table::Migration),
            Box::new(m20250301_000002_create_direct_conversations_table::Migration),
            Box::new(m20250301_000003_create_private_messages_table::Migration),
            Box::new(m20250301_000004_create_message_read_status_table::Migration),
        ]
    }
}
