pub use sea_orm_migration::prelude::*;

mod m20250901_000001_create_accounts;
mod m20250901_000002_create_listings;
mod m20250902_000001_create_bookings;
mod m20250903_000001_create_payments;
mod m20250904_000001_create_messages;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250901_000001_create_accounts::Migration),
            Box::new(m20250901_000002_create_listings::Migration),
            Box::new(m20250902_000001_create_bookings::Migration),
            Box::new(m20250903_000001_create_payments::Migration),
            Box::new(m20250904_000001_create_messages::Migration),
        ]
    }
}
