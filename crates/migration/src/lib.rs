//! Schema for the wardrobe: tables, owner policies, the atomic outfit
//! functions and the private object bucket.

pub use sea_orm_migration::prelude::*;

mod m20240601_000001_create_wardrobe_tables;
mod m20240601_000002_enable_owner_policies;
mod m20240601_000003_create_outfit_functions;
mod m20240601_000004_create_wardrobe_bucket;

pub mod utils;

pub use utils::{disable_rls_sql, enable_rls_sql, RlsCommand, RlsPolicy, RlsRole};

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240601_000001_create_wardrobe_tables::Migration),
            Box::new(m20240601_000002_enable_owner_policies::Migration),
            Box::new(m20240601_000003_create_outfit_functions::Migration),
            Box::new(m20240601_000004_create_wardrobe_bucket::Migration),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_ordered_by_name() {
        let names: Vec<String> = Migrator::migrations()
            .iter()
            .map(|m| m.name().to_string())
            .collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        assert_eq!(names.len(), 4);
    }
}
