use sea_orm::{ConnectionTrait, Statement};
use sea_orm_migration::prelude::*;

use crate::utils::{disable_rls_sql, enable_rls_sql, RlsPolicy};

const OWNER_PREDICATE: &str = "owner_id = auth.uid()";
const OUTFIT_OWNER_PREDICATE: &str =
    "exists (select 1 from public.outfits o where o.id = outfit_id and o.owner_id = auth.uid())";

fn policies() -> Vec<RlsPolicy> {
    vec![
        RlsPolicy::owner_only("items", "public", OWNER_PREDICATE),
        RlsPolicy::owner_only("outfits", "public", OWNER_PREDICATE),
        RlsPolicy::owner_only("outfit_items", "public", OUTFIT_OWNER_PREDICATE),
        RlsPolicy::owner_only("plans", "public", OWNER_PREDICATE),
    ]
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        let backend = manager.get_database_backend();

        for policy in policies() {
            db.execute(Statement::from_string(
                backend,
                enable_rls_sql(&policy.table, policy.schema.as_deref()),
            ))
            .await?;
            db.execute(Statement::from_string(backend, policy.create_policy_sql()))
                .await?;
            println!(" -> RLS policy '{}' created.", policy.name);
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        let backend = manager.get_database_backend();

        for policy in policies() {
            db.execute(Statement::from_string(backend, policy.drop_policy_sql()))
                .await?;
            db.execute(Statement::from_string(
                backend,
                disable_rls_sql(&policy.table, policy.schema.as_deref()),
            ))
            .await?;
        }

        Ok(())
    }
}
