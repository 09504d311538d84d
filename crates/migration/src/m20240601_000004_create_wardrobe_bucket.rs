use sea_orm::{ConnectionTrait, Statement};
use sea_orm_migration::prelude::*;

use crate::utils::{RlsCommand, RlsPolicy, RlsRole};

const BUCKET: &str = "wardrobe";

// Object keys start with the owner's id: `{owner}/items/...`
fn owner_prefix_predicate() -> String {
    format!(
        "bucket_id = '{}' and (storage.foldername(name))[1] = auth.uid()::text",
        BUCKET
    )
}

fn policies() -> Vec<RlsPolicy> {
    let predicate = owner_prefix_predicate();
    [
        ("select", RlsCommand::Select),
        ("insert", RlsCommand::Insert),
        ("update", RlsCommand::Update),
        ("delete", RlsCommand::Delete),
    ]
    .into_iter()
    .map(|(verb, command)| RlsPolicy {
        name: format!("{} objects {} own", BUCKET, verb),
        table: "objects".to_string(),
        command,
        role: RlsRole::Authenticated,
        using: Some(predicate.clone()),
        check: match command {
            RlsCommand::Insert | RlsCommand::Update => Some(predicate.clone()),
            _ => None,
        },
        schema: Some("storage".to_string()),
    })
    .collect()
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        let backend = manager.get_database_backend();

        db.execute(Statement::from_string(
            backend,
            format!(
                "insert into storage.buckets (id, name, public) values ('{0}', '{0}', false) \
                 on conflict (id) do nothing;",
                BUCKET
            ),
        ))
        .await?;

        for policy in policies() {
            db.execute(Statement::from_string(backend, policy.create_policy_sql()))
                .await?;
        }
        println!(" -> Bucket '{}' ready.", BUCKET);

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        let backend = manager.get_database_backend();

        for policy in policies() {
            db.execute(Statement::from_string(backend, policy.drop_policy_sql()))
                .await?;
        }

        // Buckets with objects cannot be dropped; leave them to the operator
        db.execute(Statement::from_string(
            backend,
            format!(
                "delete from storage.buckets where id = '{}' \
                 and not exists (select 1 from storage.objects where bucket_id = '{0}');",
                BUCKET
            ),
        ))
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_policies_cover_every_command() {
        let policies = policies();
        assert_eq!(policies.len(), 4);
        assert!(policies
            .iter()
            .all(|p| p.create_policy_sql().contains("storage.foldername(name))[1]")));
        let insert = policies
            .iter()
            .find(|p| p.command == RlsCommand::Insert)
            .map(RlsPolicy::create_policy_sql)
            .unwrap_or_default();
        assert!(insert.contains("WITH CHECK"));
        assert!(!insert.contains("USING"));
    }
}
