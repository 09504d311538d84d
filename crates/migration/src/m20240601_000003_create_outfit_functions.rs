use sea_orm::{ConnectionTrait, Statement};
use sea_orm_migration::prelude::*;

// Each function body runs in a single transaction, so a failing
// association insert also discards the outfit row.
const CREATE_OUTFIT_WITH_ITEMS: &str = r#"
create or replace function public.create_outfit_with_items(
    p_name text,
    p_notes text,
    p_cover_image_path text,
    p_items jsonb
)
returns public.outfits
language plpgsql
security invoker
as $$
declare
    v_outfit public.outfits;
begin
    insert into public.outfits (owner_id, name, notes, cover_image_path)
    values (auth.uid(), p_name, p_notes, p_cover_image_path)
    returning * into v_outfit;

    insert into public.outfit_items (outfit_id, item_id, slot)
    select v_outfit.id, (elem ->> 'item_id')::uuid, elem ->> 'slot'
    from jsonb_array_elements(coalesce(p_items, '[]'::jsonb)) as elem;

    return v_outfit;
end;
$$;
"#;

const REPLACE_OUTFIT_ITEMS: &str = r#"
create or replace function public.replace_outfit_items(
    p_outfit_id uuid,
    p_items jsonb
)
returns void
language plpgsql
security invoker
as $$
begin
    if not exists (select 1 from public.outfits where id = p_outfit_id) then
        raise exception 'outfit % not found', p_outfit_id using errcode = 'P0002';
    end if;

    delete from public.outfit_items where outfit_id = p_outfit_id;

    insert into public.outfit_items (outfit_id, item_id, slot)
    select p_outfit_id, (elem ->> 'item_id')::uuid, elem ->> 'slot'
    from jsonb_array_elements(coalesce(p_items, '[]'::jsonb)) as elem;

    update public.outfits set updated_at = now() where id = p_outfit_id;
end;
$$;
"#;

const TOUCH_UPDATED_AT: &str = r#"
create or replace function public.touch_updated_at()
returns trigger
language plpgsql
as $$
begin
    new.updated_at = now();
    return new;
end;
$$;
"#;

const TOUCHED_TABLES: [&str; 3] = ["items", "outfits", "plans"];

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        let backend = manager.get_database_backend();

        for sql in [CREATE_OUTFIT_WITH_ITEMS, REPLACE_OUTFIT_ITEMS, TOUCH_UPDATED_AT] {
            db.execute(Statement::from_string(backend, sql.to_string()))
                .await?;
        }

        for table in TOUCHED_TABLES {
            let sql = format!(
                "create trigger {table}_touch_updated_at before update on public.{table} \
                 for each row execute function public.touch_updated_at();"
            );
            db.execute(Statement::from_string(backend, sql)).await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        let backend = manager.get_database_backend();

        for table in TOUCHED_TABLES {
            let sql = format!("drop trigger if exists {table}_touch_updated_at on public.{table};");
            db.execute(Statement::from_string(backend, sql)).await?;
        }

        for sql in [
            "drop function if exists public.touch_updated_at();",
            "drop function if exists public.replace_outfit_items(uuid, jsonb);",
            "drop function if exists public.create_outfit_with_items(text, text, text, jsonb);",
        ] {
            db.execute(Statement::from_string(backend, sql.to_string()))
                .await?;
        }

        Ok(())
    }
}
