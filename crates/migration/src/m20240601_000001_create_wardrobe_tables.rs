use sea_orm_migration::prelude::*;

pub const CATEGORIES: [&str; 6] = ["top", "bottom", "outer", "shoes", "socks", "accessory"];
pub const LAYERS: [&str; 3] = ["base", "mid", "outer"];
pub const STATUSES: [&str; 3] = ["clean", "laundry", "repair"];
pub const SLOTS: [&str; 8] = [
    "base",
    "mid",
    "outer",
    "bottom",
    "bottom_base",
    "shoes",
    "socks",
    "accessory",
];

#[derive(DeriveIden)]
enum Items {
    Table,
    Id,
    OwnerId,
    Category,
    Layer,
    Subcategory,
    Name,
    ColorPrimary,
    ColorSecondary,
    Size,
    Status,
    CareTags,
    ImagePath,
    DetailPath,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Outfits {
    Table,
    Id,
    OwnerId,
    Name,
    Notes,
    CoverImagePath,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum OutfitItems {
    Table,
    OutfitId,
    ItemId,
    Slot,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Plans {
    Table,
    Id,
    OwnerId,
    PlanDate,
    OutfitId,
    Notes,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

fn id_column<T: IntoIden>(column: T) -> ColumnDef {
    ColumnDef::new(column)
        .uuid()
        .not_null()
        .primary_key()
        .default(Expr::cust("gen_random_uuid()"))
        .to_owned()
}

// Rows default to the caller so inserts through the REST layer need no owner
fn owner_column<T: IntoIden>(column: T) -> ColumnDef {
    ColumnDef::new(column)
        .uuid()
        .not_null()
        .default(Expr::cust("auth.uid()"))
        .to_owned()
}

fn owner_foreign_key<T: IntoIden + 'static, C: IntoIden + 'static>(
    name: &str,
    table: T,
    column: C,
) -> ForeignKeyCreateStatement {
    ForeignKey::create()
        .name(name)
        .from(table, column)
        .to((Alias::new("auth"), Users::Table), Users::Id)
        .on_delete(ForeignKeyAction::Cascade)
        .to_owned()
}

fn timestamp_column<T: IntoIden>(column: T) -> ColumnDef {
    ColumnDef::new(column)
        .timestamp_with_time_zone()
        .not_null()
        .default(Expr::current_timestamp())
        .to_owned()
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Items::Table)
                    .if_not_exists()
                    .col(id_column(Items::Id))
                    .col(owner_column(Items::OwnerId))
                    .col(
                        ColumnDef::new(Items::Category)
                            .text()
                            .not_null()
                            .check(Expr::col(Items::Category).is_in(CATEGORIES)),
                    )
                    .col(
                        ColumnDef::new(Items::Layer)
                            .text()
                            .null()
                            .check(Expr::col(Items::Layer).is_in(LAYERS)),
                    )
                    .col(ColumnDef::new(Items::Subcategory).text())
                    .col(ColumnDef::new(Items::Name).text())
                    .col(ColumnDef::new(Items::ColorPrimary).text())
                    .col(ColumnDef::new(Items::ColorSecondary).text())
                    .col(ColumnDef::new(Items::Size).text())
                    .col(
                        ColumnDef::new(Items::Status)
                            .text()
                            .not_null()
                            .default("clean")
                            .check(Expr::col(Items::Status).is_in(STATUSES)),
                    )
                    .col(
                        ColumnDef::new(Items::CareTags)
                            .array(ColumnType::Text)
                            .not_null()
                            .default(Expr::cust("'{}'::text[]")),
                    )
                    .col(ColumnDef::new(Items::ImagePath).text())
                    .col(ColumnDef::new(Items::DetailPath).text())
                    .col(timestamp_column(Items::CreatedAt))
                    .col(timestamp_column(Items::UpdatedAt))
                    .foreign_key(&mut owner_foreign_key(
                        "fk_items_owner",
                        Items::Table,
                        Items::OwnerId,
                    ))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_items_owner_created")
                    .table(Items::Table)
                    .col(Items::OwnerId)
                    .col(Items::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Outfits::Table)
                    .if_not_exists()
                    .col(id_column(Outfits::Id))
                    .col(owner_column(Outfits::OwnerId))
                    .col(ColumnDef::new(Outfits::Name).text())
                    .col(ColumnDef::new(Outfits::Notes).text())
                    .col(ColumnDef::new(Outfits::CoverImagePath).text())
                    .col(timestamp_column(Outfits::CreatedAt))
                    .col(timestamp_column(Outfits::UpdatedAt))
                    .foreign_key(&mut owner_foreign_key(
                        "fk_outfits_owner",
                        Outfits::Table,
                        Outfits::OwnerId,
                    ))
                    .to_owned(),
            )
            .await?;

        // No foreign key to items: deleting an item leaves the association
        // behind and readers drop it.
        manager
            .create_table(
                Table::create()
                    .table(OutfitItems::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(OutfitItems::OutfitId).uuid().not_null())
                    .col(ColumnDef::new(OutfitItems::ItemId).uuid().not_null())
                    .col(
                        ColumnDef::new(OutfitItems::Slot)
                            .text()
                            .not_null()
                            .check(Expr::col(OutfitItems::Slot).is_in(SLOTS)),
                    )
                    .col(timestamp_column(OutfitItems::CreatedAt))
                    .primary_key(
                        Index::create()
                            .col(OutfitItems::OutfitId)
                            .col(OutfitItems::ItemId)
                            .col(OutfitItems::Slot),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_outfit_items_outfit")
                            .from(OutfitItems::Table, OutfitItems::OutfitId)
                            .to(Outfits::Table, Outfits::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Plans::Table)
                    .if_not_exists()
                    .col(id_column(Plans::Id))
                    .col(owner_column(Plans::OwnerId))
                    .col(ColumnDef::new(Plans::PlanDate).date().not_null())
                    .col(ColumnDef::new(Plans::OutfitId).uuid().null())
                    .col(ColumnDef::new(Plans::Notes).text())
                    .col(timestamp_column(Plans::CreatedAt))
                    .col(timestamp_column(Plans::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_plans_outfit")
                            .from(Plans::Table, Plans::OutfitId)
                            .to(Outfits::Table, Outfits::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(&mut owner_foreign_key(
                        "fk_plans_owner",
                        Plans::Table,
                        Plans::OwnerId,
                    ))
                    .to_owned(),
            )
            .await?;

        // Target of the plans upsert `on_conflict=owner_id,plan_date`
        manager
            .create_index(
                Index::create()
                    .name("plans_owner_id_plan_date_key")
                    .table(Plans::Table)
                    .col(Plans::OwnerId)
                    .col(Plans::PlanDate)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Plans::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(OutfitItems::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Outfits::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Items::Table).if_exists().to_owned())
            .await?;

        Ok(())
    }
}
