use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Inventory read model: apartments -> rooms -> beds
        manager
            .create_table(
                Table::create()
                    .table(Apartments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Apartments::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Apartments::Name).string_len(200).not_null())
                    .col(ColumnDef::new(Apartments::OwnerId).integer().not_null())
                    .col(
                        ColumnDef::new(Apartments::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Apartments::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_apartments_owner")
                            .from(Apartments::Table, Apartments::OwnerId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Rooms::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Rooms::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Rooms::ApartmentId).integer().not_null())
                    .col(ColumnDef::new(Rooms::Name).string_len(100).not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_rooms_apartment")
                            .from(Rooms::Table, Rooms::ApartmentId)
                            .to(Apartments::Table, Apartments::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Beds::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Beds::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Beds::RoomId).integer().not_null())
                    .col(ColumnDef::new(Beds::BedNumber).string_len(10).not_null())
                    .col(
                        ColumnDef::new(Beds::MonthlyPrice)
                            .decimal_len(10, 2)
                            .not_null(),
                    )
                    // NULL means "use the configured default commission"
                    .col(ColumnDef::new(Beds::CommissionAmount).decimal_len(10, 2).null())
                    .col(
                        ColumnDef::new(Beds::Status)
                            .string_len(15)
                            .not_null()
                            .default("available"),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_beds_room")
                            .from(Beds::Table, Beds::RoomId)
                            .to(Rooms::Table, Rooms::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_rooms_apartment_id")
                    .table(Rooms::Table)
                    .col(Rooms::ApartmentId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_beds_room_id")
                    .table(Beds::Table)
                    .col(Beds::RoomId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Beds::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Rooms::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Apartments::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Apartments {
    Table,
    Id,
    Name,
    OwnerId,
    IsActive,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Rooms {
    Table,
    Id,
    ApartmentId,
    Name,
}

#[derive(DeriveIden)]
enum Beds {
    Table,
    Id,
    RoomId,
    BedNumber,
    MonthlyPrice,
    CommissionAmount,
    Status,
}
