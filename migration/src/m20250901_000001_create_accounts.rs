use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Users::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Users::Username)
                            .string_len(150)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Users::Email).string_len(254).not_null())
                    // "buyer" | "seller"
                    .col(
                        ColumnDef::new(Users::Role)
                            .string_len(10)
                            .not_null()
                            .default("buyer"),
                    )
                    .col(ColumnDef::new(Users::Phone).string_len(15).null())
                    .col(
                        ColumnDef::new(Users::IsVerified)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Users::ContractAccepted)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Users::ContractAcceptedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(Users::ContractAcceptedIp).string_len(45).null())
                    .col(
                        ColumnDef::new(Users::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SellerVerifications::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SellerVerifications::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    // One verification record per seller
                    .col(
                        ColumnDef::new(SellerVerifications::SellerId)
                            .integer()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(SellerVerifications::IdDocumentPath)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SellerVerifications::OwnershipDocumentPath)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SellerVerifications::Status)
                            .string_len(10)
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(SellerVerifications::RejectionReason).text().null())
                    .col(
                        ColumnDef::new(SellerVerifications::SubmittedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SellerVerifications::ReviewedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_seller_verifications_seller")
                            .from(SellerVerifications::Table, SellerVerifications::SellerId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SellerVerifications::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    Username,
    Email,
    Role,
    Phone,
    IsVerified,
    ContractAccepted,
    ContractAcceptedAt,
    ContractAcceptedIp,
    CreatedAt,
}

#[derive(DeriveIden)]
enum SellerVerifications {
    Table,
    Id,
    SellerId,
    IdDocumentPath,
    OwnershipDocumentPath,
    Status,
    RejectionReason,
    SubmittedAt,
    ReviewedAt,
}
