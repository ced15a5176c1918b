use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(IntegrationCredentials::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(IntegrationCredentials::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(IntegrationCredentials::ProviderType)
                            .string_len(50)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(IntegrationCredentials::AccountIdentifier)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(IntegrationCredentials::CredentialsJson)
                            .text()
                            .not_null(),
                    )
                    .col(ColumnDef::new(IntegrationCredentials::ExpiryDate).timestamp())
                    .col(
                        ColumnDef::new(IntegrationCredentials::Version)
                            .string_len(50)
                            .not_null()
                            .default("1"),
                    )
                    .col(
                        ColumnDef::new(IntegrationCredentials::AutomaticUpdate)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(IntegrationCredentials::CreatedBy).string_len(255))
                    .col(ColumnDef::new(IntegrationCredentials::UpdatedBy).string_len(255))
                    .col(
                        ColumnDef::new(IntegrationCredentials::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(IntegrationCredentials::UpdatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // 同一 provider 下每个租户只允许一条凭证
        manager
            .create_index(
                Index::create()
                    .name("idx_integration_credentials_provider_account")
                    .table(IntegrationCredentials::Table)
                    .col(IntegrationCredentials::ProviderType)
                    .col(IntegrationCredentials::AccountIdentifier)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(IntegrationCredentials::Table)
                    .to_owned(),
            )
            .await
    }
}

#[derive(DeriveIden)]
enum IntegrationCredentials {
    Table,
    Id,
    ProviderType,
    AccountIdentifier,
    CredentialsJson,
    ExpiryDate,
    Version,
    AutomaticUpdate,
    CreatedBy,
    UpdatedBy,
    CreatedAt,
    UpdatedAt,
}
