use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_sellers_table::Migration),
            Box::new(m20240101_000002_create_products_table::Migration),
            Box::new(m20240101_000003_create_metric_overrides_table::Migration),
            Box::new(m20240101_000004_create_distributions_table::Migration),
            Box::new(m20240101_000005_create_allocation_sales_table::Migration),
        ]
    }
}

// Migration implementations

mod m20240101_000001_create_sellers_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_sellers_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Sellers::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Sellers::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Sellers::ShopName).string().not_null())
                        .col(
                            ColumnDef::new(Sellers::ShopRating)
                                .decimal_len(4, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Sellers::Followers)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Sellers::CreditScore)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Sellers::TotalCustomers)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Sellers::CreatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Sellers::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum Sellers {
        Table,
        Id,
        ShopName,
        ShopRating,
        Followers,
        CreditScore,
        TotalCustomers,
        CreatedAt,
    }
}

mod m20240101_000002_create_products_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_products_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Products::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Products::Name).string().not_null())
                        .col(
                            ColumnDef::new(Products::Price)
                                .decimal_len(19, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Products::Stock)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Products::CreatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum Products {
        Table,
        Id,
        Name,
        Price,
        Stock,
        CreatedAt,
    }
}

mod m20240101_000003_create_metric_overrides_table {
    use sea_orm_migration::prelude::*;

    use super::m20240101_000001_create_sellers_table::Sellers;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_metric_overrides_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(MetricOverrides::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(MetricOverrides::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(MetricOverrides::SellerId).uuid().not_null())
                        .col(
                            ColumnDef::new(MetricOverrides::MetricName)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(MetricOverrides::Period).string().not_null())
                        .col(
                            ColumnDef::new(MetricOverrides::OverrideValue)
                                .decimal_len(19, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(MetricOverrides::PeriodSpecificValue)
                                .decimal_len(19, 4)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(MetricOverrides::OriginalValue)
                                .decimal_len(19, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(MetricOverrides::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(MetricOverrides::UpdatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_metric_overrides_seller")
                                .from(MetricOverrides::Table, MetricOverrides::SellerId)
                                .to(Sellers::Table, Sellers::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            // The upsert and the one-row-per-tuple invariant both hang off
            // this index.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_metric_overrides_tuple")
                        .table(MetricOverrides::Table)
                        .col(MetricOverrides::SellerId)
                        .col(MetricOverrides::MetricName)
                        .col(MetricOverrides::Period)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(MetricOverrides::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum MetricOverrides {
        Table,
        Id,
        SellerId,
        MetricName,
        Period,
        OverrideValue,
        PeriodSpecificValue,
        OriginalValue,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000004_create_distributions_table {
    use sea_orm_migration::prelude::*;

    use super::m20240101_000001_create_sellers_table::Sellers;
    use super::m20240101_000002_create_products_table::Products;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_distributions_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Distributions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Distributions::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Distributions::SellerId).uuid().not_null())
                        .col(ColumnDef::new(Distributions::ProductId).uuid().not_null())
                        .col(
                            ColumnDef::new(Distributions::SellerPrice)
                                .decimal_len(19, 4)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Distributions::Markup)
                                .decimal_len(19, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Distributions::FinalPrice)
                                .decimal_len(19, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Distributions::AllocatedStock)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Distributions::SoldQuantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Distributions::AvailableStock)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Distributions::TotalSales)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Distributions::TotalRevenue)
                                .decimal_len(19, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Distributions::TotalProfit)
                                .decimal_len(19, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Distributions::Status).string().not_null())
                        .col(
                            ColumnDef::new(Distributions::IsPromoted)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(Distributions::CommissionRate)
                                .decimal_len(5, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Distributions::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Distributions::UpdatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_distributions_seller")
                                .from(Distributions::Table, Distributions::SellerId)
                                .to(Sellers::Table, Sellers::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_distributions_product")
                                .from(Distributions::Table, Distributions::ProductId)
                                .to(Products::Table, Products::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_distributions_seller_product")
                        .table(Distributions::Table)
                        .col(Distributions::SellerId)
                        .col(Distributions::ProductId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_distributions_status")
                        .table(Distributions::Table)
                        .col(Distributions::Status)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Distributions::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum Distributions {
        Table,
        Id,
        SellerId,
        ProductId,
        SellerPrice,
        Markup,
        FinalPrice,
        AllocatedStock,
        SoldQuantity,
        AvailableStock,
        TotalSales,
        TotalRevenue,
        TotalProfit,
        Status,
        IsPromoted,
        CommissionRate,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000005_create_allocation_sales_table {
    use sea_orm_migration::prelude::*;

    use super::m20240101_000004_create_distributions_table::Distributions;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000005_create_allocation_sales_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(AllocationSales::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(AllocationSales::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(AllocationSales::DistributionId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(AllocationSales::SellerId).uuid().not_null())
                        .col(ColumnDef::new(AllocationSales::ProductId).uuid().not_null())
                        .col(
                            ColumnDef::new(AllocationSales::Quantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(AllocationSales::Revenue)
                                .decimal_len(19, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(AllocationSales::Profit)
                                .decimal_len(19, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(AllocationSales::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_allocation_sales_distribution")
                                .from(AllocationSales::Table, AllocationSales::DistributionId)
                                .to(Distributions::Table, Distributions::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            // Period aggregation scans by seller and time window.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_allocation_sales_seller_created")
                        .table(AllocationSales::Table)
                        .col(AllocationSales::SellerId)
                        .col(AllocationSales::CreatedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(AllocationSales::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum AllocationSales {
        Table,
        Id,
        DistributionId,
        SellerId,
        ProductId,
        Quantity,
        Revenue,
        Profit,
        CreatedAt,
    }
}
