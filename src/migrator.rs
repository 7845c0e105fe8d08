use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_catalog_tables::Migration),
            Box::new(m20240101_000002_create_stock_tables::Migration),
            Box::new(m20240101_000003_create_receipt_tables::Migration),
            Box::new(m20240101_000004_create_delivery_tables::Migration),
            Box::new(m20240101_000005_create_transfer_tables::Migration),
            Box::new(m20240101_000006_create_adjustments_table::Migration),
            Box::new(m20240101_000007_create_document_sequences::Migration),
        ]
    }
}

// Migration implementations

mod m20240101_000001_create_catalog_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_catalog_tables"
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
                        .col(ColumnDef::new(Products::Sku).string().not_null())
                        .col(ColumnDef::new(Products::Name).string().not_null())
                        .col(ColumnDef::new(Products::Description).string().null())
                        .col(ColumnDef::new(Products::UnitOfMeasure).string().not_null())
                        .col(
                            ColumnDef::new(Products::ReorderLevel)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Products::ReorderQuantity)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Products::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(ColumnDef::new(Products::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Products::UpdatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_products_sku")
                        .table(Products::Table)
                        .col(Products::Sku)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Warehouses::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Warehouses::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Warehouses::Name).string().not_null())
                        .col(
                            ColumnDef::new(Warehouses::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(ColumnDef::new(Warehouses::CreatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Warehouses::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Products {
        Table,
        Id,
        Sku,
        Name,
        Description,
        UnitOfMeasure,
        ReorderLevel,
        ReorderQuantity,
        IsActive,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum Warehouses {
        Table,
        Id,
        Name,
        IsActive,
        CreatedAt,
    }
}

mod m20240101_000002_create_stock_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_stock_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StockLocations::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockLocations::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockLocations::ProductId).uuid().not_null())
                        .col(
                            ColumnDef::new(StockLocations::WarehouseId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockLocations::RackLocation)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockLocations::Quantity)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(StockLocations::Version)
                                .big_integer()
                                .not_null()
                                .default(1),
                        )
                        .col(
                            ColumnDef::new(StockLocations::UpdatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            // One row per (product, warehouse, rack) key
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_locations_key")
                        .table(StockLocations::Table)
                        .col(StockLocations::ProductId)
                        .col(StockLocations::WarehouseId)
                        .col(StockLocations::RackLocation)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(StockMovements::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockMovements::Id)
                                .big_integer()
                                .auto_increment()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockMovements::ProductId).uuid().not_null())
                        .col(
                            ColumnDef::new(StockMovements::WarehouseId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockMovements::RackLocation)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockMovements::MovementKind)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockMovements::ReferenceType)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockMovements::ReferenceId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockMovements::ReferenceNumber)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockMovements::QuantityChange)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockMovements::QuantityBefore)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockMovements::QuantityAfter)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockMovements::CreatedBy).uuid().not_null())
                        .col(
                            ColumnDef::new(StockMovements::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_movements_key")
                        .table(StockMovements::Table)
                        .col(StockMovements::ProductId)
                        .col(StockMovements::WarehouseId)
                        .col(StockMovements::RackLocation)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_movements_reference")
                        .table(StockMovements::Table)
                        .col(StockMovements::ReferenceType)
                        .col(StockMovements::ReferenceId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_movements_created_at")
                        .table(StockMovements::Table)
                        .col(StockMovements::CreatedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockMovements::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(StockLocations::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum StockLocations {
        Table,
        Id,
        ProductId,
        WarehouseId,
        RackLocation,
        Quantity,
        Version,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum StockMovements {
        Table,
        Id,
        ProductId,
        WarehouseId,
        RackLocation,
        MovementKind,
        ReferenceType,
        ReferenceId,
        ReferenceNumber,
        QuantityChange,
        QuantityBefore,
        QuantityAfter,
        CreatedBy,
        CreatedAt,
    }
}

mod m20240101_000003_create_receipt_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_receipt_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Receipts::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Receipts::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Receipts::ReceiptNumber).string().not_null())
                        .col(ColumnDef::new(Receipts::SupplierName).string().not_null())
                        .col(ColumnDef::new(Receipts::WarehouseId).uuid().not_null())
                        .col(ColumnDef::new(Receipts::Status).string().not_null())
                        .col(ColumnDef::new(Receipts::ScheduledDate).date().not_null())
                        .col(ColumnDef::new(Receipts::ReceivedDate).date().null())
                        .col(ColumnDef::new(Receipts::Notes).string().null())
                        .col(ColumnDef::new(Receipts::CreatedBy).uuid().not_null())
                        .col(ColumnDef::new(Receipts::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Receipts::UpdatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_receipts_number")
                        .table(Receipts::Table)
                        .col(Receipts::ReceiptNumber)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_receipts_status")
                        .table(Receipts::Table)
                        .col(Receipts::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ReceiptLines::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ReceiptLines::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ReceiptLines::ReceiptId).uuid().not_null())
                        .col(ColumnDef::new(ReceiptLines::ProductId).uuid().not_null())
                        .col(
                            ColumnDef::new(ReceiptLines::Quantity)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ReceiptLines::ReceivedQuantity)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ReceiptLines::RackLocation)
                                .string()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_receipt_lines_receipt")
                                .from(ReceiptLines::Table, ReceiptLines::ReceiptId)
                                .to(Receipts::Table, Receipts::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_receipt_lines_receipt_id")
                        .table(ReceiptLines::Table)
                        .col(ReceiptLines::ReceiptId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ReceiptLines::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Receipts::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Receipts {
        Table,
        Id,
        ReceiptNumber,
        SupplierName,
        WarehouseId,
        Status,
        ScheduledDate,
        ReceivedDate,
        Notes,
        CreatedBy,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum ReceiptLines {
        Table,
        Id,
        ReceiptId,
        ProductId,
        Quantity,
        ReceivedQuantity,
        RackLocation,
    }
}

mod m20240101_000004_create_delivery_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_delivery_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(DeliveryOrders::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(DeliveryOrders::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryOrders::DeliveryNumber)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryOrders::CustomerName)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(DeliveryOrders::WarehouseId).uuid().not_null())
                        .col(ColumnDef::new(DeliveryOrders::Status).string().not_null())
                        .col(
                            ColumnDef::new(DeliveryOrders::ScheduledDate)
                                .date()
                                .not_null(),
                        )
                        .col(ColumnDef::new(DeliveryOrders::DeliveredDate).date().null())
                        .col(ColumnDef::new(DeliveryOrders::Notes).string().null())
                        .col(ColumnDef::new(DeliveryOrders::CreatedBy).uuid().not_null())
                        .col(
                            ColumnDef::new(DeliveryOrders::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryOrders::UpdatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_delivery_orders_number")
                        .table(DeliveryOrders::Table)
                        .col(DeliveryOrders::DeliveryNumber)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_delivery_orders_status")
                        .table(DeliveryOrders::Table)
                        .col(DeliveryOrders::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(DeliveryLines::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(DeliveryLines::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(DeliveryLines::DeliveryId).uuid().not_null())
                        .col(ColumnDef::new(DeliveryLines::ProductId).uuid().not_null())
                        .col(
                            ColumnDef::new(DeliveryLines::Quantity)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryLines::DeliveredQuantity)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_delivery_lines_delivery")
                                .from(DeliveryLines::Table, DeliveryLines::DeliveryId)
                                .to(DeliveryOrders::Table, DeliveryOrders::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_delivery_lines_delivery_id")
                        .table(DeliveryLines::Table)
                        .col(DeliveryLines::DeliveryId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(DeliveryLines::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(DeliveryOrders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum DeliveryOrders {
        Table,
        Id,
        DeliveryNumber,
        CustomerName,
        WarehouseId,
        Status,
        ScheduledDate,
        DeliveredDate,
        Notes,
        CreatedBy,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum DeliveryLines {
        Table,
        Id,
        DeliveryId,
        ProductId,
        Quantity,
        DeliveredQuantity,
    }
}

mod m20240101_000005_create_transfer_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000005_create_transfer_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(InternalTransfers::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(InternalTransfers::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InternalTransfers::TransferNumber)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InternalTransfers::FromWarehouseId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InternalTransfers::ToWarehouseId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(InternalTransfers::Status).string().not_null())
                        .col(
                            ColumnDef::new(InternalTransfers::ScheduledDate)
                                .date()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InternalTransfers::CompletedDate)
                                .date()
                                .null(),
                        )
                        .col(ColumnDef::new(InternalTransfers::Notes).string().null())
                        .col(
                            ColumnDef::new(InternalTransfers::CreatedBy)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InternalTransfers::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InternalTransfers::UpdatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_internal_transfers_number")
                        .table(InternalTransfers::Table)
                        .col(InternalTransfers::TransferNumber)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(TransferLines::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(TransferLines::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(TransferLines::TransferId).uuid().not_null())
                        .col(ColumnDef::new(TransferLines::ProductId).uuid().not_null())
                        .col(
                            ColumnDef::new(TransferLines::Quantity)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TransferLines::TransferredQuantity)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(TransferLines::ToRackLocation)
                                .string()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_transfer_lines_transfer")
                                .from(TransferLines::Table, TransferLines::TransferId)
                                .to(InternalTransfers::Table, InternalTransfers::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_transfer_lines_transfer_id")
                        .table(TransferLines::Table)
                        .col(TransferLines::TransferId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(TransferLines::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(InternalTransfers::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum InternalTransfers {
        Table,
        Id,
        TransferNumber,
        FromWarehouseId,
        ToWarehouseId,
        Status,
        ScheduledDate,
        CompletedDate,
        Notes,
        CreatedBy,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum TransferLines {
        Table,
        Id,
        TransferId,
        ProductId,
        Quantity,
        TransferredQuantity,
        ToRackLocation,
    }
}

mod m20240101_000006_create_adjustments_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000006_create_adjustments_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StockAdjustments::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockAdjustments::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockAdjustments::AdjustmentNumber)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockAdjustments::ProductId).uuid().not_null())
                        .col(
                            ColumnDef::new(StockAdjustments::WarehouseId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockAdjustments::RackLocation)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockAdjustments::SystemQuantity)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockAdjustments::ActualQuantity)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockAdjustments::Reason).string().null())
                        .col(ColumnDef::new(StockAdjustments::Status).string().not_null())
                        .col(ColumnDef::new(StockAdjustments::CreatedBy).uuid().not_null())
                        .col(
                            ColumnDef::new(StockAdjustments::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockAdjustments::UpdatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_adjustments_number")
                        .table(StockAdjustments::Table)
                        .col(StockAdjustments::AdjustmentNumber)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockAdjustments::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum StockAdjustments {
        Table,
        Id,
        AdjustmentNumber,
        ProductId,
        WarehouseId,
        RackLocation,
        SystemQuantity,
        ActualQuantity,
        Reason,
        Status,
        CreatedBy,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000007_create_document_sequences {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000007_create_document_sequences"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(DocumentSequences::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(DocumentSequences::DocumentType)
                                .string()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DocumentSequences::NextValue)
                                .big_integer()
                                .not_null()
                                .default(1),
                        )
                        .to_owned(),
                )
                .await?;

            // Seed one counter per document kind
            for document_type in ["receipt", "delivery", "transfer", "adjustment"] {
                manager
                    .exec_stmt(
                        Query::insert()
                            .into_table(DocumentSequences::Table)
                            .columns([
                                DocumentSequences::DocumentType,
                                DocumentSequences::NextValue,
                            ])
                            .values_panic([document_type.into(), 1i64.into()])
                            .to_owned(),
                    )
                    .await?;
            }

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(DocumentSequences::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum DocumentSequences {
        Table,
        DocumentType,
        NextValue,
    }
}
