use utoipa::OpenApi;

/// Aggregated OpenAPI document for the HTTP surface, served at
/// `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::products::create_product,
        crate::handlers::products::list_products,
        crate::handlers::products::low_stock_products,
        crate::handlers::products::get_product,
        crate::handlers::products::update_product,
        crate::handlers::products::delete_product,
        crate::handlers::warehouses::create_warehouse,
        crate::handlers::warehouses::list_warehouses,
        crate::handlers::warehouses::get_warehouse,
        crate::handlers::warehouses::update_warehouse,
        crate::handlers::receipts::create_receipt,
        crate::handlers::receipts::list_receipts,
        crate::handlers::receipts::get_receipt,
        crate::handlers::receipts::update_receipt,
        crate::handlers::receipts::validate_receipt,
        crate::handlers::receipts::cancel_receipt,
        crate::handlers::deliveries::create_delivery,
        crate::handlers::deliveries::list_deliveries,
        crate::handlers::deliveries::get_delivery,
        crate::handlers::deliveries::update_delivery,
        crate::handlers::deliveries::validate_delivery,
        crate::handlers::deliveries::cancel_delivery,
        crate::handlers::transfers::create_transfer,
        crate::handlers::transfers::list_transfers,
        crate::handlers::transfers::get_transfer,
        crate::handlers::transfers::update_transfer,
        crate::handlers::transfers::validate_transfer,
        crate::handlers::transfers::cancel_transfer,
        crate::handlers::adjustments::create_adjustment,
        crate::handlers::adjustments::list_adjustments,
        crate::handlers::adjustments::get_adjustment,
        crate::handlers::adjustments::update_adjustment,
        crate::handlers::adjustments::validate_adjustment,
        crate::handlers::adjustments::cancel_adjustment,
        crate::handlers::stock::query_stock,
        crate::handlers::movements::query_movements,
        crate::handlers::movements::history_for_key,
        crate::handlers::reports::dashboard,
        crate::handlers::reports::low_stock,
    ),
    components(schemas(
        crate::errors::ErrorResponse,
        crate::services::products::NewProduct,
        crate::services::products::UpdateProduct,
        crate::services::warehouses::NewWarehouse,
        crate::services::warehouses::UpdateWarehouse,
        crate::services::receipts::NewReceipt,
        crate::services::receipts::NewReceiptLine,
        crate::services::deliveries::NewDelivery,
        crate::services::deliveries::NewDeliveryLine,
        crate::services::transfers::NewTransfer,
        crate::services::transfers::NewTransferLine,
        crate::services::adjustments::NewAdjustment,
        crate::services::reports::DashboardSummary,
        crate::services::reports::LowStockLocation,
    )),
    tags(
        (name = "products", description = "Product catalog"),
        (name = "warehouses", description = "Warehouses"),
        (name = "receipts", description = "Inbound goods receipts"),
        (name = "deliveries", description = "Outbound delivery orders"),
        (name = "transfers", description = "Warehouse-to-warehouse transfers"),
        (name = "adjustments", description = "Stock count adjustments"),
        (name = "stock", description = "Current stock levels"),
        (name = "movements", description = "Immutable movement ledger"),
        (name = "reports", description = "Dashboards and low stock reports"),
    ),
    info(
        title = "Stockroom API",
        description = "Warehouse stock tracking: documents, stock locations, and the movement ledger"
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_builds() {
        let doc = ApiDoc::openapi();
        assert!(!doc.paths.paths.is_empty());
    }
}
