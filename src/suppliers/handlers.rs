use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use super::{
    dto::{CreateSupplierRequest, UpdateSupplierRequest},
    repo::Supplier,
};
use crate::{
    error::AppError,
    response::{DataResponse, MessageResponse},
    state::AppState,
};

#[derive(Debug, Serialize)]
pub struct SupplierData {
    pub supplier: Supplier,
}

#[derive(Debug, Serialize)]
pub struct SuppliersData {
    pub suppliers: Vec<Supplier>,
}

/// GET /api/v1/suppliers
#[instrument(skip(state))]
pub async fn list_suppliers(
    State(state): State<AppState>,
) -> Result<Json<DataResponse<SuppliersData>>, AppError> {
    let suppliers = Supplier::list(&state.db).await?;
    Ok(Json(DataResponse::new(SuppliersData { suppliers })))
}

/// POST /api/v1/suppliers
#[instrument(skip(state, payload))]
pub async fn create_supplier(
    State(state): State<AppState>,
    Json(payload): Json<CreateSupplierRequest>,
) -> Result<(StatusCode, Json<DataResponse<SupplierData>>), AppError> {
    let payload = payload.validate()?;
    let supplier = Supplier::create(
        &state.db,
        &payload.name,
        &payload.street,
        &payload.city,
        &payload.country,
        &payload.phone_numbers,
    )
    .await?;
    info!(supplier_id = %supplier.id, "supplier created");
    Ok((
        StatusCode::CREATED,
        Json(DataResponse::new(SupplierData { supplier })),
    ))
}

/// GET /api/v1/suppliers/:supplier_id
#[instrument(skip(state))]
pub async fn get_supplier(
    State(state): State<AppState>,
    Path(supplier_id): Path<Uuid>,
) -> Result<Json<DataResponse<SupplierData>>, AppError> {
    let supplier = Supplier::find_by_id(&state.db, supplier_id)
        .await?
        .ok_or_else(|| AppError::NotFound("supplier does not exist".into()))?;
    Ok(Json(DataResponse::new(SupplierData { supplier })))
}

/// PATCH /api/v1/suppliers/:supplier_id
#[instrument(skip(state, payload))]
pub async fn update_supplier(
    State(state): State<AppState>,
    Path(supplier_id): Path<Uuid>,
    Json(payload): Json<UpdateSupplierRequest>,
) -> Result<Json<DataResponse<SupplierData>>, AppError> {
    let supplier = Supplier::update(
        &state.db,
        supplier_id,
        payload.name.as_deref(),
        payload.street.as_deref(),
        payload.city.as_deref(),
        payload.country.as_deref(),
        payload.phone_numbers.as_deref(),
    )
    .await?
    .ok_or_else(|| AppError::NotFound("supplier does not exist".into()))?;
    Ok(Json(DataResponse::new(SupplierData { supplier })))
}

/// DELETE /api/v1/suppliers/:supplier_id
#[instrument(skip(state))]
pub async fn delete_supplier(
    State(state): State<AppState>,
    Path(supplier_id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    if !Supplier::delete(&state.db, supplier_id).await? {
        return Err(AppError::NotFound("supplier does not exist".into()));
    }
    info!(%supplier_id, "supplier deleted");
    Ok(Json(MessageResponse::new(
        "supplier has been deleted successfully",
    )))
}
