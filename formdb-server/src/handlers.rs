use actix_cors::Cors;
use actix_web::{error, web, HttpRequest, HttpResponse};
use formdb::record::payload_from_json;
use formdb::{FormDbError, RawQueryParams, Record, RecordStore};
use std::sync::{PoisonError, RwLockReadGuard, RwLockWriteGuard};

use crate::AppState;

/// Configure all API routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        let response = HttpResponse::BadRequest().json(serde_json::json!({
            "success": false,
            "message": err.to_string()
        }));
        error::InternalError::from_response(err, response).into()
    }))
    // Status
    .route("/health", web::get().to(health))
    // Schema
    .route("/form-schema", web::get().to(get_schema))
    // Submissions
    .route("/submissions", web::get().to(list_submissions))
    .route("/submissions", web::post().to(create_submission))
    .route("/submissions/{id}", web::get().to(get_submission))
    .route("/submissions/{id}", web::put().to(update_submission))
    .route("/submissions/{id}", web::delete().to(delete_submission));
}

/// CORS policy for browser clients. `None` or `*` allows any origin.
pub fn cors(origin: Option<&str>) -> Cors {
    match origin.map(str::trim) {
        None | Some("*") => Cors::permissive(),
        Some(origin) => Cors::default()
            .allowed_origin(origin)
            .allow_any_method()
            .allow_any_header()
            .max_age(3600),
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

// Every mutation either completes or leaves the collection untouched, so a
// poisoned lock still guards consistent data.
fn read_store(state: &AppState) -> RwLockReadGuard<'_, RecordStore> {
    state.store.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_store(state: &AppState) -> RwLockWriteGuard<'_, RecordStore> {
    state.store.write().unwrap_or_else(PoisonError::into_inner)
}

/// `{ "success": true, ...record }`
fn success_record(record: &Record) -> formdb::Result<serde_json::Value> {
    let mut value = serde_json::to_value(record)?;
    if let Some(obj) = value.as_object_mut() {
        obj.insert("success".into(), serde_json::Value::Bool(true));
    }
    Ok(value)
}

fn err_response(e: FormDbError) -> HttpResponse {
    match e {
        FormDbError::Validation(errors) => {
            log::warn!("Rejected submission: {errors}");
            HttpResponse::BadRequest().json(serde_json::json!({
                "success": false,
                "errors": errors
            }))
        }
        FormDbError::NotFound { id } => {
            log::debug!("Submission {id} not found");
            HttpResponse::NotFound().json(serde_json::json!({
                "success": false,
                "message": "Submission not found"
            }))
        }
        FormDbError::Payload(_) => HttpResponse::BadRequest().json(serde_json::json!({
            "success": false,
            "message": e.to_string()
        })),
        _ => {
            log::error!("Internal error: {e}");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "success": false,
                "message": "Internal Server Error"
            }))
        }
    }
}

// ── Status ──────────────────────────────────────────────────────────

async fn health(state: web::Data<AppState>) -> HttpResponse {
    let records = read_store(&state).len();
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok", "records": records }))
}

// ── Schema ──────────────────────────────────────────────────────────

async fn get_schema(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.schema.as_ref())
}

// ── Submissions ─────────────────────────────────────────────────────

async fn list_submissions(state: web::Data<AppState>, req: HttpRequest) -> HttpResponse {
    let params = raw_query_params(req.query_string()).normalize();
    let result = read_store(&state).query(&params);
    HttpResponse::Ok().json(result)
}

async fn get_submission(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let store = read_store(&state);
    match store.get(&path) {
        Ok(record) => HttpResponse::Ok().json(record),
        Err(e) => err_response(e),
    }
}

async fn create_submission(
    state: web::Data<AppState>,
    body: web::Json<serde_json::Value>,
) -> HttpResponse {
    match create_record(&state, body.into_inner()).and_then(|r| success_record(&r)) {
        Ok(v) => HttpResponse::Created().json(v),
        Err(e) => err_response(e),
    }
}

async fn update_submission(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<serde_json::Value>,
) -> HttpResponse {
    match update_record(&state, &path, body.into_inner()).and_then(|r| success_record(&r)) {
        Ok(v) => HttpResponse::Ok().json(v),
        Err(e) => err_response(e),
    }
}

async fn delete_submission(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    match write_store(&state).delete(&path) {
        Ok(_) => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "message": "Deleted successfully"
        })),
        Err(e) => err_response(e),
    }
}

/// Decode a query string leniently: repeated keys keep their first value
/// and an undecodable string falls back to the defaults.
fn raw_query_params(query: &str) -> RawQueryParams {
    match web::Query::<Vec<(String, String)>>::from_query(query) {
        Ok(pairs) => RawQueryParams::from_pairs(pairs.into_inner()),
        Err(e) => {
            log::debug!("Ignoring query string '{query}': {e}");
            RawQueryParams::default()
        }
    }
}

fn create_record(state: &AppState, body: serde_json::Value) -> formdb::Result<Record> {
    let data = payload_from_json(body)?;
    state.validator.check(&data)?;

    let record = write_store(state).append(data);
    log::info!("Stored submission {}", record.id);
    Ok(record)
}

/// Merge a partial payload. Re-validation of the merged record only runs
/// when the server is configured for it.
fn update_record(state: &AppState, id: &str, body: serde_json::Value) -> formdb::Result<Record> {
    let partial = payload_from_json(body)?;

    if state.revalidate_updates {
        write_store(state).update_checked(id, partial, |merged| state.validator.check(merged))
    } else {
        write_store(state).update(id, partial)
    }
}
