use actix_cors::Cors;
use actix_web::{
    get, post, web, App, HttpResponse, HttpServer, Responder, Result as ActixResult,
};
use actix_ws::Message;
use faascore::{Function, FunctionError, FunctionId, MetricsSample, RuntimeKind};
use faasruntime::{FaasRuntime, RuntimeConfig};
use faasstore::{Store, StoreError};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Application state shared across handlers
struct AppState {
    runtime: Arc<FaasRuntime>,
    store: Arc<Store>,
}

/// Response for function creation
#[derive(Debug, Serialize)]
struct CreatedResponse {
    message: String,
    id: FunctionId,
}

/// Response for function execution
#[derive(Debug, Serialize)]
struct RunResponse {
    output: String,
}

/// Error response
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// Latest-metrics payload; mirrors the recorded sample without its key fields
#[derive(Debug, Serialize)]
struct MetricsBody {
    response_time: f64,
    error: bool,
    stdout: String,
    stderr: String,
    memory_usage: f64,
    cpu_usage: f64,
}

impl From<MetricsSample> for MetricsBody {
    fn from(sample: MetricsSample) -> Self {
        Self {
            response_time: sample.response_time,
            error: sample.error,
            stdout: sample.stdout,
            stderr: sample.stderr,
            memory_usage: sample.memory_usage,
            cpu_usage: sample.cpu_usage,
        }
    }
}

fn store_error_response(e: StoreError) -> HttpResponse {
    match &e {
        StoreError::Function(f) => match f {
            FunctionError::NotFound(id) => HttpResponse::NotFound().json(ErrorResponse {
                error: format!("Function {id} not found"),
            }),
            FunctionError::UnknownRoute(route) => HttpResponse::NotFound().json(ErrorResponse {
                error: format!("No function registered for route {route}"),
            }),
            FunctionError::RouteTaken(route) => HttpResponse::Conflict().json(ErrorResponse {
                error: format!("Route {route} is already registered"),
            }),
            FunctionError::Invalid(_) | FunctionError::MissingCode => {
                HttpResponse::BadRequest().json(ErrorResponse {
                    error: f.to_string(),
                })
            }
        },
        _ => {
            error!("Store failure: {e}");
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: "internal storage error".to_string(),
            })
        }
    }
}

/// Health check endpoint
#[get("/health")]
async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "faasengine"
    }))
}

/// Register a new function
#[post("/functions/")]
async fn create_function(
    data: web::Data<AppState>,
    function: web::Json<Function>,
) -> ActixResult<impl Responder> {
    let function = function.into_inner();

    match data.store.insert_function(&function) {
        Ok(id) => {
            info!("Created function: {} (id {id})", function.name);
            Ok(HttpResponse::Created().json(CreatedResponse {
                message: "Function created".to_string(),
                id,
            }))
        }
        Err(e) => Ok(store_error_response(e)),
    }
}

/// List all registered functions
#[get("/functions/")]
async fn list_functions(data: web::Data<AppState>) -> ActixResult<impl Responder> {
    match data.store.list_functions() {
        Ok(functions) => Ok(HttpResponse::Ok().json(functions)),
        Err(e) => Ok(store_error_response(e)),
    }
}

/// Fetch a single function by id
#[get("/functions/{id}")]
async fn get_function(
    data: web::Data<AppState>,
    path: web::Path<FunctionId>,
) -> ActixResult<impl Responder> {
    match data.store.get_function(path.into_inner()) {
        Ok(function) => Ok(HttpResponse::Ok().json(function)),
        Err(e) => Ok(store_error_response(e)),
    }
}

/// Replace an existing function definition
#[actix_web::put("/functions/{id}")]
async fn update_function(
    data: web::Data<AppState>,
    path: web::Path<FunctionId>,
    function: web::Json<Function>,
) -> ActixResult<impl Responder> {
    let id = path.into_inner();
    match data.store.update_function(id, &function.into_inner()) {
        Ok(updated) => {
            info!("Updated function {id}");
            Ok(HttpResponse::Ok().json(serde_json::json!({
                "message": "Function updated",
                "function": updated,
            })))
        }
        Err(e) => Ok(store_error_response(e)),
    }
}

/// Delete a function
#[actix_web::delete("/functions/{id}")]
async fn delete_function(
    data: web::Data<AppState>,
    path: web::Path<FunctionId>,
) -> ActixResult<impl Responder> {
    let id = path.into_inner();
    match data.store.delete_function(id) {
        Ok(()) => {
            info!("Deleted function {id}");
            Ok(HttpResponse::Ok().json(serde_json::json!({
                "message": "Function deleted"
            })))
        }
        Err(e) => Ok(store_error_response(e)),
    }
}

/// Execute a stored function and return its output
#[post("/functions/{id}/run")]
async fn run_function(
    data: web::Data<AppState>,
    path: web::Path<FunctionId>,
) -> ActixResult<impl Responder> {
    let function = match data.store.get_function(path.into_inner()) {
        Ok(function) => function,
        Err(e) => return Ok(store_error_response(e)),
    };
    Ok(run_and_record(&data, &function).await)
}

/// Execute the function registered for a route
#[post("/invoke/{route:.*}")]
async fn invoke_route(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> ActixResult<impl Responder> {
    let route = format!("/{}", path.into_inner());
    let function = match data.store.find_by_route(&route) {
        Ok(function) => function,
        Err(e) => return Ok(store_error_response(e)),
    };
    Ok(run_and_record(&data, &function).await)
}

async fn run_and_record(data: &AppState, function: &Function) -> HttpResponse {
    if function.code().is_none() {
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "No code provided in function settings".to_string(),
        });
    }

    match data.runtime.execute(function).await {
        Ok(report) => {
            record_sample(data, &report.sample);
            if report.success {
                HttpResponse::Ok().json(RunResponse {
                    output: report.output,
                })
            } else if report.timed_out {
                HttpResponse::InternalServerError().json(ErrorResponse {
                    error: format!("Execution timed out after {}s", function.timeout_secs),
                })
            } else {
                HttpResponse::InternalServerError().json(ErrorResponse {
                    error: format!(
                        "Execution failed with exit code {}: {}",
                        report.exit_code,
                        report.stderr.trim()
                    ),
                })
            }
        }
        Err(e) => {
            error!("Execution of {} failed: {e}", function.name);
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: format!("Execution failed: {e}"),
            })
        }
    }
}

fn record_sample(data: &AppState, sample: &MetricsSample) {
    if let Err(e) = data.store.record_metrics(sample) {
        warn!("Failed to record metrics sample: {e}");
    }
}

/// Most recent metrics for one function
#[get("/functions/{id}/metrics")]
async fn function_metrics(
    data: web::Data<AppState>,
    path: web::Path<FunctionId>,
) -> ActixResult<impl Responder> {
    let function = match data.store.get_function(path.into_inner()) {
        Ok(function) => function,
        Err(e) => return Ok(store_error_response(e)),
    };

    match data.store.latest_metrics(&function.name) {
        Ok(Some(sample)) => Ok(HttpResponse::Ok().json(serde_json::json!({
            "metrics": MetricsBody::from(sample),
        }))),
        Ok(None) => Ok(HttpResponse::NotFound().json(ErrorResponse {
            error: format!("No metrics found for function {}", function.name),
        })),
        Err(e) => Ok(store_error_response(e)),
    }
}

/// Run one function under both runtimes and report the measurements
#[get("/functions/{id}/compare")]
async fn compare_performance(
    data: web::Data<AppState>,
    path: web::Path<FunctionId>,
) -> ActixResult<impl Responder> {
    let function = match data.store.get_function(path.into_inner()) {
        Ok(function) => function,
        Err(e) => return Ok(store_error_response(e)),
    };

    if function.code().is_none() {
        return Ok(HttpResponse::BadRequest().json(ErrorResponse {
            error: "No code provided in function settings".to_string(),
        }));
    }

    info!("Comparing runtimes for function {}", function.name);
    let runc = compare_side(&data, &function, RuntimeKind::Runc).await;
    let runsc = compare_side(&data, &function, RuntimeKind::Runsc).await;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "comparison": {
            "runc": runc,
            "runsc": runsc,
        }
    })))
}

async fn compare_side(
    data: &AppState,
    function: &Function,
    runtime: RuntimeKind,
) -> serde_json::Value {
    match data.runtime.execute_with(function, runtime).await {
        Ok(report) => {
            record_sample(data, &report.sample);
            serde_json::json!({
                "response_time": report.sample.response_time,
                "memory_usage": report.sample.memory_usage,
                "cpu_usage": report.sample.cpu_usage,
                "output": report.output,
            })
        }
        Err(e) => {
            warn!("{runtime} side of comparison failed: {e}");
            serde_json::json!({ "error": e.to_string() })
        }
    }
}

/// Aggregated metrics for every function
#[get("/metrics/")]
async fn all_metrics(data: web::Data<AppState>) -> ActixResult<impl Responder> {
    match data.store.aggregate_metrics() {
        Ok(aggregates) => Ok(HttpResponse::Ok().json(serde_json::json!({
            "metrics": aggregates,
        }))),
        Err(e) => Ok(store_error_response(e)),
    }
}

/// WebSocket endpoint for real-time execution events
#[get("/api/events")]
async fn websocket_events(
    req: actix_web::HttpRequest,
    stream: web::Payload,
    data: web::Data<AppState>,
) -> ActixResult<HttpResponse> {
    let (res, mut session, mut msg_stream) = actix_ws::handle(&req, stream)?;

    info!("WebSocket client connected");

    let mut events = data.runtime.subscribe_events();

    actix_web::rt::spawn(async move {
        loop {
            tokio::select! {
                event = events.recv() => {
                    match event {
                        Ok(event) => {
                            if let Ok(json) = serde_json::to_string(&event) {
                                if session.text(json).await.is_err() {
                                    break;
                                }
                            }
                        }
                        Err(_) => break,
                    }
                }

                Some(Ok(msg)) = msg_stream.recv() => {
                    match msg {
                        Message::Ping(bytes) => {
                            if session.pong(&bytes).await.is_err() {
                                break;
                            }
                        }
                        Message::Close(_) => break,
                        _ => {}
                    }
                }

                else => break,
            }
        }

        info!("WebSocket client disconnected");
        let _ = session.close(None).await;
    });

    Ok(res)
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    info!("🚀 Starting faasengine server");

    let mut config = RuntimeConfig::default();
    if let Ok(depth) = std::env::var("FAAS_PREWARM") {
        match depth.parse() {
            Ok(depth) => config.prewarm_count = depth,
            Err(_) => warn!("Ignoring unparsable FAAS_PREWARM: {depth}"),
        }
    }

    let db_path = std::env::var("FAAS_DB_PATH").unwrap_or_else(|_| "faas.db".to_string());
    let store = Arc::new(Store::open(&db_path)?);

    let runtime = Arc::new(FaasRuntime::with_config(config));
    runtime.startup().await?;

    info!("✅ Runtime initialized, warm pool filled");

    let app_state = web::Data::new(AppState {
        runtime: runtime.clone(),
        store,
    });

    let bind_address = std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

    info!("🌐 Server starting on http://{}", bind_address);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(app_state.clone())
            .wrap(cors)
            .wrap(actix_web::middleware::Logger::default())
            .service(health_check)
            .service(create_function)
            .service(list_functions)
            .service(function_metrics)
            .service(compare_performance)
            .service(run_function)
            .service(get_function)
            .service(update_function)
            .service(delete_function)
            .service(invoke_route)
            .service(all_metrics)
            .service(websocket_events)
    })
    .bind(&bind_address)?
    .run()
    .await?;

    runtime.shutdown().await;

    Ok(())
}
