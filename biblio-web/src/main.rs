//! Servidor web Axum com WebSocket para extração interativa de campos bibliográficos

mod config;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use biblio_core::{
    corpus::demo_texts, Extraction, FieldSpan, HmmState, MatrixKind, MetadataExtractor,
    ModelReport, RenderFormat, Symbol,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::ServerConfig;

/// Estado compartilhado da aplicação (o extrator só é lido)
struct AppState {
    extractor: MetadataExtractor,
}

#[derive(Deserialize)]
struct ExtractRequest {
    text: String,
}

#[derive(Deserialize)]
struct BatchRequest {
    texts: Vec<String>,
}

#[derive(Deserialize)]
struct MatrixQuery {
    #[serde(default)]
    format: Option<RenderFormat>,
}

#[derive(Serialize)]
struct ExtractResponse {
    #[serde(flatten)]
    extraction: Extraction,
    total_tokens: usize,
}

/// Eventos enviados pelo WebSocket, um passo de cada vez
#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ExtractionEvent {
    Started { total_tokens: usize },
    Token { index: usize, text: String, symbol: Symbol, state: HmmState },
    Span { span: FieldSpan },
    Done { log_probability: f64, processing_ms: u64 },
}

impl ExtractionEvent {
    fn sequence(extraction: Extraction) -> Vec<ExtractionEvent> {
        let mut events = vec![ExtractionEvent::Started {
            total_tokens: extraction.tokens.len(),
        }];
        events.extend(extraction.tokens.into_iter().map(|t| ExtractionEvent::Token {
            index: t.token.index,
            text: t.token.text,
            symbol: t.symbol,
            state: t.state,
        }));
        events.extend(extraction.spans.into_iter().map(|span| ExtractionEvent::Span { span }));
        events.push(ExtractionEvent::Done {
            log_probability: extraction.log_probability,
            processing_ms: extraction.processing_ms,
        });
        events
    }
}

/// Erro de API devolvido como `{"error": "..."}`
struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(serde_json::json!({ "error": self.1 }))).into_response()
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env();
    let model = match config.load_model() {
        Ok(model) => model,
        Err(e) => {
            error!(error = %e, "falha ao preparar o modelo");
            std::process::exit(1);
        }
    };

    let report = model.validate();
    if !report.is_ok() {
        warn!(
            unbalanced_rows = report.unbalanced_rows.len(),
            zero_cells = report.zero_cells,
            "modelo carregado com linhas degeneradas"
        );
    }

    let app = router(MetadataExtractor::new(model));

    let listener = match tokio::net::TcpListener::bind(config.addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(addr = %config.addr, error = %e, "não foi possível abrir a porta");
            std::process::exit(1);
        }
    };
    info!("Servidor de extração iniciado em http://{}", config.addr);
    if let Err(e) = axum::serve(listener, app).await {
        error!(error = %e, "servidor encerrado com erro");
    }
}

/// Monta as rotas sobre um extrator compartilhado (somente leitura)
fn router(extractor: MetadataExtractor) -> Router {
    let state = Arc::new(AppState { extractor });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index_handler))
        .route("/extract", post(extract_handler))
        .route("/extract/batch", post(batch_handler))
        .route("/ws", get(ws_handler))
        .route("/matrices/:kind", get(matrix_handler))
        .route("/validate", get(validate_handler))
        .route("/demo-texts", get(demo_texts_handler))
        .layer(cors)
        .with_state(state)
}

/// Retorna a página principal HTML
async fn index_handler() -> impl IntoResponse {
    Html(include_str!("templates/index.html"))
}

/// Extração de uma referência via HTTP POST (texto vazio → resultado vazio)
async fn extract_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ExtractRequest>,
) -> Json<ExtractResponse> {
    let extraction = state.extractor.analyze(&req.text);
    let total_tokens = extraction.tokens.len();
    Json(ExtractResponse {
        extraction,
        total_tokens,
    })
}

/// Extração de várias referências (decodificadas em paralelo)
async fn batch_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BatchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let results = tokio::task::spawn_blocking(move || state.extractor.extract_batch(&req.texts))
        .await
        .map_err(|e| ApiError(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(results))
}

/// Tabela de diagnóstico de uma das matrizes
async fn matrix_handler(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
    Query(query): Query<MatrixQuery>,
) -> Result<Response, ApiError> {
    let kind = MatrixKind::from_name(&kind)
        .ok_or_else(|| ApiError(StatusCode::NOT_FOUND, format!("Matriz desconhecida: {kind}")))?;

    let format = query.format.unwrap_or_default();
    let body = state.extractor.model().render(kind, format);
    Ok(match format {
        RenderFormat::Html => Html(body).into_response(),
        RenderFormat::Text => body.into_response(),
    })
}

/// Relatório de linhas degeneradas do modelo carregado
async fn validate_handler(State(state): State<Arc<AppState>>) -> Json<ModelReport> {
    Json(state.extractor.model().validate())
}

/// Retorna textos de demonstração
async fn demo_texts_handler() -> impl IntoResponse {
    let texts: Vec<serde_json::Value> = demo_texts()
        .iter()
        .map(|(domain, text)| {
            serde_json::json!({
                "domain": domain,
                "text": text
            })
        })
        .collect();
    Json(texts)
}

/// Upgrade HTTP → WebSocket
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

/// Mensagem WebSocket: JSON `{text}` ou o próprio texto da referência
fn ws_reference(message: String) -> String {
    match serde_json::from_str::<ExtractRequest>(&message) {
        Ok(req) => req.text,
        Err(_) => message,
    }
}

/// Recebe uma referência (texto puro ou `{text}`) e envia os eventos da decodificação
async fn handle_websocket(mut socket: WebSocket, state: Arc<AppState>) {
    info!("WebSocket conectado");

    while let Some(Ok(msg)) = socket.recv().await {
        match msg {
            Message::Text(text) => {
                let reference = ws_reference(text);
                info!("Extraindo via WebSocket: {} chars", reference.len());

                // Decodificação é síncrona: roda fora do runtime
                let state = Arc::clone(&state);
                let extraction =
                    match tokio::task::spawn_blocking(move || state.extractor.analyze(&reference)).await {
                        Ok(extraction) => extraction,
                        Err(e) => {
                            error!(error = %e, "falha na extração");
                            return;
                        }
                    };

                for event in ExtractionEvent::sequence(extraction) {
                    if let Ok(json) = serde_json::to_string(&event) {
                        if socket.send(Message::Text(json)).await.is_err() {
                            return; // cliente desconectou
                        }
                        // Pequena pausa para a animação passo a passo
                        tokio::time::sleep(tokio::time::Duration::from_millis(35)).await;
                    }
                }
            }
            Message::Close(_) => {
                info!("WebSocket desconectado");
                return;
            }
            Message::Ping(payload) => {
                let _ = socket.send(Message::Pong(payload)).await;
            }
            _ => {}
        }
    }
}
