use axum::extract::Query;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use cascade_http::{HttpLookupService, HttpOptionSource};
use cascade_protocol::{ListedOption, LookupOption, LookupResponse, OptionListResponse};
use cascade_resolver::{
    AutocompleteAdapter, CascadeChain, CascadeConfig, CascadeController, FieldName, FieldStatus,
    ForwardContext, LookupClient, LookupError, LookupRequest, LookupService, OptionId,
};
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

type Params = Query<HashMap<String, String>>;

async fn distritos(Query(params): Params) -> Json<LookupResponse> {
    let results = match params.get("q").map(String::as_str) {
        Some("Buenos Aires") => vec![LookupOption::new("2", "Buenos Aires")],
        Some("B") => vec![
            LookupOption::new("2", "Buenos Aires"),
            LookupOption::new("24", "Buenos Aires Ciudad"),
        ],
        _ => Vec::new(),
    };
    Json(LookupResponse { results })
}

async fn mesas(Query(params): Params) -> Json<LookupResponse> {
    let q = params.get("q").map(String::as_str);
    let forward = params.get("forward").map(String::as_str);
    let ident = params.get("ident").map(String::as_str);
    let results = match (q, forward, ident) {
        (Some("45"), Some(r#"{"distrito":"2"}"#), None) => {
            vec![LookupOption::new("4501", "Mesa 45").with_selected_text("45")]
        }
        (None, None, Some("4501")) => vec![LookupOption::new("4501", "Mesa 45")],
        _ => Vec::new(),
    };
    Json(LookupResponse { results })
}

async fn secciones(Query(params): Params) -> Json<LookupResponse> {
    let results = match params.get("forward").map(String::as_str) {
        Some(r#"{"desdeMesa":"1","mesa":"4501"}"#) => vec![LookupOption::new("3", "Sección 3")],
        _ => Vec::new(),
    };
    Json(LookupResponse { results })
}

async fn circuitos() -> StatusCode {
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn picker_distritos() -> Json<OptionListResponse> {
    Json(OptionListResponse {
        options: vec![
            ListedOption::new("", "---------"),
            ListedOption::new("2", "Buenos Aires"),
        ],
    })
}

async fn picker_secciones(Query(params): Params) -> Json<OptionListResponse> {
    let options = match params.get("parent_id").map(String::as_str) {
        Some("2") => vec![ListedOption::new("3", "Sección 3")],
        _ => vec![ListedOption::new("3", "Sección 3"), ListedOption::new("90", "Capital")],
    };
    Json(OptionListResponse { options })
}

async fn slow() -> Json<LookupResponse> {
    tokio::time::sleep(Duration::from_secs(2)).await;
    Json(LookupResponse::default())
}

async fn serve() -> String {
    let app = Router::new()
        .route("/elecciones/select/distritos/", get(distritos))
        .route("/elecciones/select/secciones/", get(secciones))
        .route("/elecciones/select/circuitos/", get(circuitos))
        .route("/elecciones/select/mesas/", get(mesas))
        .route("/slow/", get(slow))
        .route("/fiscales/distritos", get(picker_distritos))
        .route("/fiscales/secciones", get(picker_secciones));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    format!("http://{addr}")
}

fn config(base_url: String) -> CascadeConfig {
    CascadeConfig {
        base_url,
        request_timeout_ms: 500,
        ..CascadeConfig::default()
    }
}

fn forward(pairs: &[(&str, &str)]) -> ForwardContext {
    pairs.iter().map(|(k, v)| (*k, *v)).collect()
}

#[tokio::test]
async fn query_and_forward_are_sent_as_parameters() {
    let base = serve().await;
    let service = HttpLookupService::new(&config(base.clone())).expect("service");
    assert_eq!(
        service.endpoint(FieldName::Mesa),
        Some(format!("{base}/elecciones/select/mesas/").as_str())
    );

    let options = service
        .lookup(FieldName::Mesa, &LookupRequest::query("45", forward(&[("distrito", "2")])))
        .await
        .expect("lookup");
    assert_eq!(options.len(), 1);
    assert_eq!(options.as_slice()[0].id, OptionId::from("4501"));
    assert_eq!(options.as_slice()[0].selected_text(), "45");

    let hydrated = service
        .lookup(FieldName::Mesa, &LookupRequest::ident(OptionId::from("4501")))
        .await
        .expect("ident lookup");
    assert_eq!(hydrated.len(), 1);

    let many = service
        .lookup(FieldName::Distrito, &LookupRequest::query("B", ForwardContext::new()))
        .await
        .expect("ambiguous lookup");
    assert_eq!(many.len(), 2);
}

#[tokio::test]
async fn server_errors_and_timeouts_are_lookup_errors() {
    let base = serve().await;
    let mut config = config(base.clone());
    config.fields[0].endpoint = format!("{base}/slow/");
    let service = HttpLookupService::new(&config).expect("service");

    let err = service
        .lookup(FieldName::Circuito, &LookupRequest::infer(ForwardContext::new()))
        .await
        .unwrap_err();
    assert_eq!(err, LookupError::Status { status: 500 });

    let err = service
        .lookup(FieldName::Distrito, &LookupRequest::query("x", ForwardContext::new()))
        .await
        .unwrap_err();
    assert_eq!(err, LookupError::Timeout(500));
}

#[tokio::test]
async fn unreachable_service_is_a_transport_error() {
    let service = HttpLookupService::new(&config("http://127.0.0.1:9".to_string())).expect("service");
    let err = service
        .lookup(FieldName::Mesa, &LookupRequest::query("45", ForwardContext::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, LookupError::Transport(_) | LookupError::Timeout(_)), "{err:?}");
}

#[tokio::test]
async fn controller_resolves_against_live_endpoints() {
    let service = HttpLookupService::new(&config(serve().await)).expect("service");
    let client = LookupClient::from_service(service);
    let mut controller = CascadeController::new(CascadeChain::canonical());

    controller
        .input(FieldName::Distrito, "Buenos Aires", &client)
        .await
        .expect("distrito");
    let mesa = controller.input(FieldName::Mesa, "45", &client).await.expect("mesa");
    assert_eq!(mesa.status, FieldStatus::Resolved);

    let seccion = controller.field(FieldName::Seccion).expect("seccion");
    assert_eq!(seccion.resolved_id, Some(OptionId::from("3")));
    // circuit lookups fail server-side; auto-fill leaves the field alone
    assert_eq!(
        controller.field(FieldName::Circuito).expect("circuito").status,
        FieldStatus::Empty
    );
}

#[tokio::test]
async fn pickers_narrow_with_parent_id() {
    let mut config = config(serve().await);
    config.pickers.truncate(2);
    let source = Arc::new(HttpOptionSource::from_config(&config).expect("source"));

    let mut distrito = AutocompleteAdapter::from_config(&config, source)
        .await
        .expect("pickers")
        .expect("root picker");
    assert_eq!(distrito.validation_message(), "Valores posibles: Buenos Aires");
    assert_eq!(distrito.child().expect("seccion").values().len(), 2);

    distrito.select("Buenos Aires").await.expect("select");
    let seccion = distrito.child().expect("seccion");
    assert_eq!(seccion.values().len(), 1);
    assert_eq!(seccion.values().id_for("Sección 3"), Some(&OptionId::from("3")));
}
