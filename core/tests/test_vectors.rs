//! Verify override resolution and request construction against JSON test
//! vectors stored in `test-vectors/`.
//!
//! Requests are captured by a recording transport and compared field by
//! field. Bodies are compared as parsed JSON so field ordering does not
//! matter.

use std::sync::Arc;

use parking_lot::Mutex;
use restclient_core::{
    ApiError, BuilderError, CallArgs, ClientProxy, HttpMethod, HttpRequest, HttpResponse,
    MapConfigSource, MethodDescriptor, RestClientFactory, RestInterface, TimeUnit,
};
use serde_json::Value;

/// Parse the method string from test vectors into `HttpMethod`.
fn parse_method(s: &str) -> HttpMethod {
    match s {
        "GET" => HttpMethod::Get,
        "POST" => HttpMethod::Post,
        "PUT" => HttpMethod::Put,
        "DELETE" => HttpMethod::Delete,
        other => panic!("unknown method: {other}"),
    }
}

fn pairs(value: &Value) -> Vec<(String, String)> {
    value
        .as_array()
        .map(|arr| {
            arr.iter()
                .map(|pair| {
                    let pair = pair.as_array().unwrap();
                    (pair[0].as_str().unwrap().to_string(), pair[1].as_str().unwrap().to_string())
                })
                .collect()
        })
        .unwrap_or_default()
}

fn builder_error_kind(err: &BuilderError) -> &'static str {
    match err {
        BuilderError::InvalidArgument(_) => "InvalidArgument",
        BuilderError::IllegalState(_) => "IllegalState",
        BuilderError::Definition(_) => "Definition",
        BuilderError::Configuration { .. } => "Configuration",
    }
}

fn api_error_kind(err: &ApiError) -> &'static str {
    match err {
        ApiError::UnknownMethod { .. } => "UnknownMethod",
        ApiError::MissingPathParam { .. } => "MissingPathParam",
        ApiError::InvalidUrl(_) => "InvalidUrl",
        ApiError::SerializationError(_) => "SerializationError",
        _ => "Other",
    }
}

// ---------------------------------------------------------------------------
// Override resolution
// ---------------------------------------------------------------------------

fn resolve_case(interface: &RestInterface, case: &Value) -> Result<ClientProxy, BuilderError> {
    let source: MapConfigSource = case["overrides"]
        .as_object()
        .unwrap()
        .iter()
        .map(|(k, v)| (k.clone(), v.as_str().unwrap().to_string()))
        .collect();
    let transport = |_: HttpRequest| -> Result<HttpResponse, ApiError> {
        unreachable!("override vectors never dispatch")
    };
    let factory = RestClientFactory::builder()
        .transport(Arc::new(transport))
        .config_source(Arc::new(source))
        .build()?;

    let setup = &case["builder"];
    let mut builder = factory.new_builder();
    if let Some(uri) = setup["base_uri"].as_str() {
        builder.base_uri(uri)?;
    }
    if let Some(ms) = setup["connect_timeout_ms"].as_i64() {
        builder.connect_timeout(ms, TimeUnit::Milliseconds)?;
    }
    if let Some(ms) = setup["read_timeout_ms"].as_i64() {
        builder.read_timeout(ms, TimeUnit::Milliseconds)?;
    }
    builder.build(interface)
}

#[test]
fn override_test_vectors() {
    let raw = include_str!("../../test-vectors/overrides.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    let mut interface = RestInterface::builder(vectors["interface"]["name"].as_str().unwrap());
    if let Some(key) = vectors["interface"]["config_key"].as_str() {
        interface = interface.config_key(key);
    }
    let interface = interface.build();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let result = resolve_case(&interface, case);

        if let Some(kind) = case["expected_error"].as_str() {
            let err = result.err().unwrap_or_else(|| panic!("{name}: expected {kind}"));
            assert_eq!(builder_error_kind(&err), kind, "{name}: error kind ({err})");
            continue;
        }

        let client = result.unwrap_or_else(|e| panic!("{name}: build failed: {e}"));
        let config = client.configuration();
        let expected = &case["expected"];
        assert_eq!(config.base_uri().as_str(), expected["base_uri"].as_str().unwrap(), "{name}: base uri");
        assert_eq!(
            config.connect_timeout().as_millis() as u64,
            expected["connect_timeout_ms"].as_u64().unwrap(),
            "{name}: connect timeout"
        );
        assert_eq!(
            config.read_timeout().as_millis() as u64,
            expected["read_timeout_ms"].as_u64().unwrap(),
            "{name}: read timeout"
        );
    }
}

// ---------------------------------------------------------------------------
// Request construction
// ---------------------------------------------------------------------------

#[test]
fn request_test_vectors() {
    let raw = include_str!("../../test-vectors/requests.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    let declared = &vectors["interface"];
    let mut interface = RestInterface::builder(declared["name"].as_str().unwrap())
        .path(declared["path"].as_str().unwrap());
    for method in declared["methods"].as_array().unwrap() {
        interface = interface.method(MethodDescriptor::new(
            method["name"].as_str().unwrap(),
            parse_method(method["method"].as_str().unwrap()),
            method["path"].as_str().unwrap(),
        ));
    }
    let interface = interface.build();

    let captured: Arc<Mutex<Vec<HttpRequest>>> = Arc::default();
    let sink = Arc::clone(&captured);
    let transport = move |req: HttpRequest| -> Result<HttpResponse, ApiError> {
        sink.lock().push(req);
        Ok(HttpResponse {
            status: 200,
            headers: Vec::new(),
            body: String::new(),
        })
    };
    let factory = RestClientFactory::builder()
        .transport(Arc::new(transport))
        .config_source(Arc::new(MapConfigSource::new()))
        .build()
        .unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let mut builder = factory.new_builder();
        builder.base_uri(case["base_uri"].as_str().unwrap()).unwrap();
        let client = builder.build(&interface).unwrap();

        let call = &case["call"];
        let mut args = CallArgs::new();
        if let Some(params) = call["path_params"].as_object() {
            for (k, v) in params {
                args = args.path_param(k.as_str(), v.as_str().unwrap());
            }
        }
        for (k, v) in pairs(&call["query"]) {
            args = args.query(k, v);
        }
        for (k, v) in pairs(&call["headers"]) {
            args = args.header(k, v);
        }
        if !call["body"].is_null() {
            args = args.json_body(&call["body"]).unwrap();
        }

        captured.lock().clear();
        let result = client.call(call["method"].as_str().unwrap(), args);

        if let Some(kind) = case["expected_error"].as_str() {
            let err = result.err().unwrap_or_else(|| panic!("{name}: expected {kind}"));
            assert_eq!(api_error_kind(&err), kind, "{name}: error kind ({err})");
            assert!(captured.lock().is_empty(), "{name}: nothing should be sent");
            continue;
        }
        result.unwrap_or_else(|e| panic!("{name}: call failed: {e}"));

        let sent = captured.lock().pop().unwrap();
        let expected = &case["expected_request"];
        assert_eq!(sent.method, parse_method(expected["method"].as_str().unwrap()), "{name}: method");
        assert_eq!(sent.url, expected["url"].as_str().unwrap(), "{name}: url");
        assert_eq!(sent.headers, pairs(&expected["headers"]), "{name}: headers");

        let body: Value = sent
            .body
            .as_deref()
            .map(|b| serde_json::from_str(b).unwrap())
            .unwrap_or(Value::Null);
        assert_eq!(body, expected["body"], "{name}: body");
    }
}
