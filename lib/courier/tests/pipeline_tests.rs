//! Integration tests for `Manager` pipelines using wiremock.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use assert2::{check, let_assert};
use courier::stage::BearerAuthStage;
use courier::{
    DecodeIntent, Error, ErrorKind, Manager, Method, Part, Request, RequestStage, Response,
    ResponseStage, StageError, StagePhase, request_stage_fn, response_stage_fn,
};
use serde::{Deserialize, Serialize};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_json, body_string_contains, header, method, path, query_param},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct User {
    id: u64,
    name: String,
}

/// Records every callback it receives.
#[derive(Debug, Clone)]
struct Recorder {
    name: &'static str,
    log: Arc<Mutex<Vec<String>>>,
    fail: bool,
}

impl Recorder {
    fn new(name: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            name,
            log: Arc::clone(log),
            fail: false,
        }
    }

    fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    fn push(&self, entry: String) {
        self.log.lock().expect("lock").push(entry);
    }
}

impl RequestStage for Recorder {
    fn name(&self) -> &str {
        self.name
    }

    fn transform(&self, request: Request) -> Result<Request, StageError> {
        self.push(format!("req:{}", self.name));
        if self.fail {
            return Err(StageError::new(format!("{} failed", self.name)));
        }
        Ok(request)
    }
}

impl ResponseStage for Recorder {
    fn name(&self) -> &str {
        self.name
    }

    fn transform_response(
        &self,
        response: Response,
        _request: &Request,
    ) -> Result<Response, StageError> {
        self.push(format!("res:{}", self.name));
        if self.fail {
            return Err(StageError::new(format!("{} failed", self.name)));
        }
        Ok(response)
    }

    fn transform_error(&self, error: Error, _request: &Request) -> Error {
        self.push(format!("err:{}", self.name));
        error
    }
}

fn entries(log: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
    log.lock().expect("lock").clone()
}

async fn ok_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ping"))
        .respond_with(ResponseTemplate::new(200).set_body_string("pong"))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn stages_run_in_registration_order() {
    let server = ok_server().await;
    let log = Arc::new(Mutex::new(Vec::new()));

    let manager = Manager::builder()
        .base_url(server.uri())
        .request_stage(Recorder::new("r1", &log))
        .request_stage(Recorder::new("r2", &log))
        .response_stage(Recorder::new("s1", &log))
        .response_stage(Recorder::new("s2", &log))
        .build()
        .expect("manager");

    let response = manager
        .execute(Request::builder(Method::Get, "/ping").build())
        .await
        .expect("response");

    check!(response.status() == 200);
    check!(response.text().expect("text") == "pong");
    check!(entries(&log) == ["req:r1", "req:r2", "res:s1", "res:s2"]);
}

#[tokio::test]
async fn response_stage_failure_skips_itself_and_earlier_stages() {
    let server = ok_server().await;
    let log = Arc::new(Mutex::new(Vec::new()));

    let manager = Manager::builder()
        .base_url(server.uri())
        .response_stage(Recorder::new("s0", &log))
        .response_stage(Recorder::new("s1", &log).failing())
        .response_stage(Recorder::new("s2", &log))
        .build()
        .expect("manager");

    let_assert!(Err(err) = manager.execute(Request::builder(Method::Get, "/ping").build()).await);

    check!(entries(&log) == ["res:s0", "res:s1", "err:s2"]);
    let_assert!(Error::Stage { phase, index, stage, .. } = &err);
    check!(*phase == StagePhase::Response);
    check!(*index == 1);
    check!(stage == "s1");
}

#[tokio::test]
async fn request_stage_failure_never_dispatches() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let log = Arc::new(Mutex::new(Vec::new()));

    let manager = Manager::builder()
        .base_url(server.uri())
        .request_stage(Recorder::new("r0", &log).failing())
        .request_stage(Recorder::new("r1", &log))
        .response_stage(Recorder::new("s0", &log))
        .response_stage(Recorder::new("s1", &log))
        .build()
        .expect("manager");

    let_assert!(Err(err) = manager.execute(Request::builder(Method::Get, "/ping").build()).await);

    check!(err.kind() == ErrorKind::Stage);
    check!(entries(&log) == ["req:r0", "err:s0", "err:s1"]);
}

#[tokio::test]
async fn error_handlers_can_rewrite_errors() {
    let server = MockServer::start().await;
    let manager = Manager::builder()
        .base_url(server.uri())
        .request_stage(request_stage_fn("reject", |_| Err(StageError::new("nope"))))
        .response_stage(ContextStage("first"))
        .response_stage(ContextStage("second"))
        .build()
        .expect("manager");

    let_assert!(Err(err) = manager.execute(Request::builder(Method::Get, "/").build()).await);

    check!(err.to_string() == "second: first: request stage #0 (`reject`) failed: nope");
    check!(err.root().kind() == ErrorKind::Stage);
}

#[derive(Debug)]
struct ContextStage(&'static str);

impl ResponseStage for ContextStage {
    fn transform_error(&self, error: Error, _request: &Request) -> Error {
        error.context(self.0)
    }
}

#[tokio::test]
async fn dispatch_failure_reaches_every_error_handler() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let manager = Manager::builder()
        .base_url("http://127.0.0.1:1")
        .response_stage(Recorder::new("s0", &log))
        .response_stage(Recorder::new("s1", &log))
        .build()
        .expect("manager");

    let_assert!(Err(err) = manager.execute(Request::builder(Method::Get, "/").build()).await);

    check!(err.is_connection());
    check!(entries(&log) == ["err:s0", "err:s1"]);
}

#[tokio::test]
async fn invalid_url_fails_before_dispatch() {
    let manager = Manager::builder()
        .base_url("not a url")
        .build()
        .expect("manager");

    let_assert!(Err(err) = manager.execute(Request::builder(Method::Get, "/x").build()).await);
    check!(err.kind() == ErrorKind::Preparation);
}

#[tokio::test]
async fn request_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let manager = Manager::builder()
        .base_url(server.uri())
        .build()
        .expect("manager");

    let request = Request::builder(Method::Get, "/slow")
        .timeout(Duration::from_millis(100))
        .build();
    let_assert!(Err(err) = manager.execute(request).await);
    check!(err.is_timeout());
}

#[tokio::test]
async fn manager_timeout_applies_without_request_override() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let manager = Manager::builder()
        .base_url(server.uri())
        .timeout(Duration::from_millis(100))
        .build()
        .expect("manager");

    let_assert!(Err(err) = manager.execute(Request::builder(Method::Get, "/").build()).await);
    check!(err.is_timeout());
}

#[tokio::test]
async fn decode_with_key_path() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": {"rows": [{"id": 1, "name": "Alice"}, {"id": 2, "name": "Bob"}]}
        })))
        .mount(&server)
        .await;

    let manager = Manager::builder()
        .base_url(server.uri())
        .with_defaults()
        .build()
        .expect("manager");

    let request = Request::builder(Method::Get, "/users")
        .decode(DecodeIntent::of::<Vec<User>>().at("data.rows"))
        .build();
    let response = manager.execute(request).await.expect("response");

    let_assert!(Some(users) = response.model_as::<Vec<User>>());
    check!(users.len() == 2);
    check!(users[1].name == "Bob");
}

#[tokio::test]
async fn decode_is_skipped_on_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(serde_json::json!({"error": "missing"})),
        )
        .mount(&server)
        .await;

    let manager = Manager::builder()
        .base_url(server.uri())
        .with_defaults()
        .build()
        .expect("manager");

    let request = Request::builder(Method::Get, "/users/9")
        .decode(DecodeIntent::of::<User>())
        .build();
    let response = manager.execute(request).await.expect("response");

    check!(response.status() == 404);
    check!(!response.succeed());
    check!(response.model().is_none());
}

#[tokio::test]
async fn default_and_request_headers_are_merged() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/headers"))
        .and(header("x-client", "courier"))
        .and(header("x-trace", "override"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let manager = Manager::builder()
        .base_url(format!("{}/", server.uri()))
        .header("X-Client", "courier")
        .header("X-Trace", "default")
        .build()
        .expect("manager");

    let request = Request::builder(Method::Get, "headers")
        .header("x-trace", "override")
        .query("page", "2")
        .build();
    let response = manager.execute(request).await.expect("response");
    check!(response.status() == 204);
}

#[tokio::test]
async fn json_body() {
    let server = MockServer::start().await;
    let user = User {
        id: 3,
        name: "Carol".to_string(),
    };
    Mock::given(method("POST"))
        .and(path("/users"))
        .and(header("content-type", "application/json"))
        .and(body_json(&user))
        .respond_with(ResponseTemplate::new(201).set_body_json(&user))
        .expect(1)
        .mount(&server)
        .await;

    let manager = Manager::builder()
        .base_url(server.uri())
        .build()
        .expect("manager");

    let request = Request::builder(Method::Post, "/users").json(user.clone()).build();
    let response = manager.execute(request).await.expect("response");

    check!(response.status() == 201);
    check!(response.json::<User>().expect("json") == user);
}

#[tokio::test]
async fn multipart_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .and(body_string_contains("name=\"title\""))
        .and(body_string_contains("hello"))
        .and(body_string_contains("filename=\"a.txt\""))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let manager = Manager::builder()
        .base_url(server.uri())
        .build()
        .expect("manager");

    let request = Request::builder(Method::Post, "/upload")
        .part(Part::text("title", "hello"))
        .part(Part::new("file", "content").with_filename("a.txt"))
        .build();
    let response = manager.execute(request).await.expect("response");
    check!(response.succeed());
}

#[tokio::test]
async fn bearer_auth_stage() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("authorization", "Bearer secret-token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let manager = Manager::builder()
        .base_url(server.uri())
        .request_stage(BearerAuthStage::new("secret-token"))
        .build()
        .expect("manager");

    let response = manager
        .execute(Request::builder(Method::Get, "/me").build())
        .await
        .expect("response");
    check!(response.succeed());
}

#[tokio::test]
async fn response_stage_fn_sees_the_request() {
    let server = ok_server().await;
    let manager = Manager::builder()
        .base_url(server.uri())
        .response_stage(response_stage_fn("upper", |mut response, request| {
            check!(request.path() == "/ping");
            let body = response.text().map_err(StageError::from_error)?.to_uppercase();
            response.set_body(body);
            Ok(response)
        }))
        .build()
        .expect("manager");

    let response = manager
        .execute(Request::builder(Method::Get, "/ping").build())
        .await
        .expect("response");
    check!(response.text().expect("text") == "PONG");
}

#[tokio::test]
async fn concurrent_requests_share_a_manager() {
    let server = ok_server().await;
    let manager = Manager::builder()
        .base_url(server.uri())
        .transport(|transport| transport.with_concurrency_limit(2))
        .build()
        .expect("manager");

    let calls = (0..8).map(|_| manager.execute(Request::builder(Method::Get, "/ping").build()));
    let results = futures_util::future::join_all(calls).await;

    check!(results.len() == 8);
    for result in results {
        let_assert!(Ok(response) = result);
        check!(response.status() == 200);
    }
}

#[tokio::test]
async fn cancellation_during_dispatch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;
    let log = Arc::new(Mutex::new(Vec::new()));

    let manager = Manager::builder()
        .base_url(server.uri())
        .response_stage(Recorder::new("s0", &log))
        .build()
        .expect("manager");

    let cancel = tokio::time::sleep(Duration::from_millis(50));
    let_assert!(
        Err(err) = manager
            .execute_with_cancel(Request::builder(Method::Get, "/").build(), cancel)
            .await
    );

    check!(matches!(err, Error::Cancelled));
    check!(entries(&log) == ["err:s0"]);
}

#[tokio::test]
async fn response_records_duration_and_prepared_request() {
    let server = ok_server().await;
    let manager = Manager::builder()
        .base_url(server.uri())
        .build()
        .expect("manager");

    let response = manager
        .execute(Request::builder(Method::Get, "/ping").build())
        .await
        .expect("response");

    let request = response.request();
    let_assert!(Some(prepared) = request.prepared());
    check!(prepared.url().path() == "/ping");
    check!(request.started_at().is_some());
    check!(request.finished_at().is_some());
    check!(response.duration() == request.duration());
}
