use http::{Method, StatusCode};
use micro_dispatch::{
    Flow, JsonResponse, Redirect, RequestContext, Server, ServerOptions, handler_fn, log_requests, sync_handler_fn,
};
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Debug)]
pub struct User {
    name: String,
    zip: String,
}

// curl -v http://127.0.0.1:8080/api/users/42?verbose=1
async fn get_user(ctx: &mut RequestContext) -> Flow {
    let id = ctx.param("id").unwrap_or_default();
    let verbose = ctx.query_or("verbose", "0");
    JsonResponse::ok(serde_json::json!({ "id": id, "verbose": verbose })).into()
}

// curl -v -H 'Content-Type: application/json' -d '{"name":"hello","zip":"world"}' http://127.0.0.1:8080/api/users
async fn create_user(ctx: &mut RequestContext) -> Flow {
    match ctx.body_json::<User>().await {
        Ok(user) => JsonResponse::ok(user).with_status(StatusCode::CREATED).into(),
        Err(e) => JsonResponse::error_with(StatusCode::BAD_REQUEST, [e]).into(),
    }
}

// curl -v http://127.0.0.1:8080/files/docs/report.json
async fn serve_file(ctx: &mut RequestContext) -> Flow {
    format!("receive from method: {}, file: {}\r\n", ctx.method(), ctx.param("path").unwrap_or_default()).into()
}

async fn require_token(ctx: &mut RequestContext) -> Flow {
    if ctx.headers().contains_key("x-token") {
        Flow::Continue
    } else {
        StatusCode::UNAUTHORIZED.into()
    }
}

#[tokio::main]
async fn main() {
    let options = ServerOptions::default().catch_panics(true).profile_labels(true).on_request_done(|summary| {
        println!("{} {} {} -> {} in {:?}", summary.group, summary.method, summary.path, summary.status, summary.elapsed);
    });

    let mut server = Server::new(options);
    server.use_middleware(log_requests());
    let root = server.root().clone();

    server.on(&root).get("/", sync_handler_fn(|_ctx: &mut RequestContext| Redirect::to("/api/users/1", false).into())).unwrap();
    server.on(&root).get("/files/*path", handler_fn(serve_file)).unwrap();

    let api = server.sub_group("api", "/api");
    server.on(&api).get("/users/:id", handler_fn(get_user)).unwrap();

    let admin = api.sub_group("admin", "/admin");
    admin.use_middleware(handler_fn(require_token));
    server.on(&admin).add_route(Method::POST, "/users", handler_fn(create_user)).unwrap();

    server.start("127.0.0.1:8080").await.unwrap();
}
