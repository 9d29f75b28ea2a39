use micro_dispatch::{Flow, RequestContext, Server, ServerOptions, handler_fn};

async fn empty_body(_ctx: &mut RequestContext) -> Flow {
    "".into()
}

async fn echo_uid(ctx: &mut RequestContext) -> Flow {
    ctx.param("id").unwrap_or_default().to_owned().into()
}

#[tokio::main]
async fn main() {
    let mut server = Server::new(ServerOptions::default().catch_panics(true));
    let root = server.root().clone();

    server.on(&root).get("/", handler_fn(empty_body)).unwrap();
    server.on(&root).post("/user", handler_fn(empty_body)).unwrap();
    server.on(&root).get("/user/:id", handler_fn(echo_uid)).unwrap();

    server.start("127.0.0.1:3000").await.unwrap();
}
