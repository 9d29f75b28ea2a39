use micro_dispatch::{Flow, RequestContext, Server, handler_fn};

async fn hello_world(_ctx: &mut RequestContext) -> Flow {
    "hello world".into()
}

async fn default_handler(_ctx: &mut RequestContext) -> Flow {
    "404 not found".into()
}

#[tokio::main]
async fn main() {
    let mut server = Server::default();
    let root = server.root().clone();
    server.on(&root).get("/", handler_fn(hello_world)).unwrap();
    server.not_found(handler_fn(default_handler));

    server.start("127.0.0.1:3000").await.unwrap();
}
