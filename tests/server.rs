use std::sync::Arc;

use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;

use quizgen::llm::GenerationClient;
use quizgen::llm::testing::ScriptedBackend;
use quizgen::server::Server;
use quizgen::{Request, service};

#[tokio::test]
async fn quiz_round_trip_over_tcp() {
    let reply = json!([{
        "question": "What is the largest ocean?",
        "options": ["Atlantic", "Indian", "Arctic", "Pacific"],
        "answer": "Pacific"
    }]);
    let backend = Arc::new(ScriptedBackend::new().reply_text(reply.to_string()));
    let pipeline = service::pipeline(GenerationClient::new(backend.clone()), ["*"]);

    let server = Server::bind("127.0.0.1:0").await.unwrap();
    let addr = server.local_addr();
    let (stop, stopped) = oneshot::channel::<()>();
    let serving = tokio::spawn(server.run_until(
        move |req: Request| {
            let pipeline = pipeline.clone();
            async move { pipeline.handle(req).await }
        },
        async {
            let _ = stopped.await;
        },
    ));

    let body = json!({ "category": "geography", "difficulty": "easy", "count": 1 }).to_string();
    let raw = format!(
        "POST /generate-quiz HTTP/1.1\r\nHost: {addr}\r\nContent-Type: application/json\r\n\
         Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw.as_bytes()).await.unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();

    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{response}");
    assert!(response.contains("Content-Type: application/json\r\n"));
    assert!(response.contains("Access-Control-Allow-Origin: *\r\n"));

    let (_, payload) = response.split_once("\r\n\r\n").unwrap();
    let payload: Value = serde_json::from_str(payload).unwrap();
    assert_eq!(payload["questions"][0]["correctAnswer"], "Pacific");
    assert_eq!(payload["questions"][0]["explanation"], "");
    assert_eq!(backend.calls(), 1);

    stop.send(()).unwrap();
    serving.await.unwrap().unwrap();
}
