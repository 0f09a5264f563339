// One server per test binary, booted lazily on an ephemeral port.
use std::{
    sync::{Arc, OnceLock},
    time::Duration,
};

static SERVER_URL: OnceLock<String> = OnceLock::new();
static SERVER_READY: OnceLock<()> = OnceLock::new();

// Boots the server on first use and returns its `http://host:port` base URL.
pub fn ensure_server() -> &'static str {
    SERVER_READY.get_or_init(|| {
        let published = Arc::new(OnceLock::<String>::new());
        let published_by_server = Arc::clone(&published);
        // A dedicated OS thread and runtime so the server outlives each `#[tokio::test]` runtime.
        std::thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().expect("test runtime");
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                    .await
                    .expect("bind ephemeral test port");
                let addr = listener.local_addr().expect("get local addr");
                let _ = published_by_server.set(format!("http://{addr}"));
                wave_server::run(listener).await.expect("server failed");
            });
        });
        wait_until_accepting(published);
    });

    SERVER_URL
        .get()
        .expect("server url should be initialized")
        .as_str()
}

fn wait_until_accepting(published: Arc<OnceLock<String>>) {
    let base_url = loop {
        if let Some(url) = published.get() {
            break url.clone();
        }
        std::thread::sleep(Duration::from_millis(10));
    };
    let _ = SERVER_URL.set(base_url.clone());

    let addr = base_url
        .strip_prefix("http://")
        .expect("base url should use http://");
    for _ in 0..100 {
        if std::net::TcpStream::connect(addr).is_ok() {
            return;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    panic!("server did not become ready in time");
}

// WebSocket URL for `lobby_id`, or the default lobby when `None`.
#[allow(dead_code)]
pub fn ws_url(lobby_id: Option<&str>) -> String {
    let base = ensure_server().replacen("http://", "ws://", 1);
    match lobby_id {
        Some(id) => format!("{base}/ws?lobby_id={id}"),
        None => format!("{base}/ws"),
    }
}

// Creates a lobby over the internal route and returns the response status.
#[allow(dead_code)]
pub async fn create_lobby(lobby_id: &str, allowed_player_ids: &[&str]) -> reqwest::StatusCode {
    let payload = serde_json::json!({
        "lobby_id": lobby_id,
        "allowed_player_ids": allowed_player_ids,
    });
    reqwest::Client::new()
        .post(format!("{}/lobbies", ensure_server()))
        .json(&payload)
        .send()
        .await
        .expect("request should succeed")
        .status()
}
