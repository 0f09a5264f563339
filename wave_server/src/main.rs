#[tokio::main]
async fn main() -> std::io::Result<()> {
    wave_server::run_with_config().await
}
