use game_bot::frameworks::runtime;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    runtime::run_from_env().await
}
