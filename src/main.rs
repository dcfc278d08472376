#[tokio::main]
async fn main() -> std::process::ExitCode {
    modsync_lib::run().await
}
