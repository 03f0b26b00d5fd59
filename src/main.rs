#[tokio::main]
async fn main() {
    esrent::start_server().await;
}
