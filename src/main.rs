#[tokio::main]
async fn main() {
    if let Err(e) = donacore::run().await {
        eprintln!("{:?}", e);
        std::process::exit(1);
    }
}
