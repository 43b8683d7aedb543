#[tokio::main]
async fn main() {
  if let Err(e) = workout_log_lib::run().await {
    eprintln!("Failed to start workout log server: {}", e);
    std::process::exit(1);
  }
}
