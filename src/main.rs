use vigil::cli::{print_error, Cli};

#[tokio::main]
async fn main() {
    if let Err(e) = Cli::run().await {
        print_error(&e.to_string());
        std::process::exit(1);
    }
}
