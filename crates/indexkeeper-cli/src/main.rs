// ikeep entry point

use indexkeeper_cli::{output, router::CommandRouter};

#[tokio::main]
async fn main() {
    // Route and execute command
    if let Err(e) = CommandRouter::route().await {
        if tracing::enabled!(tracing::Level::DEBUG) {
            eprintln!("{}", e.technical_details());
        }
        output::print_error(&e.user_message());
        std::process::exit(1);
    }
}
