use std::env;

#[tokio::main]
async fn main() {
    million::logging::init();

    let raw_args: Vec<String> = env::args().collect();
    if raw_args.get(1).map(|s| s.as_str()) == Some("serve") {
        let port = raw_args
            .get(2)
            .and_then(|s| s.parse::<u16>().ok())
            .unwrap_or(8080);
        if let Err(e) = million::api::run_http_server(port).await {
            tracing::error!("server error: {e}");
            std::process::exit(1);
        }
        return;
    }

    match million::api::run_cli(raw_args) {
        Ok(output) => println!("{output}"),
        Err(million::api::CliError::Args(e)) => e.exit(),
        Err(e) => {
            tracing::error!("{e}");
            eprintln!("Usage: million --rate <RATE> [--mode contribution|time] ... | million serve [port]");
            std::process::exit(1);
        }
    }
}
