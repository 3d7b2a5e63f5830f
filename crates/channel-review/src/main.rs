use channel_review::telemetry::{init_tracing, level_for};
use clap::Parser;

mod cli;

fn main() {
    let args = cli::Cli::parse();
    init_tracing(args.json_logs, level_for(args.verbose));

    let out = match cli::run(args) {
        Ok(out) => out,
        Err(e) => {
            eprintln!("channel-review: {e}");
            std::process::exit(2);
        }
    };
    match serde_json::to_string_pretty(&out) {
        Ok(text) => println!("{text}"),
        Err(e) => {
            eprintln!("channel-review: failed to encode result: {e}");
            std::process::exit(2);
        }
    }
    if out.is_failure() {
        std::process::exit(1);
    }
}
