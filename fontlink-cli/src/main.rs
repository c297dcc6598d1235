//! Binary entrypoint for fontlink.

fn main() {
    if let Err(err) = fontlink_cli::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
