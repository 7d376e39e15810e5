//! Binary entry point for the `smmc` front end.

fn main() {
    if let Err(e) = smm::cli::run_cli() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
