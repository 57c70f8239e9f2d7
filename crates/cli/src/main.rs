fn main() {
    if let Err(error) = marginalia_cli::run(std::env::args_os()) {
        eprintln!("Error: {error:#}");
        std::process::exit(1);
    }
}
