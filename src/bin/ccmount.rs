fn main() {
    if let Err(e) = ccmount::cli::run() {
        eprintln!("ccmount: {:#}", e);
        std::process::exit(1);
    }
}
