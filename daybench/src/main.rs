fn main() {
    if let Err(e) = daybench::run() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
