fn main() {
    if let Err(err) = nl_analytics::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
