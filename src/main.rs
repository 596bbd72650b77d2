fn main() {
    if let Err(err) = chatpane::cli::main() {
        eprintln!("❌ Error: {err}");
        std::process::exit(1);
    }
}
