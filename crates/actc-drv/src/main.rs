fn main() {
    if let Err(e) = actc_drv::main() {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
