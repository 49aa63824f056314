fn main() {
    if let Err(err) = probedesk::cli::run() {
        probedesk::ui::eprintln_error(&err);
        std::process::exit(probedesk::exit::exit_code(&err));
    }
}
