fn main() -> std::process::ExitCode {
    idcheck::run()
}
