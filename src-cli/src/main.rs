fn main() -> std::process::ExitCode {
    fasternet_lib::run()
}
