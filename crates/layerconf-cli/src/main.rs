use std::process::ExitCode;

fn main() -> ExitCode {
    layerconf_cli::run()
}
