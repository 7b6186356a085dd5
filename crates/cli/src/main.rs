//! `sdkgen` binary.

fn main() {
    std::process::exit(sdkgen_cli::run(std::env::args().collect()));
}
