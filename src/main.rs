fn main() {
    std::process::exit(repoharvest::app::startup::startup());
}
