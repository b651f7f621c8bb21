fn main() -> anyhow::Result<()> {
    shelf_cli::run()
}
