fn main() -> anyhow::Result<()> {
    ik_cli::run()
}
