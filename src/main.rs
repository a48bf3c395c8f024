fn main() -> anyhow::Result<()> {
    dyndispatch::cli::run_cli()
}
