fn main() -> anyhow::Result<()> {
    dam_selfhost::cli::cli_main()
}
