fn main() -> anyhow::Result<()> {
    benchmon::run()
}
