fn main() -> anyhow::Result<()> {
    lsmbench_server::cli::execute()
}
