use anyhow::Result;

fn main() -> Result<()> {
    autopie::cli::run()
}
