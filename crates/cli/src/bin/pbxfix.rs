use anyhow::Result;

fn main() -> Result<()> {
    pbxfix_cli::main_entry()
}
