fn main() -> anyhow::Result<()> {
    recording_core::run()
}
