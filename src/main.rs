#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = exam_gate::run().await {
        eprintln!("exam-gate fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
