#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = exam_gate::run_worker().await {
        eprintln!("exam-gate-worker fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
