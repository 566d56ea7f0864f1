#[tokio::main]
async fn main() -> anyhow::Result<()> {
    match exam_gate::run_reconcile_once().await {
        Ok(summary) => println!("{summary}"),
        Err(e) => {
            eprintln!("exam-gate-reconcile fatal: {e:#}");
            std::process::exit(1);
        }
    }
    Ok(())
}
