use crate::BuildArgs;
use crate::build::ActionOptions;

pub async fn run(args: &BuildArgs) -> Result<(), anyhow::Error> {
    let builder = super::load_builder(args.config_file.as_deref()).await?;

    let summary = builder.generate(&ActionOptions::default()).await?;

    println!(
        "Built site to {} ({} documents, {} layouts, {} static files)",
        builder.output_dir().display(),
        summary.written,
        summary.layouts,
        summary.copied
    );
    if summary.skipped > 0 {
        println!("Skipped {} ignored document(s)", summary.skipped);
    }

    Ok(())
}
