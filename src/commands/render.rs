use crate::RenderArgs;

pub async fn run(args: &RenderArgs) -> Result<(), anyhow::Error> {
    let builder = super::load_builder(args.config_file.as_deref()).await?;
    builder.load().await?;

    let output = builder.render_path(&args.document).await?;
    println!("{output}");

    Ok(())
}
