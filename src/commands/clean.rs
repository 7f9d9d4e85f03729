use crate::CleanArgs;
use crate::build::ActionOptions;

pub async fn run(args: &CleanArgs) -> Result<(), anyhow::Error> {
    let builder = super::load_builder(args.config_file.as_deref()).await?;
    let site_path = builder.output_dir();

    let options = ActionOptions {
        dry_run: args.dry_run,
        ..Default::default()
    };
    let summary = builder.clean(&options).await?;

    // Delete the generated site folder
    match (summary.removed, args.dry_run) {
        (false, _) => println!("Nothing to delete at {}", site_path.display()),
        (true, true) => println!("Would delete {}", site_path.display()),
        (true, false) => println!("Deleted {}", site_path.display()),
    }

    Ok(())
}
