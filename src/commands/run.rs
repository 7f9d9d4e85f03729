use crate::RunArgs;
use crate::build::{ActionOptions, ActionQueue};

pub async fn run(args: &RunArgs) -> Result<(), anyhow::Error> {
    let builder = super::load_builder(args.config_file.as_deref()).await?;

    let options = ActionOptions {
        paths: args.paths.clone(),
        dry_run: args.dry_run,
        ..Default::default()
    };

    // Each argument is its own bundle, so `run "load render" write` runs two
    let mut queue = ActionQueue::new();
    for bundle in &args.actions {
        queue.push(bundle, options.clone(), move |outcome| match outcome {
            Ok(results) => {
                for result in results {
                    println!("{}: {}", result.action, result.value);
                }
            }
            Err(err) => println!("{bundle}: {err}"),
        });
    }

    let failed = builder.run_queue(queue).await;
    if failed > 0 {
        return Err(anyhow::anyhow!(
            "{failed} of {total} action bundle(s) failed",
            total = args.actions.len()
        ));
    }

    Ok(())
}
